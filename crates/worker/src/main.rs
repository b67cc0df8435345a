use anyhow::Context;
use clap::{Parser, Subcommand};
use digest_core::clock::{Clock, SystemClock};
use digest_core::config::{ConfigSource, FileConfigSource, Settings};
use digest_core::domain::report::RunId;
use digest_core::notify::smtp::{SmtpMailer, SmtpOptions};
use digest_core::notify::{Mailer, OutgoingEmail};
use digest_core::pipeline::{LiveClients, PipelineOrchestrator, RunOutcome};
use digest_core::storage::reports::ReportStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Conventional shell status for SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "digest_worker", about = "Daily watchlist research digest")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Research the watchlist, store the report and email it (the default).
    Run {
        /// Run date (YYYY-MM-DD). Defaults to today's local date.
        #[arg(long)]
        date: Option<String>,

        /// Sleep until today's configured schedule time before starting.
        #[arg(long)]
        wait_for_schedule: bool,
    },
    /// Send a short test message with the configured Gmail credentials.
    TestEmail,
    /// Print the stored Markdown report for a run.
    Show {
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Run {
        date: None,
        wait_for_schedule: false,
    });

    let result = match command {
        Command::Run {
            date,
            wait_for_schedule,
        } => run(&settings, date.as_deref(), wait_for_schedule).await,
        Command::TestEmail => test_email(&settings).await,
        Command::Show { date } => show(&settings, date.as_deref()),
    };

    result.map_err(|err| {
        sentry_anyhow::capture_anyhow(&err);
        err
    })
}

async fn run(
    settings: &Settings,
    date_arg: Option<&str>,
    wait_for_schedule: bool,
) -> anyhow::Result<ExitCode> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let run_date = digest_core::time::resolve_run_date(date_arg, clock.now())?;

    let config = Arc::new(FileConfigSource::from_settings(settings));
    if wait_for_schedule {
        // Config errors surface later through the orchestrator's outcome.
        if let Ok(snapshot) = config.load() {
            if let Some(wait) = digest_core::time::until_schedule(snapshot.schedule, clock.now()) {
                tracing::info!(
                    hour = snapshot.schedule.hour,
                    minute = snapshot.schedule.minute,
                    wait_secs = wait.as_secs(),
                    "waiting for scheduled time"
                );
                clock.sleep(wait).await;
            }
        }
    }

    let store = ReportStore::open(settings.reports_dir())?;
    let clients = Arc::new(LiveClients {
        gemini: digest_core::llm::gemini::GeminiOptions::from_settings(settings),
        smtp: SmtpOptions::from_settings(settings),
    });
    let orchestrator = PipelineOrchestrator::new(config, clients, store, clock);

    tokio::select! {
        outcome = orchestrator.run(run_date) => Ok(exit_code(&outcome)),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(%run_date, "interrupted; re-run to resume from the stored report");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

/// Failures reach Sentry through the `run failed` tracing event only.
fn exit_code(outcome: &RunOutcome) -> ExitCode {
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn test_email(settings: &Settings) -> anyhow::Result<ExitCode> {
    let snapshot = FileConfigSource::from_settings(settings).load()?;
    let mailer = SmtpMailer::new(SmtpOptions::from_settings(settings));
    let email = OutgoingEmail {
        from: snapshot.credentials.user.clone(),
        to: snapshot.recipient.clone(),
        subject: "📈 주식 리서치 테스트 메일".to_string(),
        html_body: "<p>Gmail 설정이 정상입니다.</p>".to_string(),
        text_body: "Gmail 설정이 정상입니다.".to_string(),
    };

    mailer.deliver(&email, &snapshot.credentials).await?;
    tracing::info!(recipient = %snapshot.recipient, "test email sent");
    Ok(ExitCode::SUCCESS)
}

fn show(settings: &Settings, date_arg: Option<&str>) -> anyhow::Result<ExitCode> {
    let run_date = digest_core::time::resolve_run_date(date_arg, SystemClock.now())?;
    let run_id = RunId::for_date(run_date);
    let store = ReportStore::open(settings.reports_dir())?;
    let report = store
        .load(run_id)
        .with_context(|| format!("no stored report for {run_id}"))?;
    println!("{}", report.rendered_markdown());
    Ok(ExitCode::SUCCESS)
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
