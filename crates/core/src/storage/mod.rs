pub mod deliveries;
pub mod lock;
pub mod reports;

use anyhow::Context;
use std::path::Path;

/// Writes through a sibling temp file and renames it into place.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    std::fs::write(tmp, contents).with_context(|| format!("write {} failed", tmp.display()))?;
    std::fs::rename(tmp, path)
        .with_context(|| format!("rename {} -> {} failed", tmp.display(), path.display()))?;
    Ok(())
}
