pub mod assemble;
pub mod render;

pub use assemble::ReportAssembler;
