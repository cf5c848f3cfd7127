pub mod extract;
pub mod schema;

pub use schema::{ExecutionMeta, NormalizedResult, Parsed, ScanEnvelope};
