pub mod errors;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod pool;
pub mod state;
pub mod store;
pub mod validator;

pub use errors::{DispatchError, ScanFault, StoreError};
pub use models::{DispatchRequest, Scan, ScanId, ScanStatus, ScanType, TaskContext, TaskRef, ToolId};
pub use orchestrator::Orchestrator;
pub use pool::WorkerPool;
pub use store::{FileStore, MemoryStore, ScanPage, ScanQuery, ScanStore};
