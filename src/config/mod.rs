pub mod binaries;
pub mod loader;
pub mod types;
pub mod wordlist;

pub use binaries::resolve_binary;
pub use loader::ConfigLoader;
pub use types::{EngineConfig, ToolConfig, ToolSettings};
pub use wordlist::WordlistCatalog;
