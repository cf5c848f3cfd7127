pub mod options;
pub mod registry;
pub mod types;

pub mod amass;
pub mod ffuf;
pub mod httpx;
pub mod masscan;
pub mod nmap;
pub mod nuclei;
pub mod rustscan;
pub mod subfinder;
pub mod testssl;
pub mod whatweb;

pub use options::ScanOptions;
pub use registry::AdapterRegistry;
pub use types::{ToolAdapter, ToolBinding};
