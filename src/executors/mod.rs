pub mod command;

pub use command::{ProcessOutput, ProcessSupervisor, check_launchable};
