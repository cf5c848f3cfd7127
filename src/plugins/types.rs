use crate::core::models::ToolId;
use crate::output::schema::Parsed;
use crate::plugins::options::ScanOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration an adapter is bound to when the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolBinding {
    pub tool: ToolId,
    /// Resolved binary, or the script path for interpreted tools.
    pub binary: PathBuf,
    /// Interpreter that runs `binary` (`bash`, `ruby`), if any.
    pub interpreter: Option<String>,
    pub timeout: Duration,
}

impl ToolBinding {
    pub fn new(tool: ToolId, binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            tool,
            binary: binary.into(),
            interpreter: None,
            timeout,
        }
    }

    pub fn interpreted(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn binary_arg(&self) -> String {
        self.binary.to_string_lossy().into_owned()
    }

    /// Leading argv elements: either `[binary]` or `[interpreter, script]`.
    pub fn launcher(&self) -> Vec<String> {
        match &self.interpreter {
            Some(interpreter) => vec![interpreter.clone(), self.binary_arg()],
            None => vec![self.binary_arg()],
        }
    }
}

/// One external tool: how to call it and how to read what it prints.
///
/// Adapters are stateless apart from their binding, so a single instance is
/// shared by every worker.
pub trait ToolAdapter: Send + Sync {
    fn binding(&self) -> &ToolBinding;

    fn tool(&self) -> ToolId {
        self.binding().tool
    }

    /// Argument vector for the tool. Never passes through a shell.
    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String>;

    /// Normalizes captured output. Must not fail: malformed fragments are
    /// dropped or downgraded.
    fn parse_output(&self, stdout: &str, stderr: &str) -> Parsed;
}
