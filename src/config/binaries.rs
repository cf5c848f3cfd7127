use std::path::{Path, PathBuf};
use which::which;

/// Where a configured tool binary actually lives.
///
/// Explicit paths are kept as given. Bare names are tried in
/// `<tools_dir>/bin/`, then on `PATH`. When nothing matches the name is kept
/// verbatim so the failure surfaces as `BinaryNotFound` when the scan runs.
pub fn resolve_binary(name: &str, tools_dir: Option<&Path>) -> PathBuf {
    if looks_like_path(name) {
        return PathBuf::from(name);
    }

    if let Some(dir) = tools_dir {
        let bundled = dir.join("bin").join(format!("{}{}", name, std::env::consts::EXE_SUFFIX));
        if bundled.is_file() {
            return bundled;
        }
    }

    match which(name) {
        Ok(found) => found,
        Err(_) => {
            tracing::debug!("{} not found in tools dir or PATH", name);
            PathBuf::from(name)
        }
    }
}

pub fn looks_like_path(name: &str) -> bool {
    name.contains(std::path::MAIN_SEPARATOR) || name.contains('/')
}
