use std::path::{Path, PathBuf};
use vandelay_core::paths;

/// Resolve the config file to read.
///
/// Priority:
/// 1. `--config` flag / `VANDELAY_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `vandelay.yaml`
/// 3. Fall back to `cwd/vandelay.yaml`
pub fn resolve_config(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd).unwrap_or_else(|| paths::config_path(&cwd))
}

/// Where `init` writes: the explicit path, else `cwd/vandelay.yaml`.
/// Never walks upward, so `init` in a subdirectory starts a new stack.
pub fn init_target(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    paths::config_path(&cwd)
}

fn find_upward(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = paths::config_path(&dir);
        if candidate.is_file() {
            return Some(candidate);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}
