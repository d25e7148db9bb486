//! Locations zk picks when the user has not configured one.

use std::path::PathBuf;

/// Directory holding `config.toml`, e.g. `~/.local/share/zk` on Linux.
///
/// Created on first use. `None` when the platform gives no home directory or
/// the directory cannot be created.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("net", "zk", "zk")?.data_local_dir().to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// `~/zk`, the store opened when neither `--root` nor `set-root` names one.
pub fn default_store_root() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join("zk"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_store_root_is_named_zk() {
        if let Some(root) = default_store_root() {
            assert!(root.ends_with("zk"));
        }
    }
}
