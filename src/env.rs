use std::{env, path::PathBuf};

pub struct Env {}

impl Env {
    pub const SYS_NAME: &'static str = "ditto-plot";
    pub const RESULTS_DIR_VAR: &'static str = "DITTO_RESULTS_DIR";
    pub const SCALE_FILE_NAME: &'static str = "scale.txt";

    pub fn proj_root() -> PathBuf {
        env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Directory holding the experiment logs, and where figures are written
    /// to. The plotting scripts live next to it, hence the `..` default.
    pub fn results_root() -> PathBuf {
        match env::var(Self::RESULTS_DIR_VAR) {
            Ok(dir) => Self::expand_path(&dir),
            Err(_) => {
                let mut path = Self::proj_root();
                path.push("..");
                path.push("results");
                path
            }
        }
    }

    pub fn scale_file() -> PathBuf {
        let mut path = Self::proj_root();
        path.push(Self::SCALE_FILE_NAME);
        path
    }

    /// Expand `~` and environment variables in user-provided paths.
    pub fn expand_path(path: &str) -> PathBuf {
        match shellexpand::full(path) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                log::warn!("{}: failed to expand path (path={path}, error={e})", Self::SYS_NAME);
                PathBuf::from(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_file_is_in_working_dir() {
        let scale_file = Env::scale_file();
        assert!(scale_file.ends_with(Env::SCALE_FILE_NAME));
    }

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        assert_eq!(
            Env::expand_path("/tmp/results"),
            PathBuf::from("/tmp/results")
        );
    }
}
