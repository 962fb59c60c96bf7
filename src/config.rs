use directories::ProjectDirs;
use std::path::PathBuf;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Where state lives and how loud logging is.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub prefs_path: PathBuf,
    pub log_level: String,
}

impl Config {
    /// Explicit values win; the rest come from the platform directories.
    pub fn resolve(db_path: Option<PathBuf>, prefs_path: Option<PathBuf>, log_level: Option<String>) -> Self {
        let dirs = ProjectDirs::from("", "", "tracker");
        Self {
            db_path: db_path.unwrap_or_else(|| default_db_path(dirs.as_ref())),
            prefs_path: prefs_path.unwrap_or_else(|| default_prefs_path(dirs.as_ref())),
            log_level: log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

fn default_db_path(dirs: Option<&ProjectDirs>) -> PathBuf {
    match dirs {
        Some(dirs) => dirs.data_dir().join("tracker.db"),
        // Fallback to current directory
        None => PathBuf::from("tracker.db"),
    }
}

fn default_prefs_path(dirs: Option<&ProjectDirs>) -> PathBuf {
    match dirs {
        Some(dirs) => dirs.config_dir().join("prefs.json"),
        None => PathBuf::from("tracker-prefs.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_win() {
        let config = Config::resolve(
            Some(PathBuf::from("/tmp/a.db")),
            Some(PathBuf::from("/tmp/p.json")),
            Some("debug".to_string()),
        );
        assert_eq!(config.db_path, PathBuf::from("/tmp/a.db"));
        assert_eq!(config.prefs_path, PathBuf::from("/tmp/p.json"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn defaults_are_filled_in() {
        let config = Config::resolve(None, None, None);
        assert!(config.db_path.ends_with("tracker.db"));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }
}
