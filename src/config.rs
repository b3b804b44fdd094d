use std::path::PathBuf;
use std::time::Duration;

/// Simulated latency between submitting the login form and the result.
pub const LOGIN_DELAY: Duration = Duration::from_millis(800);

const APP_DIR: &str = "taskboard";
const LOG_FILE: &str = "taskboard.log";

/// Runtime settings resolved from flags, environment and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub login_delay: Duration,
    pub debug: bool,
}

impl Config {
    pub fn new(data_dir: Option<PathBuf>, no_login_delay: bool, debug: bool) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(default_data_dir),
            login_delay: if no_login_delay {
                Duration::ZERO
            } else {
                LOGIN_DELAY
            },
            debug,
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

/// Platform data directory, or `./.taskboard` when there is none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR}")))
}
