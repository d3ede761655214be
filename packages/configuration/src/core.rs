use serde::{Deserialize, Serialize};

/// Core tracker policy, shared by every protocol front-end.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Core {
    /// Interval in seconds that clients should wait between regular announces.
    #[serde(default = "Core::default_announce_interval_secs")]
    pub announce_interval_secs: u32,

    /// Minimum announce interval in seconds. Clients must not reannounce more
    /// frequently than this.
    #[serde(default = "Core::default_min_announce_interval_secs")]
    pub min_announce_interval_secs: u32,

    /// Weather the tracker should collect usage statistics (request counters
    /// and response-time histograms).
    #[serde(default = "Core::default_tracker_usage_statistics")]
    pub tracker_usage_statistics: bool,

    /// Logging verbosity: `off`, `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default = "Core::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for Core {
    fn default() -> Self {
        Self {
            announce_interval_secs: Self::default_announce_interval_secs(),
            min_announce_interval_secs: Self::default_min_announce_interval_secs(),
            tracker_usage_statistics: Self::default_tracker_usage_statistics(),
            log_level: Self::default_log_level(),
        }
    }
}

impl Core {
    fn default_announce_interval_secs() -> u32 {
        120
    }

    fn default_min_announce_interval_secs() -> u32 {
        120
    }

    fn default_tracker_usage_statistics() -> bool {
        true
    }

    fn default_log_level() -> LogLevel {
        LogLevel::Info
    }
}

/// Logging verbosity levels accepted in the configuration.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
