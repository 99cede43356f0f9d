use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory whose immediate subdirectories are backup profiles.
    /// Set with `SNAPSTAT_DATA_ROOT`. Default is `/data`.
    pub data_root: String,

    /// Path to the external reporting tool. Set with `SNAPSTAT_BINARY`.
    /// Default is `/resticprofile`.
    pub binary: String,

    /// How long a computed result stays fresh. Set with
    /// `SNAPSTAT_CACHE_SECONDS`; non-positive or unparseable values fall
    /// back to the default of `3600`.
    pub cache_ttl: Duration,

    /// When `1`/`true`/`yes`, only the latest-snapshot query runs per
    /// profile and the size fields are zeroed. Set with `SNAPSTAT_REDUCED`.
    pub reduced: bool,

    /// Upper bound on a single external invocation. Set with
    /// `SNAPSTAT_SOURCE_TIMEOUT_SECS`. Default is `300`.
    pub source_timeout: Duration,

    /// Socket address to serve on. Set with `SNAPSTAT_LISTEN`.
    /// Default is `0.0.0.0:8080`.
    pub listen: String,
}

impl Config {
    pub fn from_env() -> Self {
        let data_root = std::env::var("SNAPSTAT_DATA_ROOT").unwrap_or("/data".to_owned());

        let binary = std::env::var("SNAPSTAT_BINARY").unwrap_or("/resticprofile".to_owned());

        let cache_seconds = std::env::var("SNAPSTAT_CACHE_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(3600);

        let reduced = match std::env::var("SNAPSTAT_REDUCED") {
            Ok(v) => matches!(v.as_str(), "1" | "true" | "yes"),
            Err(_) => false,
        };

        let timeout_seconds = std::env::var("SNAPSTAT_SOURCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300);

        let listen = std::env::var("SNAPSTAT_LISTEN").unwrap_or("0.0.0.0:8080".to_owned());

        Self {
            data_root,
            binary,
            cache_ttl: Duration::from_secs(cache_seconds),
            reduced,
            source_timeout: Duration::from_secs(timeout_seconds),
            listen,
        }
    }
}
