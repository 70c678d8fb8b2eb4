//! Server configuration
//!
//! [`ServeConfig`] is the read-only configuration surface of the replay core:
//! where the data lives, which port to serve on, and how playback behaves.
//! It can be built in code with chainable setters or loaded from YAML.
//!
//! ```rust
//! use std::time::Duration;
//! use xviz_replay::ServeConfig;
//!
//! let config = ServeConfig::new("/data/generated/circle")
//!     .with_port(8081)
//!     .with_live(true)
//!     .with_send_interval(Duration::from_millis(100));
//! config.validate().expect("valid configuration");
//! ```
//!
//! ```yaml
//! data_directory: kitti-2011_09_26
//! port: 8081
//! frame_limit: 500
//! live: true
//! skip_images: false
//! send_interval: 50   # milliseconds
//! wrap_policy: avoid_repeat
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resolver::WrapPolicy;
use crate::types::{RangeEnd, RequestDefaults};
use crate::{Result, ServeError};

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(50);

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration consumed read-only by the replay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Directory the frames are served from.
    pub data_directory: PathBuf,
    pub bind_address: IpAddr,
    /// WebSocket port; `0` picks a free port.
    pub port: u16,
    /// Number of frames to send; above the frame count playback loops.
    pub frame_limit: Option<usize>,
    /// Play forever, shifting timestamps on every loop.
    pub live: bool,
    /// Drop image primitives from frames before sending.
    pub skip_images: bool,
    #[serde(with = "duration_ms")]
    pub send_interval: Duration,
    pub wrap_policy: WrapPolicy,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::new(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            frame_limit: None,
            live: false,
            skip_images: false,
            send_interval: DEFAULT_SEND_INTERVAL,
            wrap_policy: WrapPolicy::default(),
        }
    }
}

impl ServeConfig {
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self { data_directory: data_directory.into(), ..Self::default() }
    }

    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_frame_limit(mut self, limit: Option<usize>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn with_skip_images(mut self, skip: bool) -> Self {
        self.skip_images = skip;
        self
    }

    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    pub fn with_wrap_policy(mut self, policy: WrapPolicy) -> Self {
        self.wrap_policy = policy;
        self
    }

    /// Resolve a relative data directory against `base`; absolute paths are kept.
    pub fn resolve_data_directory(mut self, base: &Path) -> Self {
        if self.data_directory.is_relative() {
            self.data_directory = base.join(&self.data_directory);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_directory.as_os_str().is_empty() {
            return Err(ServeError::config("data directory is required"));
        }
        if self.send_interval.is_zero() {
            return Err(ServeError::config("send interval must be greater than zero"));
        }
        if self.frame_limit == Some(0) {
            return Err(ServeError::config("frame limit must be greater than zero"));
        }
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| ServeError::config(format!("invalid YAML configuration: {}", e)))
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| ServeError::file_error(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Defaults for requests against a catalog of `frame_count` data frames.
    ///
    /// Live sessions never end; otherwise the range covers the frame limit,
    /// or the whole catalog when no limit is set.
    pub fn request_defaults(&self, frame_count: usize) -> RequestDefaults {
        let end = if self.live {
            RangeEnd::Unbounded
        } else {
            RangeEnd::Bounded(self.frame_limit.unwrap_or(frame_count) as u64)
        };
        RequestDefaults { end, interval: self.send_interval }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_server() {
        let config = ServeConfig::default();
        assert_eq!(config.port, 8081);
        assert!(!config.live);
        assert_eq!(config.send_interval, Duration::from_millis(50));
        assert_eq!(config.wrap_policy, WrapPolicy::AvoidRepeat);
    }

    #[test]
    fn yaml_round_trip_uses_milliseconds() {
        let config = ServeConfig::from_yaml_str(
            "data_directory: circle\nport: 9000\nsend_interval: 100\nlive: true\nwrap_policy: cyclic\n",
        )
        .expect("yaml config");

        assert_eq!(config.data_directory, PathBuf::from("circle"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.send_interval, Duration::from_millis(100));
        assert!(config.live);
        assert_eq!(config.wrap_policy, WrapPolicy::Cyclic);
        assert_eq!(config.frame_limit, None);
    }

    #[test]
    fn invalid_yaml_is_config_error() {
        let err = ServeConfig::from_yaml_str("port: not-a-port").expect_err("bad port");
        assert!(matches!(err, ServeError::Config { .. }));
    }

    #[test]
    fn relative_directories_resolve_against_base() {
        let base = Path::new("/srv/data/generated");
        let relative = ServeConfig::new("circle").resolve_data_directory(base);
        assert_eq!(relative.data_directory, PathBuf::from("/srv/data/generated/circle"));

        let absolute = ServeConfig::new("/tmp/frames").resolve_data_directory(base);
        assert_eq!(absolute.data_directory, PathBuf::from("/tmp/frames"));
    }

    #[test]
    fn validation_rejects_zero_interval_and_missing_directory() {
        assert!(ServeConfig::default().validate().is_err());
        assert!(ServeConfig::new("x").with_send_interval(Duration::ZERO).validate().is_err());
        assert!(ServeConfig::new("x").with_frame_limit(Some(0)).validate().is_err());
        assert!(ServeConfig::new("x").validate().is_ok());
    }

    #[test]
    fn request_defaults_follow_live_and_limit() {
        let config = ServeConfig::new("x");
        assert_eq!(config.request_defaults(5).end, RangeEnd::Bounded(5));

        let limited = config.clone().with_frame_limit(Some(12));
        assert_eq!(limited.request_defaults(5).end, RangeEnd::Bounded(12));

        let live = config.with_live(true);
        assert_eq!(live.request_defaults(5).end, RangeEnd::Unbounded);
    }
}
