use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::camera::JPEG_MEDIA_TYPE;

/// Which acquisition data streams to enable before starting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSelector {
    /// Every stream the device reports as connected.
    All,
    /// Only the listed stream indices.
    Streams(Vec<u16>),
}

/// Configuration for a synchronized acquisition run.
#[derive(Debug, Clone)]
pub struct SyncConfiguration {
    /// Directory the camera collaborator writes recordings into
    /// (default: `recordings`).
    pub output_directory: PathBuf,

    /// Capability media type a camera must offer to be recorded
    /// (default: `image/jpeg`).
    pub required_media_type: String,

    /// Acquisition streams to enable (default: all).
    pub stream_selector: StreamSelector,

    /// Poll-loop tick. Bounds the latency of cancellation and deadline
    /// checks (default: 100ms).
    pub poll_interval: Duration,

    /// Stop the take this long after it starts (None = record until the
    /// run ends).
    pub recording_duration: Option<Duration>,

    /// Compute SHA-256 of every recorded file in the final report.
    pub checksum_recordings: bool,

    /// Treat a device-reported error as a stop request (default: false).
    pub stop_on_device_error: bool,

    /// Upper bound on individually recorded issues; further ones are only
    /// counted.
    pub max_recorded_issues: usize,
}

impl SyncConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if self.poll_interval > Duration::from_secs(1) {
            return Err(format!(
                "poll interval {:?} exceeds 1s cancellation bound",
                self.poll_interval
            ));
        }
        if self.required_media_type.trim().is_empty() {
            return Err("required media type must not be empty".into());
        }
        if let StreamSelector::Streams(streams) = &self.stream_selector {
            if streams.is_empty() {
                return Err("stream selector lists no streams".into());
            }
        }
        if self.recording_duration.is_some_and(|d| d.is_zero()) {
            return Err("recording duration must be positive".into());
        }
        Ok(())
    }
}

impl Default for SyncConfiguration {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("recordings"),
            required_media_type: JPEG_MEDIA_TYPE.to_string(),
            stream_selector: StreamSelector::All,
            poll_interval: Duration::from_millis(100),
            recording_duration: None,
            checksum_recordings: false,
            stop_on_device_error: false,
            max_recorded_issues: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SyncConfiguration::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_poll_interval() {
        let config = SyncConfiguration {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfiguration {
            poll_interval: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_selection() {
        let config = SyncConfiguration {
            stream_selector: StreamSelector::Streams(vec![]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_recording_duration() {
        let config = SyncConfiguration {
            recording_duration: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
