use std::fs;
use std::path::Path;

use crate::models::error::SyncError;
use crate::models::report::RunReport;

/// Write a run report as a pretty-printed JSON manifest.
pub fn write_manifest(report: &RunReport, manifest_path: &Path) -> Result<(), SyncError> {
    if let Some(parent) = manifest_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| SyncError::Storage(format!("failed to create manifest directory: {}", e)))?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| SyncError::Storage(format!("failed to serialize manifest: {}", e)))?;
    fs::write(manifest_path, json)
        .map_err(|e| SyncError::Storage(format!("failed to write manifest: {}", e)))?;
    Ok(())
}

/// Read a run report back from a JSON manifest.
pub fn read_manifest(manifest_path: &Path) -> Result<RunReport, SyncError> {
    let json = fs::read_to_string(manifest_path)
        .map_err(|e| SyncError::Storage(format!("failed to read manifest: {}", e)))?;
    let report: RunReport = serde_json::from_str(&json)
        .map_err(|e| SyncError::Storage(format!("failed to parse manifest: {}", e)))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::models::camera::{CameraSummary, SkippedCamera};
    use crate::models::diagnostics::FrameStatsSnapshot;
    use crate::models::report::{RecordedFile, RunIssue};
    use crate::models::state::{RunState, StopReason};
    use crate::trigger::policy::TriggerPolicy;

    fn sample_report() -> RunReport {
        RunReport {
            run_id: "run-1".into(),
            started_at: "2026-01-01T00:00:00+00:00".into(),
            finished_at: "2026-01-01T00:00:10+00:00".into(),
            elapsed_secs: 10.0,
            final_state: RunState::Stopped,
            stop_reason: Some(StopReason::DeadlineElapsed),
            trigger: TriggerPolicy::Threshold(30_000),
            trigger_timestamp: Some(30_080),
            cameras: vec![CameraSummary {
                id: "cam0".into(),
                name: "Top".into(),
            }],
            skipped_cameras: vec![SkippedCamera {
                camera_id: "cam1".into(),
                reason: "no image/jpeg capability".into(),
            }],
            output_directory: PathBuf::from("recordings"),
            recorded_files: vec![RecordedFile {
                path: PathBuf::from("recordings/cam0.mjpeg"),
                size_bytes: 4096,
                sha256: None,
            }],
            issues: vec![RunIssue::InvalidFrames { count: 1 }],
            stats: FrameStatsSnapshot {
                frames: 100,
                ..Default::default()
            },
        }
    }

    #[test]
    fn manifest_survives_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("run.json");
        let report = sample_report();

        write_manifest(&report, &path).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), report);
    }

    #[test]
    fn manifest_uses_snake_case_tags() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["final_state"], "stopped");
        assert_eq!(json["stop_reason"], "deadline_elapsed");
        assert_eq!(json["trigger"]["mode"], "threshold");
        assert_eq!(json["trigger"]["timestamp"], 30_000);
        assert_eq!(json["issues"][0]["kind"], "invalid_frames");
    }

    #[test]
    fn unreadable_manifest_is_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_manifest(&path), Err(SyncError::Storage(_))));
    }
}
