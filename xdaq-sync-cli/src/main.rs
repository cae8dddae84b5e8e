//! Runs one synchronized acquisition against the synthetic backends and
//! prints the recorded files.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use xdaq_sync_core::{
    discover_cameras, write_manifest, AcquisitionController, FrameStatsSnapshot, RecordingStarted,
    RunIssue, RunObserver, RunReport, RunState, StreamSelector, SyncConfiguration, TriggerPolicy,
};
use xdaq_sync_sim::{SyntheticAcquisition, SyntheticAcquisitionConfig, SyntheticCameraService};

/// Start camera recordings when the acquisition device reaches a timestamp.
#[derive(Parser, Debug)]
#[command(name = "xdaq-sync")]
#[command(about = "Acquisition-triggered multi-camera recording", long_about = None)]
struct Args {
    /// Total run duration in seconds
    #[arg(long, default_value = "10")]
    duration: f64,

    /// Start recording at this device timestamp instead of immediately
    #[arg(long)]
    trigger_at: Option<u32>,

    /// Stop recording this many seconds after it starts
    #[arg(long)]
    record_for: Option<f64>,

    /// Directory the cameras record into
    #[arg(long, default_value = "recordings")]
    output_dir: PathBuf,

    /// Number of cameras in the synthetic rig
    #[arg(long, default_value = "3")]
    cameras: usize,

    /// How many of those cameras offer MJPEG
    #[arg(long, default_value = "2")]
    jpeg_cameras: usize,

    /// Synthetic device sample rate in Hz
    #[arg(long, default_value = "30000")]
    sample_rate: f64,

    /// Enable only these stream indices (default: all)
    #[arg(long, value_delimiter = ',')]
    streams: Vec<u16>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Print the run report as JSON on stdout instead of a file list
    #[arg(long)]
    json: bool,

    /// Include SHA-256 checksums of recorded files
    #[arg(long)]
    checksum: bool,

    /// End the run on the first device error
    #[arg(long)]
    stop_on_device_error: bool,
}

fn seconds(flag: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("{} must be a positive number of seconds", flag);
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("{} is too large", flag))
}

impl Args {
    fn run_duration(&self) -> Result<Duration> {
        seconds("--duration", self.duration)
    }

    fn to_config(&self) -> Result<SyncConfiguration> {
        self.run_duration()?;
        let recording_duration = self
            .record_for
            .map(|secs| seconds("--record-for", secs))
            .transpose()?;

        Ok(SyncConfiguration {
            output_directory: self.output_dir.clone(),
            stream_selector: if self.streams.is_empty() {
                StreamSelector::All
            } else {
                StreamSelector::Streams(self.streams.clone())
            },
            recording_duration,
            checksum_recordings: self.checksum,
            stop_on_device_error: self.stop_on_device_error,
            ..Default::default()
        })
    }

    fn trigger(&self) -> TriggerPolicy {
        match self.trigger_at {
            Some(ts) => TriggerPolicy::Threshold(u64::from(ts)),
            None => TriggerPolicy::Immediate,
        }
    }
}

/// Observer printing a live tally on stderr, keeping stdout for results.
struct ConsoleObserver {
    sample_rate: f64,
    ticks: AtomicU64,
}

impl RunObserver for ConsoleObserver {
    fn on_state_changed(&self, state: RunState) {
        if state != RunState::Running {
            eprintln!();
        }
        log::debug!("Run state: {:?}", state);
    }

    fn on_progress(&self, stats: &FrameStatsSnapshot) {
        // Every 5th tick (~2 Hz at the default poll interval).
        if self.ticks.fetch_add(1, Ordering::Relaxed) % 5 != 0 {
            return;
        }
        let secs = stats.last_timestamp as f64 / self.sample_rate;
        eprint!(
            "\r  ts {:>10} ({:>7.2}s)  frames {:>8}  invalid {:>4}  device errors {:>4}",
            stats.last_timestamp, secs, stats.frames, stats.invalid_frames, stats.device_errors
        );
        let _ = std::io::stderr().flush();
    }

    fn on_recording_started(&self, started: &RecordingStarted) {
        eprintln!(
            "\nRecording {} camera(s) from ts {}",
            started.camera_ids.len(),
            started.trigger_timestamp
        );
    }

    fn on_issue(&self, _issue: &RunIssue) {}

    fn on_run_finished(&self, report: &RunReport) {
        for issue in &report.issues {
            log::warn!("{:?}", issue);
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.to_config()?;
    let duration = args.run_duration()?;
    let trigger = args.trigger();

    let service = Arc::new(SyntheticCameraService::with_rig(args.cameras, args.jpeg_cameras));
    let cameras = discover_cameras(service.as_ref()).context("camera discovery failed")?;
    eprintln!("Found {} camera(s):", cameras.len());
    for camera in &cameras {
        let media: Vec<&str> = camera
            .capabilities
            .iter()
            .map(|c| c.media_type.as_str())
            .collect();
        eprintln!("  {} ({}): {}", camera.id, camera.name, media.join(", "));
    }

    let acquisition = SyntheticAcquisition::new(SyntheticAcquisitionConfig {
        sample_rate_hz: args.sample_rate,
        ..Default::default()
    });
    let mut controller = AcquisitionController::new(acquisition, service, config);
    controller.set_observer(Arc::new(ConsoleObserver {
        sample_rate: args.sample_rate.max(1.0),
        ticks: AtomicU64::new(0),
    }));

    let control = controller.run_control();
    ctrlc::set_handler(move || {
        if control.cancel() {
            eprintln!("\nReceived interrupt signal. Shutting down...");
        }
    })
    .context("failed to install Ctrl+C handler")?;

    eprintln!("Acquiring for {:.1}s, trigger: {}", args.duration, trigger);
    let report = controller
        .run(duration, trigger, cameras)
        .context("acquisition run failed")?;

    if let Some(ref path) = args.manifest {
        write_manifest(&report, path).with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Manifest written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let output_dir = report
        .output_directory
        .canonicalize()
        .unwrap_or_else(|_| report.output_directory.clone());
    if report.recording_triggered() {
        let failed = report
            .issues
            .iter()
            .filter(|i| matches!(i, RunIssue::StreamStartFailed { .. }))
            .count();
        let cameras_recorded = report
            .cameras
            .len()
            .saturating_sub(report.skipped_cameras.len() + failed);
        println!("Recorded {} cameras in {}", cameras_recorded, output_dir.display());
    } else {
        println!("Trigger never fired; nothing recorded in {}", output_dir.display());
    }
    for file in &report.recorded_files {
        match file.sha256 {
            Some(ref sha) => println!("{}  {}", sha, file.path.display()),
            None => println!("{}", file.path.display()),
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("xdaq-sync").chain(extra.iter().copied()))
    }

    #[test]
    fn defaults_are_valid() {
        let args = args(&[]);
        assert_eq!(args.run_duration().unwrap(), Duration::from_secs(10));
        let config = args.to_config().unwrap();
        assert_eq!(config.recording_duration, None);
        assert_eq!(config.stream_selector, StreamSelector::All);
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        assert!(args(&["--duration", "0"]).to_config().is_err());
        assert!(args(&["--duration", "NaN"]).to_config().is_err());
        assert!(args(&["--record-for=-1"]).to_config().is_err());
    }

    #[test]
    fn oversized_durations_are_errors() {
        let err = args(&["--duration", "1e20"]).to_config().unwrap_err();
        assert!(err.to_string().contains("--duration"), "{}", err);
        assert!(args(&["--duration", "1e20"]).run_duration().is_err());

        let err = args(&["--record-for", "1e20"]).to_config().unwrap_err();
        assert!(err.to_string().contains("--record-for"), "{}", err);
    }

    #[test]
    fn record_for_becomes_recording_duration() {
        let config = args(&["--record-for", "2.5"]).to_config().unwrap();
        assert_eq!(config.recording_duration, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn trigger_threshold_must_fit_device_timestamps() {
        assert_eq!(args(&[]).trigger(), TriggerPolicy::Immediate);
        assert_eq!(
            args(&["--trigger-at", "4294967295"]).trigger(),
            TriggerPolicy::Threshold(u64::from(u32::MAX))
        );
        assert!(Args::try_parse_from(["xdaq-sync", "--trigger-at", "4294967296"]).is_err());
    }
}
