//! Replay command - run a tracking session against recorded fixes.
//!
//! The frames file stands in for a BLE GPS peripheral: every non-comment
//! line is delivered verbatim as one notification, malformed lines
//! included. The optional phone file feeds the phone location service
//! before the peripheral is connected.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use indicatif::ProgressBar;
use tokio::sync::broadcast;
use tracing::{info, warn};

use trailfix::app::{AppConfig, TrailfixApp};
use trailfix::ble::{parse_frame, BlePhase, DiscoveredPeripheral, PeripheralId};
use trailfix::geo::GeoPoint;
use trailfix::sim::{RecordingMapHost, ScriptedBleTransport, ScriptedLocationService};
use trailfix::tracking::{
    path_to_geojson, Collaborators, PositionSource, SessionSummary, TrackingHandle, TrackingUpdate,
};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Address advertised by the replayed peripheral.
const REPLAY_PERIPHERAL_ID: &str = "00:00:00:00:00:01";

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub frames: PathBuf,
    pub phone: Option<PathBuf>,
    pub follow: bool,
    pub fail_connect: bool,
    pub pick: Option<String>,
    pub geojson: Option<PathBuf>,
    pub verbose: bool,
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.verbose)?;
    runner.log_startup("replay");

    let mut config = AppConfig::from_config_file(runner.config())?;
    if args.follow {
        config.session.follow_mode = true;
    }

    let frames = read_frames(&args.frames)?;
    let phone_fixes = args.phone.as_deref().map(read_fixes).transpose()?;

    let name = args
        .frames
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "replay".to_string());
    let mut ble = ScriptedBleTransport::new().with_peripherals(vec![DiscoveredPeripheral::new(
        REPLAY_PERIPHERAL_ID,
        Some(&name),
        -60,
    )]);
    if args.fail_connect {
        ble = ble.with_connect_error("simulated connect failure");
    }

    println!("Trailfix Replay v{}", trailfix::VERSION);
    println!("====================");
    println!();
    println!("Frames:      {} ({} lines)", args.frames.display(), frames.len());
    match &phone_fixes {
        Some(fixes) => println!("Phone fixes: {}", fixes.len()),
        None => println!("Phone fixes: (none, phone GPS unavailable)"),
    }
    println!("Seed:        {}", config.session.seed);
    println!("Follow mode: {}", config.session.follow_mode);
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let replay = Replay {
        map: Arc::new(RecordingMapHost::new()),
        ble: Arc::new(ble),
        location: Arc::new(match phone_fixes {
            Some(_) => ScriptedLocationService::available(),
            None => ScriptedLocationService::unsupported(),
        }),
        frames,
        phone_fixes: phone_fixes.unwrap_or_default(),
        pick: args.pick,
    };

    let (summary, map_calls) = runtime.block_on(replay.run(config))?;
    print_summary(&summary, map_calls);

    if let Some(path) = args.geojson {
        let json = path_to_geojson(&summary.path, summary.final_source, Utc::now())
            .map_err(|e| CliError::Runtime(format!("GeoJSON encoding failed: {}", e)))?;
        std::fs::write(&path, json).map_err(|error| CliError::FileWrite {
            path: path.display().to_string(),
            error,
        })?;
        println!();
        println!("Path written to {}", path.display());
    }

    Ok(())
}

struct Replay {
    map: Arc<RecordingMapHost>,
    ble: Arc<ScriptedBleTransport>,
    location: Arc<ScriptedLocationService>,
    frames: Vec<Vec<u8>>,
    phone_fixes: Vec<GeoPoint>,
    pick: Option<String>,
}

impl Replay {
    async fn run(self, config: AppConfig) -> Result<(SessionSummary, usize), CliError> {
        let collaborators = Collaborators {
            map: self.map.clone(),
            location: self.location.clone(),
            ble: self.ble.clone(),
        };
        let app = TrailfixApp::start(config, collaborators).await?;

        let cancel = app.cancellation_token();
        ctrlc::set_handler(move || cancel.cancel())
            .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

        let printer = tokio::spawn(print_updates(app.handle().subscribe()));

        if self.drive_until_cancelled(&app).await.is_none() {
            info!("Replay interrupted");
        }

        let summary = app.shutdown().await?;
        if let Err(e) = printer.await {
            warn!(error = %e, "Update printer failed");
        }
        Ok((summary, self.map.calls().len()))
    }

    /// Drive the replay, giving up as soon as the app is cancelled.
    ///
    /// The update channel stays open while `app` is alive, so the waits in
    /// `drive` cannot see the session stop on their own.
    async fn drive_until_cancelled(&self, app: &TrailfixApp) -> Option<()> {
        let cancel = app.cancellation_token();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            done = self.drive(app.handle()) => done,
        }
    }

    /// Phone fixes, then scan, connect and stream the frames.
    ///
    /// Returns `None` when the session ended underneath.
    async fn drive(&self, handle: &TrackingHandle) -> Option<()> {
        if !self.phone_fixes.is_empty() {
            for fix in &self.phone_fixes {
                self.location.push_fix(fix.latitude(), fix.longitude());
            }
            let expected = self.phone_fixes.len() as u64;
            handle
                .wait_for(|s| s.stats.accepted + s.stats.rejected >= expected)
                .await?;
        }

        let mut updates = handle.subscribe();
        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Scanning for GPS peripherals...");
        handle.start_scan().ok()?;
        let devices = next_scan_result(&mut updates).await;
        spinner.finish_and_clear();

        let devices = devices?;
        let id = match choose_peripheral(&devices, self.pick.as_deref()) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("{}", style(e.to_string()).red());
                return Some(());
            }
        };

        handle.choose_peripheral(id).ok()?;
        if !await_connection(&mut updates).await? {
            return Some(());
        }

        for frame in &self.frames {
            self.ble.push_frame(frame.clone());
        }
        self.ble.close_feed();
        handle
            .wait_for(|s| s.ble_phase != BlePhase::Connected)
            .await?;
        info!(frames = self.frames.len(), "Replay feed exhausted");
        Some(())
    }
}

/// Wait for the scan window to close. `None` when nothing usable was found.
async fn next_scan_result(
    updates: &mut broadcast::Receiver<TrackingUpdate>,
) -> Option<Vec<DiscoveredPeripheral>> {
    loop {
        match updates.recv().await {
            Ok(TrackingUpdate::DevicesFound(devices)) => return Some(devices),
            Ok(TrackingUpdate::NoDevicesFound) => return None,
            Ok(TrackingUpdate::BleFailed {
                peripheral: None, ..
            }) => return None,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Wait for the chosen peripheral to become the active source.
///
/// `Some(false)` when connecting failed, `None` when the session ended.
async fn await_connection(updates: &mut broadcast::Receiver<TrackingUpdate>) -> Option<bool> {
    loop {
        match updates.recv().await {
            Ok(TrackingUpdate::SourceChanged(t)) if t.to == PositionSource::BlePeripheral => {
                return Some(true)
            }
            Ok(TrackingUpdate::BleFailed { .. }) => return Some(false),
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Pick a peripheral: by `--pick`, by prompt on a terminal, else the first.
fn choose_peripheral(
    devices: &[DiscoveredPeripheral],
    pick: Option<&str>,
) -> Result<PeripheralId, CliError> {
    if let Some(pick) = pick {
        return devices
            .iter()
            .find(|d| d.id.as_str() == pick || d.name.as_deref() == Some(pick))
            .map(|d| d.id.clone())
            .ok_or_else(|| CliError::InvalidArgument(format!("No peripheral matches '{}'", pick)));
    }

    if devices.len() == 1 || !Term::stdout().is_term() {
        return devices
            .first()
            .map(|d| d.id.clone())
            .ok_or_else(|| CliError::InvalidArgument("No peripherals to choose from".to_string()));
    }

    let labels: Vec<String> = devices
        .iter()
        .map(|d| format!("{} ({}, {} dBm)", d.label(), d.id, d.rssi))
        .collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a GPS peripheral")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))?;
    Ok(devices[selection].id.clone())
}

async fn print_updates(mut updates: broadcast::Receiver<TrackingUpdate>) {
    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                println!("{}", style(format!("({} updates skipped)", skipped)).dim());
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        match update {
            TrackingUpdate::PositionAccepted {
                point,
                source,
                path_len,
            } => println!(
                "{} {} via {} (path {})",
                style("+").green(),
                point,
                source,
                path_len
            ),
            TrackingUpdate::SourceChanged(t) => println!(
                "{} Source: {} -> {} ({})",
                style("*").cyan().bold(),
                t.from,
                t.to,
                t.reason
            ),
            TrackingUpdate::DevicesFound(devices) => {
                println!("{} Found {} peripheral(s)", style("*").cyan(), devices.len())
            }
            TrackingUpdate::NoDevicesFound => {
                println!("{}", style("No GPS peripherals found").yellow())
            }
            TrackingUpdate::BleFailed { peripheral, reason } => match peripheral {
                Some(id) => println!("{} {}: {}", style("!").red().bold(), id, reason),
                None => println!("{} {}", style("!").red().bold(), reason),
            },
            TrackingUpdate::FollowModeChanged(enabled) => {
                println!("{} Follow mode {}", style("*").cyan(), enabled)
            }
        }
    }
}

fn print_summary(summary: &SessionSummary, map_calls: usize) {
    println!();
    println!("{}", style("Session summary").bold());
    println!("  Final position:  {}", summary.final_position);
    println!("  Path points:     {}", summary.path.len());
    println!("  Distance:        {:.1} m", summary.stats.distance_m);
    println!(
        "  Samples:         {} accepted, {} rejected",
        summary.stats.accepted, summary.stats.rejected
    );
    println!("  Last source:     {}", summary.final_source);
    println!("  Source changes:  {}", summary.source_changes);
    println!("  BLE disconnects: {}", summary.disconnects);
    println!("  Map calls:       {}", map_calls);
}

/// Notification payloads, one per non-blank, non-comment line.
fn read_frames(path: &Path) -> Result<Vec<Vec<u8>>, CliError> {
    let content = read_input(path)?;
    Ok(input_lines(&content)
        .map(|(_, line)| line.as_bytes().to_vec())
        .collect())
}

/// Phone fixes; every line must be a valid `<lat>,<lon>` pair.
fn read_fixes(path: &Path) -> Result<Vec<GeoPoint>, CliError> {
    let content = read_input(path)?;
    input_lines(&content)
        .map(|(number, line)| {
            parse_frame(line.as_bytes()).map_err(|e| CliError::InvalidInput {
                path: path.display().to_string(),
                line: number,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn read_input(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|error| CliError::FileRead {
        path: path.display().to_string(),
        error,
    })
}

/// 1-based line numbers with blank and `#` lines removed.
fn input_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}
