//! HDMI-CEC emulator binary.
//!
//! Loads a device profile into the virtual component, opens the HAL the way a
//! CEC driver would, then injects control-plane messages and transmits frames
//! so the traffic can be followed in the log.

use anyhow::{bail, Context, Result};
use cec_hal::{
    CecDriver, DeliveryError, HalError, HalHandle, QueueError, RxCallback, TxCallback, TxResult,
    VirtualComponent,
};
use cec_wire::{Command, LogicalAddress};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::EmulatorConfig;
use logging::CecLogFormatter;

// Component logging macros are defined in logging.rs and available via #[macro_export]

/// Virtual HDMI-CEC bus driven from a device profile
#[derive(Parser, Debug)]
#[command(name = "cec-emu", version, about = "Virtual HDMI-CEC component emulator")]
struct Args {
    /// Device profile (overrides the config file)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, default_value = "cec-emu.yaml")]
    config: PathBuf,

    /// Log level (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Control-plane message file to inject (repeatable)
    #[arg(long = "message")]
    messages: Vec<PathBuf>,

    /// Frame to transmit as hex, e.g. 04:36 (repeatable)
    #[arg(long = "tx")]
    frames: Vec<String>,

    /// Pause between injected messages, e.g. 200ms
    #[arg(long)]
    interval: Option<humantime::Duration>,

    /// Claim logical address 0 when emulating a TV
    #[arg(long)]
    claim_logical_address: Option<bool>,

    /// Print the device tree as JSON once all messages are handled
    #[arg(long)]
    dump_json: bool,

    /// Keep the HAL open until Ctrl-C
    #[arg(long)]
    hold: bool,
}

impl Args {
    /// Command-line flags override the file and environment
    fn apply(&self, config: &mut EmulatorConfig) {
        if let Some(profile) = &self.profile {
            config.profile_path = profile.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(interval) = &self.interval {
            config.message_interval_ms = interval.as_millis() as u64;
        }
        if let Some(claim) = self.claim_logical_address {
            config.claim_logical_address = claim;
        }
        config.messages.extend(self.messages.iter().cloned());
    }
}

fn init_logging(level: &str) -> Result<()> {
    let env_filter = EnvFilter::new("info")
        .add_directive(format!("cec_emu={}", level).parse()?)
        .add_directive(format!("cec_hal={}", level).parse()?)
        .add_directive(format!("cec_topology={}", level).parse()?)
        .add_directive(format!("cec_profile={}", level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .event_format(CecLogFormatter::new("cec-emu"))
        .init();
    Ok(())
}

/// Parse `04:36`, `04 36` or `0436` into frame bytes
fn parse_hex_frame(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '-'))
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        bail!("frame {:?} must hold an even, non-zero number of hex digits", text);
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte in frame {:?}", text))
        })
        .collect()
}

fn hex(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

fn rx_logger() -> RxCallback {
    Arc::new(|handle: HalHandle, frame: &[u8]| match Command::decode(frame) {
        Ok(command) => component_info!("bus", "Rx {} on {}: {:?}", hex(frame), handle, command.opcode),
        Err(e) => component_warn!("bus", "Rx {} on {} does not decode: {}", hex(frame), handle, e),
    })
}

fn tx_logger() -> TxCallback {
    Arc::new(|handle: HalHandle, result: TxResult| {
        component_info!("bus", "Tx completed on {}: {:?}", handle, result);
    })
}

/// Wait until the worker has handled everything enqueued so far
async fn wait_for_drain(component: &VirtualComponent, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match component.queue_stats() {
            Some(stats) if stats.handled >= stats.enqueued => return true,
            None => return false,
            Some(_) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn inject_messages(component: &VirtualComponent, config: &EmulatorConfig) -> Result<()> {
    let interval = Duration::from_millis(config.message_interval_ms);
    for path in &config.messages {
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read message {:?}", path))?;

        match component.deliver_document(payload) {
            Ok(()) => component_debug!("control", "Injected {:?}", path),
            Err(DeliveryError::Queue(QueueError::Full(_))) => {
                component_warn!("control", "Queue full, dropped {:?}", path)
            }
            Err(e) => component_error!("control", "Failed to inject {:?}: {}", path, e),
        }
        tokio::time::sleep(interval).await;
    }
    Ok(())
}

fn transmit(component: &VirtualComponent, handle: HalHandle, frames: &[String]) -> Result<()> {
    for text in frames {
        let frame = parse_hex_frame(text)?;
        match component.tx(handle, &frame) {
            Ok(result) => component_info!("driver", "Tx {}: {:?}", hex(&frame), result),
            Err(e) => component_warn!("driver", "Tx {} failed: {}", hex(&frame), e),
        }
    }
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, load_notes) = EmulatorConfig::load_from_file(&args.config)?;
    args.apply(&mut config);
    init_logging(&config.log_level)?;
    for note in &load_notes {
        note.log();
    }

    info!("Starting HDMI-CEC emulator v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Profile {:?}, {} message(s), interval {}ms",
        config.profile_path,
        config.messages.len(),
        config.message_interval_ms
    );

    let component = VirtualComponent::new();
    component.initialize()?;
    component
        .open(&config.profile_path)
        .with_context(|| format!("failed to open profile {:?}", config.profile_path))?;

    let handle = CecDriver::open(&component).context("failed to open HAL")?;
    component.set_rx_callback(handle, Some(rx_logger()))?;
    component.set_tx_callback(handle, Some(tx_logger()))?;

    if config.claim_logical_address {
        match component.add_logical_address(handle, LogicalAddress::Tv) {
            Ok(()) => component_info!("driver", "Claimed logical address {}", LogicalAddress::Tv),
            Err(HalError::InvalidArgument) => {
                component_debug!("driver", "Emulated device is not a sink, nothing to claim")
            }
            Err(e) => component_warn!("driver", "Failed to claim logical address: {}", e),
        }
    }
    info!(
        "Emulated device at {} as {}",
        component.get_physical_address(handle)?,
        component.get_logical_address(handle)?
    );

    transmit(&component, handle, &args.frames)?;
    inject_messages(&component, &config).await?;

    if !wait_for_drain(&component, Duration::from_secs(5)).await {
        component_warn!("control", "Message queue did not drain in time");
    }
    if let Some(stats) = component.queue_stats() {
        info!(
            "Messages: {} enqueued, {} handled, {} dropped",
            stats.enqueued, stats.handled, stats.dropped
        );
    }

    if args.dump_json {
        match component.snapshot() {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => component_warn!("hal", "No device tree to dump"),
        }
    }

    if args.hold {
        info!("Holding the HAL open, press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
    }

    // Closing joins the message worker, keep that off the runtime threads
    tokio::task::spawn_blocking(move || -> Result<()> {
        CecDriver::close(&component, handle)?;
        component.deinitialize()?;
        Ok(())
    })
    .await
    .context("teardown task failed")??;
    info!("HDMI-CEC emulator stopped");
    Ok(())
}
