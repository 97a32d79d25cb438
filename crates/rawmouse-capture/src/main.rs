//! `rawmouse-debug`: interactive console for the capture service.
//!
//! Starts the service, prints every record of a poll on a fixed interval,
//! and accepts commands on stdin:
//!
//! ```text
//! init      start or restart capture
//! kill      stop capture
//! poll      poll immediately
//! devices   list connected devices
//! quit      exit (Ctrl-C works too)
//! ```
//!
//! Records are printed after a round trip through the poll wire format, so
//! what appears here is exactly what a host reading `rawmouse_poll` sees.

use std::sync::Arc;

use rawmouse_capture::application::lifecycle::{CaptureService, InitOutcome};
use rawmouse_capture::infrastructure::logging::init_logging;
use rawmouse_capture::infrastructure::notification_source::platform_source;
use rawmouse_capture::infrastructure::storage::config::{load_config, AppConfig};
use rawmouse_core::decode_snapshot;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = load_config();
    let config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => AppConfig::default(),
    };

    // Level is overridden by `RUST_LOG`.
    init_logging(&config.service.log_level);
    if let Err(e) = loaded {
        warn!("using default configuration: {e}");
    }

    let service = Arc::new(CaptureService::new(
        platform_source(&config.capture),
        config.service.shutdown_timeout(),
    ));
    run_init(&service);

    let mut ticker = tokio::time::interval(config.debug.poll_interval());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("rawmouse-debug ready. Commands: init, kill, poll, devices, quit");

    loop {
        tokio::select! {
            _ = ticker.tick() => print_poll(&service)?,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "init" => run_init(&service),
                    "kill" => {
                        let report = service.kill();
                        println!(
                            "kill: was_running={} status={}",
                            report.was_running, report.os_status
                        );
                    }
                    "poll" => print_poll(&service)?,
                    "devices" => print_devices(&service),
                    "quit" | "exit" => break,
                    "" => {}
                    other => println!("unknown command: {other}"),
                }
            }
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    service.kill();
    info!("rawmouse-debug stopped");
    Ok(())
}

fn run_init(service: &CaptureService) {
    match service.init() {
        Ok(InitOutcome::Fresh) => println!("init: started"),
        Ok(InitOutcome::Restarted) => println!("init: restarted"),
        Err(e) => error!("init failed: {e}"),
    }
}

fn print_poll(service: &CaptureService) -> anyhow::Result<()> {
    let bytes = service.poll_bytes();
    for record in decode_snapshot(&bytes)? {
        println!("{record}");
    }
    Ok(())
}

fn print_devices(service: &CaptureService) {
    let devices = service.devices();
    if devices.is_empty() {
        println!("no devices");
    }
    for (id, state) in devices {
        println!(
            "{id}  buttons={} rate={} hwheel={}  {}",
            state.info.button_count,
            state.info.sample_rate,
            state.info.has_horizontal_wheel,
            state.display_name
        );
    }
}
