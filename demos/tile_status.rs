use std::time::Duration;

use swarm_tile::{SerialConfig, SessionConfig, TileClient};

fn main() {
    tracing_subscriber::fmt::init();

    let device = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let serial = SerialConfig {
        device,
        ..Default::default()
    };

    let mut tile = match TileClient::open_serial(&serial, SessionConfig::default()) {
        Ok(tile) => tile,
        Err(e) => {
            eprintln!("Failed to open Tile: {}", e);
            return;
        }
    };

    // Quiet the modem before issuing queries
    if let Err(e) = tile.disable_unsolicited() {
        eprintln!("Could not disable unsolicited reports: {}", e);
    }

    match tile.get_firmware_version() {
        Ok(version) => println!("Tile Firmware Version: {}", version),
        Err(e) => eprintln!("Firmware version: {}", e),
    }

    match tile.get_gps_time() {
        Ok(Some(time)) => println!("Current GPS Time (UTC): {}", time),
        Ok(None) => println!("Current GPS Time (UTC): unavailable"),
        Err(e) => eprintln!("GPS time: {}", e),
    }

    match tile.get_gps_stats() {
        Ok(stats) => println!("{}", stats.verbose()),
        Err(e) => eprintln!("GPS stats: {}", e),
    }

    match tile.get_message_count(true) {
        Ok(count) => println!("{} unread messages.", count),
        Err(e) => eprintln!("Message count: {}", e),
    }

    println!("\n10 second monitor:");
    for sentence in tile.session().read_monitor(Duration::from_secs(10)) {
        match sentence {
            Ok(sentence) => println!("{}", sentence),
            Err(e) => {
                eprintln!("Monitor stopped: {}", e);
                break;
            }
        }
    }
}
