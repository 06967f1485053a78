use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::router::BUS_CAPACITY;

/// Default autosave interval (5 minutes).
pub const DEFAULT_AUTOSAVE_SECS: u64 = 300;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GROUND_RADIUS: i64 = 32;
/// The ground sits one below y=0 so clients can build on y=0.
pub const DEFAULT_GROUND_Y: i64 = -1;
pub const DEFAULT_GROUND_COLOR: u32 = 0x3a7d2c;

#[derive(Debug, Clone, Parser)]
#[command(name = "craftsync-server", version, about = "Authoritative multiplayer voxel sandbox server")]
pub struct ServerConfig {
    /// Address the WebSocket/status listener binds to.
    #[arg(long, env = "CRAFTSYNC_BIND", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    pub bind: SocketAddr,

    /// Snapshot file used by save-world/load-world, autosave and startup.
    #[arg(long, env = "CRAFTSYNC_WORLD", default_value = "world/world.json")]
    pub world_file: PathBuf,

    /// Half-width of the indestructible ground plane. 0 disables it.
    #[arg(long, default_value_t = DEFAULT_GROUND_RADIUS)]
    pub ground_radius: i64,

    #[arg(long, default_value_t = DEFAULT_GROUND_Y, allow_negative_numbers = true)]
    pub ground_y: i64,

    /// Ground color as `0xRRGGBB`, `#RRGGBB` or decimal.
    #[arg(long, default_value = "0x3a7d2c", value_parser = parse_color)]
    pub ground_color: u32,

    /// Seconds between autosaves. 0 disables autosave.
    #[arg(long, env = "CRAFTSYNC_AUTOSAVE_SECS", default_value_t = DEFAULT_AUTOSAVE_SECS)]
    pub autosave_secs: u64,

    /// Broadcast bus capacity per subscriber before it is resynchronized.
    #[arg(long, default_value_t = BUS_CAPACITY)]
    pub bus_capacity: usize,

    /// Start from an empty world instead of loading the snapshot file.
    #[arg(long)]
    pub fresh: bool,
}

impl ServerConfig {
    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.autosave_secs > 0).then(|| Duration::from_secs(self.autosave_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            world_file: PathBuf::from("world/world.json"),
            ground_radius: DEFAULT_GROUND_RADIUS,
            ground_y: DEFAULT_GROUND_Y,
            ground_color: DEFAULT_GROUND_COLOR,
            autosave_secs: DEFAULT_AUTOSAVE_SECS,
            bus_capacity: BUS_CAPACITY,
            fresh: false,
        }
    }
}

fn parse_color(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix('#')) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    match parsed {
        Ok(rgb) if rgb <= 0xff_ffff => Ok(rgb),
        Ok(rgb) => Err(format!("color {rgb:#x} is wider than 24 bits")),
        Err(e) => Err(format!("invalid color '{s}': {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_color_forms() {
        assert_eq!(parse_color("0xff0000"), Ok(0xff0000));
        assert_eq!(parse_color("#00ff00"), Ok(0x00ff00));
        assert_eq!(parse_color("255"), Ok(255));
        assert!(parse_color("0x1000000").is_err());
        assert!(parse_color("green").is_err());
    }

    #[test]
    fn cli_overrides_defaults() {
        let config = ServerConfig::parse_from([
            "craftsync-server",
            "--bind",
            "127.0.0.1:4000",
            "--ground-y",
            "-3",
            "--autosave-secs",
            "0",
            "--fresh",
        ]);
        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 4000)));
        assert_eq!(config.ground_y, -3);
        assert_eq!(config.autosave_interval(), None);
        assert!(config.fresh);
        assert_eq!(config.ground_radius, DEFAULT_GROUND_RADIUS);
    }
}
