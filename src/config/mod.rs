//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines (`LOG_FORMAT=json`)
    pub log_json: bool,
    /// Allowed client origins for CORS (comma separated, `*` for any)
    pub client_origin: String,
    /// Shared secret for signing operator requests. Admin routes are disabled without it.
    pub admin_secret: Option<String>,
    /// Max inbound messages per second per connection
    pub intent_rate_limit: u32,
    /// Outbound queue depth per connection before messages are dropped
    pub outbound_buffer: usize,

    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json")),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            admin_secret: env::var("ADMIN_SECRET").ok().filter(|s| !s.is_empty()),
            intent_rate_limit: env_or("INTENT_RATE_LIMIT", 120)?,
            outbound_buffer: env_or("OUTBOUND_BUFFER", 256)?,

            game: GameConfig::from_env()?,
        };

        config.game.validate()?;
        Ok(config)
    }
}

/// Simulation and world tunables.
///
/// Units: distances in world units, times in milliseconds, speeds in
/// world units per millisecond.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub map_size: f32,
    pub max_players: usize,
    /// Simulation tick interval
    pub tick_interval_ms: u64,
    /// Broadcast on every Nth tick
    pub client_send_rate: u32,
    /// Fixed seed for world generation and spawn placement
    pub world_seed: Option<u64>,

    pub player_decel: f32,
    pub player_speed: f32,
    pub player_radius: f32,
    /// Speed multiplier applied inside the snow band
    pub snow_speed_factor: f32,
    /// Rightward drift added to velocity.x per ms inside the river
    pub water_current: f32,

    /// Snow covers `y < snow_biome_top`
    pub snow_biome_top: f32,
    /// River is centered on the vertical midpoint of the map
    pub river_width: f32,

    pub area_count: u32,
    pub trees_per_area: u32,
    pub bushes_per_area: u32,
    pub total_rocks: u32,
    pub gold_ores: u32,
    pub tree_scales: Vec<f32>,
    pub bush_scales: Vec<f32>,
    pub rock_scales: Vec<f32>,

    /// Half-extent of the visibility rectangle
    pub max_screen_width: f32,
    pub max_screen_height: f32,

    pub max_name_length: usize,
    pub attack_cooldown_ms: u64,
    pub ping_interval_ms: u64,

    /// Password for in-chat operator login. Login is disabled without it.
    pub dev_password: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map_size: 14400.0,
            max_players: 50,
            tick_interval_ms: 9,
            client_send_rate: 5,
            world_seed: None,

            player_decel: 0.993,
            player_speed: 0.0016,
            player_radius: 35.0,
            snow_speed_factor: 0.8,
            water_current: 0.0011,

            snow_biome_top: 2400.0,
            river_width: 724.0,

            area_count: 7,
            trees_per_area: 9,
            bushes_per_area: 3,
            total_rocks: 32,
            gold_ores: 7,
            tree_scales: vec![140.0, 145.0, 150.0, 155.0],
            bush_scales: vec![80.0, 85.0, 95.0],
            rock_scales: vec![80.0, 85.0, 90.0],

            max_screen_width: 1920.0,
            max_screen_height: 1080.0,

            max_name_length: 15,
            attack_cooldown_ms: 500,
            ping_interval_ms: 2200,

            dev_password: None,
        }
    }
}

impl GameConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            map_size: env_or("MAP_SIZE", defaults.map_size)?,
            max_players: env_or("MAX_PLAYERS", defaults.max_players)?,
            tick_interval_ms: env_or("TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            client_send_rate: env_or("CLIENT_SEND_RATE", defaults.client_send_rate)?,
            world_seed: env_opt("WORLD_SEED")?,
            player_speed: env_or("PLAYER_SPEED", defaults.player_speed)?,
            player_decel: env_or("PLAYER_DECEL", defaults.player_decel)?,
            player_radius: env_or("PLAYER_RADIUS", defaults.player_radius)?,
            snow_speed_factor: env_or("SNOW_SPEED_FACTOR", defaults.snow_speed_factor)?,
            water_current: env_or("WATER_CURRENT", defaults.water_current)?,
            snow_biome_top: env_or("SNOW_BIOME_TOP", defaults.snow_biome_top)?,
            river_width: env_or("RIVER_WIDTH", defaults.river_width)?,
            area_count: env_or("AREA_COUNT", defaults.area_count)?,
            trees_per_area: env_or("TREES_PER_AREA", defaults.trees_per_area)?,
            bushes_per_area: env_or("BUSHES_PER_AREA", defaults.bushes_per_area)?,
            total_rocks: env_or("TOTAL_ROCKS", defaults.total_rocks)?,
            gold_ores: env_or("GOLD_ORES", defaults.gold_ores)?,
            tree_scales: env_list("TREE_SCALES", &defaults.tree_scales)?,
            bush_scales: env_list("BUSH_SCALES", &defaults.bush_scales)?,
            rock_scales: env_list("ROCK_SCALES", &defaults.rock_scales)?,
            max_screen_width: env_or("MAX_SCREEN_WIDTH", defaults.max_screen_width)?,
            max_screen_height: env_or("MAX_SCREEN_HEIGHT", defaults.max_screen_height)?,
            max_name_length: env_or("MAX_NAME_LENGTH", defaults.max_name_length)?,
            attack_cooldown_ms: env_or("ATTACK_COOLDOWN_MS", defaults.attack_cooldown_ms)?,
            ping_interval_ms: env_or("PING_INTERVAL_MS", defaults.ping_interval_ms)?,
            dev_password: env::var("DEV_PASSWORD").ok().filter(|s| !s.is_empty()),
            ..defaults
        })
    }

    /// Reject configurations the world cannot be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lengths = [
            self.map_size,
            self.player_speed,
            self.player_radius,
            self.snow_speed_factor,
            self.water_current,
            self.snow_biome_top,
            self.river_width,
            self.max_screen_width,
            self.max_screen_height,
        ];
        if !lengths.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::Inconsistent("numeric tunables must be finite"));
        }
        if self.map_size <= 2.0 * self.player_radius {
            return Err(ConfigError::Inconsistent("map_size must exceed the player diameter"));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Inconsistent("max_players must be at least 1"));
        }
        if self.tick_interval_ms == 0 || self.client_send_rate == 0 {
            return Err(ConfigError::Inconsistent("tick interval and send rate must be non-zero"));
        }
        if self.area_count == 0 {
            return Err(ConfigError::Inconsistent("area_count must be at least 1"));
        }
        if self.river_width < 0.0 || self.river_width >= self.map_size {
            return Err(ConfigError::Inconsistent("river_width must be within [0, map_size)"));
        }
        if !(0.0..=1.0).contains(&self.player_decel) {
            return Err(ConfigError::Inconsistent("player_decel must be within [0, 1]"));
        }
        if self.tree_scales.is_empty() || self.bush_scales.is_empty() || self.rock_scales.is_empty() {
            return Err(ConfigError::Inconsistent("every resource kind needs at least one scale"));
        }
        Ok(())
    }

    /// Edge length of one generation cell
    pub fn area_size(&self) -> f32 {
        self.map_size / self.area_count as f32
    }

    /// Vertical extent `(top, bottom)` of the river band
    pub fn river_band(&self) -> (f32, f32) {
        let mid = self.map_size / 2.0;
        (mid - self.river_width / 2.0, mid + self.river_width / 2.0)
    }

    pub fn in_river(&self, y: f32) -> bool {
        let (top, bottom) = self.river_band();
        y > top && y < bottom
    }

    pub fn in_snow(&self, y: f32) -> bool {
        y < self.snow_biome_top
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(env_opt(key)?.unwrap_or(default))
}

fn env_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

/// Comma separated list of numbers, e.g. `TREE_SCALES=140,145,150`
fn env_list(key: &'static str, default: &[f32]) -> Result<Vec<f32>, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_list(&raw).ok_or(ConfigError::Invalid(key)),
        Err(_) => Ok(default.to_vec()),
    }
}

fn parse_list(raw: &str) -> Option<Vec<f32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f32>().ok().filter(|v| v.is_finite() && *v > 0.0))
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Inconsistent game configuration: {0}")]
    Inconsistent(&'static str),
}
