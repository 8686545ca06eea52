use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use serde::Deserialize;

use crate::game::constants::{self, arena, game, hole, movement, physics, spawning};
use crate::game::state::{ConsumableTemplate, ConsumableTier};
use crate::util::vec2::Vec2;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read prop metadata {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse prop metadata: {0}")]
    Json(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Read and parse an environment variable, warning (and returning None) on bad input
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the transport layer binds to
    pub bind_address: IpAddr,
    /// Port the transport layer listens on
    pub port: u16,
    /// Port for the Prometheus endpoint
    pub metrics_port: u16,
    /// Maximum number of concurrent sessions
    pub max_sessions: usize,
    /// Maximum participants per session
    pub max_players_per_session: usize,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Snapshots broadcast per second
    pub snapshot_rate: u32,
    /// Host one session at boot and log its join code
    pub host_on_start: bool,
    /// Display name of the boot-time host
    pub host_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            metrics_port: 9090,
            max_sessions: 100,
            max_players_per_session: game::MAX_PLAYERS,
            tick_rate: physics::TICK_RATE,
            snapshot_rate: constants::net::SNAPSHOT_RATE,
            host_on_start: true,
            host_name: "Host".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse::<IpAddr>("BIND_ADDRESS") {
            config.bind_address = addr;
        }

        if let Some(port) = env_parse::<u16>("PORT") {
            if port > 0 {
                config.port = port;
            } else {
                tracing::warn!("PORT must be > 0, using default");
            }
        }

        if let Some(port) = env_parse::<u16>("METRICS_PORT") {
            config.metrics_port = port;
        }

        if let Some(max) = env_parse::<usize>("MAX_SESSIONS") {
            if max > 0 && max <= 10000 {
                config.max_sessions = max;
            } else {
                tracing::warn!("MAX_SESSIONS must be 1-10000, using default");
            }
        }

        if let Some(max) = env_parse::<usize>("MAX_PLAYERS") {
            config.max_players_per_session = max;
        }

        if let Some(rate) = env_parse::<u32>("TICK_RATE") {
            config.tick_rate = rate;
        }

        if let Some(rate) = env_parse::<u32>("SNAPSHOT_RATE") {
            config.snapshot_rate = rate;
        }

        if let Some(host) = env_parse::<bool>("HOST_ON_START") {
            config.host_on_start = host;
        }

        if let Ok(name) = std::env::var("HOST_NAME") {
            config.host_name = name;
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("port", "cannot be 0"));
        }
        if self.max_sessions == 0 {
            return Err(invalid("max_sessions", "must be at least 1"));
        }
        if self.max_players_per_session == 0 {
            return Err(invalid("max_players_per_session", "must be at least 1"));
        }
        if self.tick_rate == 0 || self.tick_rate > 240 {
            return Err(invalid("tick_rate", "must be 1-240"));
        }
        if self.snapshot_rate == 0 || self.snapshot_rate > self.tick_rate {
            return Err(invalid("snapshot_rate", "must be between 1 and tick_rate"));
        }
        Ok(())
    }

    /// Seconds per simulation tick
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Ticks between snapshot broadcasts
    pub fn ticks_per_snapshot(&self) -> u64 {
        (self.tick_rate / self.snapshot_rate.max(1)).max(1) as u64
    }
}

/// Match phase timing
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Countdown length in seconds
    pub countdown_duration: f32,
    /// Playing phase length in seconds
    pub match_duration: f32,
    /// Start the countdown automatically once every connected player is ready
    pub auto_start_when_ready: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            countdown_duration: game::COUNTDOWN,
            match_duration: game::MATCH_DURATION,
            auto_start_when_ready: false,
        }
    }
}

/// Hole movement tuning
#[derive(Debug, Clone)]
pub struct MovementConfig {
    pub max_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub rotation_speed: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            max_speed: movement::MAX_SPEED,
            acceleration: movement::ACCELERATION,
            deceleration: movement::DECELERATION,
            rotation_speed: movement::ROTATION_SPEED,
        }
    }
}

/// Hole size limits
#[derive(Debug, Clone)]
pub struct HoleConfig {
    pub initial_radius: f32,
    pub max_radius: f32,
}

impl HoleConfig {
    pub fn initial_area(&self) -> f32 {
        constants::radius_to_area(self.initial_radius)
    }

    pub fn max_area(&self) -> f32 {
        constants::radius_to_area(self.max_radius)
    }
}

impl Default for HoleConfig {
    fn default() -> Self {
        Self {
            initial_radius: hole::INITIAL_RADIUS,
            max_radius: hole::MAX_RADIUS,
        }
    }
}

/// Consumable spawn scheduling
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Population cap for scheduler-spawned consumables
    pub max_population: usize,
    /// Seconds between spawn attempts
    pub interval: f32,
    /// Half-size of the rectangular spawn area on the ground plane
    pub area_half_extents: Vec2,
    /// Height consumables are dropped from
    pub height: f32,
    /// Templates to pick from; empty means every attempt is a no-op
    pub templates: Vec<ConsumableTemplate>,
    /// Fixed RNG seed (None = seed from entropy)
    pub rng_seed: Option<u64>,
    /// Entities the in-process runtime accepts before refusing spawns
    pub runtime_capacity: usize,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            max_population: spawning::MAX_POPULATION,
            interval: spawning::INTERVAL,
            area_half_extents: Vec2::new(spawning::AREA_HALF_X, spawning::AREA_HALF_Z),
            height: spawning::HEIGHT,
            templates: ConsumableTemplate::park_defaults(),
            rng_seed: None,
            runtime_capacity: spawning::RUNTIME_CAPACITY,
        }
    }
}

/// Prop metadata file, as exported by the asset pipeline
#[derive(Debug, Deserialize)]
struct PropMetadata {
    props: Vec<PropEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropEntry {
    name: String,
    tier: ConsumableTier,
    required_radius: f32,
    area_value: f32,
    score_value: u32,
}

impl SpawnConfig {
    /// Parse consumable templates from prop metadata JSON
    pub fn parse_prop_metadata(json: &str) -> Result<Vec<ConsumableTemplate>, ConfigError> {
        let metadata: PropMetadata = serde_json::from_str(json)?;
        let templates = metadata
            .props
            .into_iter()
            .map(|p| ConsumableTemplate {
                name: p.name,
                tier: p.tier,
                size_threshold: p.required_radius,
                score_value: p.score_value,
                growth_value: p.area_value,
            })
            .collect();
        Ok(templates)
    }

    /// Load consumable templates from a prop metadata file
    pub fn load_prop_metadata(path: &str) -> Result<Vec<ConsumableTemplate>, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse_prop_metadata(&json)
    }
}

/// Playable area
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Half-size of the ground plane; positions are clamped into it
    pub half_extents: Vec2,
    /// Player spawn points, assigned round-robin by join order
    pub spawn_points: Vec<Vec2>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            half_extents: Vec2::new(arena::HALF_X, arena::HALF_Z),
            spawn_points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(-10.0, 10.0),
                Vec2::new(10.0, -10.0),
                Vec2::new(-10.0, -10.0),
                Vec2::new(0.0, 15.0),
                Vec2::new(0.0, -15.0),
                Vec2::new(15.0, 0.0),
            ],
        }
    }
}

impl ArenaConfig {
    /// Spawn point for the n-th joining player
    pub fn spawn_point(&self, index: usize) -> Vec2 {
        if self.spawn_points.is_empty() {
            return Vec2::ZERO;
        }
        self.spawn_points[index % self.spawn_points.len()]
    }
}

/// All gameplay tuning for one session
#[derive(Debug, Clone, Default)]
pub struct GameConfig {
    pub match_config: MatchConfig,
    pub movement: MovementConfig,
    pub hole: HoleConfig,
    pub spawn: SpawnConfig,
    pub arena: ArenaConfig,
}

impl GameConfig {
    /// Load gameplay tuning from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<f32>("COUNTDOWN_DURATION") {
            config.match_config.countdown_duration = v;
        }
        if let Some(v) = env_parse::<f32>("MATCH_DURATION") {
            config.match_config.match_duration = v;
        }
        if let Some(v) = env_parse::<bool>("AUTO_START_WHEN_READY") {
            config.match_config.auto_start_when_ready = v;
        }

        if let Some(v) = env_parse::<f32>("MAX_SPEED") {
            config.movement.max_speed = v;
        }
        if let Some(v) = env_parse::<f32>("ACCELERATION") {
            config.movement.acceleration = v;
        }
        if let Some(v) = env_parse::<f32>("DECELERATION") {
            config.movement.deceleration = v;
        }
        if let Some(v) = env_parse::<f32>("ROTATION_SPEED") {
            config.movement.rotation_speed = v;
        }

        if let Some(v) = env_parse::<f32>("HOLE_INITIAL_RADIUS") {
            config.hole.initial_radius = v;
        }
        if let Some(v) = env_parse::<f32>("HOLE_MAX_RADIUS") {
            config.hole.max_radius = v;
        }

        if let Some(v) = env_parse::<usize>("SPAWN_MAX_POPULATION") {
            config.spawn.max_population = v;
        }
        if let Some(v) = env_parse::<f32>("SPAWN_INTERVAL") {
            config.spawn.interval = v;
        }
        if let Some(v) = env_parse::<f32>("SPAWN_AREA_X") {
            config.spawn.area_half_extents.x = v;
        }
        if let Some(v) = env_parse::<f32>("SPAWN_AREA_Z") {
            config.spawn.area_half_extents.y = v;
        }
        if let Some(v) = env_parse::<f32>("SPAWN_HEIGHT") {
            config.spawn.height = v;
        }
        if let Some(v) = env_parse::<u64>("SPAWN_SEED") {
            config.spawn.rng_seed = Some(v);
        }

        if let Ok(path) = std::env::var("PROP_METADATA_PATH") {
            match SpawnConfig::load_prop_metadata(&path) {
                Ok(templates) => {
                    tracing::info!("Loaded {} consumable templates from {}", templates.len(), path);
                    config.spawn.templates = templates;
                }
                Err(e) => tracing::warn!("{}, using default templates", e),
            }
        }

        if let Some(v) = env_parse::<f32>("ARENA_HALF_X") {
            config.arena.half_extents.x = v;
        }
        if let Some(v) = env_parse::<f32>("ARENA_HALF_Z") {
            config.arena.half_extents.y = v;
        }

        config
    }

    /// Validate gameplay tuning
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.match_config;
        if !(m.countdown_duration >= 0.0) {
            return Err(invalid("countdown_duration", "must be >= 0"));
        }
        if !(m.match_duration > 0.0) {
            return Err(invalid("match_duration", "must be > 0"));
        }

        let mv = &self.movement;
        if !(mv.max_speed > 0.0 && mv.acceleration > 0.0 && mv.deceleration > 0.0) {
            return Err(invalid("movement", "speed and rates must be > 0"));
        }
        if !(mv.rotation_speed >= 0.0) {
            return Err(invalid("rotation_speed", "must be >= 0"));
        }

        let h = &self.hole;
        if !(h.initial_radius > 0.0) {
            return Err(invalid("hole.initial_radius", "must be > 0"));
        }
        if h.max_radius < h.initial_radius {
            return Err(invalid("hole.max_radius", "cannot be smaller than initial_radius"));
        }

        let s = &self.spawn;
        if !(s.interval > 0.0) {
            return Err(invalid("spawn.interval", "must be > 0"));
        }
        if s.area_half_extents.x < 0.0 || s.area_half_extents.y < 0.0 {
            return Err(invalid("spawn.area_half_extents", "must be non-negative"));
        }
        if let Some(t) = s
            .templates
            .iter()
            .find(|t| t.size_threshold < 0.0 || t.growth_value < 0.0)
        {
            return Err(invalid(
                "spawn.templates",
                format!("template '{}' has negative threshold or growth", t.name),
            ));
        }

        if self.arena.half_extents.x <= 0.0 || self.arena.half_extents.y <= 0.0 {
            return Err(invalid("arena.half_extents", "must be > 0"));
        }
        Ok(())
    }
}
