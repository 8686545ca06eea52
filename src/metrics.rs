//! Prometheus-compatible metrics endpoint
//!
//! Default endpoint: http://localhost:9090/metrics

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Samples kept for tick-time percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for the arena server
#[derive(Debug)]
pub struct Metrics {
    // Sessions and avatars
    pub sessions_active: AtomicU64,
    pub players_total: AtomicU64,
    pub consumables_live: AtomicU64,

    // Gameplay counters
    pub consumptions_total: AtomicU64,
    pub spawns_total: AtomicU64,
    pub spawn_failures_total: AtomicU64,
    pub matches_finished: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Replication
    pub snapshots_broadcast: AtomicU64,
    pub effects_broadcast: AtomicU64,
    pub bytes_broadcast: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_active: AtomicU64::new(0),
            players_total: AtomicU64::new(0),
            consumables_live: AtomicU64::new(0),
            consumptions_total: AtomicU64::new(0),
            spawns_total: AtomicU64::new(0),
            spawn_failures_total: AtomicU64::new(0),
            matches_finished: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            snapshots_broadcast: AtomicU64::new(0),
            effects_broadcast: AtomicU64::new(0),
            bytes_broadcast: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Gauges sampled from the lobby once per server tick
    pub fn set_population(&self, sessions: usize, players: usize, consumables: usize) {
        self.sessions_active.store(sessions as u64, Ordering::Relaxed);
        self.players_total.store(players as u64, Ordering::Relaxed);
        self.consumables_live.store(consumables as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("hole_arena_sessions_active", "Live sessions", "gauge",
            self.sessions_active.load(Ordering::Relaxed));
        metric!("hole_arena_players_total", "Avatars across all sessions", "gauge",
            self.players_total.load(Ordering::Relaxed));
        metric!("hole_arena_consumables_live", "Unconsumed objects across all sessions", "gauge",
            self.consumables_live.load(Ordering::Relaxed));

        metric!("hole_arena_consumptions_total", "Objects swallowed", "counter",
            self.consumptions_total.load(Ordering::Relaxed));
        metric!("hole_arena_spawns_total", "Objects spawned during play", "counter",
            self.spawns_total.load(Ordering::Relaxed));
        metric!("hole_arena_spawn_failures_total", "Spawns refused by the entity runtime", "counter",
            self.spawn_failures_total.load(Ordering::Relaxed));
        metric!("hole_arena_matches_finished_total", "Matches that reached Ended", "counter",
            self.matches_finished.load(Ordering::Relaxed));

        metric!("hole_arena_tick_time_microseconds", "Last server tick time", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("hole_arena_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("hole_arena_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("hole_arena_tick_time_max_microseconds", "Maximum tick time in the window", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("hole_arena_tick_count", "Server ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("hole_arena_snapshots_broadcast_total", "Snapshots published", "counter",
            self.snapshots_broadcast.load(Ordering::Relaxed));
        metric!("hole_arena_effects_broadcast_total", "Effect events published", "counter",
            self.effects_broadcast.load(Ordering::Relaxed));
        metric!("hole_arena_bytes_broadcast_total", "Encoded bytes published", "counter",
            self.bytes_broadcast.load(Ordering::Relaxed));

        metric!("hole_arena_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same counters
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "sessions": {
                "active": self.sessions_active.load(Ordering::Relaxed),
                "players": self.players_total.load(Ordering::Relaxed),
                "consumables": self.consumables_live.load(Ordering::Relaxed),
            },
            "gameplay": {
                "consumptions": self.consumptions_total.load(Ordering::Relaxed),
                "spawns": self.spawns_total.load(Ordering::Relaxed),
                "spawn_failures": self.spawn_failures_total.load(Ordering::Relaxed),
                "matches_finished": self.matches_finished.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
            },
            "replication": {
                "snapshots": self.snapshots_broadcast.load(Ordering::Relaxed),
                "effects": self.effects_broadcast.load(Ordering::Relaxed),
                "bytes": self.bytes_broadcast.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Route a raw HTTP request line to a response
fn route(request: &str, metrics: &Metrics) -> String {
    if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        http_response("application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        http_response("text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        http_response("text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = route(&request, &metrics);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
