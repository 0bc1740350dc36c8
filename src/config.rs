use std::time::Duration;

fn usize_env(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn f64_env(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

fn millis_env(name: &str, default: u64) -> Duration {
    Duration::from_millis(std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default))
}

/// Largest page the backend hands out in one response.
pub const MAX_PAGE_SIZE: usize = 100;

/// Tunables for an open thread view and its live channel.
#[derive(Clone, Debug)]
pub struct ViewConfig {
    pub page_size: usize,
    /// Distance in pixels from an edge that still counts as "at" that edge.
    pub edge_threshold_px: f64,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub channel_buffer: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            edge_threshold_px: 64.0,
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            channel_buffer: 256,
        }
    }
}

impl ViewConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let reconnect_initial = millis_env("RIB_RECONNECT_INITIAL_MS", d.reconnect_initial.as_millis() as u64);
        let reconnect_max = millis_env("RIB_RECONNECT_MAX_MS", d.reconnect_max.as_millis() as u64);
        Self {
            page_size: usize_env("RIB_PAGE_SIZE", d.page_size).clamp(1, MAX_PAGE_SIZE),
            edge_threshold_px: f64_env("RIB_EDGE_THRESHOLD_PX", d.edge_threshold_px),
            reconnect_initial,
            reconnect_max: reconnect_max.max(reconnect_initial),
            channel_buffer: usize_env("RIB_CHANNEL_BUFFER", d.channel_buffer).max(1),
        }
    }
}

/// Settings for the reference backend binary.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: String,
    pub frontend_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind: std::env::var("RIB_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_url: std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string()),
        }
    }
}
