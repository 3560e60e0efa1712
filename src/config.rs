//! Node configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Numeric knobs fall back to their defaults when missing or unparsable.
//! Enumerated knobs (`FRAME_LAYOUT`, `RESTORE_VISIBILITY`) reject unknown
//! values so a typo never silently changes wire format or policy.

use std::path::PathBuf;
use std::time::Duration;

use crate::frame::FrameLayout;
use crate::services::calibration::RestorePolicy;

pub const DEFAULT_TABLE_WIDTH_M: f64 = 1.00;
pub const DEFAULT_TABLE_HEIGHT_M: f64 = 0.60;
pub const DEFAULT_PIXELS_PER_METER: f64 = 2000.0;
pub const DEFAULT_SCENE_PORT: u16 = 1234;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_FRAME_RATE_HZ: u32 = 15;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
pub const DEFAULT_CLIENT_QUEUE_DEPTH: usize = 4;
pub const DEFAULT_CALIBRATION_MARKER_M: f64 = 0.01;
pub const DEFAULT_PROJECTORS: &str = "http://localhost:8090";
pub const DEFAULT_TOUCHTABLE_URL: &str = "http://localhost:8091";
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_READINESS_POLL_MS: u64 = 500;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value} ({reason})")]
    Invalid { key: &'static str, value: String, reason: &'static str },
}

// =============================================================================
// CONFIG
// =============================================================================

/// Physical table geometry and its raster scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width_m: f64,
    pub height_m: f64,
    pub pixels_per_meter: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub table: TableGeometry,
    pub scene_port: u16,
    pub http_port: u16,
    pub frame_rate_hz: u32,
    pub jpeg_quality: u8,
    pub frame_layout: FrameLayout,
    /// Frames buffered per client before new frames are dropped for it.
    pub client_queue_depth: usize,
    pub restore_policy: RestorePolicy,
    pub calibration_marker_m: f64,
    /// Base URLs of the projector nodes, in bring-up order.
    pub projectors: Vec<String>,
    pub touchtable_url: String,
    pub startup_timeout: Duration,
    pub readiness_poll: Duration,
    pub font_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            table: TableGeometry {
                origin_x: 0.0,
                origin_y: 0.0,
                width_m: DEFAULT_TABLE_WIDTH_M,
                height_m: DEFAULT_TABLE_HEIGHT_M,
                pixels_per_meter: DEFAULT_PIXELS_PER_METER,
            },
            scene_port: DEFAULT_SCENE_PORT,
            http_port: DEFAULT_HTTP_PORT,
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            frame_layout: FrameLayout::Plain,
            client_queue_depth: DEFAULT_CLIENT_QUEUE_DEPTH,
            restore_policy: RestorePolicy::ShowAll,
            calibration_marker_m: DEFAULT_CALIBRATION_MARKER_M,
            projectors: parse_list(DEFAULT_PROJECTORS),
            touchtable_url: DEFAULT_TOUCHTABLE_URL.to_string(),
            startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
            readiness_poll: Duration::from_millis(DEFAULT_READINESS_POLL_MS),
            font_path: None,
        }
    }
}

impl NodeConfig {
    /// Build the node config from environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `ORIGIN_X`, `ORIGIN_Y` (0.0)
    /// - `TABLE_WIDTH_M` (1.00), `TABLE_HEIGHT_M` (0.60)
    /// - `PIXELS_PER_METER` (2000)
    /// - `SCENE_PORT` (1234), `HTTP_PORT` (8080)
    /// - `FRAME_RATE_HZ` (15), `JPEG_QUALITY` (95)
    /// - `FRAME_LAYOUT`: `plain` (default) or `qt`
    /// - `CLIENT_QUEUE_DEPTH` (4)
    /// - `RESTORE_VISIBILITY`: `all` (default) or `previous`
    /// - `CALIBRATION_MARKER_M` (0.01)
    /// - `PROJECTORS`: comma-separated base URLs
    /// - `TOUCHTABLE_URL`
    /// - `STARTUP_TIMEOUT_SECS` (30), `READINESS_POLL_MS` (500)
    /// - `FONT_PATH`: TTF/OTF used for text items
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown enum values or a
    /// degenerate table geometry.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let table = TableGeometry {
            origin_x: env_parse("ORIGIN_X", defaults.table.origin_x),
            origin_y: env_parse("ORIGIN_Y", defaults.table.origin_y),
            width_m: env_parse("TABLE_WIDTH_M", defaults.table.width_m),
            height_m: env_parse("TABLE_HEIGHT_M", defaults.table.height_m),
            pixels_per_meter: env_parse("PIXELS_PER_METER", defaults.table.pixels_per_meter),
        };
        validate_table(&table)?;

        let config = Self {
            table,
            scene_port: env_parse("SCENE_PORT", defaults.scene_port),
            http_port: env_parse("HTTP_PORT", defaults.http_port),
            frame_rate_hz: env_parse("FRAME_RATE_HZ", defaults.frame_rate_hz).max(1),
            jpeg_quality: env_parse("JPEG_QUALITY", defaults.jpeg_quality).clamp(1, 100),
            frame_layout: parse_frame_layout(std::env::var("FRAME_LAYOUT").ok().as_deref())?,
            client_queue_depth: env_parse("CLIENT_QUEUE_DEPTH", defaults.client_queue_depth).max(1),
            restore_policy: parse_restore_policy(std::env::var("RESTORE_VISIBILITY").ok().as_deref())?,
            calibration_marker_m: env_parse("CALIBRATION_MARKER_M", defaults.calibration_marker_m),
            projectors: std::env::var("PROJECTORS")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.projectors),
            touchtable_url: std::env::var("TOUCHTABLE_URL")
                .unwrap_or(defaults.touchtable_url)
                .trim_end_matches('/')
                .to_string(),
            startup_timeout: Duration::from_secs(env_parse("STARTUP_TIMEOUT_SECS", DEFAULT_STARTUP_TIMEOUT_SECS)),
            readiness_poll: Duration::from_millis(env_parse("READINESS_POLL_MS", DEFAULT_READINESS_POLL_MS).max(1)),
            font_path: std::env::var("FONT_PATH").ok().map(PathBuf::from),
        };
        Ok(config)
    }

    /// Interval between frame broadcasts.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate_hz.max(1)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Split a comma-separated list, dropping blanks and trailing slashes.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

fn validate_table(table: &TableGeometry) -> Result<(), ConfigError> {
    let checks = [
        ("TABLE_WIDTH_M", table.width_m),
        ("TABLE_HEIGHT_M", table.height_m),
        ("PIXELS_PER_METER", table.pixels_per_meter),
    ];
    for (key, value) in checks {
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::Invalid { key, value: value.to_string(), reason: "must be positive" });
        }
    }
    Ok(())
}

fn parse_frame_layout(raw: Option<&str>) -> Result<FrameLayout, ConfigError> {
    match raw.unwrap_or("plain") {
        "plain" => Ok(FrameLayout::Plain),
        "qt" => Ok(FrameLayout::QtDataStream),
        other => Err(ConfigError::Invalid {
            key: "FRAME_LAYOUT",
            value: other.to_string(),
            reason: "expected 'plain' or 'qt'",
        }),
    }
}

fn parse_restore_policy(raw: Option<&str>) -> Result<RestorePolicy, ConfigError> {
    match raw.unwrap_or("all") {
        "all" => Ok(RestorePolicy::ShowAll),
        "previous" => Ok(RestorePolicy::Previous),
        other => Err(ConfigError::Invalid {
            key: "RESTORE_VISIBILITY",
            value: other.to_string(),
            reason: "expected 'all' or 'previous'",
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
