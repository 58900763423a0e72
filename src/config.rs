//! Service configuration parsed from environment variables.

use std::time::Duration;

use crate::layout::grid::{Breakpoints, Footprint, FootprintTable};
use crate::layout::{LayoutConfig, LayoutError};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SANDBOX_PUBLIC_BASE: &str = "/sandbox";
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 250;
pub const DEFAULT_GENERATION_MAX_TOKENS: u32 = 2500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?}: {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "E_CONFIG_INVALID",
            Self::Layout(e) => crate::error::ErrorCode::error_code(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Postgres URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub layout: LayoutConfig,
    /// When false the sandbox host refuses every mount.
    pub sandbox_isolation: bool,
    pub sandbox_public_base: String,
    pub flush_interval: Duration,
    pub generation_max_tokens: u32,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: in-memory store when absent
    /// - `LAYOUT_BREAKPOINTS`: ascending widths, default `640,768,1024`
    /// - `LAYOUT_FOOTPRINTS`: small,medium,large as `WxH`, default `1x1,2x1,3x1`
    /// - `SANDBOX_ISOLATION`: `enabled` (default) or `disabled`
    /// - `SANDBOX_PUBLIC_BASE`: default `/sandbox`
    /// - `REGISTRY_FLUSH_INTERVAL_MS`: default 250
    /// - `GENERATION_MAX_TOKENS`: default 2500
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for any value that is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for any value that is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let port = parse_number("PORT", get("PORT"), DEFAULT_PORT)?;
        let breakpoints = match get("LAYOUT_BREAKPOINTS") {
            Some(raw) => parse_breakpoints(&raw)?,
            None => Breakpoints::default(),
        };
        let footprints = match get("LAYOUT_FOOTPRINTS") {
            Some(raw) => parse_footprints(&raw)?,
            None => FootprintTable::default(),
        };
        let sandbox_isolation = match get("SANDBOX_ISOLATION").as_deref() {
            None | Some("enabled") => true,
            Some("disabled") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "SANDBOX_ISOLATION",
                    value: other.to_owned(),
                    reason: "expected 'enabled' or 'disabled'".into(),
                });
            }
        };
        let flush_ms = parse_number("REGISTRY_FLUSH_INTERVAL_MS", get("REGISTRY_FLUSH_INTERVAL_MS"), DEFAULT_FLUSH_INTERVAL_MS)?;

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            layout: LayoutConfig { breakpoints, footprints },
            sandbox_isolation,
            sandbox_public_base: get("SANDBOX_PUBLIC_BASE").unwrap_or_else(|| DEFAULT_SANDBOX_PUBLIC_BASE.to_owned()),
            flush_interval: Duration::from_millis(flush_ms.max(1)),
            generation_max_tokens: parse_number(
                "GENERATION_MAX_TOKENS",
                get("GENERATION_MAX_TOKENS"),
                DEFAULT_GENERATION_MAX_TOKENS,
            )?,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            layout: LayoutConfig::default(),
            sandbox_isolation: true,
            sandbox_public_base: DEFAULT_SANDBOX_PUBLIC_BASE.to_owned(),
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            generation_max_tokens: DEFAULT_GENERATION_MAX_TOKENS,
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid { var, reason: e.to_string(), value }),
    }
}

/// Parse `640,768,1024` into strictly ascending breakpoints.
///
/// # Errors
///
/// Returns `ConfigError` for non-numeric or non-ascending thresholds.
pub fn parse_breakpoints(raw: &str) -> Result<Breakpoints, ConfigError> {
    let thresholds = raw
        .split(',')
        .map(|part| {
            part.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                var: "LAYOUT_BREAKPOINTS",
                value: raw.to_owned(),
                reason: format!("{part:?}: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Breakpoints::new(thresholds)?)
}

/// Parse `1x1,2x1,3x1` (small, medium, large) into a footprint table.
///
/// # Errors
///
/// Returns `InvalidFootprint` unless there are exactly three positive `WxH` entries.
pub fn parse_footprints(raw: &str) -> Result<FootprintTable, ConfigError> {
    let parsed = raw
        .split(',')
        .map(|part| parse_footprint(part.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    match parsed.as_slice() {
        [small, medium, large] => Ok(FootprintTable { small: *small, medium: *medium, large: *large }),
        _ => Err(LayoutError::InvalidFootprint(format!("expected 3 entries (small,medium,large), got {raw:?}")).into()),
    }
}

fn parse_footprint(part: &str) -> Result<Footprint, LayoutError> {
    let invalid = || LayoutError::InvalidFootprint(format!("{part:?} is not WxH with positive integers"));
    let (w, h) = part.split_once(['x', 'X']).ok_or_else(invalid)?;
    let w = w.trim().parse::<u32>().map_err(|_| invalid())?;
    let h = h.trim().parse::<u32>().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok(Footprint { w, h })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
