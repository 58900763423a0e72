//! Built-in app catalog.
//!
//! Static definitions that ship with the server. Installing one admits a
//! fresh copy (new id, new timestamp) through the normal validator path, so
//! the same entry can be installed any number of times.

use serde::Serialize;
use tracing::info;

use crate::registry::types::{AppDefinition, AppDraft, Config};
use crate::registry::{Registry, RegistryError};
use crate::validator::EntryPoint;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown catalog entry: {0}")]
    UnknownEntry(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl crate::error::ErrorCode for CatalogError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownEntry(_) => "E_UNKNOWN_CATALOG_ENTRY",
            Self::Registry(e) => crate::error::ErrorCode::error_code(e),
        }
    }
}

/// One installable built-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub entry_point: &'static str,
    pub source_text: &'static str,
    pub default_config: Config,
}

impl CatalogEntry {
    fn draft(&self) -> AppDraft {
        AppDraft {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            icon: self.icon.to_owned(),
            source_text: self.source_text.to_owned(),
            default_config: self.default_config.clone(),
            entry_point: Some(self.entry_point.to_owned()),
        }
    }
}

/// Every built-in, in display order.
#[must_use]
pub fn catalog() -> Vec<CatalogEntry> {
    let mut launcher_config = Config::new();
    launcher_config.insert("url".into(), "https://example.com".into());

    vec![
        CatalogEntry {
            key: "weather-widget",
            name: "Weather Widget",
            description: "Displays current weather information",
            icon: "🌤️",
            entry_point: "WeatherWidget",
            source_text: WEATHER_SOURCE,
            default_config: Config::new(),
        },
        CatalogEntry {
            key: "url-launcher",
            name: "URL Launcher",
            description: "Quick access to your favorite websites",
            icon: "🔗",
            entry_point: "URLLauncher",
            source_text: LAUNCHER_SOURCE,
            default_config: launcher_config,
        },
        CatalogEntry {
            key: "calculator",
            name: "Calculator",
            description: "A simple calculator",
            icon: "🧮",
            entry_point: "Calculator",
            source_text: CALCULATOR_SOURCE,
            default_config: Config::new(),
        },
        CatalogEntry {
            key: "world-clock",
            name: "World Clock",
            description: "Shows the current time in different time zones",
            icon: "🕒",
            entry_point: "WorldClock",
            source_text: CLOCK_SOURCE,
            default_config: Config::new(),
        },
    ]
}

/// Admit a fresh copy of the built-in named `key`.
///
/// # Errors
///
/// Returns `UnknownEntry` for an unrecognized key, or the registry's
/// admission error.
pub fn install_builtin(registry: &Registry, key: &str) -> Result<(AppDefinition, EntryPoint), CatalogError> {
    let entry = catalog()
        .into_iter()
        .find(|e| e.key == key)
        .ok_or_else(|| CatalogError::UnknownEntry(key.to_owned()))?;
    let (app, entry_point) = registry.add_app(entry.draft())?;
    info!(key, app_id = %app.id, "catalog: built-in installed");
    Ok((app, entry_point))
}

// =============================================================================
// SOURCES
// =============================================================================

const WEATHER_SOURCE: &str = r"function WeatherWidget({ config }) {
  const [weather, setWeather] = React.useState(null);

  React.useEffect(() => {
    const timer = setTimeout(() => {
      setWeather({ temp: 72, condition: 'Sunny', city: config.city || 'San Francisco' });
    }, 500);
    return () => clearTimeout(timer);
  }, [config.city]);

  if (!weather) {
    return <div style={{ padding: '16px', color: '#666' }}>Loading weather...</div>;
  }

  return (
    <div style={{ padding: '16px', textAlign: 'center', fontFamily: 'sans-serif' }}>
      <div style={{ fontSize: '14px', color: '#666' }}>{weather.city}</div>
      <div style={{ fontSize: '40px', fontWeight: 'bold' }}>{weather.temp}°F</div>
      <div style={{ fontSize: '16px' }}>{weather.condition}</div>
    </div>
  );
}";

const LAUNCHER_SOURCE: &str = r"function URLLauncher({ config }) {
  const [url, setUrl] = React.useState(config.url || '');

  const open = () => {
    if (url) {
      window.open(url, '_blank', 'noopener');
    }
  };

  return (
    <div style={{ padding: '16px', display: 'flex', gap: '8px', fontFamily: 'sans-serif' }}>
      <input
        value={url}
        onChange={(e) => setUrl(e.target.value)}
        placeholder='https://'
        style={{ flex: 1, padding: '6px', border: '1px solid #ccc', borderRadius: '4px' }}
      />
      <button onClick={open} style={{ padding: '6px 12px', borderRadius: '4px' }}>
        Open
      </button>
    </div>
  );
}";

const CALCULATOR_SOURCE: &str = r"function Calculator({ config }) {
  const [display, setDisplay] = React.useState('0');
  const [stored, setStored] = React.useState(null);
  const [pending, setPending] = React.useState(null);
  const [fresh, setFresh] = React.useState(true);

  const compute = (a, b, op) => {
    if (op === '+') return a + b;
    if (op === '-') return a - b;
    if (op === '*') return a * b;
    if (op === '/') return b === 0 ? NaN : a / b;
    return b;
  };

  const pressDigit = (d) => {
    setDisplay(fresh || display === '0' ? d : display + d);
    setFresh(false);
  };

  const pressOp = (op) => {
    const value = parseFloat(display);
    const result = stored === null ? value : compute(stored, value, pending);
    setStored(result);
    setDisplay(String(result));
    setPending(op === '=' ? null : op);
    setFresh(true);
  };

  const clear = () => {
    setDisplay('0');
    setStored(null);
    setPending(null);
    setFresh(true);
  };

  const keys = ['7', '8', '9', '/', '4', '5', '6', '*', '1', '2', '3', '-', '0', 'C', '=', '+'];

  return (
    <div style={{ padding: '12px', fontFamily: 'monospace' }}>
      <div style={{ textAlign: 'right', fontSize: '24px', padding: '8px', background: '#f4f4f4', borderRadius: '4px' }}>
        {display}
      </div>
      <div style={{ display: 'grid', gridTemplateColumns: 'repeat(4, 1fr)', gap: '4px', marginTop: '8px' }}>
        {keys.map((k) => (
          <button
            key={k}
            onClick={() => (k === 'C' ? clear() : /[0-9]/.test(k) ? pressDigit(k) : pressOp(k))}
            style={{ padding: '10px', fontSize: '16px' }}
          >
            {k}
          </button>
        ))}
      </div>
    </div>
  );
}";

const CLOCK_SOURCE: &str = r"function WorldClock({ config }) {
  const [now, setNow] = React.useState(new Date());

  React.useEffect(() => {
    const id = setInterval(() => setNow(new Date()), 1000);
    return () => clearInterval(id);
  }, []);

  const zones = config.zones || ['America/New_York', 'Europe/London', 'Asia/Tokyo'];

  return (
    <div style={{ padding: '16px', fontFamily: 'sans-serif' }}>
      {zones.map((zone) => (
        <div key={zone} style={{ display: 'flex', justifyContent: 'space-between', padding: '4px 0' }}>
          <span style={{ color: '#666' }}>{zone.split('/').pop().replace('_', ' ')}</span>
          <span style={{ fontWeight: 'bold' }}>{now.toLocaleTimeString('en-US', { timeZone: zone })}</span>
        </div>
      ))}
    </div>
  );
}";

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
