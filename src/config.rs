use crate::models::message::{DEFAULT_LOG_FORMAT, DEFAULT_TIME_FORMAT};
use crate::util::human::parse_duration;
use anyhow::{bail, Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub driver: DriverConfig,

    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Line template with {remote} {ident} {auth} {time} {method} {uri} {proto} {status} {size}
    pub log_format:  String,
    /// strftime layout for {time}
    pub time_format: String,
    /// Auth users drawn from several scripts instead of ASCII only
    pub use_unicode: bool,
    /// Number of preset pages to seed; 0 = fully random paths
    pub page_count:  usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Emit interval, Go-style duration ("1s", "250ms")
    pub rate:        String,
    /// Log rolling window stats every N messages (0 = never)
    pub stats_every: u64,
}

/// Geometry of the rolling traffic counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Width of one bucket ("10s")
    pub bucket_width: String,
    /// Buckets per window; window = bucket_width * bucket_count
    pub bucket_count: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            log_format:  DEFAULT_LOG_FORMAT.into(),
            time_format: DEFAULT_TIME_FORMAT.into(),
            use_unicode: false,
            page_count:  0,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { rate: "1s".into(), stats_every: 10 }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { bucket_width: "10s".into(), bucket_count: 12 }
    }
}

// ── Validation ────────────────────────────────────────────────────────

impl DriverConfig {
    pub fn rate(&self) -> Result<Duration> {
        let d = parse_duration(&self.rate).context("driver.rate")?;
        if d.is_zero() {
            bail!("driver.rate must be greater than 0");
        }
        Ok(d)
    }
}

impl WindowConfig {
    pub fn bucket_width(&self) -> Result<Duration> {
        let d = parse_duration(&self.bucket_width).context("window.bucket_width")?;
        if d.is_zero() {
            bail!("window.bucket_width must be greater than 0");
        }
        Ok(d)
    }
}

impl Config {
    /// Reject anything that would panic or misbehave further down.
    pub fn validate(&self) -> Result<()> {
        self.driver.rate()?;
        self.window.bucket_width()?;
        if self.window.bucket_count == 0 {
            bail!("window.bucket_count must be greater than 0");
        }
        check_time_format(&self.generator.time_format)?;
        Ok(())
    }
}

pub fn check_time_format(fmt: &str) -> Result<()> {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        bail!("invalid time format {:?}", fmt);
    }
    Ok(())
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    /// Load from the default path. A missing file yields defaults, which are
    /// written out best-effort for the user to edit.
    pub fn load() -> Result<Self> {
        let path = match Config::config_path() {
            Some(p) => p,
            None    => return Ok(Config::default()),
        };
        if !path.exists() {
            if let Err(e) = try_write_defaults(&path) {
                tracing::debug!("could not write default config to {}: {:#}", path.display(), e);
            }
            return Ok(Config::default());
        }
        Config::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Config::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ddlog").join("ddlog.toml"))
    }
}

fn try_write_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# ddlog configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
