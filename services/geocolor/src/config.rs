//! Worker configuration.
//!
//! Loaded once from `config/geocolor.yaml` and passed by reference to every
//! component. `${VAR}` and `${VAR:-default}` references are expanded from the
//! environment before parsing. A missing file yields the built-in GOES-16
//! CONUS GeoColor configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use catalog::{ChannelFeed, ThreddsConfig};
use sat_common::{GeoBounds, TokenFormat};
use serde::Deserialize;
use tracing::{debug, info};

const THREDDS_GEOCOLOR: &str =
    "https://thredds.ucar.edu/thredds/catalog/satellite/goes/east/products/GeoColor/CONUS";

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the lock file and the `output/` tree
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub geolocation: GeolocationSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub products: ProductSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub publisher: PublisherKind,
    #[serde(default)]
    pub decorator: DecoratorKind,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            feeds: FeedsConfig::default(),
            catalog: CatalogSettings::default(),
            geolocation: GeolocationSettings::default(),
            render: RenderSettings::default(),
            products: ProductSettings::default(),
            schedule: ScheduleSettings::default(),
            publisher: PublisherKind::default(),
            decorator: DecoratorKind::default(),
        }
    }
}

/// The three channel feeds, by the color they contribute.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    pub blue: ChannelFeed,
    pub red: ChannelFeed,
    pub green: ChannelFeed,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        let feed = |n: u8| {
            ChannelFeed::new(
                format!("C{:02}", n),
                format!("{}/Channel{:02}/current/catalog.xml", THREDDS_GEOCOLOR, n),
            )
        };
        Self {
            blue: feed(1),
            red: feed(2),
            green: feed(3),
        }
    }
}

impl FeedsConfig {
    /// Feeds in (blue, red, green) order.
    pub fn ordered(&self) -> [&ChannelFeed; 3] {
        [&self.blue, &self.red, &self.green]
    }
}

/// Catalog access and entry naming.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_variable")]
    pub variable: String,
    /// `_`-separated field of the entry name holding the valid-time token
    #[serde(default = "default_token_field")]
    pub token_field: usize,
    #[serde(default)]
    pub token_format: TokenFormat,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_variable() -> String {
    "Sectorized_CMI".to_string()
}

fn default_token_field() -> usize {
    3
}

fn default_request_timeout() -> u64 {
    25
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            variable: default_variable(),
            token_field: default_token_field(),
            token_format: TokenFormat::default(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl CatalogSettings {
    pub fn thredds_config(&self) -> ThreddsConfig {
        ThreddsConfig {
            variable: self.variable.clone(),
            token_field: self.token_field,
            token_format: self.token_format,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_retries: self.max_retries,
            ..ThreddsConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationSettings {
    /// Multiplier from axis units to radians (1e-6 for microradians)
    #[serde(default = "default_axis_scale")]
    pub axis_scale: f64,
}

fn default_axis_scale() -> f64 {
    1e-6
}

impl Default for GeolocationSettings {
    fn default() -> Self {
        Self {
            axis_scale: default_axis_scale(),
        }
    }
}

/// Projection of the GIS image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GisMode {
    /// Plate carrée over the sector extent
    #[default]
    Rectangular,
    /// EPSG:3857 over the data's own bounding box
    WebMercator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderSettings {
    /// Sector as "min_lon,min_lat,max_lon,max_lat"
    #[serde(default = "default_extent")]
    pub extent: String,
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    #[serde(default)]
    pub gis_mode: GisMode,
    #[serde(default = "default_gis_enabled")]
    pub gis_enabled: bool,
}

fn default_extent() -> String {
    "-125,24,-65,50".to_string()
}

fn default_width() -> usize {
    3840
}

fn default_height() -> usize {
    2160
}

fn default_gis_enabled() -> bool {
    true
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            extent: default_extent(),
            width: default_width(),
            height: default_height(),
            gis_mode: GisMode::default(),
            gis_enabled: default_gis_enabled(),
        }
    }
}

impl RenderSettings {
    pub fn sector(&self) -> Result<GeoBounds> {
        GeoBounds::from_extent_str(&self.extent)
            .with_context(|| format!("Invalid render extent '{}'", self.extent))
    }
}

/// Product identity and output path segments.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSettings {
    #[serde(default = "default_display_id")]
    pub display_id: u32,
    #[serde(default = "default_gis_id")]
    pub gis_id: u32,
    /// Seconds between client reloads, published in metadata
    #[serde(default = "default_reload_interval")]
    pub reload_interval: u32,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_satellite")]
    pub satellite: String,
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_notice")]
    pub notice: String,
}

fn default_display_id() -> u32 {
    5
}

fn default_gis_id() -> u32 {
    4
}

fn default_reload_interval() -> u32 {
    270
}

fn default_category() -> String {
    "satellite".to_string()
}

fn default_satellite() -> String {
    "goes16".to_string()
}

fn default_product() -> String {
    "geocolor".to_string()
}

fn default_title() -> String {
    "GOES-16 CONUS GeoColor".to_string()
}

fn default_notice() -> String {
    "GeoColor developed by NOAA/CIRA".to_string()
}

impl Default for ProductSettings {
    fn default() -> Self {
        Self {
            display_id: default_display_id(),
            gis_id: default_gis_id(),
            reload_interval: default_reload_interval(),
            category: default_category(),
            satellite: default_satellite(),
            product: default_product(),
            title: default_title(),
            notice: default_notice(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    /// Upper bound on the channel download phase
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Pause between worker runs under the supervisor
    #[serde(default = "default_relaunch_delay")]
    pub relaunch_delay_secs: u64,
    /// Rollup age after which the watchdog kills a lock holder
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold_secs: u64,
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_relaunch_delay() -> u64 {
    15
}

fn default_staleness_threshold() -> u64 {
    600
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            relaunch_delay_secs: default_relaunch_delay(),
            staleness_threshold_secs: default_staleness_threshold(),
        }
    }
}

impl ScheduleSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn relaunch_delay(&self) -> Duration {
        Duration::from_secs(self.relaunch_delay_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherKind {
    /// Images plus run metadata and product rollups
    #[default]
    Hdwx,
    /// Images only
    ImagesOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoratorKind {
    #[default]
    None,
}

impl AppConfig {
    /// Load from a YAML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using built-in defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse YAML text after environment expansion.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.render.sector()?;
        anyhow::ensure!(
            self.render.width > 0 && self.render.height > 0,
            "Render size must be positive, got {}x{}",
            self.render.width,
            self.render.height
        );
        anyhow::ensure!(
            self.geolocation.axis_scale.is_finite() && self.geolocation.axis_scale > 0.0,
            "axis_scale must be positive"
        );
        anyhow::ensure!(
            self.products.display_id != self.products.gis_id,
            "Display and GIS product ids must differ"
        );
        Ok(())
    }

    /// Path of the worker lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join("geocolor-lock.txt")
    }

    /// Root of the published tree.
    pub fn output_dir(&self) -> PathBuf {
        self.base_dir.join("output")
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut brace_count = 1;
            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim())
            .with_context(|| format!("Environment variable {} not set", expr))
    }
}
