//! Configuration management for the Inventory Dispatch platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with IDP_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::planning::{PackingOptions, VolumeScale, DEFAULT_MAX_UNITS};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Dispatch planning configuration
    pub planning: PlanningConfig,

    /// Distance matrix (mapping service) configuration
    pub maps: MapsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlanningConfig {
    /// Divisor applied to `length x width x height` of a product to obtain
    /// the volume unit of truck capacities. 1000000 turns cm into m3.
    pub volume_scale_factor: VolumeScale,

    /// Days between planning and the scheduled dispatch date
    pub dispatch_lead_days: i64,

    /// Decrement branch stock inside the planning transaction
    pub decrement_stock: bool,

    /// Never mix units from different source branches in one load
    pub split_loads_by_branch: bool,

    /// Largest number of units one quotation may expand into
    pub max_units_per_quotation: usize,
}

impl PlanningConfig {
    pub fn packing_options(&self) -> PackingOptions {
        PackingOptions {
            split_by_branch: self.split_loads_by_branch,
        }
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            volume_scale_factor: VolumeScale::default(),
            dispatch_lead_days: 1,
            decrement_stock: true,
            split_loads_by_branch: true,
            max_units_per_quotation: DEFAULT_MAX_UNITS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapsConfig {
    /// Distance Matrix API key; enrichment is skipped when absent
    pub api_key: Option<String>,

    /// Distance Matrix JSON endpoint
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Language for the human-readable distance/duration texts
    pub language: String,
}

impl MapsConfig {
    /// The API key, unless it is missing or blank
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("IDP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default(
                "planning.volume_scale_factor",
                Decimal::from(VolumeScale::default()).to_string(),
            )?
            .set_default("planning.dispatch_lead_days", 1)?
            .set_default("planning.decrement_stock", true)?
            .set_default("planning.split_loads_by_branch", true)?
            .set_default(
                "planning.max_units_per_quotation",
                DEFAULT_MAX_UNITS as i64,
            )?
            .set_default(
                "maps.base_url",
                "https://maps.googleapis.com/maps/api/distancematrix/json",
            )?
            .set_default("maps.timeout_secs", 30)?
            .set_default("maps.language", "es")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (IDP_ prefix)
            .add_source(
                Environment::with_prefix("IDP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
