//! The config for the quota controller

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;

/// Helps serde default the allocate period to 3 seconds
fn default_allocate_period() -> u64 {
    3
}

/// Helps serde default the reclaim period to 5 seconds
fn default_reclaim_period() -> u64 {
    5
}

/// Helps serde default the allocation policy to drf
fn default_policy() -> String {
    "drf".to_owned()
}

/// Helps serde default a value to false
fn default_false() -> bool {
    false
}

/// Settings for the controller's periodic tasks
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct Controller {
    /// How often to recompute and write back quota entitlements in seconds
    #[serde(default = "default_allocate_period")]
    pub allocate_period: u64,
    /// How often to evict pods of overused quotas in seconds
    #[serde(default = "default_reclaim_period")]
    pub reclaim_period: u64,
    /// The allocation policy to divide cluster resources with
    #[serde(default = "default_policy")]
    pub policy: String,
    /// Whether to mirror replication controllers into quota objects
    #[serde(default = "default_false")]
    pub shadow_replication_controllers: bool,
}

impl Default for Controller {
    /// Create a default `Controller` config
    fn default() -> Self {
        Controller {
            allocate_period: default_allocate_period(),
            reclaim_period: default_reclaim_period(),
            policy: default_policy(),
            shadow_replication_controllers: false,
        }
    }
}

/// The log levels to use
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum LogLevel {
    /// Do not log anything
    Off,
    /// Log only errors
    Error,
    /// Log warnings and errors
    Warn,
    /// Log info and above
    Info,
    /// Log debug and above
    Debug,
    /// Log everything
    Trace,
}

impl Default for LogLevel {
    /// Default to the info log level
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    /// Convert this log level to a tracing filter
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// The local tracing settings
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, JsonSchema)]
pub struct TracingLocal {
    /// The level to log traces at
    #[serde(default)]
    pub level: LogLevel,
}

/// The tracing settings for the controller
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, JsonSchema)]
pub struct Tracing {
    /// The settings for tracing to stdout
    #[serde(default)]
    pub local: TracingLocal,
}

/// The config for the quota controller
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, JsonSchema)]
pub struct Conf {
    /// The settings for the controller's periodic tasks
    #[serde(default)]
    pub controller: Controller,
    /// The settings for tracing
    #[serde(default)]
    pub tracing: Tracing,
}

impl Conf {
    /// Creates a new [Conf] object
    ///
    /// # Arguments
    ///
    /// * `path` - The path to use when reading the config file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // load from a file first
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Yaml))
            // then overlay any environment args ontop
            .add_source(
                config::Environment::with_prefix("quotad")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
