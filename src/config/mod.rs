use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub display: DisplayConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_seconds: u64,
    pub create_if_missing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// IANA zone used for wall-clock input and output, e.g. `Europe/Helsinki`.
    pub timezone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Where to write a Prometheus text snapshot on exit, if anywhere.
    pub textfile_path: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 1,
            busy_timeout_seconds: 30,
            create_if_missing: true,
        }
    }
}

impl DisplayConfig {
    pub fn timezone(&self) -> Result<chrono_tz::Tz, String> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| format!("Invalid timezone {}: {}", self.timezone, e))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_dir =
            std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = config::Config::builder()
            .set_default("database.path", "prices.db")?
            .set_default("database.max_connections", 1)?
            .set_default("database.busy_timeout_seconds", 30)?
            .set_default("database.create_if_missing", true)?
            .set_default("display.timezone", "Europe/Helsinki")?
            .add_source(
                config::File::from(PathBuf::from(&config_dir).join("default.toml"))
                    .required(false),
            )
            .add_source(
                config::File::from(PathBuf::from(&config_dir).join("local.toml"))
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
