mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, ServerSettings, Settings};

/// Prefix of environment overrides, e.g. `INFOCENTER_BROKER__IDLE_TIMEOUT_SECS`.
pub const ENV_PREFIX: &str = "INFOCENTER";

/// Loads the configuration from `config/default` and environment variables.
///
/// Values missing from both sources fall back to `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(Path::new("config/default"))
}

/// Like [`load_config`], reading the file source from `path` (extension optional).
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge(Settings::default()))
}
