use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `config/Config.toml` and `LADDER_`-prefixed
    /// environment variables, on top of the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or the strategy
    /// ladder is invalid.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or the strategy
    /// ladder is invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        Self::extract(Self::base().merge(Toml::file(path.as_ref())))
    }

    /// Loads configuration with a profile overlay (`config/Config.{profile}.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or the strategy
    /// ladder is invalid.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::extract(
            Self::base()
                .merge(Toml::file(DEFAULT_CONFIG_PATH))
                .merge(Toml::file(format!("config/Config.{profile}.toml"))),
        )
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        let config: AppConfig = figment.merge(Env::prefixed("LADDER_").split("__")).extract()?;
        config.validate()?;
        tracing::debug!("Loaded strategy config: {:?}", config.strategy);
        Ok(config)
    }
}
