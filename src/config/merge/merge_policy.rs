//! Merge policy: the default layer every load starts from.

use crate::config::PanelkitConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the serialized defaults, so partial files only
/// override the keys they name.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&PanelkitConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
