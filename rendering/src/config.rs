use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use xdom::Syntax;

use crate::model::DEFAULT_WIKI;
use crate::security::{Right, RightsTable};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings of the rendering pipeline, read from a TOML file.
///
/// ```toml
/// max_nesting_depth = 100
/// default_syntax = "xwiki/2.1"
/// target_syntax = "xhtml/1.0"
///
/// [users.alice]
/// right = "script"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Deepest chain of macros expanding into macros.
    pub max_nesting_depth: usize,
    /// Macro executions allowed in one transformation, nested ones included.
    pub max_macro_executions: usize,
    pub default_syntax: Syntax,
    pub target_syntax: Syntax,
    pub wiki: String,
    pub restricted: bool,
    /// Author of documents read from disk and of their wiki macros.
    pub default_author: Option<String>,
    pub users: BTreeMap<String, UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub right: Right,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        RenderingConfig {
            max_nesting_depth: 100,
            max_macro_executions: 1000,
            default_syntax: Syntax::XWiki21,
            target_syntax: Syntax::Xhtml10,
            wiki: DEFAULT_WIKI.to_string(),
            restricted: false,
            default_author: None,
            users: BTreeMap::new(),
        }
    }
}

impl RenderingConfig {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
            config_path: config_path.to_path_buf(),
            source,
        })
    }

    /// Rights table built from the `[users]` section.
    pub fn rights_table(&self) -> RightsTable {
        self.users
            .iter()
            .fold(RightsTable::new(), |table, (user, config)| {
                table.grant(user.clone(), config.right)
            })
    }
}
