pub mod command;
pub mod config;
pub mod error;
pub mod games;
pub mod instance_lock;
pub mod paths;
pub mod registry;
pub mod runners;

pub use error::{Error, Result};

use config::GlobalConfig;
use paths::{Paths, Tools};

/// Everything a process needs to know about its environment, loaded once in
/// `main` and handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: Paths,
    pub config: GlobalConfig,
    pub tools: Tools,
}

impl Settings {
    pub fn load() -> Self {
        let paths = Paths::from_env();
        let config = GlobalConfig::load(&paths.config_file, &paths.default_prefixes_dir);
        let tools = Tools::discover();
        Self {
            paths,
            config,
            tools,
        }
    }

    /// Like [`Settings::load`] but writes any missing config defaults back
    /// to disk. Only the long-lived launcher does this.
    pub fn load_or_init() -> Result<Self> {
        let paths = Paths::from_env();
        let config = GlobalConfig::load_or_init(&paths.config_file, &paths.default_prefixes_dir)?;
        let tools = Tools::discover();
        Ok(Self {
            paths,
            config,
            tools,
        })
    }
}
