/// Runtime configuration
///
/// Priority, lowest first: defaults, config file, `INSIGHTEASE_*` environment.
/// Command line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::engine::EngineThresholds;
use crate::types::InsightError;

const SYSTEM_CONFIG: &str = "/etc/insightease/insightease.toml";
const LOCAL_CONFIG: &str = "./insightease.toml";
const ENV_PREFIX: &str = "INSIGHTEASE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Root directory of the local store
    pub data_dir: PathBuf,
    pub engine: EngineThresholds,
    /// Lifetime of API cache entries, such as `profile` reports
    pub cache_ttl_minutes: u32,
    /// Datasets not accessed for this many days are removed by cleanup
    pub dataset_max_age_days: u32,
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir().map_or_else(|| PathBuf::from("./data"), |dir| dir.join("insightease"))
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            engine: EngineThresholds::default(),
            cache_ttl_minutes: 60,
            dataset_max_age_days: 30,
            log_level: "info".to_string(),
        }
    }
}

impl InsightConfig {
    /// Loads from the system file, then `./insightease.toml` (or `explicit`, which
    /// must exist), then the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, InsightError> {
        Self::load_from(explicit, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(explicit: Option<&Path>, env: Environment) -> Result<Self, InsightError> {
        let mut builder = Config::builder().add_source(File::with_name(SYSTEM_CONFIG).required(false));

        builder = match explicit {
            Some(path) => {
                debug!(path = %path.display(), "using explicit config file");
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::with_name(LOCAL_CONFIG).required(false)),
        };

        builder = builder.add_source(env.prefix_separator("_").separator("__").try_parsing(true));

        builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| InsightError::Config(e.to_string()))
    }
}
