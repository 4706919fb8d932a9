use camino::{Utf8Path, Utf8PathBuf};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

const DEFAULT_CONFIG_FILE: &str = "e2e.toml";
const ENV_PREFIX: &str = "E2E_";

/// Run-wide switches. One value per test binary run, never per test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Overwrite golden files instead of comparing against them.
    #[serde(default)]
    pub update_golden: bool,
    /// Log the raw response before filters run.
    #[serde(default)]
    pub dump_raw: bool,
    #[serde(default = "default_testdata_dir")]
    pub testdata_dir: Utf8PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            update_golden: false,
            dump_raw: false,
            testdata_dir: default_testdata_dir(),
        }
    }
}

fn default_testdata_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("testdata")
}

impl RunConfig {
    /// Defaults, then `e2e.toml` in the working directory if present, then
    /// `E2E_*` environment variables.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(None)
    }

    pub fn load_from(explicit_path: Option<&Utf8Path>) -> Result<Self, Error> {
        let path = explicit_path.unwrap_or(Utf8Path::new(DEFAULT_CONFIG_FILE));
        Ok(Figment::from(Serialized::defaults(RunConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?)
    }

    pub fn update(mut self, update_golden: bool) -> Self {
        self.update_golden = update_golden;
        self
    }

    pub fn dump_raw(mut self, dump_raw: bool) -> Self {
        self.dump_raw = dump_raw;
        self
    }

    pub fn testdata_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.testdata_dir = dir.into();
        self
    }
}
