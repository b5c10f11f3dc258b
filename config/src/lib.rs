use std::{
    env,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

mod error;

pub mod fixedpoint;

pub use error::Error;
pub use fixedpoint::FixedPointConfig;

const CARGO_MANIFEST_DIR: &str = env!("CARGO_MANIFEST_DIR");
const CONFIG_ENV_PREFIX: &str = "NEXUS";

pub trait Config: DeserializeOwned {
    const PREFIX: &'static str;

    fn from_env() -> Result<Self, Error> {
        let prefix = format!("{}_{}", CONFIG_ENV_PREFIX, Self::PREFIX);
        let _result = dotenvy::from_path(config_env_path());

        // the env file is optional outside of deployments.
        #[cfg(not(test))]
        if let Err(err) = _result {
            if !err.not_found() {
                return Err(err.into());
            }
        }

        Ok(config::Config::builder()
            .add_source(
                config::Environment::with_prefix(&prefix)
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?)
    }
}

#[doc(hidden)]
pub fn config_env_path() -> PathBuf {
    Path::new(CARGO_MANIFEST_DIR).join(".config.env")
}
