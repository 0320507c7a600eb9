//! Config file loading: read the file to a string, then hand it to
//! `toml`, wrapping errors instead of unwrapping.

use ue_core::config::UeConfig;

use crate::error::UeProcessError;

pub async fn load_config(path: &str) -> Result<UeConfig, UeProcessError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| UeProcessError::ConfigRead { path: path.to_string(), source })?;

    toml::from_str(&contents).map_err(|source| UeProcessError::ConfigParse { path: path.to_string(), source })
}
