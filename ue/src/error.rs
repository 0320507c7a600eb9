use thiserror::Error;

#[derive(Error, Debug)]
pub enum UeProcessError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("gnb search entry {entry:?} is not a valid socket address: {source}")]
    InvalidSearchEntry {
        entry: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error(transparent)]
    Task(#[from] ue_core::UeTaskError),
    #[error(transparent)]
    Config(#[from] ue_core::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
