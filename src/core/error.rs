use thiserror::Error;

use crate::core::types::ChannelKey;

#[derive(Error, Debug)]
pub enum DungeonError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No encounter for channel {0}")]
    UnknownEncounter(ChannelKey),

    #[error("Collaborator not available: {0}")]
    Unavailable(&'static str),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DungeonError>;
