use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup file is not valid TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("unable to serialise backup: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid document: {0}")]
    Document(#[from] ubl_core::ParseError),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0} is read-only")]
    ReadOnly(&'static str),

    #[error("{0}")]
    Other(String),
}
