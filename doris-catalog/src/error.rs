use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error reported to DDL statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DdlError(pub String);

/// Error reported when resolving metadata of a missing object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MetaNotFound(pub String);

/// Error that cancels a running schema change job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AlterCancelled(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{0}")]
    Ddl(#[from] DdlError),
    #[error("{0}")]
    MetaNotFound(#[from] MetaNotFound),
    #[error("{0}")]
    AlterCancelled(#[from] AlterCancelled),
    #[error("table {0} already exists")]
    TableAlreadyExists(String),
    #[error("table {0} not exists")]
    TableNotExists(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<toml::de::Error> for Error {
    #[inline]
    fn from(src: toml::de::Error) -> Self {
        Error::InvalidConfig(src.to_string())
    }
}
