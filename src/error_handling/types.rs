use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NoSourcesConfigured(String),
    BadHostname(String),
    NotInRange(String),
    DirectoryDoesNotExist(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NoSourcesConfigured(e) => write!(f, "Source configuration error: {}", e),
            ConfigError::BadHostname(e) => write!(f, "Hostname error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum AcquisitionError {
    CommandFailed(String),
    IoError(std::io::Error),
    NotConfigured,
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::CommandFailed(e) => write!(f, "Acquisition command failed: {}", e),
            AcquisitionError::IoError(e) => write!(f, "Acquisition IO error: {}", e),
            AcquisitionError::NotConfigured => write!(f, "No acquisition command configured"),
        }
    }
}

impl std::error::Error for AcquisitionError {}

impl From<std::io::Error> for AcquisitionError {
    fn from(err: std::io::Error) -> Self {
        AcquisitionError::IoError(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum EnrichmentError {
    RequestFailed(String),
    LookupFailed(String),
    CacheIoError(std::io::Error),
    BadResponse(String),
}

impl fmt::Display for EnrichmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentError::RequestFailed(e) => write!(f, "Enrichment request failed: {}", e),
            EnrichmentError::LookupFailed(e) => write!(f, "Lookup failed for {}", e),
            EnrichmentError::CacheIoError(e) => write!(f, "Enrichment cache IO error: {}", e),
            EnrichmentError::BadResponse(e) => write!(f, "Bad enrichment response: {}", e),
        }
    }
}

impl std::error::Error for EnrichmentError {}

impl From<std::io::Error> for EnrichmentError {
    fn from(err: std::io::Error) -> Self {
        EnrichmentError::CacheIoError(err)
    }
}

#[derive(Debug)]
pub enum QueryError {
    BadAddress(String),
    BadDirection(String),
    BadLimit(String),
    BadTimeRange(String),
    StorageError(StorageError),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::BadAddress(e) => write!(f, "Invalid address filter: {}", e),
            QueryError::BadDirection(e) => write!(f, "Invalid direction filter: {}", e),
            QueryError::BadLimit(e) => write!(f, "Invalid row limit: {}", e),
            QueryError::BadTimeRange(e) => write!(f, "Invalid time range: {}", e),
            QueryError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        QueryError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum PipelineError {
    ConfigurationError(ConfigError),
    AcquisitionError(AcquisitionError),
    StorageError(StorageError),
    EnrichmentError(EnrichmentError),
    InitializationFailed(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            PipelineError::AcquisitionError(e) => write!(f, "Acquisition error: {}", e),
            PipelineError::StorageError(e) => write!(f, "Storage error: {}", e),
            PipelineError::EnrichmentError(e) => write!(f, "Enrichment error: {}", e),
            PipelineError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::ConfigurationError(err)
    }
}

impl From<AcquisitionError> for PipelineError {
    fn from(err: AcquisitionError) -> Self {
        PipelineError::AcquisitionError(err)
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        PipelineError::StorageError(err)
    }
}

impl From<EnrichmentError> for PipelineError {
    fn from(err: EnrichmentError) -> Self {
        PipelineError::EnrichmentError(err)
    }
}
