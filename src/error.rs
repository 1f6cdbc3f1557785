use thiserror::Error;

/// Failure while retrieving or decoding the station dataset
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to download dataset: {0}")]
    Http(#[from] reqwest::Error),
    #[error("dataset request returned status {0}")]
    Status(u16),
    #[error("failed to decode dataset: {0}")]
    Decode(String),
    #[error("dataset is not a GeoJSON FeatureCollection")]
    NotACollection,
    #[error("dataset loader stopped before delivering a result")]
    Disconnected,
}

/// Failure reported by a map engine while installing sources or layers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("source '{0}' already exists")]
    DuplicateSource(String),
    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),
    #[error("layer references unknown source '{0}'")]
    UnknownSource(String),
    #[error("map engine has been removed")]
    Removed,
}

/// Failure surfaced by a map view to its host
#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
