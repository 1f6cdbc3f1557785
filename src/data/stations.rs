use crate::error::FetchError;
use geojson::{FeatureCollection, GeoJson};
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use tracing::{debug, info};

pub type FetchResult = Result<FeatureCollection, FetchError>;

/// Where the station dataset lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetLocation {
    File(PathBuf),
    Url(String),
}

impl FromStr for DatasetLocation {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(DatasetLocation::Url(s.to_string()))
        } else {
            Ok(DatasetLocation::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for DatasetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetLocation::File(path) => write!(f, "{}", path.display()),
            DatasetLocation::Url(url) => f.write_str(url),
        }
    }
}

/// A dataset retrieval in flight. Dropping it abandons the result.
pub struct PendingDataset {
    rx: Receiver<FetchResult>,
}

impl PendingDataset {
    /// A pending dataset fed by hand through the returned sender
    pub fn channel() -> (Sender<FetchResult>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    /// `None` while the fetch is still running
    pub fn try_take(&self) -> Option<FetchResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FetchError::Disconnected)),
        }
    }
}

/// Retrieve and decode the dataset on a background thread
pub fn spawn_fetch(location: DatasetLocation) -> PendingDataset {
    let (tx, pending) = PendingDataset::channel();
    thread::spawn(move || {
        let result = fetch(&location);
        // The receiver is gone if the view was torn down in the meantime
        if tx.send(result).is_err() {
            debug!(%location, "dataset arrived after teardown, discarded");
        }
    });
    pending
}

/// Retrieve and decode the dataset, blocking
pub fn fetch(location: &DatasetLocation) -> FetchResult {
    info!(%location, "fetching station dataset");
    let bytes = match location {
        DatasetLocation::File(path) => std::fs::read(path)?,
        DatasetLocation::Url(url) => {
            let response = reqwest::blocking::get(url.as_str())?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            response.bytes()?.to_vec()
        }
    };
    decode(bytes)
}

/// Decode a GeoJSON FeatureCollection
pub fn decode(mut bytes: Vec<u8>) -> FetchResult {
    let value: serde_json::Value =
        simd_json::serde::from_slice(&mut bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    match GeoJson::from_json_value(value).map_err(|e| FetchError::Decode(e.to_string()))? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(FetchError::NotACollection),
    }
}
