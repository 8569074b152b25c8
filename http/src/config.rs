// Participant addresses

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use locus::{ChoreographyError, Location, Result};

/// Where every participant listens.
///
/// ```
/// use locus_http::HttpConfig;
///
/// let config: HttpConfig<char> = HttpConfig::from_json(
///     r#"{"locations": {"a": "127.0.0.1:8001", "b": "127.0.0.1:8002"}}"#,
/// )
/// .unwrap();
/// assert_eq!(config.address('b').unwrap().port(), 8002);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "L: Serialize",
    deserialize = "L: DeserializeOwned + std::hash::Hash + Eq"
))]
pub struct HttpConfig<L> {
    pub locations: HashMap<L, SocketAddr>,
}

impl<L: Location> HttpConfig<L> {
    pub fn new(locations: impl IntoIterator<Item = (L, SocketAddr)>) -> Self {
        Self {
            locations: locations.into_iter().collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ChoreographyError::Transport(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn address(&self, location: L) -> Result<SocketAddr> {
        self.locations
            .get(&location)
            .copied()
            .ok_or_else(|| ChoreographyError::UnknownLocation(format!("{:?}", location)))
    }

    pub fn participants(&self) -> Vec<L> {
        self.locations.keys().copied().collect()
    }
}
