// Wire unit exchanged between participants.

use locus::{Location, Result, Tag};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// One message in flight: who sent it, at which causal position, and the
/// JSON-encoded payload. The receiver is addressing information passed to
/// [`Transport::send`](super::Transport::send) and is not part of the wire
/// form.
///
/// Wire form: `{"from": "<participant>", "tag": [1,0,2], "data": <payload>}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "L: DeserializeOwned"))]
pub struct Envelope<L> {
    pub from: L,
    pub tag: Tag,
    pub data: serde_json::Value,
}

impl<L: Location> Envelope<L> {
    /// Wrap a payload for sending.
    pub fn seal<T: Serialize + ?Sized>(from: L, tag: Tag, payload: &T) -> Result<Self> {
        Ok(Envelope {
            from,
            tag,
            data: serde_json::to_value(payload)?,
        })
    }

    /// Decode the payload.
    pub fn open<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.data)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
