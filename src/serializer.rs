//! Serialization layer for the buffered backends.
//!
//! A [`Snapshot`] is the whole shelf as an ordered map of JSON values. Two
//! encodings ship with the crate: [`JsonSerializer`] (one human-readable JSON
//! object) and [`BincodeSerializer`] (an opaque binary blob). Implement
//! [`Serializer`] if you need another format.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// The complete in-memory contents of a buffered shelf, in insertion order.
pub type Snapshot = IndexMap<String, Value>;

/// Converts snapshots to/from bytes for persistence.
pub trait Serializer: Send + Sync {
    /// Encode a snapshot to bytes.
    fn serialize(&self, data: &Snapshot) -> Result<Vec<u8>>;

    /// Decode bytes back into a snapshot. Malformed input is
    /// [`Error::CorruptData`].
    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot>;
}

/// JSON serializer with optional pretty-printing.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON (single line, no extra whitespace).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON with indentation, easier to read by hand.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, data: &Snapshot) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(data)
        } else {
            serde_json::to_vec(data)
        };
        bytes.map_err(|e| Error::Unserializable(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot> {
        serde_json::from_slice(bytes).map_err(|e| Error::CorruptData(e.to_string()))
    }
}

const BLOB_MAGIC: &[u8; 4] = b"JSHB";
const BLOB_VERSION: u8 = 1;

/// Opaque binary serializer built on bincode.
///
/// Layout: `JSHB`, one version byte, then the bincode encoding of the entry
/// list. Not meant to be read by anything but this crate.
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    /// Create a bincode serializer.
    pub fn new() -> Self {
        Self
    }
}

// bincode is not self-describing, so `serde_json::Value` can't go through it
// directly. Entries are mirrored into this closed tree first.
#[derive(Serialize, Deserialize)]
enum Blob {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<Blob>),
    Object(Vec<(String, Blob)>),
}

impl From<&Value> for Blob {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Blob::Null,
            Value::Bool(b) => Blob::Bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Blob::UInt(u)
                } else if let Some(i) = n.as_i64() {
                    Blob::Int(i)
                } else {
                    Blob::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => Blob::Str(s.clone()),
            Value::Array(items) => Blob::List(items.iter().map(Blob::from).collect()),
            Value::Object(map) => {
                Blob::Object(map.iter().map(|(k, v)| (k.clone(), Blob::from(v))).collect())
            }
        }
    }
}

impl TryFrom<Blob> for Value {
    type Error = Error;

    fn try_from(blob: Blob) -> Result<Self> {
        Ok(match blob {
            Blob::Null => Value::Null,
            Blob::Bool(b) => Value::Bool(b),
            Blob::Int(i) => Value::Number(i.into()),
            Blob::UInt(u) => Value::Number(u.into()),
            Blob::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| Error::CorruptData(format!("non-finite float {f} in blob")))?,
            Blob::Str(s) => Value::String(s),
            Blob::List(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Blob::Object(pairs) => {
                let mut map = Map::with_capacity(pairs.len());
                for (k, v) in pairs {
                    map.insert(k, Value::try_from(v)?);
                }
                Value::Object(map)
            }
        })
    }
}

impl Serializer for BincodeSerializer {
    fn serialize(&self, data: &Snapshot) -> Result<Vec<u8>> {
        let entries: Vec<(&str, Blob)> = data
            .iter()
            .map(|(k, v)| (k.as_str(), Blob::from(v)))
            .collect();
        let body = bincode::serialize(&entries).map_err(|e| Error::Unserializable(e.to_string()))?;

        let mut out = Vec::with_capacity(BLOB_MAGIC.len() + 1 + body.len());
        out.extend_from_slice(BLOB_MAGIC);
        out.push(BLOB_VERSION);
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot> {
        let body = match bytes.strip_prefix(BLOB_MAGIC.as_slice()) {
            Some([BLOB_VERSION, rest @ ..]) => rest,
            Some([v, ..]) => {
                return Err(Error::CorruptData(format!("unsupported blob version {v}")))
            }
            _ => return Err(Error::CorruptData("missing blob header".into())),
        };
        let entries: Vec<(String, Blob)> =
            bincode::deserialize(body).map_err(|e| Error::CorruptData(e.to_string()))?;

        let mut snapshot = Snapshot::with_capacity(entries.len());
        for (k, v) in entries {
            snapshot.insert(k, Value::try_from(v)?);
        }
        Ok(snapshot)
    }
}
