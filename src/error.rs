//! Error types for project read and write operations.
use thiserror::Error;

use crate::scene::EntryKind;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading project files")]
    Io(#[from] std::io::Error),

    #[error("error reading scene index")]
    Scene(#[from] SceneError),

    #[error("error decoding payload")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("error writing project files")]
    Io(#[from] std::io::Error),

    #[error("error updating scene index")]
    Scene(#[from] SceneError),

    #[error("error encoding payload")]
    Encode(#[from] binrw::Error),

    #[error("error encoding ascii projection")]
    Ascii(#[from] QaError),
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene file is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("scene file has no Sequence.RootLayer")]
    MissingRootLayer,

    #[error("missing DataFileOffset for layer {layer:?}")]
    MissingOffset { layer: String },

    #[error("DataFileOffset {value:?} for layer {layer:?} is not a hex string")]
    MalformedOffset { layer: String, value: String },

    #[error("scene index has {entries} entries but the file has {items} items")]
    EntryCountMismatch { entries: usize, items: usize },

    #[error("scene entry for layer {layer:?} no longer exists in the tree")]
    StaleEntry { layer: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("error decoding file header")]
    Header(#[from] binrw::Error),

    #[error("data file offset {offset:#x} for layer {layer:?} is outside the {len} byte payload")]
    OffsetOutOfRange { layer: String, offset: u64, len: u64 },

    #[error("layers {first:?} and {second:?} share data file offset {offset:#x}")]
    OffsetCollision {
        first: String,
        second: String,
        offset: u64,
    },

    #[error("error decoding {kind:?} record for layer {layer:?} at offset {offset:#x}")]
    Record {
        layer: String,
        kind: EntryKind,
        offset: u64,
        #[source]
        source: binrw::Error,
    },
}

/// Raised while decoding a stroke whose brush code has no known meaning.
#[derive(Debug, Error)]
#[error("invalid brush type code {code} for stroke {global_stroke_id}")]
pub struct InvalidBrushType {
    pub code: i16,
    pub global_stroke_id: i32,
}

#[derive(Debug, Error)]
pub enum QaError {
    #[error("ascii document is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("expected {record} to be a JSON object")]
    NotAnObject { record: &'static str },

    #[error("missing field {field:?} in {record}")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("field {field:?} in {record} has the wrong type")]
    FieldType {
        record: &'static str,
        field: &'static str,
    },

    #[error("field {field:?} in {record} is not a hex byte string")]
    InvalidHex {
        record: &'static str,
        field: &'static str,
    },

    #[error("top level item must be a single drawing or picture object")]
    ItemKind,

    #[error("unknown brush type name {name:?}")]
    UnknownBrush { name: String },

    #[error("{field} is {declared} but the sequence has {actual} elements")]
    CountMismatch {
        field: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("unsupported image kind {kind}")]
    ImageKind { kind: i64 },

    #[error("pixel {index} does not have {channels} channels")]
    PixelChannels { index: usize, channels: usize },

    #[error("non-finite value in field {field:?} cannot be represented")]
    NonFiniteFloat { field: &'static str },
}
