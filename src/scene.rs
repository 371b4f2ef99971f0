//! Scene tree access for the data file offset index.
//!
//! `Scene.json` is a tree of layers. The codec only interprets the layer
//! types and the `DataFileOffset` hex strings locating each paint layer's
//! drawings and each picture layer's image inside the payload. The rest of
//! the document passes through save unchanged.
use serde_json::Value;

use crate::error::SceneError;

/// The record type a scene entry locates in the payload.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EntryKind {
    Drawing,
    Picture,
}

/// One `DataFileOffset` reference extracted from the scene tree.
#[derive(Debug, PartialEq, Clone)]
pub struct SceneEntry {
    pub offset: u64,
    pub kind: EntryKind,
    /// Slash separated layer names from the root, for error messages.
    pub layer_path: String,
    /// JSON pointer to the offset string, used to rewrite it on save.
    pub(crate) pointer: String,
}

/// The parsed `Scene.json` document.
#[derive(Debug, PartialEq, Clone)]
pub struct SceneTree {
    doc: Value,
}

impl SceneTree {
    pub fn parse(text: &str) -> Result<Self, SceneError> {
        Ok(Self {
            doc: serde_json::from_str(text)?,
        })
    }

    pub fn as_value(&self) -> &Value {
        &self.doc
    }

    /// Data file offset entries in depth first document order.
    ///
    /// Entries are not sorted. Callers slicing the payload sort by offset
    /// first.
    pub fn entries(&self) -> Result<Vec<SceneEntry>, SceneError> {
        let root = self
            .doc
            .pointer("/Sequence/RootLayer")
            .ok_or(SceneError::MissingRootLayer)?;
        let name = root.get("Name").and_then(Value::as_str).unwrap_or("");

        let mut entries = Vec::new();
        collect_layer(root, "/Sequence/RootLayer", name, &mut entries)?;
        Ok(entries)
    }

    /// Rewrite each entry's `DataFileOffset` string.
    ///
    /// `entries` and `offsets` pair positionally.
    pub fn set_offsets(&mut self, entries: &[SceneEntry], offsets: &[u64]) -> Result<(), SceneError> {
        if entries.len() != offsets.len() {
            return Err(SceneError::EntryCountMismatch {
                entries: entries.len(),
                items: offsets.len(),
            });
        }
        for (entry, offset) in entries.iter().zip(offsets) {
            let value = self
                .doc
                .pointer_mut(&entry.pointer)
                .ok_or_else(|| SceneError::StaleEntry {
                    layer: entry.layer_path.clone(),
                })?;
            *value = Value::String(format!("{offset:08x}"));
        }
        Ok(())
    }

    /// Serialize the document, preserving member order.
    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(&self.doc)?)
    }
}

fn collect_layer(
    layer: &Value,
    pointer: &str,
    path: &str,
    entries: &mut Vec<SceneEntry>,
) -> Result<(), SceneError> {
    match layer.get("Type").and_then(Value::as_str) {
        Some("Paint") => {
            let drawings = layer
                .pointer("/Implementation/Drawings")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (i, drawing) in drawings.iter().enumerate() {
                entries.push(SceneEntry {
                    offset: parse_offset(drawing.get("DataFileOffset"), path)?,
                    kind: EntryKind::Drawing,
                    layer_path: path.to_string(),
                    pointer: format!("{pointer}/Implementation/Drawings/{i}/DataFileOffset"),
                });
            }
        }
        Some("Picture") => {
            entries.push(SceneEntry {
                offset: parse_offset(layer.pointer("/Implementation/DataFileOffset"), path)?,
                kind: EntryKind::Picture,
                layer_path: path.to_string(),
                pointer: format!("{pointer}/Implementation/DataFileOffset"),
            });
        }
        _ => {
            let children = layer
                .pointer("/Implementation/Children")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (i, child) in children.iter().enumerate() {
                let name = child.get("Name").and_then(Value::as_str).unwrap_or("");
                collect_layer(
                    child,
                    &format!("{pointer}/Implementation/Children/{i}"),
                    &format!("{path}/{name}"),
                    entries,
                )?;
            }
        }
    }
    Ok(())
}

fn parse_offset(value: Option<&Value>, layer: &str) -> Result<u64, SceneError> {
    let value = value.ok_or_else(|| SceneError::MissingOffset {
        layer: layer.to_string(),
    })?;
    value
        .as_str()
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit()))
        .and_then(|s| u64::from_str_radix(s, 16).ok())
        .ok_or_else(|| SceneError::MalformedOffset {
            layer: layer.to_string(),
            value: value.to_string(),
        })
}
