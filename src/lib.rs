//! A library for reading and writing Oculus Quill project files.
//!
//! A Quill project directory stores the paint strokes and embedded pictures
//! for a scene in a single binary payload `Scene.qbin`. The records inside
//! the payload are located by byte offsets kept in the `Scene.json` scene
//! tree. [QuillProject] reads both files together, decodes the payload into
//! typed records, and writes everything back with the scene tree's offsets
//! updated to the positions the records were given in the new payload.
//! Re-encoding an unmodified project reproduces the payload byte for byte,
//! including header bytes whose meaning is still unidentified.
//!
//! Decoded payloads can also be projected to `Scene.qa`, a JSON document
//! carrying the same information, for inspection and hand editing.
//!
//! # Examples
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let project = quill::QuillProject::load("Example.quill")?;
//! for item in &project.file.items {
//!     if let quill::TopLevelItem::Drawing(drawing) = item {
//!         println!("{} strokes", drawing.strokes.len());
//!     }
//! }
//! project.save("Example.quill.out")?;
//! # Ok(())
//! # }
//! ```
use std::{fs, path::Path};

pub mod error;
pub mod picture;
pub mod qa;
pub mod qbin;
pub mod scene;

use error::{LoadError, QaError, SaveError, SceneError};
pub use qbin::{
    BoundingBox, BrushType, Drawing, Picture, Pixels, QuillFile, Rgb, Rgba, Stroke, TopLevelItem,
    Vec3, Vertex, FILE_HEADER_SIZE,
};
pub use scene::{EntryKind, SceneEntry, SceneTree};

/// A Quill project directory held in memory.
#[derive(Debug, PartialEq, Clone)]
pub struct QuillProject {
    pub scene: SceneTree,
    /// Contents of `State.json`, written back verbatim.
    pub state: String,
    pub file: QuillFile,
}

impl QuillProject {
    /// Read a project directory.
    ///
    /// Loads `Scene.json`, `State.json` and `Scene.qbin`, then decodes the
    /// payload at the offsets in the scene tree. Nothing is returned on
    /// failure, so a partially decoded payload is never observable.
    pub fn load<P: AsRef<Path>>(project_dir: P) -> Result<Self, LoadError> {
        let dir = project_dir.as_ref();

        let scene = SceneTree::parse(&fs::read_to_string(dir.join("Scene.json"))?)?;

        // Quill keeps the state file under a temporary name until the
        // project is saved from the application.
        let state_path = dir.join("State.json");
        let state = if state_path.exists() {
            fs::read_to_string(state_path)?
        } else {
            fs::read_to_string(dir.join("~State.json"))?
        };

        let payload = fs::read(dir.join("Scene.qbin"))?;
        let mut entries = scene.entries()?;
        entries.sort_by_key(|e| e.offset);
        let file = QuillFile::from_bytes(&payload, &entries)?;

        Ok(Self { scene, state, file })
    }

    /// Write `Scene.json`, `State.json` and `Scene.qbin` to `out_dir`.
    ///
    /// Items are written in memory order and the scene tree's
    /// `DataFileOffset` strings are rewritten to the new positions, pairing
    /// item `i` with the `i`-th index entry sorted by its current offset.
    pub fn save<P: AsRef<Path>>(&self, out_dir: P) -> Result<(), SaveError> {
        let dir = out_dir.as_ref();
        fs::create_dir_all(dir)?;

        let (payload, offsets) = self.file.to_bytes()?;

        let mut entries = self.scene.entries()?;
        entries.sort_by_key(|e| e.offset);
        if entries.len() != offsets.len() {
            return Err(SceneError::EntryCountMismatch {
                entries: entries.len(),
                items: offsets.len(),
            }
            .into());
        }

        let mut scene = self.scene.clone();
        scene.set_offsets(&entries, &offsets)?;

        fs::write(dir.join("Scene.json"), scene.to_json()?)?;
        fs::write(dir.join("State.json"), &self.state)?;
        fs::write(dir.join("Scene.qbin"), payload)?;
        Ok(())
    }

    /// Write the ASCII projection `Scene.qa` to `out_dir`.
    pub fn save_ascii<P: AsRef<Path>>(&self, out_dir: P) -> Result<(), SaveError> {
        let dir = out_dir.as_ref();
        fs::create_dir_all(dir)?;
        fs::write(dir.join("Scene.qa"), self.to_ascii()?)?;
        Ok(())
    }

    /// The ASCII projection of the payload.
    pub fn to_ascii(&self) -> Result<String, QaError> {
        qa::encode(&self.file)
    }

    /// A project with this project's scene tree and state and the payload
    /// decoded from `text`.
    ///
    /// The scene tree and state are opaque to the codec, so round-tripping
    /// through the ASCII projection borrows them from an existing project.
    pub fn from_ascii(&self, text: &str) -> Result<Self, QaError> {
        Ok(Self {
            scene: self.scene.clone(),
            state: self.state.clone(),
            file: qa::decode(text)?,
        })
    }
}
