//! The `Scene.qbin` payload holding stroke geometry and embedded pictures.
//!
//! The payload is a short header followed by a sequence of [Drawing] and
//! [Picture] records. The sequence is not self delimiting. Each record's
//! byte offset comes from the scene file's `DataFileOffset` index, so
//! decoding takes the sorted [SceneEntry] list and slices the payload from
//! each offset to the next one.
//!
//! Unidentified header bytes are kept as raw byte arrays rather than typed
//! values so re-encoding a decoded payload reproduces the input byte for
//! byte.
use std::io::{Cursor, Seek, Write};

use binrw::{binrw, helpers::until_eof, BinRead, BinReaderExt, BinResult, BinWrite, BinWriterExt};
use log::{trace, warn};

use crate::{
    error::{DecodeError, InvalidBrushType},
    scene::{EntryKind, SceneEntry},
};

/// Size of the fixed fields before the first indexed record.
pub const FILE_HEADER_SIZE: u64 = 8;

const IMAGE_KIND_RGB: u8 = 6;
const IMAGE_KIND_RGBA: u8 = 7;

/// The decoded `Scene.qbin` payload.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct QuillFile {
    pub highest_global_stroke_id: i32,
    // TODO: always 0?
    pub unknown0: [u8; 4],
    /// Records in ascending offset order from the scene index.
    pub items: Vec<TopLevelItem>,
}

/// A record referenced by a `DataFileOffset` entry in the scene file.
#[derive(Debug, PartialEq, Clone)]
pub enum TopLevelItem {
    Drawing(Drawing),
    Picture(Picture),
}

/// A paint layer's strokes.
#[binrw]
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Drawing {
    #[br(temp, assert(num_strokes >= 0, "negative stroke count {}", num_strokes))]
    #[bw(calc = strokes.len() as i32)]
    num_strokes: i32,

    #[br(count = num_strokes)]
    pub strokes: Vec<Stroke>,

    /// Bytes between the last stroke and the end of this record's span.
    #[br(parse_with = until_eof)]
    pub tail: Vec<u8>,
}

/// One continuous brush motion.
#[binrw]
#[derive(Debug, PartialEq, Clone)]
pub struct Stroke {
    pub global_stroke_id: i32,

    // TODO: always 0?
    pub unknown0: [u8; 4],

    pub bounding_box: BoundingBox,

    #[br(try_map = |code: i16| BrushType::from_code(code).ok_or(InvalidBrushType { code, global_stroke_id }))]
    #[bw(map = |brush: &BrushType| brush.code())]
    pub brush_type: BrushType,

    #[br(map = |x: u8| x != 0)]
    #[bw(map = |x: &bool| u8::from(*x))]
    pub disable_rotational_opacity: bool,

    pub unknown1: u8,

    #[br(temp, assert(num_vertices >= 0, "negative vertex count {}", num_vertices))]
    #[bw(calc = vertices.len() as i32)]
    num_vertices: i32,

    #[br(count = num_vertices)]
    pub vertices: Vec<Vertex>,
}

/// The brush used to sweep a stroke's cross section along its path.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BrushType {
    Line = 0,
    Ribbon = 1,
    Cylinder = 2,
    Ellipse = 3,
    Cube = 4,
}

impl BrushType {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Line),
            1 => Some(Self::Ribbon),
            2 => Some(Self::Cylinder),
            3 => Some(Self::Ellipse),
            4 => Some(Self::Cube),
            _ => None,
        }
    }

    pub fn code(&self) -> i16 {
        *self as i16
    }

    /// The name used by the ascii projection.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Line => "LINE",
            Self::Ribbon => "RIBBON",
            Self::Cylinder => "CYLINDER",
            Self::Ellipse => "ELLIPSE",
            Self::Cube => "CUBE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LINE" => Some(Self::Line),
            "RIBBON" => Some(Self::Ribbon),
            "CYLINDER" => Some(Self::Cylinder),
            "ELLIPSE" => Some(Self::Ellipse),
            "CUBE" => Some(Self::Cube),
            _ => None,
        }
    }
}

/// One sampled point along a stroke.
#[derive(Debug, BinRead, BinWrite, PartialEq, Clone, Copy)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    /// Linear RGB in 0.0..=1.0.
    pub color: Vec3,
    pub opacity: f32,
    pub width: f32,
}

#[derive(Debug, BinRead, BinWrite, PartialEq, Clone, Copy, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, BinRead, BinWrite, PartialEq, Clone, Copy, Default)]
pub struct BoundingBox {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    pub min_z: f32,
    pub max_z: f32,
}

/// An image embedded by a picture layer.
#[binrw]
#[derive(Debug, PartialEq, Clone)]
pub struct Picture {
    pub unknown0: [u8; 2],

    /// Bytes per color channel. Always 1 in captured files.
    pub channel_size: i16,

    pub unknown1: u8,

    #[br(temp, assert(image_kind == IMAGE_KIND_RGB || image_kind == IMAGE_KIND_RGBA, "unsupported image kind {}", image_kind))]
    #[bw(calc = pixels.image_kind())]
    image_kind: u8,

    pub unknown2: u8,
    pub unknown3: u8,

    #[br(assert(width >= 0, "negative image width {}", width))]
    pub width: i32,

    #[br(assert(height >= 0, "negative image height {}", height))]
    pub height: i32,

    pub unknown4: [u8; 4],

    /// Row major pixels, `width * height` in total.
    #[br(args { kind: image_kind, count: width as usize * height as usize })]
    #[bw(assert(pixels.len() == *width as usize * *height as usize, "pixel count {} does not match {}x{}", pixels.len(), width, height))]
    pub pixels: Pixels,

    /// Bytes between the pixel data and the end of this record's span.
    ///
    /// Some captured files store more bytes in a picture region than the
    /// pixel count accounts for. The meaning is unknown, so they round-trip
    /// as is.
    #[br(parse_with = until_eof)]
    pub tail: Vec<u8>,
}

/// Pixel storage for the two image kinds.
#[derive(Debug, BinRead, BinWrite, PartialEq, Eq, Clone)]
#[br(import { kind: u8, count: usize })]
pub enum Pixels {
    #[br(pre_assert(kind == IMAGE_KIND_RGB))]
    Rgb(#[br(count = count)] Vec<Rgb>),

    #[br(pre_assert(kind == IMAGE_KIND_RGBA))]
    Rgba(#[br(count = count)] Vec<Rgba>),
}

impl Pixels {
    /// The kind byte stored in the picture header.
    pub fn image_kind(&self) -> u8 {
        match self {
            Self::Rgb(_) => IMAGE_KIND_RGB,
            Self::Rgba(_) => IMAGE_KIND_RGBA,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Rgb(pixels) => pixels.len(),
            Self::Rgba(pixels) => pixels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb(_) => 3,
            Self::Rgba(_) => 4,
        }
    }
}

impl Default for Pixels {
    fn default() -> Self {
        Self::Rgb(Vec::new())
    }
}

#[derive(Debug, BinRead, BinWrite, PartialEq, Eq, Clone, Copy)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, BinRead, BinWrite, PartialEq, Eq, Clone, Copy)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl QuillFile {
    /// Decode a payload sliced at the offsets in `entries`.
    ///
    /// `entries` must be sorted by ascending offset. Items are produced in
    /// entry order, so item `i` corresponds to `entries[i]`. An empty
    /// payload decodes to an empty file.
    pub fn from_bytes(bytes: &[u8], entries: &[SceneEntry]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        debug_assert!(entries.windows(2).all(|w| w[0].offset <= w[1].offset));

        for pair in entries.windows(2) {
            if pair[0].offset == pair[1].offset {
                return Err(DecodeError::OffsetCollision {
                    first: pair[0].layer_path.clone(),
                    second: pair[1].layer_path.clone(),
                    offset: pair[0].offset,
                });
            }
        }

        let mut reader = Cursor::new(bytes);
        let highest_global_stroke_id = reader.read_le()?;
        let unknown0 = reader.read_le()?;

        let len = bytes.len() as u64;
        let mut items = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let start = entry.offset;
            let end = entries.get(i + 1).map(|next| next.offset).unwrap_or(len);
            if start < FILE_HEADER_SIZE || end > len {
                return Err(DecodeError::OffsetOutOfRange {
                    layer: entry.layer_path.clone(),
                    offset: start,
                    len,
                });
            }
            trace!(
                "{:?} for {:?}: {:#x}..{:#x}",
                entry.kind,
                entry.layer_path,
                start,
                end
            );

            let mut cursor = Cursor::new(&bytes[start as usize..end as usize]);
            let item = match entry.kind {
                EntryKind::Drawing => cursor.read_le().map(TopLevelItem::Drawing),
                EntryKind::Picture => cursor.read_le().map(TopLevelItem::Picture),
            }
            .map_err(|source| DecodeError::Record {
                layer: entry.layer_path.clone(),
                kind: entry.kind,
                offset: start,
                source,
            })?;

            let tail_len = match &item {
                TopLevelItem::Drawing(drawing) => drawing.tail.len(),
                TopLevelItem::Picture(picture) => picture.tail.len(),
            };
            if tail_len > 0 {
                warn!(
                    "preserving {tail_len} trailing bytes after the {:?} record for {:?}",
                    entry.kind, entry.layer_path
                );
            }

            items.push(item);
        }

        Ok(Self {
            highest_global_stroke_id,
            unknown0,
            items,
        })
    }

    /// Write the payload and return the byte offset of each item.
    ///
    /// The offsets are what the scene file's `DataFileOffset` strings must
    /// be rewritten to for the emitted payload to decode again.
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> BinResult<Vec<u64>> {
        writer.write_le(&self.highest_global_stroke_id)?;
        writer.write_le(&self.unknown0)?;

        let mut offsets = Vec::with_capacity(self.items.len());
        for item in &self.items {
            offsets.push(writer.stream_position()?);
            match item {
                TopLevelItem::Drawing(drawing) => writer.write_le(drawing)?,
                TopLevelItem::Picture(picture) => writer.write_le(picture)?,
            }
        }
        Ok(offsets)
    }

    pub fn to_bytes(&self) -> BinResult<(Vec<u8>, Vec<u64>)> {
        let mut writer = Cursor::new(Vec::new());
        let offsets = self.write(&mut writer)?;
        Ok((writer.into_inner(), offsets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;
    use pretty_assertions::assert_eq;

    fn entry(offset: u64, kind: EntryKind, layer_path: &str) -> SceneEntry {
        SceneEntry {
            offset,
            kind,
            layer_path: layer_path.to_string(),
            pointer: String::new(),
        }
    }

    // File header (highest id 1), one drawing with one single vertex stroke.
    fn single_stroke_bytes() -> Vec<u8> {
        hex!(
            // file header
            01000000 00000000
            // drawing, 1 stroke
            01000000
            // stroke 7, zero bbox, line brush, 1 vertex
            07000000 00000000
            00000000 00000000 00000000 00000000 00000000 00000000
            0000 00 00
            01000000
            // vertex at (1, 0, 0), opacity 1, width 0.5
            0000803F 00000000 00000000
            00000000 00000000 00000000
            00000000 00000000 00000000
            00000000 00000000 00000000
            0000803F 0000003F
        )
        .to_vec()
    }

    fn single_stroke_file() -> QuillFile {
        QuillFile {
            highest_global_stroke_id: 1,
            unknown0: [0; 4],
            items: vec![TopLevelItem::Drawing(Drawing {
                strokes: vec![Stroke {
                    global_stroke_id: 7,
                    unknown0: [0; 4],
                    bounding_box: BoundingBox::default(),
                    brush_type: BrushType::Line,
                    disable_rotational_opacity: false,
                    unknown1: 0,
                    vertices: vec![Vertex {
                        position: Vec3 {
                            x: 1.0,
                            y: 0.0,
                            z: 0.0,
                        },
                        normal: Vec3::default(),
                        tangent: Vec3::default(),
                        color: Vec3::default(),
                        opacity: 1.0,
                        width: 0.5,
                    }],
                }],
                tail: Vec::new(),
            })],
        }
    }

    #[test]
    fn read_write_single_stroke_drawing() {
        let bytes = single_stroke_bytes();
        let entries = [entry(8, EntryKind::Drawing, "Root/Paint")];

        let file = QuillFile::from_bytes(&bytes, &entries).unwrap();
        assert_eq!(single_stroke_file(), file);

        let (out, offsets) = file.to_bytes().unwrap();
        assert_eq!(bytes, out);
        assert_eq!(vec![8], offsets);
    }

    #[test]
    fn read_write_unknown_byte_preserved() {
        // Offset 47 is the stroke's unidentified byte after the flags.
        let mut bytes = single_stroke_bytes();
        bytes[47] = 0xAB;
        let entries = [entry(8, EntryKind::Drawing, "Root/Paint")];

        let file = QuillFile::from_bytes(&bytes, &entries).unwrap();
        let TopLevelItem::Drawing(drawing) = &file.items[0] else {
            panic!("expected a drawing");
        };
        assert_eq!(0xAB, drawing.strokes[0].unknown1);

        let (out, _) = file.to_bytes().unwrap();
        assert_eq!(bytes, out);
    }

    #[test]
    fn read_write_picture_rgb_2x1() {
        let bytes = hex!(
            01000000 00000000
            // picture header, kind 6 (RGB), 2x1
            0000 0100 00 06 0000
            02000000 01000000
            00000000
            // pixels
            FF0000 00FF00
        );
        let entries = [entry(8, EntryKind::Picture, "Root/Photo")];

        let file = QuillFile::from_bytes(&bytes, &entries).unwrap();
        let TopLevelItem::Picture(picture) = &file.items[0] else {
            panic!("expected a picture");
        };
        assert_eq!(2, picture.width);
        assert_eq!(1, picture.height);
        assert_eq!(
            Pixels::Rgb(vec![
                Rgb { r: 255, g: 0, b: 0 },
                Rgb { r: 0, g: 255, b: 0 }
            ]),
            picture.pixels
        );
        assert!(picture.tail.is_empty());

        let (out, _) = file.to_bytes().unwrap();
        assert_eq!(bytes.to_vec(), out);
    }

    #[test]
    fn read_write_picture_trailing_bytes_preserved() {
        let bytes = hex!(
            01000000 00000000
            0000 0100 00 07 0000
            01000000 01000000
            00000000
            FF00FF80
            // bytes past the pixel data
            DEADBEEF
        );
        let entries = [entry(8, EntryKind::Picture, "Root/Photo")];

        let file = QuillFile::from_bytes(&bytes, &entries).unwrap();
        let TopLevelItem::Picture(picture) = &file.items[0] else {
            panic!("expected a picture");
        };
        assert_eq!(hex!(DEADBEEF).to_vec(), picture.tail);

        let (out, _) = file.to_bytes().unwrap();
        assert_eq!(bytes.to_vec(), out);
    }

    #[test]
    fn read_write_empty_drawing() {
        let bytes = hex!(00000000 00000000 00000000);
        let entries = [entry(8, EntryKind::Drawing, "Root/Paint")];

        let file = QuillFile::from_bytes(&bytes, &entries).unwrap();
        let TopLevelItem::Drawing(drawing) = &file.items[0] else {
            panic!("expected a drawing");
        };
        assert!(drawing.strokes.is_empty());

        let (out, _) = file.to_bytes().unwrap();
        assert_eq!(bytes.to_vec(), out);
    }

    #[test]
    fn read_write_picture_zero_width() {
        let bytes = hex!(
            00000000 00000000
            0000 0100 00 06 0000
            00000000 04000000
            00000000
        );
        let entries = [entry(8, EntryKind::Picture, "Root/Photo")];

        let file = QuillFile::from_bytes(&bytes, &entries).unwrap();
        let TopLevelItem::Picture(picture) = &file.items[0] else {
            panic!("expected a picture");
        };
        assert!(picture.pixels.is_empty());

        let (out, _) = file.to_bytes().unwrap();
        assert_eq!(bytes.to_vec(), out);
    }

    #[test]
    fn read_empty_payload() {
        let file = QuillFile::from_bytes(&[], &[]).unwrap();
        assert_eq!(QuillFile::default(), file);
    }

    #[test]
    fn read_multiple_items_in_offset_order() {
        // Two empty drawings followed by a 1x1 RGB picture.
        let bytes = hex!(
            02000000 00000000
            00000000
            00000000
            0000 0100 00 06 0000
            01000000 01000000
            00000000
            112233
        );
        let entries = [
            entry(8, EntryKind::Drawing, "Root/A"),
            entry(12, EntryKind::Drawing, "Root/B"),
            entry(16, EntryKind::Picture, "Root/C"),
        ];

        let file = QuillFile::from_bytes(&bytes, &entries).unwrap();
        assert_eq!(3, file.items.len());
        assert!(matches!(file.items[0], TopLevelItem::Drawing(_)));
        assert!(matches!(file.items[2], TopLevelItem::Picture(_)));

        let (out, offsets) = file.to_bytes().unwrap();
        assert_eq!(bytes.to_vec(), out);
        assert_eq!(vec![8, 12, 16], offsets);
    }

    #[test]
    fn read_invalid_brush_type() {
        let mut bytes = single_stroke_bytes();
        // Stroke brush code at offset 44.
        bytes[44] = 9;
        let entries = [entry(8, EntryKind::Drawing, "Root/Paint")];

        let err = QuillFile::from_bytes(&bytes, &entries).unwrap_err();
        let DecodeError::Record { layer, source, .. } = err else {
            panic!("expected a record error");
        };
        assert_eq!("Root/Paint", layer);
        let message = format!("{source:?}");
        assert!(message.contains("code: 9"), "{message}");
        assert!(message.contains("global_stroke_id: 7"), "{message}");
    }

    #[test]
    fn read_invalid_image_kind() {
        let bytes = hex!(
            00000000 00000000
            0000 0100 00 05 0000
            01000000 01000000
            00000000
            112233
        );
        let entries = [entry(8, EntryKind::Picture, "Root/Photo")];

        let err = QuillFile::from_bytes(&bytes, &entries).unwrap_err();
        let DecodeError::Record { source, .. } = err else {
            panic!("expected a record error");
        };
        let message = format!("{source}");
        assert!(message.contains("image kind"), "{message}");
    }

    #[test]
    fn read_truncated_vertex() {
        let mut bytes = single_stroke_bytes();
        // One byte short of a full vertex.
        bytes.pop();
        let entries = [entry(8, EntryKind::Drawing, "Root/Paint")];

        let err = QuillFile::from_bytes(&bytes, &entries).unwrap_err();
        assert!(
            matches!(&err, DecodeError::Record { layer, .. } if layer == "Root/Paint"),
            "{err:?}"
        );
    }

    #[test]
    fn read_offset_out_of_range() {
        let bytes = hex!(00000000 00000000);
        let entries = [entry(64, EntryKind::Drawing, "Root/Paint")];

        let err = QuillFile::from_bytes(&bytes, &entries).unwrap_err();
        assert!(
            matches!(err, DecodeError::OffsetOutOfRange { offset: 64, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn read_offset_collision() {
        let bytes = hex!(00000000 00000000 00000000);
        let entries = [
            entry(8, EntryKind::Drawing, "Root/A"),
            entry(8, EntryKind::Drawing, "Root/B"),
        ];

        let err = QuillFile::from_bytes(&bytes, &entries).unwrap_err();
        assert!(
            matches!(err, DecodeError::OffsetCollision { offset: 8, .. }),
            "{err:?}"
        );
    }
}
