//! Lossless ASCII projection of the payload model.
//!
//! `Scene.qa` is a JSON document mirroring [QuillFile] field for field so a
//! decoded payload can be inspected, diffed, and edited by hand, then read
//! back. Keys appear in the order the binary layout declares them, brush
//! types are written by name, and unidentified bytes are written as
//! lowercase hex strings. Counts are written from the sequence lengths and
//! checked against them again on decode.
use serde_json::{json, Map, Value};

use crate::{
    error::QaError,
    qbin::{
        BoundingBox, BrushType, Drawing, Picture, Pixels, QuillFile, Rgb, Rgba, Stroke,
        TopLevelItem, Vec3, Vertex,
    },
};

/// Encode a file as the `Scene.qa` text document.
///
/// Fails if a float is not finite, since JSON has no representation for it.
pub fn encode(file: &QuillFile) -> Result<String, QaError> {
    Ok(serde_json::to_string_pretty(&file_to_value(file)?)?)
}

/// Decode a `Scene.qa` text document.
pub fn decode(text: &str) -> Result<QuillFile, QaError> {
    file_from_value(&serde_json::from_str(text)?)
}

fn file_to_value(file: &QuillFile) -> Result<Value, QaError> {
    let items = file
        .items
        .iter()
        .map(item_to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "highest_global_stroke_id": file.highest_global_stroke_id,
        "unknown0": hex_string(&file.unknown0),
        "items": items,
    }))
}

fn item_to_value(item: &TopLevelItem) -> Result<Value, QaError> {
    Ok(match item {
        TopLevelItem::Drawing(drawing) => json!({ "drawing": drawing_to_value(drawing)? }),
        TopLevelItem::Picture(picture) => json!({ "picture": picture_to_value(picture)? }),
    })
}

fn drawing_to_value(drawing: &Drawing) -> Result<Value, QaError> {
    let strokes = drawing
        .strokes
        .iter()
        .map(stroke_to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let mut value = json!({
        "num_strokes": drawing.strokes.len(),
        "strokes": strokes,
    });
    push_tail(&mut value, &drawing.tail);
    Ok(value)
}

fn stroke_to_value(stroke: &Stroke) -> Result<Value, QaError> {
    let vertices = stroke
        .vertices
        .iter()
        .map(vertex_to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "global_stroke_id": stroke.global_stroke_id,
        "unknown0": hex_string(&stroke.unknown0),
        "bounding_box": bounding_box_to_value(&stroke.bounding_box)?,
        "brush_type": stroke.brush_type.name(),
        "disable_rotational_opacity": stroke.disable_rotational_opacity,
        "unknown1": hex_string(&[stroke.unknown1]),
        "num_vertices": stroke.vertices.len(),
        "vertices": vertices,
    }))
}

fn vertex_to_value(vertex: &Vertex) -> Result<Value, QaError> {
    Ok(json!({
        "position": vec3_to_value(&vertex.position)?,
        "normal": vec3_to_value(&vertex.normal)?,
        "tangent": vec3_to_value(&vertex.tangent)?,
        "color": vec3_to_value(&vertex.color)?,
        "opacity": finite(vertex.opacity, "opacity")?,
        "width": finite(vertex.width, "width")?,
    }))
}

fn vec3_to_value(v: &Vec3) -> Result<Value, QaError> {
    Ok(json!({
        "x": finite(v.x, "x")?,
        "y": finite(v.y, "y")?,
        "z": finite(v.z, "z")?,
    }))
}

fn bounding_box_to_value(b: &BoundingBox) -> Result<Value, QaError> {
    Ok(json!({
        "min_x": finite(b.min_x, "min_x")?,
        "max_x": finite(b.max_x, "max_x")?,
        "min_y": finite(b.min_y, "min_y")?,
        "max_y": finite(b.max_y, "max_y")?,
        "min_z": finite(b.min_z, "min_z")?,
        "max_z": finite(b.max_z, "max_z")?,
    }))
}

fn picture_to_value(picture: &Picture) -> Result<Value, QaError> {
    let pixels = match &picture.pixels {
        Pixels::Rgb(pixels) => pixels.iter().map(|p| json!([p.r, p.g, p.b])).collect(),
        Pixels::Rgba(pixels) => pixels.iter().map(|p| json!([p.r, p.g, p.b, p.a])).collect(),
    };
    let mut value = json!({
        "unknown0": hex_string(&picture.unknown0),
        "channel_size": picture.channel_size,
        "unknown1": hex_string(&[picture.unknown1]),
        "image_kind": picture.pixels.image_kind(),
        "unknown2": hex_string(&[picture.unknown2]),
        "unknown3": hex_string(&[picture.unknown3]),
        "width": picture.width,
        "height": picture.height,
        "unknown4": hex_string(&picture.unknown4),
        "pixels": Value::Array(pixels),
    });
    push_tail(&mut value, &picture.tail);
    Ok(value)
}

fn push_tail(value: &mut Value, tail: &[u8]) {
    if !tail.is_empty() {
        if let Some(object) = value.as_object_mut() {
            object.insert("tail".to_string(), Value::String(hex_string(tail)));
        }
    }
}

fn finite(value: f32, field: &'static str) -> Result<f64, QaError> {
    if value.is_finite() {
        Ok(value as f64)
    } else {
        Err(QaError::NonFiniteFloat { field })
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn file_from_value(value: &Value) -> Result<QuillFile, QaError> {
    let object = object(value, "file")?;
    let items = array(object, "file", "items")?
        .iter()
        .map(item_from_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(QuillFile {
        highest_global_stroke_id: int(object, "file", "highest_global_stroke_id")?,
        unknown0: hex_array(object, "file", "unknown0")?,
        items,
    })
}

fn item_from_value(value: &Value) -> Result<TopLevelItem, QaError> {
    let object = object(value, "item")?;
    if object.len() != 1 {
        return Err(QaError::ItemKind);
    }
    match object.iter().next() {
        Some((key, value)) if key == "drawing" => Ok(TopLevelItem::Drawing(drawing_from_value(value)?)),
        Some((key, value)) if key == "picture" => Ok(TopLevelItem::Picture(picture_from_value(value)?)),
        _ => Err(QaError::ItemKind),
    }
}

fn drawing_from_value(value: &Value) -> Result<Drawing, QaError> {
    let object = object(value, "drawing")?;
    let strokes = array(object, "drawing", "strokes")?
        .iter()
        .map(stroke_from_value)
        .collect::<Result<Vec<_>, _>>()?;
    check_count(int::<usize>(object, "drawing", "num_strokes")?, strokes.len(), "num_strokes")?;
    Ok(Drawing {
        strokes,
        tail: tail_from_value(object, "drawing")?,
    })
}

fn stroke_from_value(value: &Value) -> Result<Stroke, QaError> {
    let object = object(value, "stroke")?;
    let name = string(object, "stroke", "brush_type")?;
    let brush_type = BrushType::from_name(name).ok_or_else(|| QaError::UnknownBrush {
        name: name.to_string(),
    })?;
    let vertices = array(object, "stroke", "vertices")?
        .iter()
        .map(vertex_from_value)
        .collect::<Result<Vec<_>, _>>()?;
    check_count(int::<usize>(object, "stroke", "num_vertices")?, vertices.len(), "num_vertices")?;
    Ok(Stroke {
        global_stroke_id: int(object, "stroke", "global_stroke_id")?,
        unknown0: hex_array(object, "stroke", "unknown0")?,
        bounding_box: bounding_box_from_value(field(object, "stroke", "bounding_box")?)?,
        brush_type,
        disable_rotational_opacity: boolean(object, "stroke", "disable_rotational_opacity")?,
        unknown1: hex_array::<1>(object, "stroke", "unknown1")?[0],
        vertices,
    })
}

fn vertex_from_value(value: &Value) -> Result<Vertex, QaError> {
    let object = object(value, "vertex")?;
    Ok(Vertex {
        position: vec3_from_value(field(object, "vertex", "position")?)?,
        normal: vec3_from_value(field(object, "vertex", "normal")?)?,
        tangent: vec3_from_value(field(object, "vertex", "tangent")?)?,
        color: vec3_from_value(field(object, "vertex", "color")?)?,
        opacity: float(object, "vertex", "opacity")?,
        width: float(object, "vertex", "width")?,
    })
}

fn vec3_from_value(value: &Value) -> Result<Vec3, QaError> {
    let object = object(value, "vec3")?;
    Ok(Vec3 {
        x: float(object, "vec3", "x")?,
        y: float(object, "vec3", "y")?,
        z: float(object, "vec3", "z")?,
    })
}

fn bounding_box_from_value(value: &Value) -> Result<BoundingBox, QaError> {
    let object = object(value, "bounding_box")?;
    Ok(BoundingBox {
        min_x: float(object, "bounding_box", "min_x")?,
        max_x: float(object, "bounding_box", "max_x")?,
        min_y: float(object, "bounding_box", "min_y")?,
        max_y: float(object, "bounding_box", "max_y")?,
        min_z: float(object, "bounding_box", "min_z")?,
        max_z: float(object, "bounding_box", "max_z")?,
    })
}

fn picture_from_value(value: &Value) -> Result<Picture, QaError> {
    let object = object(value, "picture")?;
    let kind: i64 = int(object, "picture", "image_kind")?;
    let width: i32 = int(object, "picture", "width")?;
    let height: i32 = int(object, "picture", "height")?;

    let values = array(object, "picture", "pixels")?;
    let pixels = match kind {
        6 => Pixels::Rgb(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let [r, g, b] = pixel_from_value::<3>(v, i)?;
                    Ok(Rgb { r, g, b })
                })
                .collect::<Result<Vec<_>, QaError>>()?,
        ),
        7 => Pixels::Rgba(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let [r, g, b, a] = pixel_from_value::<4>(v, i)?;
                    Ok(Rgba { r, g, b, a })
                })
                .collect::<Result<Vec<_>, QaError>>()?,
        ),
        kind => return Err(QaError::ImageKind { kind }),
    };
    check_count(
        width.unsigned_abs() as usize * height.unsigned_abs() as usize,
        pixels.len(),
        "pixel count",
    )?;

    Ok(Picture {
        unknown0: hex_array(object, "picture", "unknown0")?,
        channel_size: int(object, "picture", "channel_size")?,
        unknown1: hex_array::<1>(object, "picture", "unknown1")?[0],
        unknown2: hex_array::<1>(object, "picture", "unknown2")?[0],
        unknown3: hex_array::<1>(object, "picture", "unknown3")?[0],
        width,
        height,
        unknown4: hex_array(object, "picture", "unknown4")?,
        pixels,
        tail: tail_from_value(object, "picture")?,
    })
}

fn pixel_from_value<const N: usize>(value: &Value, index: usize) -> Result<[u8; N], QaError> {
    value
        .as_array()
        .filter(|channels| channels.len() == N)
        .and_then(|channels| {
            let mut bytes = [0u8; N];
            for (byte, channel) in bytes.iter_mut().zip(channels) {
                *byte = u8::try_from(channel.as_u64()?).ok()?;
            }
            Some(bytes)
        })
        .ok_or(QaError::PixelChannels {
            index,
            channels: N,
        })
}

fn tail_from_value(object: &Map<String, Value>, record: &'static str) -> Result<Vec<u8>, QaError> {
    match object.get("tail") {
        None => Ok(Vec::new()),
        Some(value) => value
            .as_str()
            .and_then(parse_hex)
            .ok_or(QaError::InvalidHex {
                record,
                field: "tail",
            }),
    }
}

fn check_count(declared: usize, actual: usize, field: &'static str) -> Result<(), QaError> {
    if declared == actual {
        Ok(())
    } else {
        Err(QaError::CountMismatch {
            field,
            declared,
            actual,
        })
    }
}

fn object<'a>(value: &'a Value, record: &'static str) -> Result<&'a Map<String, Value>, QaError> {
    value.as_object().ok_or(QaError::NotAnObject { record })
}

fn field<'a>(
    object: &'a Map<String, Value>,
    record: &'static str,
    field: &'static str,
) -> Result<&'a Value, QaError> {
    object
        .get(field)
        .ok_or(QaError::MissingField { record, field })
}

fn int<T: TryFrom<i64>>(
    object: &Map<String, Value>,
    record: &'static str,
    name: &'static str,
) -> Result<T, QaError> {
    field(object, record, name)?
        .as_i64()
        .and_then(|v| T::try_from(v).ok())
        .ok_or(QaError::FieldType {
            record,
            field: name,
        })
}

fn float(
    object: &Map<String, Value>,
    record: &'static str,
    name: &'static str,
) -> Result<f32, QaError> {
    field(object, record, name)?
        .as_f64()
        .map(|v| v as f32)
        .ok_or(QaError::FieldType {
            record,
            field: name,
        })
}

fn boolean(
    object: &Map<String, Value>,
    record: &'static str,
    name: &'static str,
) -> Result<bool, QaError> {
    field(object, record, name)?
        .as_bool()
        .ok_or(QaError::FieldType {
            record,
            field: name,
        })
}

fn string<'a>(
    object: &'a Map<String, Value>,
    record: &'static str,
    name: &'static str,
) -> Result<&'a str, QaError> {
    field(object, record, name)?
        .as_str()
        .ok_or(QaError::FieldType {
            record,
            field: name,
        })
}

fn array<'a>(
    object: &'a Map<String, Value>,
    record: &'static str,
    name: &'static str,
) -> Result<&'a Vec<Value>, QaError> {
    field(object, record, name)?
        .as_array()
        .ok_or(QaError::FieldType {
            record,
            field: name,
        })
}

fn hex_array<const N: usize>(
    object: &Map<String, Value>,
    record: &'static str,
    name: &'static str,
) -> Result<[u8; N], QaError> {
    field(object, record, name)?
        .as_str()
        .and_then(parse_hex)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or(QaError::InvalidHex {
            record,
            field: name,
        })
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
