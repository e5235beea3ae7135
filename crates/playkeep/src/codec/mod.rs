//! Canonical string form and tolerant equality for captured field values.
//!
//! The string form is what the diff stores persist. Parsing is lenient: anything that does not
//! decode cleanly becomes the zero/identity value of the requested kind instead of an error.

mod value;

pub use value::{Color, FieldKind, FieldValue, Quat, Vec2, Vec3, Vec4};

pub const EPSILON: f32 = 1e-4;

pub fn serialize(value: &FieldValue) -> String {
    match value {
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Boolean(v) => v.to_string(),
        FieldValue::Float(v) => format_float(*v),
        FieldValue::String(v) => v.clone(),
        FieldValue::Color(c) => format!(
            "#{:02X}{:02X}{:02X}{:02X}",
            channel_to_u8(c.r),
            channel_to_u8(c.g),
            channel_to_u8(c.b),
            channel_to_u8(c.a)
        ),
        FieldValue::Vector2(v) => join_floats(&[v.x, v.y]),
        FieldValue::Vector3(v) => join_floats(&[v.x, v.y, v.z]),
        FieldValue::Vector4(v) => join_floats(&[v.x, v.y, v.z, v.w]),
        FieldValue::Rotation(q) => join_floats(&[q.x, q.y, q.z, q.w]),
        FieldValue::Enum(ordinal) => ordinal.to_string(),
    }
}

pub fn deserialize(raw: &str, kind: FieldKind) -> FieldValue {
    try_deserialize(raw, kind).unwrap_or_else(|| FieldValue::zero(kind))
}

fn try_deserialize(raw: &str, kind: FieldKind) -> Option<FieldValue> {
    let value = match kind {
        FieldKind::Integer => FieldValue::Integer(raw.trim().parse().ok()?),
        FieldKind::Boolean => FieldValue::Boolean(parse_bool(raw)?),
        FieldKind::Float => FieldValue::Float(raw.trim().parse().ok()?),
        FieldKind::String => FieldValue::String(raw.to_string()),
        FieldKind::Color => FieldValue::Color(parse_hex_color(raw)?),
        FieldKind::Vector2 => {
            let [x, y] = parse_floats::<2>(raw)?;
            FieldValue::Vector2(Vec2 { x, y })
        }
        FieldKind::Vector3 => {
            let [x, y, z] = parse_floats::<3>(raw)?;
            FieldValue::Vector3(Vec3 { x, y, z })
        }
        FieldKind::Vector4 => {
            let [x, y, z, w] = parse_floats::<4>(raw)?;
            FieldValue::Vector4(Vec4 { x, y, z, w })
        }
        FieldKind::Rotation => {
            let [x, y, z, w] = parse_floats::<4>(raw)?;
            FieldValue::Rotation(Quat { x, y, z, w })
        }
        FieldKind::Enum => FieldValue::Enum(raw.trim().parse().ok()?),
    };
    Some(value)
}

/// Tolerant equality. Values of different kinds are never equal.
pub fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
        (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
        (FieldValue::Float(a), FieldValue::Float(b)) => floats_equal(*a, *b),
        (FieldValue::String(a), FieldValue::String(b)) => a == b,
        (FieldValue::Color(a), FieldValue::Color(b)) => colors_equal(*a, *b),
        (FieldValue::Vector2(a), FieldValue::Vector2(b)) => vec2_equal(*a, *b),
        (FieldValue::Vector3(a), FieldValue::Vector3(b)) => vec3_equal(*a, *b),
        (FieldValue::Vector4(a), FieldValue::Vector4(b)) => {
            components_equal(&[a.x, a.y, a.z, a.w], &[b.x, b.y, b.z, b.w])
        }
        (FieldValue::Rotation(a), FieldValue::Rotation(b)) => quats_equal(*a, *b),
        (FieldValue::Enum(a), FieldValue::Enum(b)) => a == b,
        _ => false,
    }
}

pub(crate) fn floats_equal(a: f32, b: f32) -> bool {
    components_equal(&[a], &[b])
}

pub(crate) fn vec2_equal(a: Vec2, b: Vec2) -> bool {
    components_equal(&[a.x, a.y], &[b.x, b.y])
}

pub(crate) fn vec3_equal(a: Vec3, b: Vec3) -> bool {
    components_equal(&[a.x, a.y, a.z], &[b.x, b.y, b.z])
}

pub(crate) fn quats_equal(a: Quat, b: Quat) -> bool {
    let (a_raw, b_raw) = ([a.x, a.y, a.z, a.w], [b.x, b.y, b.z, b.w]);
    if has_nan(&a_raw) || has_nan(&b_raw) {
        return components_equal(&a_raw, &b_raw);
    }
    angle_between_degrees(a, b) < EPSILON as f64
}

/// Colors persist at 8 bits per channel, so two colors that store as the same hex string are
/// equal even when their distance exceeds the epsilon.
fn colors_equal(a: Color, b: Color) -> bool {
    let (a, b) = ([a.r, a.g, a.b, a.a], [b.r, b.g, b.b, b.a]);
    if !has_nan(&a) && !has_nan(&b) && a.map(channel_to_u8) == b.map(channel_to_u8) {
        return true;
    }
    components_equal(&a, &b)
}

/// Euclidean distance under the epsilon. NaN matches NaN in the same component and nothing else.
fn components_equal(a: &[f32], b: &[f32]) -> bool {
    let mut squared = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        match (x.is_nan(), y.is_nan()) {
            (true, true) => {}
            (false, false) if x == y => {}
            (false, false) => squared += (x - y) * (x - y),
            _ => return false,
        }
    }
    squared.sqrt() < EPSILON
}

fn has_nan(components: &[f32]) -> bool {
    components.iter().any(|c| c.is_nan())
}

/// Rotation angle, in degrees, that takes `a` onto `b`. `q` and `-q` count as the same rotation.
pub fn angle_between_degrees(a: Quat, b: Quat) -> f64 {
    let a = normalized(a);
    let mut b = normalized(b);
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];
    if dot < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    let mut diff = 0.0;
    let mut sum = 0.0;
    for i in 0..4 {
        diff += (a[i] - b[i]) * (a[i] - b[i]);
        sum += (a[i] + b[i]) * (a[i] + b[i]);
    }
    (4.0 * diff.sqrt().atan2(sum.sqrt())).to_degrees()
}

fn normalized(q: Quat) -> [f64; 4] {
    let raw = [q.x as f64, q.y as f64, q.z as f64, q.w as f64];
    let len = raw.iter().map(|c| c * c).sum::<f64>().sqrt();
    if len == 0.0 || !len.is_finite() {
        return [0.0, 0.0, 0.0, 1.0];
    }
    raw.map(|c| c / len)
}

fn format_float(value: f32) -> String {
    // Shortest form that parses back to the same bits.
    format!("{value}")
}

fn join_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| format_float(*v))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_floats<const N: usize>(raw: &str) -> Option<[f32; N]> {
    let parts = raw.split(',').collect::<Vec<_>>();
    if parts.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.trim().parse().ok()?;
    }
    Some(out)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}

fn channel_to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn parse_hex_color(raw: &str) -> Option<Color> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return None;
    }
    let byte = |index: usize| u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).ok();
    let alpha = if hex.len() == 8 { byte(3)? } else { 255 };
    Some(Color::from_rgba8(byte(0)?, byte(1)?, byte(2)?, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn representative_values() -> Vec<FieldValue> {
        vec![
            FieldValue::Integer(0),
            FieldValue::Integer(i64::MIN),
            FieldValue::Integer(i64::MAX),
            FieldValue::Boolean(true),
            FieldValue::Boolean(false),
            FieldValue::Float(0.0),
            FieldValue::Float(-123.456),
            FieldValue::Float(1.0e-7),
            FieldValue::String(String::new()),
            FieldValue::String("name, with commas|and pipes".to_string()),
            FieldValue::Color(Color::from_rgba8(255, 128, 0, 64)),
            FieldValue::Color(Color::CLEAR),
            FieldValue::Vector2(Vec2::ZERO),
            FieldValue::Vector3(Vec3::new(1.5, -2.25, 1000.125)),
            FieldValue::Vector4(Vec4::new(0.1, 0.2, 0.3, 0.4)),
            FieldValue::Rotation(Quat::IDENTITY),
            FieldValue::Rotation(Quat::from_rotation_z(1.2)),
            FieldValue::Enum(0),
            FieldValue::Enum(-3),
        ]
    }

    #[test]
    fn every_kind_survives_serialize_then_deserialize() {
        for value in representative_values() {
            let text = serialize(&value);
            let decoded = deserialize(&text, value.kind());
            assert!(
                values_equal(&value, &decoded),
                "{value:?} decoded as {decoded:?} via {text:?}"
            );
        }
    }

    #[test]
    fn vectors_and_rotations_are_comma_joined() {
        assert_eq!(serialize(&FieldValue::Vector3(Vec3::new(1.0, 0.5, -2.0))), "1,0.5,-2");
        assert_eq!(serialize(&FieldValue::Rotation(Quat::IDENTITY)), "0,0,0,1");
    }

    #[test]
    fn colors_are_upper_hex_with_alpha() {
        let color = FieldValue::Color(Color::from_rgba8(0x12, 0xAB, 0x00, 0xFF));
        assert_eq!(serialize(&color), "#12AB00FF");
        assert_eq!(
            deserialize("#12AB00", FieldKind::Color),
            FieldValue::Color(Color::from_rgba8(0x12, 0xAB, 0x00, 0xFF))
        );
    }

    #[test]
    fn enums_serialize_as_ordinals() {
        assert_eq!(serialize(&FieldValue::Enum(4)), "4");
        assert_eq!(deserialize("4", FieldKind::Enum), FieldValue::Enum(4));
    }

    #[test]
    fn malformed_input_decodes_to_zero_or_identity() {
        assert_eq!(
            deserialize("1,2", FieldKind::Vector3),
            FieldValue::Vector3(Vec3::ZERO)
        );
        assert_eq!(
            deserialize("1,2,3", FieldKind::Rotation),
            FieldValue::Rotation(Quat::IDENTITY)
        );
        assert_eq!(deserialize("x", FieldKind::Integer), FieldValue::Integer(0));
        assert_eq!(deserialize("maybe", FieldKind::Boolean), FieldValue::Boolean(false));
        assert_eq!(deserialize("#12", FieldKind::Color), FieldValue::Color(Color::CLEAR));
        assert_eq!(deserialize("", FieldKind::Float), FieldValue::Float(0.0));
    }

    #[test]
    fn float_epsilon_boundary() {
        assert!(values_equal(
            &FieldValue::Float(1.0),
            &FieldValue::Float(1.0 + 0.00005)
        ));
        assert!(!values_equal(
            &FieldValue::Float(1.0),
            &FieldValue::Float(1.0 + 0.0002)
        ));
    }

    #[test]
    fn vector_epsilon_uses_distance() {
        let a = FieldValue::Vector3(Vec3::new(0.0, 0.0, 0.0));
        assert!(values_equal(&a, &FieldValue::Vector3(Vec3::new(0.00005, 0.0, 0.0))));
        assert!(!values_equal(&a, &FieldValue::Vector3(Vec3::new(0.0, 0.0002, 0.0))));
    }

    #[test]
    fn rotation_equality_ignores_double_cover() {
        let q = Quat::from_rotation_z(0.7);
        let negated = Quat::new(-q.x, -q.y, -q.z, -q.w);
        assert!(values_equal(&FieldValue::Rotation(q), &FieldValue::Rotation(negated)));
        assert!(!values_equal(
            &FieldValue::Rotation(q),
            &FieldValue::Rotation(Quat::from_rotation_z(0.71))
        ));
        let angle = angle_between_degrees(Quat::IDENTITY, Quat::from_rotation_z(90f32.to_radians()));
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn colors_between_hex_steps_survive_the_round_trip() {
        for color in [Color::new(0.3, 0.6, 0.9, 1.0), Color::new(0.5, 0.5, 0.5, 1.0)] {
            let value = FieldValue::Color(color);
            let decoded = deserialize(&serialize(&value), FieldKind::Color);
            assert_ne!(decoded, value);
            assert!(values_equal(&value, &decoded), "{value:?} vs {decoded:?}");
        }
        assert!(!values_equal(
            &FieldValue::Color(Color::from_rgba8(128, 128, 128, 255)),
            &FieldValue::Color(Color::from_rgba8(129, 128, 128, 255))
        ));
    }

    #[test]
    fn nan_matches_only_nan_in_every_kind() {
        let nan = f32::NAN;
        assert!(values_equal(&FieldValue::Float(nan), &FieldValue::Float(nan)));
        assert!(!values_equal(&FieldValue::Float(nan), &FieldValue::Float(0.0)));

        let vector = FieldValue::Vector3(Vec3::new(nan, 1.0, 2.0));
        assert!(values_equal(&vector, &vector.clone()));
        assert!(!values_equal(&vector, &FieldValue::Vector3(Vec3::new(0.0, 1.0, 2.0))));

        let color = FieldValue::Color(Color::new(nan, 0.0, 0.0, 1.0));
        assert!(values_equal(&color, &color.clone()));
        assert!(!values_equal(&color, &FieldValue::Color(Color::new(0.0, 0.0, 0.0, 1.0))));

        let rotation = FieldValue::Rotation(Quat::new(nan, 0.0, 0.0, 1.0));
        assert!(values_equal(&rotation, &rotation.clone()));
        assert!(!values_equal(&rotation, &FieldValue::Rotation(Quat::IDENTITY)));
    }

    #[test]
    fn exact_kinds_and_mismatched_kinds() {
        assert!(!values_equal(&FieldValue::Integer(1), &FieldValue::Integer(2)));
        assert!(!values_equal(&FieldValue::Integer(1), &FieldValue::Enum(1)));
        assert!(!values_equal(
            &FieldValue::String("a".to_string()),
            &FieldValue::String("A".to_string())
        ));
    }
}
