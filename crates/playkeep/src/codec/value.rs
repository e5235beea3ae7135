use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const ONE: Self = Self {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

/// Rotation quaternion, `w` last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `radians` around the Z axis.
    pub fn from_rotation_z(radians: f32) -> Self {
        let half = radians * 0.5;
        Self {
            x: 0.0,
            y: 0.0,
            z: half.sin(),
            w: half.cos(),
        }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Linear RGBA color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const CLEAR: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }
}

/// Closed set of field kinds the engine can capture, diff and replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Boolean,
    Float,
    String,
    Color,
    Vector2,
    Vector3,
    Vector4,
    Rotation,
    Enum,
}

impl FieldKind {
    pub const ALL: [FieldKind; 10] = [
        FieldKind::Integer,
        FieldKind::Boolean,
        FieldKind::Float,
        FieldKind::String,
        FieldKind::Color,
        FieldKind::Vector2,
        FieldKind::Vector3,
        FieldKind::Vector4,
        FieldKind::Rotation,
        FieldKind::Enum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Float => "float",
            FieldKind::String => "string",
            FieldKind::Color => "color",
            FieldKind::Vector2 => "vector2",
            FieldKind::Vector3 => "vector3",
            FieldKind::Vector4 => "vector4",
            FieldKind::Rotation => "rotation",
            FieldKind::Enum => "enum",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Boolean(bool),
    Float(f32),
    String(String),
    Color(Color),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Rotation(Quat),
    /// Underlying ordinal of an enum member, not its name.
    Enum(i32),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Boolean(_) => FieldKind::Boolean,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Color(_) => FieldKind::Color,
            FieldValue::Vector2(_) => FieldKind::Vector2,
            FieldValue::Vector3(_) => FieldKind::Vector3,
            FieldValue::Vector4(_) => FieldKind::Vector4,
            FieldValue::Rotation(_) => FieldKind::Rotation,
            FieldValue::Enum(_) => FieldKind::Enum,
        }
    }

    /// Zero or identity value of `kind`, used whenever a stored string cannot be parsed.
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Boolean => FieldValue::Boolean(false),
            FieldKind::Float => FieldValue::Float(0.0),
            FieldKind::String => FieldValue::String(String::new()),
            FieldKind::Color => FieldValue::Color(Color::CLEAR),
            FieldKind::Vector2 => FieldValue::Vector2(Vec2::ZERO),
            FieldKind::Vector3 => FieldValue::Vector3(Vec3::ZERO),
            FieldKind::Vector4 => FieldValue::Vector4(Vec4::ZERO),
            FieldKind::Rotation => FieldValue::Rotation(Quat::IDENTITY),
            FieldKind::Enum => FieldValue::Enum(0),
        }
    }
}
