//! Field kinds and the encode/decode registry
//!
//! Every mappable field has one of a closed set of primitive kinds. Each kind
//! owns exactly one encode/decode pair in [`REGISTRY`]; flatten and populate
//! both dispatch through it so reads and writes apply identical rules.

use std::fmt;
use thiserror::Error;

/// Primitive kinds a record field may have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    I64 = 4,
    Isize = 5,
    U8 = 6,
    U16 = 7,
    U32 = 8,
    U64 = 9,
    Usize = 10,
    F32 = 11,
    F64 = 12,
    Str = 13,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::I8 => "i8",
            FieldKind::I16 => "i16",
            FieldKind::I32 => "i32",
            FieldKind::I64 => "i64",
            FieldKind::Isize => "isize",
            FieldKind::U8 => "u8",
            FieldKind::U16 => "u16",
            FieldKind::U32 => "u32",
            FieldKind::U64 => "u64",
            FieldKind::Usize => "usize",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::Str => "string",
        }
    }

    /// Encode/decode pair for this kind
    pub fn codec(&self) -> &'static KindCodec {
        &REGISTRY[*self as usize]
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    Str(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::I8(_) => FieldKind::I8,
            FieldValue::I16(_) => FieldKind::I16,
            FieldValue::I32(_) => FieldKind::I32,
            FieldValue::I64(_) => FieldKind::I64,
            FieldValue::Isize(_) => FieldKind::Isize,
            FieldValue::U8(_) => FieldKind::U8,
            FieldValue::U16(_) => FieldKind::U16,
            FieldValue::U32(_) => FieldKind::U32,
            FieldValue::U64(_) => FieldKind::U64,
            FieldValue::Usize(_) => FieldKind::Usize,
            FieldValue::F32(_) => FieldKind::F32,
            FieldValue::F64(_) => FieldKind::F64,
            FieldValue::Str(_) => FieldKind::Str,
        }
    }

    /// Text form stored in the hash
    pub fn encode(&self) -> String {
        (self.kind().codec().encode)(self)
    }

    /// True for the kind's zero value (false, 0, 0.0, "")
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Bool(v) => !*v,
            FieldValue::I8(v) => *v == 0,
            FieldValue::I16(v) => *v == 0,
            FieldValue::I32(v) => *v == 0,
            FieldValue::I64(v) => *v == 0,
            FieldValue::Isize(v) => *v == 0,
            FieldValue::U8(v) => *v == 0,
            FieldValue::U16(v) => *v == 0,
            FieldValue::U32(v) => *v == 0,
            FieldValue::U64(v) => *v == 0,
            FieldValue::Usize(v) => *v == 0,
            FieldValue::F32(v) => *v == 0.0,
            FieldValue::F64(v) => *v == 0.0,
            FieldValue::Str(v) => v.is_empty(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Failure to parse stored text as a field kind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot decode {input:?} as {kind}: {reason}")]
pub struct DecodeError {
    pub kind: FieldKind,
    pub input: String,
    pub reason: String,
}

impl DecodeError {
    fn new(kind: FieldKind, input: &str, reason: impl ToString) -> Self {
        DecodeError {
            kind,
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type EncodeFn = fn(&FieldValue) -> String;
pub type DecodeFn = fn(&str) -> Result<FieldValue, DecodeError>;

/// Encode/decode pair registered for one kind
pub struct KindCodec {
    pub kind: FieldKind,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

/// One entry per [`FieldKind`], indexed by discriminant
pub static REGISTRY: [KindCodec; 14] = [
    KindCodec { kind: FieldKind::Bool, encode: encode_bool, decode: decode_bool },
    KindCodec { kind: FieldKind::I8, encode: encode_text, decode: decode_i8 },
    KindCodec { kind: FieldKind::I16, encode: encode_text, decode: decode_i16 },
    KindCodec { kind: FieldKind::I32, encode: encode_text, decode: decode_i32 },
    KindCodec { kind: FieldKind::I64, encode: encode_text, decode: decode_i64 },
    KindCodec { kind: FieldKind::Isize, encode: encode_text, decode: decode_isize },
    KindCodec { kind: FieldKind::U8, encode: encode_text, decode: decode_u8 },
    KindCodec { kind: FieldKind::U16, encode: encode_text, decode: decode_u16 },
    KindCodec { kind: FieldKind::U32, encode: encode_text, decode: decode_u32 },
    KindCodec { kind: FieldKind::U64, encode: encode_text, decode: decode_u64 },
    KindCodec { kind: FieldKind::Usize, encode: encode_text, decode: decode_usize },
    KindCodec { kind: FieldKind::F32, encode: encode_text, decode: decode_f32 },
    KindCodec { kind: FieldKind::F64, encode: encode_text, decode: decode_f64 },
    KindCodec { kind: FieldKind::Str, encode: encode_text, decode: decode_str },
];

// Booleans are written the way Redis clients send them
fn encode_bool(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(true) => "1".to_string(),
        FieldValue::Bool(false) => "0".to_string(),
        other => encode_text(other),
    }
}

fn encode_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(v) => v.to_string(),
        FieldValue::I8(v) => v.to_string(),
        FieldValue::I16(v) => v.to_string(),
        FieldValue::I32(v) => v.to_string(),
        FieldValue::I64(v) => v.to_string(),
        FieldValue::Isize(v) => v.to_string(),
        FieldValue::U8(v) => v.to_string(),
        FieldValue::U16(v) => v.to_string(),
        FieldValue::U32(v) => v.to_string(),
        FieldValue::U64(v) => v.to_string(),
        FieldValue::Usize(v) => v.to_string(),
        // Shortest text that parses back to the same bits
        FieldValue::F32(v) => v.to_string(),
        FieldValue::F64(v) => v.to_string(),
        FieldValue::Str(v) => v.clone(),
    }
}

fn decode_bool(s: &str) -> Result<FieldValue, DecodeError> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(FieldValue::Bool(true)),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(FieldValue::Bool(false)),
        _ => Err(DecodeError::new(FieldKind::Bool, s, "invalid boolean")),
    }
}

macro_rules! number_decoder {
    ($name:ident, $ty:ty, $variant:ident) => {
        fn $name(s: &str) -> Result<FieldValue, DecodeError> {
            s.parse::<$ty>()
                .map(FieldValue::$variant)
                .map_err(|e| DecodeError::new(FieldKind::$variant, s, e))
        }
    };
}

number_decoder!(decode_i8, i8, I8);
number_decoder!(decode_i16, i16, I16);
number_decoder!(decode_i32, i32, I32);
number_decoder!(decode_i64, i64, I64);
number_decoder!(decode_isize, isize, Isize);
number_decoder!(decode_u8, u8, U8);
number_decoder!(decode_u16, u16, U16);
number_decoder!(decode_u32, u32, U32);
number_decoder!(decode_u64, u64, U64);
number_decoder!(decode_usize, usize, Usize);
number_decoder!(decode_f32, f32, F32);
number_decoder!(decode_f64, f64, F64);

fn decode_str(s: &str) -> Result<FieldValue, DecodeError> {
    Ok(FieldValue::Str(s.to_string()))
}
