//! Field codec
//!
//! Converts between [`Record`] structs and flat string field maps, the only
//! shape a hash in the store understands.
//!
//! Decoding is best-effort: a field whose stored text does not parse as its
//! kind is left untouched and reported as a [`FieldWarning`]; the rest of the
//! record is still populated.

pub mod kind;
pub mod record;

pub use kind::{DecodeError, FieldKind, FieldValue, KindCodec, REGISTRY};
pub use record::{kind_of, FieldSpec, FieldType, Record};

use crate::error::{CollectionError, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// External field name -> encoded value
pub type FieldMap = HashMap<String, String>;

/// A field that could not be decoded during [`populate`]
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWarning {
    pub field: &'static str,
    pub error: DecodeError,
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {}: {}", self.field, self.error)
    }
}

fn schema<R: Record>() -> Result<&'static [FieldSpec]> {
    let fields = R::fields();
    if fields.is_empty() {
        return Err(CollectionError::NotARecord(R::type_name()));
    }
    Ok(fields)
}

/// External names of every mappable field, in declaration order
pub fn field_names<R: Record>() -> Result<Vec<&'static str>> {
    Ok(schema::<R>()?.iter().map(|f| f.name).collect())
}

/// Encode every mappable field of `record`
///
/// # Examples
///
/// ```
/// use redis_collections::{codec, impl_record};
///
/// #[derive(Default)]
/// struct Foo {
///     name: String,
///     sex: i32,
/// }
/// impl_record!(Foo { name, sex });
///
/// let map = codec::flatten(&Foo { name: "lihao".into(), sex: 1 }).unwrap();
/// assert_eq!(map["name"], "lihao");
/// assert_eq!(map["sex"], "1");
/// ```
pub fn flatten<R: Record>(record: &R) -> Result<FieldMap> {
    let fields = schema::<R>()?;
    let mut map = FieldMap::with_capacity(fields.len());
    for (idx, spec) in fields.iter().enumerate() {
        let value = field_value(record, idx, spec)?;
        map.insert(spec.name.to_string(), (spec.kind.codec().encode)(&value));
    }
    Ok(map)
}

/// Decode values from `map` into `record`
///
/// Fields absent from `map` are left as they are. Returns one warning per
/// field whose value failed to decode.
pub fn populate<R: Record>(record: &mut R, map: &FieldMap) -> Result<Vec<FieldWarning>> {
    let fields = schema::<R>()?;
    let mut warnings = Vec::new();
    for (idx, spec) in fields.iter().enumerate() {
        let Some(raw) = map.get(spec.name) else {
            continue;
        };
        match (spec.kind.codec().decode)(raw) {
            Ok(value) => {
                if !record.set(idx, value) {
                    return Err(CollectionError::SchemaMismatch(format!(
                        "{} refused a {} value for field {}",
                        R::type_name(),
                        spec.kind,
                        spec.name
                    )));
                }
            }
            Err(error) => {
                warn!("set field({})={} err: {}", spec.name, raw, error);
                warnings.push(FieldWarning {
                    field: spec.name,
                    error,
                });
            }
        }
    }
    Ok(warnings)
}

/// Encode a single value the way [`flatten`] would
pub fn encode(value: &FieldValue) -> String {
    value.encode()
}

fn field_value<R: Record>(record: &R, idx: usize, spec: &FieldSpec) -> Result<FieldValue> {
    match record.get(idx) {
        Some(v) if v.kind() == spec.kind => Ok(v),
        Some(v) => Err(CollectionError::SchemaMismatch(format!(
            "{} field {} declared {} but holds {}",
            R::type_name(),
            spec.name,
            spec.kind,
            v.kind()
        ))),
        None => Err(CollectionError::SchemaMismatch(format!(
            "{} has no value for field {}",
            R::type_name(),
            spec.name
        ))),
    }
}
