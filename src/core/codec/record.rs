//! Record schemas
//!
//! A [`Record`] is a struct whose mappable fields are listed once, at compile
//! time, with [`impl_record!`](crate::impl_record). Fields left out of the
//! listing (or of a kind the codec does not support) are never read or
//! written by the collections.

use super::kind::{FieldKind, FieldValue};

/// Schema entry for one mappable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// External name used in the store
    pub name: &'static str,
    /// Declared Rust field name
    pub ident: &'static str,
    pub kind: FieldKind,
    /// Carried from the declaration; flatten still writes empty values
    pub omit_empty: bool,
}

/// Rust types that map onto a [`FieldKind`]
pub trait FieldType: Sized {
    const KIND: FieldKind;

    fn to_value(&self) -> FieldValue;

    /// `None` when `value` is of another kind
    fn from_value(value: FieldValue) -> Option<Self>;
}

macro_rules! field_type {
    ($ty:ty, $variant:ident) => {
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::$variant;

            fn to_value(&self) -> FieldValue {
                FieldValue::$variant(self.clone())
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for FieldValue {
            fn from(v: $ty) -> Self {
                FieldValue::$variant(v)
            }
        }
    };
}

field_type!(bool, Bool);
field_type!(i8, I8);
field_type!(i16, I16);
field_type!(i32, I32);
field_type!(i64, I64);
field_type!(isize, Isize);
field_type!(u8, U8);
field_type!(u16, U16);
field_type!(u32, U32);
field_type!(u64, U64);
field_type!(usize, Usize);
field_type!(f32, F32);
field_type!(f64, F64);
field_type!(String, Str);

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

/// A struct whose fields can be flattened to and populated from a field map
///
/// Implement with [`impl_record!`](crate::impl_record) rather than by hand.
pub trait Record {
    /// Mappable fields in declaration order
    fn fields() -> &'static [FieldSpec];

    /// Current value of the field at `index` in [`Record::fields`]
    fn get(&self, index: usize) -> Option<FieldValue>;

    /// Assign the field at `index`; false if the index or kind does not match
    fn set(&mut self, index: usize, value: FieldValue) -> bool;

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Kind of a struct field, resolved from an accessor
#[doc(hidden)]
pub fn kind_of<R, T: FieldType>(_accessor: fn(&R) -> &T) -> FieldKind {
    T::KIND
}

/// Implement [`Record`] for a struct by listing its mappable fields
///
/// Each field is `ident`, optionally followed by `=> "external_name"` and/or
/// the `omitempty` marker. Unlisted fields are left alone.
///
/// ```
/// use redis_collections::{impl_record, Record};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Account {
///     name: String,
///     sex: i32,
///     nick: String,
///     tags: Vec<String>,
/// }
///
/// impl_record!(Account {
///     name,
///     sex => "gender",
///     nick omitempty,
/// });
///
/// let names: Vec<_> = Account::fields().iter().map(|f| f.name).collect();
/// assert_eq!(names, vec!["name", "gender", "nick"]);
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $( $field:ident $( => $ext:literal )? $( $omit:ident )? ),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn fields() -> &'static [$crate::FieldSpec] {
                static FIELDS: ::std::sync::OnceLock<::std::vec::Vec<$crate::FieldSpec>> =
                    ::std::sync::OnceLock::new();
                FIELDS.get_or_init(|| {
                    ::std::vec![
                        $(
                            $crate::FieldSpec {
                                name: $crate::__record_field_name!($field $(, $ext)?),
                                ident: ::std::stringify!($field),
                                kind: $crate::codec::kind_of(|r: &$ty| &r.$field),
                                omit_empty: $crate::__record_omit_empty!($($omit)?),
                            }
                        ),*
                    ]
                })
            }

            fn get(&self, index: usize) -> ::std::option::Option<$crate::FieldValue> {
                let getters: &[fn(&Self) -> $crate::FieldValue] = &[
                    $( |r: &Self| $crate::FieldType::to_value(&r.$field) ),*
                ];
                getters.get(index).map(|g| g(self))
            }

            fn set(&mut self, index: usize, value: $crate::FieldValue) -> bool {
                let setters: &[fn(&mut Self, $crate::FieldValue) -> bool] = &[
                    $(
                        |r: &mut Self, v: $crate::FieldValue| match $crate::FieldType::from_value(v) {
                            ::std::option::Option::Some(x) => {
                                r.$field = x;
                                true
                            }
                            ::std::option::Option::None => false,
                        }
                    ),*
                ];
                match setters.get(index) {
                    ::std::option::Option::Some(s) => s(self, value),
                    ::std::option::Option::None => false,
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_field_name {
    ($field:ident) => {
        ::std::stringify!($field)
    };
    ($field:ident, $ext:literal) => {
        $ext
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_omit_empty {
    () => {
        false
    };
    (omitempty) => {
        true
    };
}
