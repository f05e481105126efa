//! Record descriptors.
//!
//! A record is a plain struct whose members are listed once, at compile
//! time, as a table of `(name, getter, setter)`. Parameter binding reads
//! members through the getters; row mapping writes them through the
//! setters. Nothing is inspected at run time.
//!
//! ```
//! use qail_script::impl_record;
//!
//! #[derive(Debug, Default, PartialEq)]
//! pub struct Resource {
//!     pub id: i64,
//!     pub value: Option<String>,
//! }
//!
//! impl_record!(Resource { id, value });
//! ```

use std::borrow::Cow;

use crate::convert::FieldNameConverter;
use crate::error::{ScriptError, ScriptResult};
use crate::mapper::Row;
use crate::params::ParamShape;
use crate::value::{Value, ValueError};

/// One member of a record.
pub struct Field<T: 'static> {
    /// Member name before conversion.
    pub name: &'static str,
    pub get: fn(&T) -> Value,
    pub set: fn(&mut T, Value) -> Result<(), ValueError>,
}

impl<T: 'static> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// A struct described by a static member table.
///
/// Usually implemented with [`impl_record!`](crate::impl_record), which also
/// implements [`ToParams`](crate::ToParams) and [`FromRow`](crate::FromRow).
pub trait Record: Default + 'static {
    const FIELDS: &'static [Field<Self>];
}

/// Parameter shape of a record value: one entry per member.
pub fn record_shape<T: Record>(record: &T) -> ParamShape {
    ParamShape::Record(
        T::FIELDS
            .iter()
            .map(|field| (Cow::Borrowed(field.name), (field.get)(record)))
            .collect(),
    )
}

/// Parameter shape of an absent record: every member null.
pub fn record_null_shape<T: Record>() -> ParamShape {
    ParamShape::Record(
        T::FIELDS
            .iter()
            .map(|field| (Cow::Borrowed(field.name), Value::Null))
            .collect(),
    )
}

/// Build a record from a row.
///
/// Members without a matching column keep their default value; a column
/// whose value does not fit its member is an error.
pub fn map_record<T: Record>(row: &Row, converter: &dyn FieldNameConverter) -> ScriptResult<T> {
    let mut record = T::default();
    for field in T::FIELDS {
        let column = converter.convert(field.name);
        let Some(index) = row.index_of(&column) else {
            continue;
        };
        let value = row.values()[index].clone();
        (field.set)(&mut record, value)
            .map_err(|e| ScriptError::coercion(column, e.expected, e.found))?;
    }
    Ok(record)
}

/// Describe a struct as a record and implement parameter binding and row
/// mapping for it.
///
/// Every listed member must implement [`ToValue`](crate::ToValue) and
/// [`FromValue`](crate::FromValue); the struct must implement `Default`.
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::Record for $ty {
            const FIELDS: &'static [$crate::Field<Self>] = &[
                $(
                    $crate::Field {
                        name: stringify!($field),
                        get: |record: &$ty| $crate::ToValue::to_value(&record.$field),
                        set: |record: &mut $ty, value: $crate::Value| {
                            record.$field = $crate::FromValue::from_value(value)?;
                            Ok(())
                        },
                    }
                ),+
            ];
        }

        impl $crate::ToParams for $ty {
            fn param_shape(&self) -> $crate::ScriptResult<$crate::ParamShape> {
                Ok($crate::record::record_shape(self))
            }

            fn null_shape() -> $crate::ParamShape {
                $crate::record::record_null_shape::<$ty>()
            }
        }

        impl $crate::FromRow for $ty {
            fn from_row(
                row: &$crate::Row,
                converter: &dyn $crate::FieldNameConverter,
            ) -> $crate::ScriptResult<Self> {
                $crate::record::map_record(row, converter)
            }
        }
    };
}
