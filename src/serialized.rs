//! Serde-backed parameter binding and row mapping.
//!
//! [`Serialized`] wraps any `Serialize`/`Deserialize` type so it can be used
//! where no [`impl_record!`](crate::impl_record) description exists. Members
//! are discovered by serializing to JSON, so the rename and skip attributes
//! of serde apply.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;

use crate::convert::FieldNameConverter;
use crate::error::ScriptResult;
use crate::mapper::{FromRow, Row};
use crate::params::{ParamShape, ToParams};
use crate::value::Value;

/// A value marshalled through serde.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Serialized<T>(pub T);

impl<T> Serialized<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> ToParams for Serialized<T> {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        Ok(match serde_json::to_value(&self.0)? {
            // Unit and `None` carry no members
            Json::Null => ParamShape::Empty,
            Json::Array(_) => ParamShape::Sequence,
            Json::Object(members) => ParamShape::Record(
                members
                    .into_iter()
                    .map(|(name, value)| (Cow::Owned(name), Value::from_json(value)))
                    .collect(),
            ),
            scalar => ParamShape::Scalar(Value::from_json(scalar)),
        })
    }

    fn null_shape() -> ParamShape {
        ParamShape::Empty
    }
}

/// Rows become a JSON object keyed by column name, so serde member names
/// (after `#[serde(rename)]`) must equal the column names. Missing columns
/// are left out of the object and serde defaults apply.
impl<T: DeserializeOwned> FromRow for Serialized<T> {
    fn from_row(row: &Row, _converter: &dyn FieldNameConverter) -> ScriptResult<Self> {
        match serde_json::from_value::<T>(Json::Object(row.to_json())) {
            Ok(value) => Ok(Serialized(value)),
            // A lone column may be the whole value
            Err(_) if row.len() == 1 => {
                let value = row.values()[0].to_json();
                Ok(Serialized(serde_json::from_value(value)?))
            }
            Err(e) => Err(e.into()),
        }
    }
}
