//! Row mapping: decoded rows in, typed values out.

use std::sync::Arc;

use crate::convert::FieldNameConverter;
use crate::error::{ScriptError, ScriptResult};
use crate::value::{FromValue, Value};

/// One decoded result row.
///
/// Column names are shared between all rows of the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<N, I>(pairs: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the named column: exact match first, then ASCII
    /// case-insensitive.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.index_of(name).map(|i| &self.values[i])
    }

    /// Read and coerce the named column.
    ///
    /// Meant for hand-written [`FromRow`] impls.
    pub fn try_get<T: FromValue>(&self, name: &str) -> ScriptResult<T> {
        let value = self.get_by_name(name).cloned().ok_or_else(|| {
            ScriptError::coercion(name, std::any::type_name::<T>(), "missing column")
        })?;
        T::from_value(value).map_err(|e| ScriptError::coercion(name, e.expected, e.found))
    }

    /// Read and coerce a column by position.
    pub fn try_get_index<T: FromValue>(&self, index: usize) -> ScriptResult<T> {
        let column = self
            .columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("#{}", index));
        let value = self.values.get(index).cloned().ok_or_else(|| {
            ScriptError::coercion(column.clone(), std::any::type_name::<T>(), "missing column")
        })?;
        T::from_value(value).map_err(|e| ScriptError::coercion(column, e.expected, e.found))
    }

    /// Column/value pairs as a JSON object.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().map(Value::to_json))
            .collect()
    }
}

/// A type that can be built from a row.
///
/// Scalars read column 0. Records (see [`impl_record!`](crate::impl_record))
/// match columns by converted member name. Implement this by hand to replace
/// the generic mapping for a type on a hot path.
///
/// `Option<T>` maps to `None` when [`FromRow::is_absent`] holds for `T`: a
/// NULL first column for scalars, every column NULL otherwise (the shape of
/// an unmatched outer join).
pub trait FromRow: Sized {
    fn from_row(row: &Row, converter: &dyn FieldNameConverter) -> ScriptResult<Self>;

    /// Whether `row` stands for an absent value of this type.
    fn is_absent(row: &Row) -> bool {
        !row.is_empty() && row.values().iter().all(Value::is_null)
    }
}

impl FromRow for Row {
    fn from_row(row: &Row, _converter: &dyn FieldNameConverter) -> ScriptResult<Self> {
        Ok(row.clone())
    }
}

macro_rules! impl_scalar_row {
    ($($t:ty),*) => {
        $(
            impl FromRow for $t {
                fn from_row(row: &Row, _converter: &dyn FieldNameConverter) -> ScriptResult<Self> {
                    row.try_get_index(0)
                }

                fn is_absent(row: &Row) -> bool {
                    row.values().first().is_some_and(Value::is_null)
                }
            }
        )*
    };
}

impl_scalar_row!(Value, bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, char, String, Vec<u8>);

impl<T: FromRow> FromRow for Option<T> {
    fn from_row(row: &Row, converter: &dyn FieldNameConverter) -> ScriptResult<Self> {
        if T::is_absent(row) {
            return Ok(None);
        }
        T::from_row(row, converter).map(Some)
    }

    fn is_absent(row: &Row) -> bool {
        T::is_absent(row)
    }
}
