//! Field name to column name conversion.
//!
//! Every record member and every parameter name passes through a
//! [`FieldNameConverter`] before it meets the database. The default,
//! [`PascalToSnakeCase`], turns `SomeOtherValue` into `some_other_value` and
//! leaves names that are already snake_case alone.

use std::fmt;
use std::sync::Arc;

/// Maps a field identifier to a column name.
///
/// Implementations must be pure: the same input always yields the same
/// output. Any `Fn(&str) -> String` closure is a converter.
pub trait FieldNameConverter: Send + Sync {
    /// Convert a field identifier to a column name.
    fn convert(&self, identifier: &str) -> String;
}

impl<F> FieldNameConverter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn convert(&self, identifier: &str) -> String {
        self(identifier)
    }
}

/// The default converter: `PascalCase` → `snake_case`.
///
/// An underscore is inserted before every upper-case character except the
/// first, then the whole result is lower-cased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PascalToSnakeCase;

impl FieldNameConverter for PascalToSnakeCase {
    fn convert(&self, identifier: &str) -> String {
        let mut out = String::with_capacity(identifier.len() + 4);
        for (i, c) in identifier.chars().enumerate() {
            if i > 0 && c.is_uppercase() {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        }
        out
    }
}

/// Shared handle to a converter, as stored by actions and configuration.
#[derive(Clone)]
pub struct SharedConverter(Arc<dyn FieldNameConverter>);

impl SharedConverter {
    pub fn new(converter: impl FieldNameConverter + 'static) -> Self {
        Self(Arc::new(converter))
    }

    pub fn convert(&self, identifier: &str) -> String {
        self.0.convert(identifier)
    }

    pub fn as_dyn(&self) -> &dyn FieldNameConverter {
        self.0.as_ref()
    }
}

impl Default for SharedConverter {
    fn default() -> Self {
        Self::new(PascalToSnakeCase)
    }
}

impl fmt::Debug for SharedConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedConverter(..)")
    }
}

impl From<Arc<dyn FieldNameConverter>> for SharedConverter {
    fn from(inner: Arc<dyn FieldNameConverter>) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_to_snake_case() {
        let sut = PascalToSnakeCase;
        for (input, expected) in [
            ("Id", "id"),
            ("Data1", "data1"),
            ("SomeValue", "some_value"),
            ("SomeOtherValue", "some_other_value"),
        ] {
            assert_eq!(sut.convert(input), expected, "converting {input}");
        }
    }

    #[test]
    fn test_snake_case_passes_through() {
        assert_eq!(PascalToSnakeCase.convert("some_value"), "some_value");
        assert_eq!(PascalToSnakeCase.convert("id"), "id");
        assert_eq!(PascalToSnakeCase.convert(""), "");
    }

    #[test]
    fn test_closure_converter() {
        let upper = SharedConverter::new(|name: &str| name.to_uppercase());
        assert_eq!(upper.convert("value"), "VALUE");
    }
}
