//! Dynamic database values and the coercions in and out of them.

use serde_json::Value as Json;

/// A single database value.
///
/// `Null` is the database-null sentinel that parameter binding substitutes
/// for absent values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the stored kind, used in coercion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Convert to a JSON value (bytes become an array of numbers).
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Text(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::Array(b.iter().map(|x| Json::Number((*x).into())).collect()),
        }
    }

    /// Convert from a JSON value. Arrays and objects are kept as JSON text.
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// A value that did not fit the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ValueError {
    fn new(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.kind(),
        }
    }
}

/// Types that can be written as a [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Types that can be read back from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            // SQLite and MySQL store booleans as integers
            Value::Int(i) => Ok(i != 0),
            Value::Text(ref s) => match s.trim() {
                "true" | "TRUE" | "1" => Ok(true),
                "false" | "FALSE" | "0" => Ok(false),
                _ => Err(ValueError::new("bool", &value)),
            },
            other => Err(ValueError::new("bool", &other)),
        }
    }
}

macro_rules! impl_integer {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let expected = stringify!($t);
                    let wide = match &value {
                        Value::Int(i) => *i,
                        Value::Bool(b) => i64::from(*b),
                        // `as` saturates, so the range is checked first
                        Value::Float(f)
                            if f.fract() == 0.0
                                && *f >= i64::MIN as f64
                                && *f < i64::MAX as f64 =>
                        {
                            *f as i64
                        }
                        Value::Text(s) => s
                            .trim()
                            .parse::<i64>()
                            .map_err(|_| ValueError::new(expected, &value))?,
                        _ => return Err(ValueError::new(expected, &value)),
                    };
                    <$t>::try_from(wide).map_err(|_| ValueError::new(expected, &value))
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_float {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::Float(f64::from(*self))
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match &value {
                        Value::Float(f) => Ok(*f as $t),
                        Value::Int(i) => Ok(*i as $t),
                        Value::Text(s) => s
                            .trim()
                            .parse::<$t>()
                            .map_err(|_| ValueError::new(stringify!($t), &value)),
                        _ => Err(ValueError::new(stringify!($t), &value)),
                    }
                }
            }
        )*
    };
}

impl_float!(f32, f64);

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Bytes(b) => {
                String::from_utf8(b).map_err(|_| ValueError {
                    expected: "String",
                    found: "bytes",
                })
            }
            Value::Null => Err(ValueError::new("String", &Value::Null)),
        }
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        if let Value::Text(s) = &value {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(ValueError::new("char", &value))
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(ValueError::new("Vec<u8>", &other)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("hello"), Value::Text("hello".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(i32::from_value(Value::Int(7)), Ok(7));
        assert_eq!(i64::from_value(Value::Text(" 12 ".into())), Ok(12));
        assert_eq!(u8::from_value(Value::Float(3.0)), Ok(3));

        let err = u8::from_value(Value::Int(300)).unwrap_err();
        assert_eq!(err.expected, "u8");
        assert_eq!(err.found, "integer");

        let err = i64::from_value(Value::Text("abc".into())).unwrap_err();
        assert_eq!(err.found, "text");
    }

    #[test]
    fn test_whole_float_out_of_range() {
        let err = i64::from_value(Value::Float(1e20)).unwrap_err();
        assert_eq!(err.expected, "i64");
        assert!(i64::from_value(Value::Float(-1e20)).is_err());
        assert!(i64::from_value(Value::Float(f64::INFINITY)).is_err());
        assert!(i64::from_value(Value::Float(f64::NAN)).is_err());
        assert!(i64::from_value(Value::Float(9_223_372_036_854_775_807.0)).is_err());

        assert_eq!(i64::from_value(Value::Float(-9_223_372_036_854_775_808.0)), Ok(i64::MIN));
        assert_eq!(i64::from_value(Value::Float(1e15)), Ok(1_000_000_000_000_000));
    }

    #[test]
    fn test_null_requires_option() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_value(Value::Text("x".into())),
            Ok(Some("x".to_string()))
        );
        assert!(String::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_bool_from_integer() {
        assert_eq!(bool::from_value(Value::Int(1)), Ok(true));
        assert_eq!(bool::from_value(Value::Int(0)), Ok(false));
        assert!(bool::from_value(Value::Float(0.5)).is_err());
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(Value::from_json(serde_json::json!(5)), Value::Int(5));
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(
            Value::from_json(serde_json::json!([1, 2])),
            Value::Text("[1,2]".into())
        );
        assert_eq!(Value::Text("a".into()).to_json(), serde_json::json!("a"));
    }
}
