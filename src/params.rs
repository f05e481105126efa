//! Parameter binding: typed values in, named database values out.
//!
//! A parameter source declares its [`ParamShape`] through [`ToParams`]:
//!
//! | Source                        | Shape      | Resulting set                    |
//! |-------------------------------|------------|----------------------------------|
//! | `()`                          | `Empty`    | no parameters                    |
//! | `i64`, `String`, `bool`, ...  | `Scalar`   | `{"param": value}`               |
//! | `Option<T>`                   | as `T`     | `None` binds the null sentinel   |
//! | `Vec<T>`, slices, sets, maps  | `Sequence` | `InvalidParameterShape` error    |
//! | records (`impl_record!`)      | `Record`   | one entry per member             |

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::convert::FieldNameConverter;
use crate::error::{ScriptError, ScriptResult};
use crate::value::{ToValue, Value};

/// Name of the single parameter a scalar source binds to.
///
/// Scripts with one placeholder refer to it as `@param`.
pub const SCALAR_PARAM: &str = "param";

/// Named database values handed to a script.
///
/// Keeps insertion order; inserting an existing name replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, Value)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, v)| v)
    }

    /// Lookup used for script placeholders: exact first, then ASCII
    /// case-insensitive.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name).or_else(|| {
            self.entries
                .iter()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// How a parameter source is laid out.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamShape {
    /// Binds nothing.
    Empty,
    /// Binds one value as `@param`.
    Scalar(Value),
    /// A collection; never a valid parameter source.
    Sequence,
    /// Binds one value per member, keyed by the unconverted member name.
    Record(Vec<(Cow<'static, str>, Value)>),
}

/// A value that can be used as the parameter source of a script.
pub trait ToParams {
    /// The shape of this value.
    fn param_shape(&self) -> ScriptResult<ParamShape>;

    /// The shape an absent value of this type binds as, used for `None`.
    fn null_shape() -> ParamShape {
        ParamShape::Scalar(Value::Null)
    }
}

/// Build a parameter set from a typed source.
pub fn bind<P>(source: &P, converter: &dyn FieldNameConverter) -> ScriptResult<ParameterSet>
where
    P: ToParams + ?Sized,
{
    let mut set = ParameterSet::new();
    match source.param_shape()? {
        ParamShape::Empty => {}
        ParamShape::Scalar(value) => set.insert(SCALAR_PARAM, value),
        ParamShape::Sequence => {
            return Err(ScriptError::InvalidParameterShape(
                std::any::type_name::<P>().to_string(),
            ));
        }
        ParamShape::Record(members) => {
            for (name, value) in members {
                set.insert(converter.convert(&name), value);
            }
        }
    }
    Ok(set)
}

impl ToParams for () {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        Ok(ParamShape::Empty)
    }

    fn null_shape() -> ParamShape {
        ParamShape::Empty
    }
}

impl ToParams for Value {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        Ok(ParamShape::Scalar(self.clone()))
    }
}

macro_rules! impl_scalar_params {
    ($($t:ty),*) => {
        $(
            impl ToParams for $t {
                fn param_shape(&self) -> ScriptResult<ParamShape> {
                    Ok(ParamShape::Scalar(self.to_value()))
                }
            }
        )*
    };
}

impl_scalar_params!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, char, String, str);

impl<T: ToParams> ToParams for Option<T> {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        match self {
            Some(value) => value.param_shape(),
            None => Ok(T::null_shape()),
        }
    }

    fn null_shape() -> ParamShape {
        T::null_shape()
    }
}

impl<T: ToParams + ?Sized> ToParams for &T {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        (**self).param_shape()
    }
    fn null_shape() -> ParamShape {
        T::null_shape()
    }
}

impl<T: ToParams + ?Sized> ToParams for Box<T> {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        (**self).param_shape()
    }
    fn null_shape() -> ParamShape {
        T::null_shape()
    }
}

impl<T: ToParams + ?Sized> ToParams for Arc<T> {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        (**self).param_shape()
    }
    fn null_shape() -> ParamShape {
        T::null_shape()
    }
}

macro_rules! impl_sequence_params {
    ($($t:ty => [$($g:ident),*]),* $(,)?) => {
        $(
            impl<$($g),*> ToParams for $t {
                fn param_shape(&self) -> ScriptResult<ParamShape> {
                    Ok(ParamShape::Sequence)
                }

                fn null_shape() -> ParamShape {
                    ParamShape::Sequence
                }
            }
        )*
    };
}

impl_sequence_params!(
    Vec<T> => [T],
    VecDeque<T> => [T],
    HashSet<T> => [T],
    BTreeSet<T> => [T],
    HashMap<K, V> => [K, V],
    BTreeMap<K, V> => [K, V],
);

impl<T> ToParams for [T] {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        Ok(ParamShape::Sequence)
    }

    fn null_shape() -> ParamShape {
        ParamShape::Sequence
    }
}

impl<T, const N: usize> ToParams for [T; N] {
    fn param_shape(&self) -> ScriptResult<ParamShape> {
        Ok(ParamShape::Sequence)
    }

    fn null_shape() -> ParamShape {
        ParamShape::Sequence
    }
}
