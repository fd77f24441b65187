use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::iter::FromIterator;
use std::ops::{Deref, DerefMut, Index};

use serde::de::{Error, Unexpected};
use serde_json::Value;

/// A JSON object, as carried by `ResourceProperties` and response `Data`.
///
/// Deserializing anything other than an object (or `null`, which becomes an
/// empty map) is an error.
#[derive(Default, Clone, PartialEq)]
pub struct Map(serde_json::Map<String, Value>);

impl Map {
    pub fn new() -> Self {
        Map(serde_json::Map::new())
    }

    pub fn into_inner(self) -> serde_json::Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn deserialize_into<'de, T: serde::Deserialize<'de>>(&'de self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    /// Serializes `t`, which must produce a JSON object.
    pub fn serialize_from<T: serde::Serialize>(t: T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(t).and_then(Self::from_value)
    }

    fn from_value<E: Error>(v: Value) -> Result<Self, E> {
        let expected = &"object map";
        match v {
            Value::Object(map) => Ok(Map(map)),
            Value::Null => Ok(Map::new()),
            Value::Bool(v) => Err(E::invalid_type(Unexpected::Bool(v), expected)),
            Value::Number(v) => Err(if let Some(v) = v.as_u64() {
                E::invalid_type(Unexpected::Unsigned(v), expected)
            } else if let Some(v) = v.as_i64() {
                E::invalid_type(Unexpected::Signed(v), expected)
            } else if let Some(v) = v.as_f64() {
                E::invalid_type(Unexpected::Float(v), expected)
            } else {
                E::invalid_type(Unexpected::Other("number"), expected)
            }),
            Value::String(v) => Err(E::invalid_type(Unexpected::Str(&v), expected)),
            Value::Array(..) => Err(E::invalid_type(Unexpected::Seq, expected)),
        }
    }
}

impl Deref for Map {
    type Target = serde_json::Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Map {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<serde_json::Map<String, Value>> for Map {
    fn from(m: serde_json::Map<String, Value>) -> Self {
        Map(m)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        m.into_value()
    }
}

impl From<Map> for serde_json::Map<String, Value> {
    fn from(m: Map) -> Self {
        m.into_inner()
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, fmt)
    }
}

impl serde::Serialize for Map {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.0, s)
    }
}

impl<'de> serde::Deserialize<'de> for Map {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value: Value = serde::Deserialize::deserialize(d)?;
        Self::from_value(value)
    }
}

impl FromIterator<(String, Value)> for Map {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        serde_json::Map::from_iter(iter).into()
    }
}

impl Extend<(String, Value)> for Map {
    fn extend<T: IntoIterator<Item = (String, Value)>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Map {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'a, Q: Ord + Eq + Hash + ?Sized> Index<&'a Q> for Map
where
    String: Borrow<Q>,
{
    type Output = Value;

    fn index(&self, index: &Q) -> &Self::Output {
        self.0.index(index)
    }
}
