use core::fmt;
use std::collections::BTreeMap;

use crate::stream::StringValue;
use crate::tags::Tag;

/// A fraction as stored by the `RATIONAL` and `SRATIONAL` types.
///
/// Both the unsigned and the signed 32-bit pairs fit the widened components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rational {
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Rational {
            numerator,
            denominator,
        }
    }

    /// The quotient. A zero denominator gives an infinite or NaN result rather than an error.
    pub fn to_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A decoded tag value, one variant per handler setter.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Undefined(Vec<u8>),
    String(StringValue),
    Rational(Rational),
    RationalArray(Vec<Rational>),
    Float(f32),
    FloatArray(Vec<f32>),
    Double(f64),
    DoubleArray(Vec<f64>),
    Int8s(i8),
    Int8sArray(Vec<i8>),
    Int8u(u8),
    Int8uArray(Vec<u8>),
    Int16s(i16),
    Int16sArray(Vec<i16>),
    Int16u(u16),
    Int16uArray(Vec<u16>),
    Int32s(i32),
    Int32sArray(Vec<i32>),
    Int32u(u32),
    Int32uArray(Vec<u32>),
}

impl Value {
    /// Any unsigned scalar, widened.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int8u(val) => Some(val.into()),
            Value::Int16u(val) => Some(val.into()),
            Value::Int32u(val) => Some(val.into()),
            _ => None,
        }
    }

    /// Any integer scalar, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int8s(val) => Some(val.into()),
            Value::Int16s(val) => Some(val.into()),
            Value::Int32s(val) => Some(val.into()),
            _ => self.as_u64().and_then(|val| i64::try_from(val).ok()),
        }
    }

    /// Any numeric scalar, rationals included.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(val) => Some(val.into()),
            Value::Double(val) => Some(val),
            Value::Rational(val) => Some(val.to_f64()),
            _ => self.as_i64().map(|val| val as f64),
        }
    }

    pub fn as_rational(&self) -> Option<Rational> {
        match *self {
            Value::Rational(val) => Some(val),
            _ => None,
        }
    }

    pub fn as_string_value(&self) -> Option<&StringValue> {
        match self {
            Value::String(val) => Some(val),
            _ => None,
        }
    }

    /// Strings decoded with their own charset.
    pub fn to_text(&self) -> Option<String> {
        self.as_string_value().map(|val| val.to_string())
    }

    /// Unsigned scalars and arrays as one list.
    pub fn to_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            Value::Int8uArray(vals) => Some(vals.iter().map(|&v| v.into()).collect()),
            Value::Int16uArray(vals) => Some(vals.iter().map(|&v| v.into()).collect()),
            Value::Int32uArray(vals) => Some(vals.iter().map(|&v| v.into()).collect()),
            other => other.as_u64().map(|v| vec![v]),
        }
    }

    /// Number of components held.
    pub fn count(&self) -> usize {
        match self {
            Value::Undefined(bytes) => bytes.len(),
            Value::String(val) => val.as_bytes().len(),
            Value::RationalArray(vals) => vals.len(),
            Value::FloatArray(vals) => vals.len(),
            Value::DoubleArray(vals) => vals.len(),
            Value::Int8sArray(vals) => vals.len(),
            Value::Int8uArray(vals) => vals.len(),
            Value::Int16sArray(vals) => vals.len(),
            Value::Int16uArray(vals) => vals.len(),
            Value::Int32sArray(vals) => vals.len(),
            Value::Int32uArray(vals) => vals.len(),
            _ => 1,
        }
    }
}

/// Where a directory sits in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectoryKind {
    /// The first directory of the root chain.
    Ifd0,
    /// A follower on the root chain, `Ifd(1)` being the second directory.
    Ifd(usize),
    /// Reached through the Exif pointer.
    Exif,
    /// Reached through the GPS pointer.
    Gps,
    /// Reached through the interoperability pointer.
    Interop,
    /// Reached through the `SubIFDs` pointer.
    SubIfd,
}

impl DirectoryKind {
    /// The kind of directory a pointer tag leads to, if the tag is one.
    pub fn from_pointer_tag(tag: u16) -> Option<DirectoryKind> {
        match Tag::from_u16(tag)? {
            Tag::ExifDirectory => Some(DirectoryKind::Exif),
            Tag::GpsDirectory => Some(DirectoryKind::Gps),
            Tag::InteropDirectory => Some(DirectoryKind::Interop),
            Tag::SubIfd => Some(DirectoryKind::SubIfd),
            _ => None,
        }
    }

    pub fn name(self) -> String {
        match self {
            DirectoryKind::Ifd0 => "IFD0".into(),
            DirectoryKind::Ifd(n) => format!("IFD{}", n),
            DirectoryKind::Exif => "Exif".into(),
            DirectoryKind::Gps => "GPS".into(),
            DirectoryKind::Interop => "Interoperability".into(),
            DirectoryKind::SubIfd => "SubIFD".into(),
        }
    }
}

/// An Image File Directory (IFD) with its decoded values.
///
/// Values are keyed by the raw tag number. A tag that occurs twice in the same directory keeps
/// the value read last.
#[doc(alias = "IFD")]
pub struct Directory {
    kind: DirectoryKind,
    /// Index of the directory holding the pointer to this one, `None` on the root chain.
    parent: Option<usize>,
    entries: BTreeMap<u16, Value>,
}

impl Directory {
    pub fn new(kind: DirectoryKind, parent: Option<usize>) -> Self {
        Directory {
            kind,
            parent,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DirectoryKind {
        self.kind
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Retrieve the value associated with a tag.
    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.get_raw(tag.to_u16())
    }

    pub fn get_raw(&self, tag: u16) -> Option<&Value> {
        self.entries.get(&tag)
    }

    /// Check if the directory contains a specified tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag.to_u16())
    }

    /// Iterate over all known and unknown tags in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Value)> + '_ {
        self.entries
            .iter()
            .map(|(k, v)| (Tag::from_u16_exhaustive(*k), v))
    }

    pub fn insert(&mut self, tag: u16, value: Value) {
        self.entries.insert(tag, value);
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field(
                "entries",
                &self
                    .entries
                    .iter()
                    .map(|(k, v)| (Tag::from_u16_exhaustive(*k), v))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
