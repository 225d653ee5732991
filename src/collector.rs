//! A handler that keeps every decoded value.

use tracing::{debug, warn};

use crate::decoder::handler::TiffHandler;
use crate::directory::{Directory, DirectoryKind, Rational, Value};
use crate::error::{FormatError, MetadataResult};
use crate::stream::StringValue;
use crate::tags::Tag;

/// Marker of a classic TIFF file, `42`.
pub const TIFF_MARKER: u16 = 0x002A;

/// Deepest chain of `SubIFDs` pointers that is followed.
pub const MAX_SUB_IFD_DEPTH: usize = 4;

/// Everything a walk produced.
///
/// Directories are stored in the order they were entered, so a parent always precedes its
/// children. Faults the walker recovered from are kept as messages.
#[derive(Debug, Default)]
pub struct Metadata {
    pub directories: Vec<Directory>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Metadata {
    /// The first directory of the given kind.
    pub fn directory(&self, kind: DirectoryKind) -> Option<&Directory> {
        self.directories.iter().find(|dir| dir.kind() == kind)
    }

    /// Looks up a tag in the first directory of the given kind.
    pub fn get(&self, kind: DirectoryKind, tag: Tag) -> Option<&Value> {
        self.directory(kind).and_then(|dir| dir.get(tag))
    }

    /// Directories entered through a pointer tag of the directory at `parent`.
    pub fn children(&self, parent: usize) -> impl Iterator<Item = &Directory> + '_ {
        self.directories
            .iter()
            .filter(move |dir| dir.parent() == Some(parent))
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Collects the directory tree of a TIFF, Exif or TIFF-based RAW structure.
///
/// The standard Exif pointer tags and `SubIFDs` are followed where the Exif layout puts them:
/// Exif and GPS from a root-chain directory, interoperability from Exif, and `SubIFDs` from a
/// root-chain directory or another `SubIFDs` directory up to [`MAX_SUB_IFD_DEPTH`]. A pointer
/// tag anywhere else is kept as a plain value. Follower directories are only taken on the root
/// chain, where they usually hold a thumbnail.
#[derive(Debug)]
pub struct DirectoryCollector {
    markers: Vec<u16>,
    directories: Vec<Directory>,
    /// Indices of the directories currently being filled, innermost last.
    open: Vec<usize>,
    root_chain_len: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Default for DirectoryCollector {
    fn default() -> Self {
        DirectoryCollector {
            markers: vec![TIFF_MARKER],
            directories: Vec::new(),
            open: Vec::new(),
            root_chain_len: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl DirectoryCollector {
    pub fn new() -> Self {
        DirectoryCollector::default()
    }

    /// Also accept the given markers, e.g. `0x4F52` for Olympus ORF or `0x0055` for
    /// Panasonic RW2.
    pub fn with_markers(mut self, markers: impl IntoIterator<Item = u16>) -> Self {
        self.markers.extend(markers);
        self
    }

    pub fn into_metadata(self) -> Metadata {
        Metadata {
            directories: self.directories,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn open_directory(&mut self, kind: DirectoryKind) {
        let parent = self.open.last().copied();
        self.directories.push(Directory::new(kind, parent));
        self.open.push(self.directories.len() - 1);
    }

    fn current_kind(&self) -> Option<DirectoryKind> {
        self.open.last().map(|&index| self.directories[index].kind())
    }

    /// Whether a directory of `kind` may be opened inside the current one.
    fn accepts_nested(&self, kind: DirectoryKind) -> bool {
        let parent = match self.current_kind() {
            Some(parent) => parent,
            None => return false,
        };
        let on_root_chain = matches!(parent, DirectoryKind::Ifd0 | DirectoryKind::Ifd(_));
        match kind {
            DirectoryKind::Exif | DirectoryKind::Gps => on_root_chain,
            DirectoryKind::Interop => parent == DirectoryKind::Exif,
            DirectoryKind::SubIfd => {
                let sub_ifds = self
                    .open
                    .iter()
                    .filter(|&&index| self.directories[index].kind() == DirectoryKind::SubIfd)
                    .count();
                (on_root_chain || parent == DirectoryKind::SubIfd)
                    && sub_ifds < MAX_SUB_IFD_DEPTH
            }
            DirectoryKind::Ifd0 | DirectoryKind::Ifd(_) => false,
        }
    }

    fn insert(&mut self, tag: u16, value: Value) {
        match self.open.last() {
            Some(&index) => self.directories[index].insert(tag, value),
            None => self.warn(&format!("Value for tag 0x{:04X} outside of a directory", tag)),
        }
    }
}

impl TiffHandler for DirectoryCollector {
    fn set_marker(&mut self, marker: u16) -> MetadataResult<()> {
        if !self.markers.contains(&marker) {
            return Err(FormatError::UnexpectedMarker(marker).into());
        }
        self.root_chain_len = 1;
        self.open_directory(DirectoryKind::Ifd0);
        Ok(())
    }

    fn is_tag_ifd_pointer(&mut self, tag: u16) -> bool {
        match DirectoryKind::from_pointer_tag(tag) {
            Some(kind) if self.accepts_nested(kind) => {
                self.open_directory(kind);
                true
            }
            Some(kind) => {
                debug!(
                    tag,
                    kind = kind.name(),
                    parent = ?self.current_kind(),
                    "pointer tag out of place"
                );
                false
            }
            None => false,
        }
    }

    fn has_follower_ifd(&mut self) -> bool {
        if !self.open.is_empty() {
            return false;
        }
        self.open_directory(DirectoryKind::Ifd(self.root_chain_len));
        self.root_chain_len += 1;
        true
    }

    fn ending_ifd(&mut self) {
        self.open.pop();
    }

    fn warn(&mut self, message: &str) {
        warn!("{}", message);
        self.warnings.push(message.to_owned());
    }

    fn error(&mut self, message: &str) {
        warn!(error = true, "{}", message);
        self.errors.push(message.to_owned());
    }

    fn set_byte_array(&mut self, tag: u16, bytes: Vec<u8>) {
        self.insert(tag, Value::Undefined(bytes));
    }

    fn set_string(&mut self, tag: u16, string: StringValue) {
        self.insert(tag, Value::String(string));
    }

    fn set_rational(&mut self, tag: u16, rational: Rational) {
        self.insert(tag, Value::Rational(rational));
    }

    fn set_rational_array(&mut self, tag: u16, array: Vec<Rational>) {
        self.insert(tag, Value::RationalArray(array));
    }

    fn set_float(&mut self, tag: u16, float: f32) {
        self.insert(tag, Value::Float(float));
    }

    fn set_float_array(&mut self, tag: u16, array: Vec<f32>) {
        self.insert(tag, Value::FloatArray(array));
    }

    fn set_double(&mut self, tag: u16, double: f64) {
        self.insert(tag, Value::Double(double));
    }

    fn set_double_array(&mut self, tag: u16, array: Vec<f64>) {
        self.insert(tag, Value::DoubleArray(array));
    }

    fn set_int8s(&mut self, tag: u16, int8s: i8) {
        self.insert(tag, Value::Int8s(int8s));
    }

    fn set_int8s_array(&mut self, tag: u16, array: Vec<i8>) {
        self.insert(tag, Value::Int8sArray(array));
    }

    fn set_int8u(&mut self, tag: u16, int8u: u8) {
        self.insert(tag, Value::Int8u(int8u));
    }

    fn set_int8u_array(&mut self, tag: u16, array: Vec<u8>) {
        self.insert(tag, Value::Int8uArray(array));
    }

    fn set_int16s(&mut self, tag: u16, int16s: i16) {
        self.insert(tag, Value::Int16s(int16s));
    }

    fn set_int16s_array(&mut self, tag: u16, array: Vec<i16>) {
        self.insert(tag, Value::Int16sArray(array));
    }

    fn set_int16u(&mut self, tag: u16, int16u: u16) {
        self.insert(tag, Value::Int16u(int16u));
    }

    fn set_int16u_array(&mut self, tag: u16, array: Vec<u16>) {
        self.insert(tag, Value::Int16uArray(array));
    }

    fn set_int32s(&mut self, tag: u16, int32s: i32) {
        self.insert(tag, Value::Int32s(int32s));
    }

    fn set_int32s_array(&mut self, tag: u16, array: Vec<i32>) {
        self.insert(tag, Value::Int32sArray(array));
    }

    fn set_int32u(&mut self, tag: u16, int32u: u32) {
        self.insert(tag, Value::Int32u(int32u));
    }

    fn set_int32u_array(&mut self, tag: u16, array: Vec<u32>) {
        self.insert(tag, Value::Int32uArray(array));
    }
}
