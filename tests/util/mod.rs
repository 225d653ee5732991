#![allow(dead_code)]

use tiff_metadata::decoder::cycles::VisitedOffsets;
use tiff_metadata::stream::{ByteArrayReader, ShiftedReader};
use tiff_metadata::{
    ByteOrder, FormatError, MetadataResult, RandomAccessReader, Rational, StringValue,
    TiffHandler, TiffWalker, Value,
};

pub fn encode_u16(order: ByteOrder, value: u16) -> [u8; 2] {
    match order {
        ByteOrder::LittleEndian => value.to_le_bytes(),
        ByteOrder::BigEndian => value.to_be_bytes(),
    }
}

pub fn encode_u32(order: ByteOrder, value: u32) -> [u8; 4] {
    match order {
        ByteOrder::LittleEndian => value.to_le_bytes(),
        ByteOrder::BigEndian => value.to_be_bytes(),
    }
}

/// The 4-byte value field of an entry.
#[derive(Clone, Debug)]
pub enum Field {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Long(u32),
}

#[derive(Clone, Debug)]
pub struct IfdEntry {
    pub tag: u16,
    pub format: u16,
    pub count: u32,
    pub field: Field,
}

impl IfdEntry {
    pub fn short(tag: u16, value: u16) -> Self {
        IfdEntry::shorts(tag, &[value])
    }

    pub fn shorts(tag: u16, values: &[u16]) -> Self {
        IfdEntry {
            tag,
            format: 3,
            count: values.len() as u32,
            field: Field::Shorts(values.to_vec()),
        }
    }

    pub fn long(tag: u16, value: u32) -> Self {
        IfdEntry {
            tag,
            format: 4,
            count: 1,
            field: Field::Long(value),
        }
    }

    /// Up to four bytes stored inline; `format` should be a 1-byte type.
    pub fn bytes(tag: u16, format: u16, bytes: &[u8]) -> Self {
        IfdEntry {
            tag,
            format,
            count: bytes.len() as u32,
            field: Field::Bytes(bytes.to_vec()),
        }
    }

    /// A value stored elsewhere, or any entry whose field is a plain 4-byte number.
    pub fn at(tag: u16, format: u16, count: u32, offset: u32) -> Self {
        IfdEntry {
            tag,
            format,
            count,
            field: Field::Long(offset),
        }
    }

    fn write(&self, order: ByteOrder, out: &mut Vec<u8>) {
        out.extend_from_slice(&encode_u16(order, self.tag));
        out.extend_from_slice(&encode_u16(order, self.format));
        out.extend_from_slice(&encode_u32(order, self.count));
        let mut field = Vec::with_capacity(4);
        match &self.field {
            Field::Bytes(bytes) => field.extend_from_slice(bytes),
            Field::Shorts(shorts) => {
                for &s in shorts {
                    field.extend_from_slice(&encode_u16(order, s));
                }
            }
            Field::Long(value) => field.extend_from_slice(&encode_u32(order, *value)),
        }
        field.resize(4, 0);
        out.extend_from_slice(&field);
    }
}

/// Assembles a classic TIFF structure in memory. All offsets are relative to the header.
pub struct TiffBuilder {
    order: ByteOrder,
    data: Vec<u8>,
}

impl TiffBuilder {
    pub fn new(order: ByteOrder) -> Self {
        TiffBuilder::with_marker(order, 0x002A)
    }

    /// A header whose first IFD offset points directly behind it.
    pub fn with_marker(order: ByteOrder, marker: u16) -> Self {
        let data = match order {
            ByteOrder::LittleEndian => b"II".to_vec(),
            ByteOrder::BigEndian => b"MM".to_vec(),
        };
        let mut builder = TiffBuilder { order, data };
        builder.push_u16(marker);
        builder.push_u32(8);
        builder
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn set_first_ifd(&mut self, offset: u32) {
        self.patch_u32(4, offset);
    }

    pub fn patch_u32(&mut self, at: u32, value: u32) {
        let at = at as usize;
        self.data[at..at + 4].copy_from_slice(&encode_u32(self.order, value));
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> u32 {
        let at = self.len();
        self.data.extend_from_slice(bytes);
        at
    }

    pub fn push_u16(&mut self, value: u16) -> u32 {
        self.push_bytes(&encode_u16(self.order, value))
    }

    pub fn push_u32(&mut self, value: u32) -> u32 {
        self.push_bytes(&encode_u32(self.order, value))
    }

    pub fn push_u32s(&mut self, values: &[u32]) -> u32 {
        let at = self.len();
        for &v in values {
            self.push_u32(v);
        }
        at
    }

    pub fn push_f64(&mut self, value: f64) -> u32 {
        let bytes = match self.order {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        };
        self.push_bytes(&bytes)
    }

    /// Appends a directory with a zero next pointer and returns its offset.
    pub fn ifd(&mut self, entries: &[IfdEntry]) -> u32 {
        self.ifd_in_order(self.order, entries)
    }

    /// Appends a directory written in the given byte order.
    pub fn ifd_in_order(&mut self, order: ByteOrder, entries: &[IfdEntry]) -> u32 {
        let at = self.len();
        self.data
            .extend_from_slice(&encode_u16(order, entries.len() as u16));
        for entry in entries {
            entry.write(order, &mut self.data);
        }
        self.data.extend_from_slice(&[0; 4]);
        at
    }

    /// Sets the next-directory pointer of the directory at `ifd`.
    pub fn link(&mut self, ifd: u32, next: u32) {
        let at = ifd as usize;
        let count = match self.order {
            ByteOrder::LittleEndian => u16::from_le_bytes([self.data[at], self.data[at + 1]]),
            ByteOrder::BigEndian => u16::from_be_bytes([self.data[at], self.data[at + 1]]),
        };
        self.patch_u32(ifd + 2 + 12 * u32::from(count), next);
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Marker(u16),
    Pointer(u16),
    Follower,
    EndingIfd,
    Completed(i64),
    Warn(String),
    Error(String),
    Custom {
        tag: u16,
        value_offset: i64,
        byte_count: i64,
        head: Vec<u8>,
    },
    Value(u16, Value),
}

/// Records every callback of a walk.
pub struct RecordingHandler {
    pub events: Vec<Event>,
    pub markers: Vec<u16>,
    pub pointer_tags: Vec<u16>,
    pub follow: bool,
    /// Tags taken over by `custom_process_tag`.
    pub consume_tags: Vec<u16>,
    /// Tags whose value is an embedded TIFF, walked from its first directory at local offset 8.
    pub note_tags: Vec<u16>,
    /// Non-standard format codes and their component size.
    pub custom_formats: Vec<(u16, i64)>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        RecordingHandler {
            events: Vec::new(),
            markers: vec![0x002A],
            pointer_tags: vec![0x8769, 0x8825, 0xA005, 0x014A],
            follow: true,
            consume_tags: Vec::new(),
            note_tags: Vec::new(),
            custom_formats: Vec::new(),
        }
    }

    pub fn endings(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::EndingIfd))
            .count()
    }

    pub fn values(&self) -> Vec<(u16, Value)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Value(tag, value) => Some((*tag, value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn value(&self, tag: u16) -> Option<Value> {
        self.values()
            .into_iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v)
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Error(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Warn(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    fn value_event(&mut self, tag: u16, value: Value) {
        self.events.push(Event::Value(tag, value));
    }
}

impl TiffHandler for RecordingHandler {
    fn set_marker(&mut self, marker: u16) -> MetadataResult<()> {
        self.events.push(Event::Marker(marker));
        if self.markers.contains(&marker) {
            Ok(())
        } else {
            Err(FormatError::UnexpectedMarker(marker).into())
        }
    }

    fn is_tag_ifd_pointer(&mut self, tag: u16) -> bool {
        if self.pointer_tags.contains(&tag) {
            self.events.push(Event::Pointer(tag));
            true
        } else {
            false
        }
    }

    fn has_follower_ifd(&mut self) -> bool {
        if self.follow {
            self.events.push(Event::Follower);
        }
        self.follow
    }

    fn ending_ifd(&mut self) {
        self.events.push(Event::EndingIfd);
    }

    fn completed(
        &mut self,
        _reader: &mut dyn RandomAccessReader,
        header_offset: i64,
    ) -> MetadataResult<()> {
        self.events.push(Event::Completed(header_offset));
        Ok(())
    }

    fn custom_process_tag(
        &mut self,
        value_offset: i64,
        visited: &mut VisitedOffsets,
        _header_offset: i64,
        reader: &mut dyn RandomAccessReader,
        tag: u16,
        byte_count: i64,
    ) -> MetadataResult<bool> {
        if self.note_tags.contains(&tag) {
            let mut note = ShiftedReader::new(reader, value_offset);
            TiffWalker::new().process_ifd(&mut note, self, visited, 8, 0, 1)?;
            return Ok(true);
        }
        if !self.consume_tags.contains(&tag) {
            return Ok(false);
        }
        let mut view = ShiftedReader::new(reader, value_offset);
        let head = view.get_bytes(0, byte_count.min(4))?;
        self.events.push(Event::Custom {
            tag,
            value_offset,
            byte_count,
            head,
        });
        Ok(true)
    }

    fn try_custom_process_format(&mut self, _tag: u16, format_code: u16, count: u32) -> Option<i64> {
        self.custom_formats
            .iter()
            .find(|(code, _)| *code == format_code)
            .map(|(_, size)| size * i64::from(count))
    }

    fn warn(&mut self, message: &str) {
        self.events.push(Event::Warn(message.to_owned()));
    }

    fn error(&mut self, message: &str) {
        self.events.push(Event::Error(message.to_owned()));
    }

    fn set_byte_array(&mut self, tag: u16, bytes: Vec<u8>) {
        self.value_event(tag, Value::Undefined(bytes));
    }

    fn set_string(&mut self, tag: u16, string: StringValue) {
        self.value_event(tag, Value::String(string));
    }

    fn set_rational(&mut self, tag: u16, rational: Rational) {
        self.value_event(tag, Value::Rational(rational));
    }

    fn set_rational_array(&mut self, tag: u16, array: Vec<Rational>) {
        self.value_event(tag, Value::RationalArray(array));
    }

    fn set_float(&mut self, tag: u16, float: f32) {
        self.value_event(tag, Value::Float(float));
    }

    fn set_float_array(&mut self, tag: u16, array: Vec<f32>) {
        self.value_event(tag, Value::FloatArray(array));
    }

    fn set_double(&mut self, tag: u16, double: f64) {
        self.value_event(tag, Value::Double(double));
    }

    fn set_double_array(&mut self, tag: u16, array: Vec<f64>) {
        self.value_event(tag, Value::DoubleArray(array));
    }

    fn set_int8s(&mut self, tag: u16, int8s: i8) {
        self.value_event(tag, Value::Int8s(int8s));
    }

    fn set_int8s_array(&mut self, tag: u16, array: Vec<i8>) {
        self.value_event(tag, Value::Int8sArray(array));
    }

    fn set_int8u(&mut self, tag: u16, int8u: u8) {
        self.value_event(tag, Value::Int8u(int8u));
    }

    fn set_int8u_array(&mut self, tag: u16, array: Vec<u8>) {
        self.value_event(tag, Value::Int8uArray(array));
    }

    fn set_int16s(&mut self, tag: u16, int16s: i16) {
        self.value_event(tag, Value::Int16s(int16s));
    }

    fn set_int16s_array(&mut self, tag: u16, array: Vec<i16>) {
        self.value_event(tag, Value::Int16sArray(array));
    }

    fn set_int16u(&mut self, tag: u16, int16u: u16) {
        self.value_event(tag, Value::Int16u(int16u));
    }

    fn set_int16u_array(&mut self, tag: u16, array: Vec<u16>) {
        self.value_event(tag, Value::Int16uArray(array));
    }

    fn set_int32s(&mut self, tag: u16, int32s: i32) {
        self.value_event(tag, Value::Int32s(int32s));
    }

    fn set_int32s_array(&mut self, tag: u16, array: Vec<i32>) {
        self.value_event(tag, Value::Int32sArray(array));
    }

    fn set_int32u(&mut self, tag: u16, int32u: u32) {
        self.value_event(tag, Value::Int32u(int32u));
    }

    fn set_int32u_array(&mut self, tag: u16, array: Vec<u32>) {
        self.value_event(tag, Value::Int32uArray(array));
    }
}

/// Routes the walker's trace output to the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}

/// Walks an in-memory TIFF with the default walker.
pub fn walk(data: &[u8], handler: &mut RecordingHandler) -> MetadataResult<()> {
    init_logging();
    TiffWalker::new().process(&mut ByteArrayReader::new(data), handler, 0)
}
