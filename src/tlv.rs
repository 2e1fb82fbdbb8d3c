//! Utilities to decode/encode matter tlv
//!
//! Three layers are provided:
//! - element primitives: [read_tag_type], [write_tag], [read_integer_value], [write_integer_value]
//! - [TlvReader] - element by element decoder which tracks open containers
//! - item tree: [decode_tlv] produces [TlvItem], [TlvItem::encode] and [TlvBuffer] produce bytes

use anyhow::Result;

use crate::{
    config::CodecConfig,
    error::TlvError,
    util::binary::{DataReader, DataWriter},
};

/// TLV element types (Matter core specification A.7.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlvType {
    SignedInt8 = 0x00,
    SignedInt16 = 0x01,
    SignedInt32 = 0x02,
    SignedInt64 = 0x03,
    UnsignedInt8 = 0x04,
    UnsignedInt16 = 0x05,
    UnsignedInt32 = 0x06,
    UnsignedInt64 = 0x07,
    BooleanFalse = 0x08,
    BooleanTrue = 0x09,
    Float32 = 0x0a,
    Float64 = 0x0b,
    Utf8String8 = 0x0c,
    Utf8String16 = 0x0d,
    Utf8String32 = 0x0e,
    Utf8String64 = 0x0f,
    ByteString8 = 0x10,
    ByteString16 = 0x11,
    ByteString32 = 0x12,
    ByteString64 = 0x13,
    Null = 0x14,
    Structure = 0x15,
    Array = 0x16,
    List = 0x17,
    EndOfContainer = 0x18,
}

impl TlvType {
    pub const ALL: [TlvType; 25] = [
        TlvType::SignedInt8,
        TlvType::SignedInt16,
        TlvType::SignedInt32,
        TlvType::SignedInt64,
        TlvType::UnsignedInt8,
        TlvType::UnsignedInt16,
        TlvType::UnsignedInt32,
        TlvType::UnsignedInt64,
        TlvType::BooleanFalse,
        TlvType::BooleanTrue,
        TlvType::Float32,
        TlvType::Float64,
        TlvType::Utf8String8,
        TlvType::Utf8String16,
        TlvType::Utf8String32,
        TlvType::Utf8String64,
        TlvType::ByteString8,
        TlvType::ByteString16,
        TlvType::ByteString32,
        TlvType::ByteString64,
        TlvType::Null,
        TlvType::Structure,
        TlvType::Array,
        TlvType::List,
        TlvType::EndOfContainer,
    ];

    pub fn is_container(self) -> bool {
        matches!(self, TlvType::Structure | TlvType::Array | TlvType::List)
    }

    /// Width in bytes of the length prefix of string types.
    fn length_width(self) -> Option<usize> {
        match self {
            TlvType::Utf8String8 | TlvType::ByteString8 => Some(1),
            TlvType::Utf8String16 | TlvType::ByteString16 => Some(2),
            TlvType::Utf8String32 | TlvType::ByteString32 => Some(4),
            TlvType::Utf8String64 | TlvType::ByteString64 => Some(8),
            _ => None,
        }
    }
}

impl TryFrom<u8> for TlvType {
    type Error = TlvError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        TlvType::ALL
            .get(value as usize)
            .copied()
            .ok_or(TlvError::UnknownType(value))
    }
}

/// TLV tag control (Matter core specification A.7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TagControl {
    Anonymous = 0,
    ContextSpecific = 1,
    CommonProfile16 = 2,
    CommonProfile32 = 3,
    ImplicitProfile16 = 4,
    ImplicitProfile32 = 5,
    FullyQualified48 = 6,
    FullyQualified64 = 7,
}

const TYPE_MASK: u8 = 0x1f;
const TAG_CONTROL_SHIFT: u8 = 5;

pub const COMMON_PROFILE: u32 = 0x00000000;

fn control_byte(tag_control: TagControl, element_type: TlvType) -> u8 {
    ((tag_control as u8) << TAG_CONTROL_SHIFT) | element_type as u8
}

/// Element tag. Both fields absent means anonymous, only `id` means context specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TlvTag {
    pub profile: Option<u32>,
    pub id: Option<u32>,
}

impl TlvTag {
    pub const ANONYMOUS: TlvTag = TlvTag {
        profile: None,
        id: None,
    };

    pub const fn context(id: u8) -> Self {
        Self {
            profile: None,
            id: Some(id as u32),
        }
    }

    pub const fn common(id: u32) -> Self {
        Self {
            profile: Some(COMMON_PROFILE),
            id: Some(id),
        }
    }

    pub const fn fully_qualified(profile: u32, id: u32) -> Self {
        Self {
            profile: Some(profile),
            id: Some(id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.profile.is_none() && self.id.is_none()
    }

    /// Id of a context specific tag, `None` for every other form.
    pub fn context_id(&self) -> Option<u8> {
        match (self.profile, self.id) {
            (None, Some(id)) => u8::try_from(id).ok(),
            _ => None,
        }
    }
}

/// Read control byte and tag of the next element.
pub fn read_tag_type(reader: &mut DataReader) -> Result<(TlvType, TlvTag)> {
    let control = reader.read_u8()?;
    let element_type = TlvType::try_from(control & TYPE_MASK)?;
    let tag = match control >> TAG_CONTROL_SHIFT {
        0 => TlvTag::ANONYMOUS,
        1 => TlvTag::context(reader.read_u8()?),
        2 => TlvTag::common(reader.read_u16()? as u32),
        3 => TlvTag::common(reader.read_u32()?),
        c @ (4 | 5) => return Err(TlvError::UnsupportedTagControl(c).into()),
        6 => {
            let profile = reader.read_u32()?;
            let id = reader.read_u16()? as u32;
            TlvTag::fully_qualified(profile, id)
        }
        _ => {
            let profile = reader.read_u32()?;
            let id = reader.read_u32()?;
            TlvTag::fully_qualified(profile, id)
        }
    };
    Ok((element_type, tag))
}

/// Write control byte and tag, choosing the shortest tag form for the given tag.
pub fn write_tag(writer: &mut DataWriter, element_type: TlvType, tag: &TlvTag) -> Result<()> {
    match (tag.profile, tag.id) {
        (None, None) => writer.write_u8(control_byte(TagControl::Anonymous, element_type)),
        (None, Some(id)) => {
            let id = u8::try_from(id).map_err(|_| TlvError::ContextTagOutOfRange(id))?;
            writer.write_u8(control_byte(TagControl::ContextSpecific, element_type))?;
            writer.write_u8(id)
        }
        (Some(COMMON_PROFILE), id) => {
            let id = id.ok_or(TlvError::MissingTagId("common profile"))?;
            if id & 0xffff0000 == 0 {
                writer.write_u8(control_byte(TagControl::CommonProfile16, element_type))?;
                writer.write_u16(id as u16)
            } else {
                writer.write_u8(control_byte(TagControl::CommonProfile32, element_type))?;
                writer.write_u32(id)
            }
        }
        (Some(profile), id) => {
            let id = id.ok_or(TlvError::MissingTagId("fully qualified"))?;
            if id & 0xffff0000 == 0 {
                writer.write_u8(control_byte(TagControl::FullyQualified48, element_type))?;
                writer.write_u32(profile)?;
                writer.write_u16(id as u16)
            } else {
                writer.write_u8(control_byte(TagControl::FullyQualified64, element_type))?;
                writer.write_u32(profile)?;
                writer.write_u32(id)
            }
        }
    }
}

/// Read value of an unsigned integer element. Other element types are rejected.
pub fn read_integer_value(reader: &mut DataReader, element_type: TlvType) -> Result<u64> {
    match element_type {
        TlvType::UnsignedInt8 => Ok(reader.read_u8()? as u64),
        TlvType::UnsignedInt16 => Ok(reader.read_u16()? as u64),
        TlvType::UnsignedInt32 => Ok(reader.read_u32()? as u64),
        TlvType::UnsignedInt64 => reader.read_u64(),
        _ => Err(TlvError::UnexpectedType(element_type).into()),
    }
}

/// Write value of an unsigned integer element. Fails if the value does not fit the width.
pub fn write_integer_value(writer: &mut DataWriter, element_type: TlvType, value: u64) -> Result<()> {
    let out_of_range = || TlvError::IntegerOutOfRange {
        element_type,
        value,
    };
    match element_type {
        TlvType::UnsignedInt8 => writer.write_u8(u8::try_from(value).map_err(|_| out_of_range())?),
        TlvType::UnsignedInt16 => {
            writer.write_u16(u16::try_from(value).map_err(|_| out_of_range())?)
        }
        TlvType::UnsignedInt32 => {
            writer.write_u32(u32::try_from(value).map_err(|_| out_of_range())?)
        }
        TlvType::UnsignedInt64 => writer.write_u64(value),
        _ => Err(TlvError::UnexpectedType(element_type).into()),
    }
}

fn unsigned_type(value: u64) -> TlvType {
    if value <= u8::MAX as u64 {
        TlvType::UnsignedInt8
    } else if value <= u16::MAX as u64 {
        TlvType::UnsignedInt16
    } else if value <= u32::MAX as u64 {
        TlvType::UnsignedInt32
    } else {
        TlvType::UnsignedInt64
    }
}

fn signed_type(value: i64) -> TlvType {
    if i8::try_from(value).is_ok() {
        TlvType::SignedInt8
    } else if i16::try_from(value).is_ok() {
        TlvType::SignedInt16
    } else if i32::try_from(value).is_ok() {
        TlvType::SignedInt32
    } else {
        TlvType::SignedInt64
    }
}

fn string_type(utf8: bool, len: usize) -> TlvType {
    let (s8, s16, s32, s64) = if utf8 {
        (
            TlvType::Utf8String8,
            TlvType::Utf8String16,
            TlvType::Utf8String32,
            TlvType::Utf8String64,
        )
    } else {
        (
            TlvType::ByteString8,
            TlvType::ByteString16,
            TlvType::ByteString32,
            TlvType::ByteString64,
        )
    };
    if len <= u8::MAX as usize {
        s8
    } else if len <= u16::MAX as usize {
        s16
    } else if len as u64 <= u32::MAX as u64 {
        s32
    } else {
        s64
    }
}

/// Value of one element as produced by [TlvReader].
#[derive(Debug, Clone, PartialEq)]
pub enum TlvValue {
    SignedInt(i64),
    UnsignedInt(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Null,
    ContainerStart,
    ContainerEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub element_type: TlvType,
    pub tag: TlvTag,
    pub value: TlvValue,
}

/// Element by element decoder.
///
/// Containers push a frame, end-of-container pops one. The reader fails on an
/// end-of-container without open frame, on end of data with open frames, and
/// when nesting exceeds the configured depth.
pub struct TlvReader<'a> {
    reader: DataReader<'a>,
    containers: Vec<TlvType>,
    max_depth: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_max_depth(data, crate::config::DEFAULT_MAX_TLV_DEPTH)
    }

    pub fn with_max_depth(data: &'a [u8], max_depth: usize) -> Self {
        Self {
            reader: DataReader::new(data),
            containers: Vec::new(),
            max_depth,
        }
    }

    /// Number of currently open containers.
    pub fn depth(&self) -> usize {
        self.containers.len()
    }

    /// Type of the innermost open container.
    pub fn current_container(&self) -> Option<TlvType> {
        self.containers.last().copied()
    }

    pub fn next_element(&mut self) -> Result<Option<TlvElement>> {
        if self.reader.is_empty() {
            if !self.containers.is_empty() {
                return Err(TlvError::UnterminatedContainer(self.containers.len()).into());
            }
            return Ok(None);
        }
        let (element_type, tag) = read_tag_type(&mut self.reader)?;
        let value = match element_type {
            TlvType::EndOfContainer => {
                self.containers
                    .pop()
                    .ok_or(TlvError::UnexpectedEndOfContainer)?;
                TlvValue::ContainerEnd
            }
            TlvType::Structure | TlvType::Array | TlvType::List => {
                if self.containers.len() >= self.max_depth {
                    return Err(TlvError::MaxDepthExceeded(self.max_depth).into());
                }
                self.containers.push(element_type);
                TlvValue::ContainerStart
            }
            _ => self.read_value(element_type)?,
        };
        log::trace!(
            "tlv element {:?} tag {:?} depth {}",
            element_type,
            tag,
            self.containers.len()
        );
        Ok(Some(TlvElement {
            element_type,
            tag,
            value,
        }))
    }

    fn read_length(&mut self, element_type: TlvType) -> Result<usize> {
        let len = match element_type.length_width() {
            Some(1) => self.reader.read_u8()? as u64,
            Some(2) => self.reader.read_u16()? as u64,
            Some(4) => self.reader.read_u32()? as u64,
            Some(_) => self.reader.read_u64()?,
            None => return Err(TlvError::UnexpectedType(element_type).into()),
        };
        // anything beyond usize can not fit in the buffer anyway
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }

    fn read_value(&mut self, element_type: TlvType) -> Result<TlvValue> {
        let value = match element_type {
            TlvType::SignedInt8 => TlvValue::SignedInt(self.reader.read_i8()? as i64),
            TlvType::SignedInt16 => TlvValue::SignedInt(self.reader.read_i16()? as i64),
            TlvType::SignedInt32 => TlvValue::SignedInt(self.reader.read_i32()? as i64),
            TlvType::SignedInt64 => TlvValue::SignedInt(self.reader.read_i64()?),
            TlvType::UnsignedInt8
            | TlvType::UnsignedInt16
            | TlvType::UnsignedInt32
            | TlvType::UnsignedInt64 => {
                TlvValue::UnsignedInt(read_integer_value(&mut self.reader, element_type)?)
            }
            TlvType::BooleanFalse => TlvValue::Bool(false),
            TlvType::BooleanTrue => TlvValue::Bool(true),
            TlvType::Float32 => TlvValue::Float(self.reader.read_f32()?),
            TlvType::Float64 => TlvValue::Double(self.reader.read_f64()?),
            TlvType::Utf8String8
            | TlvType::Utf8String16
            | TlvType::Utf8String32
            | TlvType::Utf8String64 => {
                let len = self.read_length(element_type)?;
                let bytes = self.reader.read_bytes(len)?;
                let s = std::str::from_utf8(bytes).map_err(|_| TlvError::InvalidUtf8)?;
                TlvValue::String(s.to_owned())
            }
            TlvType::ByteString8
            | TlvType::ByteString16
            | TlvType::ByteString32
            | TlvType::ByteString64 => {
                let len = self.read_length(element_type)?;
                TlvValue::Bytes(self.reader.read_bytes(len)?.to_vec())
            }
            TlvType::Null => TlvValue::Null,
            TlvType::Structure | TlvType::Array | TlvType::List | TlvType::EndOfContainer => {
                return Err(TlvError::UnexpectedType(element_type).into())
            }
        };
        Ok(value)
    }
}

/// Buffer to encode matter tlv. Create buffer, write elements then take encoded bytes.
/// ```
/// # use matcert::tlv;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let mut tlv = tlv::TlvBuffer::new();
/// tlv.write_struct(1)?;
/// tlv.write_uint8(0, 100)?;
/// tlv.write_string(0, "test")?;
/// tlv.write_struct_end()?;
/// assert_eq!(tlv.data(), &[0x35, 0x01, 0x24, 0x00, 100, 0x2c, 0x00, 4, b't', b'e', b's', b't', 0x18]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct TlvBuffer {
    writer: DataWriter,
}

impl TlvBuffer {
    pub fn new() -> Self {
        Self {
            writer: DataWriter::new(),
        }
    }

    pub fn data(&self) -> &[u8] {
        self.writer.as_slice()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.writer.into_vec()
    }

    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_bytes(data)
    }

    fn header(&mut self, element_type: TlvType, tag: &TlvTag) -> Result<()> {
        write_tag(&mut self.writer, element_type, tag)
    }

    fn put_uint(&mut self, tag: &TlvTag, value: u64) -> Result<()> {
        let element_type = unsigned_type(value);
        self.header(element_type, tag)?;
        write_integer_value(&mut self.writer, element_type, value)
    }

    fn put_int(&mut self, tag: &TlvTag, value: i64) -> Result<()> {
        let element_type = signed_type(value);
        self.header(element_type, tag)?;
        // signed_type guarantees the narrowing casts are lossless
        match element_type {
            TlvType::SignedInt8 => self.writer.write_i8(value as i8),
            TlvType::SignedInt16 => self.writer.write_i16(value as i16),
            TlvType::SignedInt32 => self.writer.write_i32(value as i32),
            _ => self.writer.write_i64(value),
        }
    }

    fn put_string(&mut self, tag: &TlvTag, utf8: bool, bytes: &[u8]) -> Result<()> {
        let element_type = string_type(utf8, bytes.len());
        self.header(element_type, tag)?;
        match element_type.length_width() {
            Some(1) => self.writer.write_u8(bytes.len() as u8)?,
            Some(2) => self.writer.write_u16(bytes.len() as u16)?,
            Some(4) => self.writer.write_u32(bytes.len() as u32)?,
            _ => self.writer.write_u64(bytes.len() as u64)?,
        }
        self.writer.write_bytes(bytes)
    }

    fn put_container(&mut self, element_type: TlvType, tag: &TlvTag) -> Result<()> {
        self.header(element_type, tag)
    }

    pub fn write_anon_struct(&mut self) -> Result<()> {
        self.put_container(TlvType::Structure, &TlvTag::ANONYMOUS)
    }
    pub fn write_anon_list(&mut self) -> Result<()> {
        self.put_container(TlvType::List, &TlvTag::ANONYMOUS)
    }
    pub fn write_anon_array(&mut self) -> Result<()> {
        self.put_container(TlvType::Array, &TlvTag::ANONYMOUS)
    }
    pub fn write_struct(&mut self, tag: u8) -> Result<()> {
        self.put_container(TlvType::Structure, &TlvTag::context(tag))
    }
    pub fn write_array(&mut self, tag: u8) -> Result<()> {
        self.put_container(TlvType::Array, &TlvTag::context(tag))
    }
    pub fn write_list(&mut self, tag: u8) -> Result<()> {
        self.put_container(TlvType::List, &TlvTag::context(tag))
    }
    pub fn write_struct_end(&mut self) -> Result<()> {
        self.put_container(TlvType::EndOfContainer, &TlvTag::ANONYMOUS)
    }
    pub fn write_string(&mut self, tag: u8, data: &str) -> Result<()> {
        self.put_string(&TlvTag::context(tag), true, data.as_bytes())
    }
    pub fn write_octetstring(&mut self, tag: u8, data: &[u8]) -> Result<()> {
        self.put_string(&TlvTag::context(tag), false, data)
    }
    pub fn write_int8(&mut self, tag: u8, value: i8) -> Result<()> {
        self.header(TlvType::SignedInt8, &TlvTag::context(tag))?;
        self.writer.write_i8(value)
    }
    /// Signed integer in the smallest width which holds the value.
    pub fn write_int(&mut self, tag: u8, value: i64) -> Result<()> {
        self.put_int(&TlvTag::context(tag), value)
    }
    pub fn write_uint8(&mut self, tag: u8, value: u8) -> Result<()> {
        self.header(TlvType::UnsignedInt8, &TlvTag::context(tag))?;
        self.writer.write_u8(value)
    }
    pub fn write_uint8_notag(&mut self, value: u8) -> Result<()> {
        self.header(TlvType::UnsignedInt8, &TlvTag::ANONYMOUS)?;
        self.writer.write_u8(value)
    }
    pub fn write_uint16(&mut self, tag: u8, value: u16) -> Result<()> {
        self.header(TlvType::UnsignedInt16, &TlvTag::context(tag))?;
        self.writer.write_u16(value)
    }
    pub fn write_uint32(&mut self, tag: u8, value: u32) -> Result<()> {
        self.header(TlvType::UnsignedInt32, &TlvTag::context(tag))?;
        self.writer.write_u32(value)
    }
    pub fn write_uint64(&mut self, tag: u8, value: u64) -> Result<()> {
        self.header(TlvType::UnsignedInt64, &TlvTag::context(tag))?;
        self.writer.write_u64(value)
    }
    /// Unsigned integer in the smallest width which holds the value.
    pub fn write_uint(&mut self, tag: u8, value: u64) -> Result<()> {
        self.put_uint(&TlvTag::context(tag), value)
    }
    pub fn write_uint_notag(&mut self, value: u64) -> Result<()> {
        self.put_uint(&TlvTag::ANONYMOUS, value)
    }
    pub fn write_octetstring_notag(&mut self, data: &[u8]) -> Result<()> {
        self.put_string(&TlvTag::ANONYMOUS, false, data)
    }
    pub fn write_bool(&mut self, tag: u8, value: bool) -> Result<()> {
        let element_type = if value {
            TlvType::BooleanTrue
        } else {
            TlvType::BooleanFalse
        };
        self.header(element_type, &TlvTag::context(tag))
    }
    pub fn write_null(&mut self, tag: u8) -> Result<()> {
        self.header(TlvType::Null, &TlvTag::context(tag))
    }
    pub fn write_float(&mut self, tag: u8, value: f32) -> Result<()> {
        self.header(TlvType::Float32, &TlvTag::context(tag))?;
        self.writer.write_f32(value)
    }
    pub fn write_double(&mut self, tag: u8, value: f64) -> Result<()> {
        self.header(TlvType::Float64, &TlvTag::context(tag))?;
        self.writer.write_f64(value)
    }

    /// Encode item tree, including its own tag.
    pub fn write_item(&mut self, item: &TlvItem) -> Result<()> {
        let tag = &item.tag;
        match &item.value {
            TlvItemValue::Int(v) => self.put_uint(tag, *v),
            TlvItemValue::SignedInt(v) => self.put_int(tag, *v),
            TlvItemValue::Bool(v) => {
                let element_type = if *v {
                    TlvType::BooleanTrue
                } else {
                    TlvType::BooleanFalse
                };
                self.header(element_type, tag)
            }
            TlvItemValue::Float(v) => {
                self.header(TlvType::Float32, tag)?;
                self.writer.write_f32(*v)
            }
            TlvItemValue::Double(v) => {
                self.header(TlvType::Float64, tag)?;
                self.writer.write_f64(*v)
            }
            TlvItemValue::String(s) => self.put_string(tag, true, s.as_bytes()),
            TlvItemValue::OctetString(o) => self.put_string(tag, false, o),
            TlvItemValue::Null => self.header(TlvType::Null, tag),
            TlvItemValue::Struct(items) | TlvItemValue::Array(items) | TlvItemValue::List(items) => {
                let element_type = match &item.value {
                    TlvItemValue::Struct(_) => TlvType::Structure,
                    TlvItemValue::Array(_) => TlvType::Array,
                    _ => TlvType::List,
                };
                self.put_container(element_type, tag)?;
                for i in items {
                    self.write_item(i)?;
                }
                self.write_struct_end()
            }
        }
    }
}

/// Enum containing data of decoded tlv element
#[derive(Debug, Clone, PartialEq)]
pub enum TlvItemValue {
    Int(u64),
    SignedInt(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    OctetString(Vec<u8>),
    Null,
    Struct(Vec<TlvItem>),
    Array(Vec<TlvItem>),
    List(Vec<TlvItem>),
}

/// Decoded tlv element returned by [decode_tlv]
#[derive(Debug, Clone, PartialEq)]
pub struct TlvItem {
    pub tag: TlvTag,
    pub value: TlvItemValue,
}

impl TlvItem {
    pub fn new(tag: TlvTag, value: TlvItemValue) -> Self {
        Self { tag, value }
    }

    pub fn children(&self) -> Option<&[TlvItem]> {
        match &self.value {
            TlvItemValue::Struct(v) | TlvItemValue::Array(v) | TlvItemValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// Follow path of context tags through nested containers.
    pub fn get_item(&self, tag: &[u8]) -> Option<&TlvItem> {
        match tag.split_first() {
            None => Some(self),
            Some((first, rest)) => self
                .children()?
                .iter()
                .find(|c| c.tag.context_id() == Some(*first))?
                .get_item(rest),
        }
    }
    pub fn get(&self, tag: &[u8]) -> Option<&TlvItemValue> {
        self.get_item(tag).map(|i| &i.value)
    }
    pub fn get_int(&self, tag: &[u8]) -> Option<u64> {
        if let Some(TlvItemValue::Int(i)) = self.get(tag) {
            Some(*i)
        } else {
            None
        }
    }
    pub fn get_signed(&self, tag: &[u8]) -> Option<i64> {
        if let Some(TlvItemValue::SignedInt(i)) = self.get(tag) {
            Some(*i)
        } else {
            None
        }
    }
    pub fn get_bool(&self, tag: &[u8]) -> Option<bool> {
        if let Some(TlvItemValue::Bool(i)) = self.get(tag) {
            Some(*i)
        } else {
            None
        }
    }
    pub fn get_u8(&self, tag: &[u8]) -> Option<u8> {
        self.get_int(tag).and_then(|i| u8::try_from(i).ok())
    }
    pub fn get_u16(&self, tag: &[u8]) -> Option<u16> {
        self.get_int(tag).and_then(|i| u16::try_from(i).ok())
    }
    pub fn get_u32(&self, tag: &[u8]) -> Option<u32> {
        self.get_int(tag).and_then(|i| u32::try_from(i).ok())
    }
    pub fn get_u64(&self, tag: &[u8]) -> Option<u64> {
        self.get_int(tag)
    }
    pub fn get_octet_string(&self, tag: &[u8]) -> Option<&[u8]> {
        if let Some(TlvItemValue::OctetString(o)) = self.get(tag) {
            Some(o)
        } else {
            None
        }
    }
    pub fn get_octet_string_owned(&self, tag: &[u8]) -> Option<Vec<u8>> {
        self.get_octet_string(tag).map(|o| o.to_vec())
    }
    pub fn get_str(&self, tag: &[u8]) -> Option<&str> {
        if let Some(TlvItemValue::String(s)) = self.get(tag) {
            Some(s)
        } else {
            None
        }
    }
    pub fn get_string_owned(&self, tag: &[u8]) -> Option<String> {
        self.get_str(tag).map(|s| s.to_owned())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut tlv = TlvBuffer::new();
        tlv.write_item(self)?;
        Ok(tlv.into_vec())
    }
}

fn read_item(reader: &mut TlvReader, element: TlvElement) -> Result<TlvItem> {
    let value = match element.value {
        TlvValue::ContainerStart => {
            let mut children = Vec::new();
            loop {
                match reader.next_element()? {
                    Some(TlvElement {
                        value: TlvValue::ContainerEnd,
                        ..
                    }) => break,
                    Some(child) => children.push(read_item(reader, child)?),
                    None => return Err(TlvError::UnterminatedContainer(reader.depth()).into()),
                }
            }
            match element.element_type {
                TlvType::Structure => TlvItemValue::Struct(children),
                TlvType::Array => TlvItemValue::Array(children),
                _ => TlvItemValue::List(children),
            }
        }
        TlvValue::ContainerEnd => return Err(TlvError::UnexpectedEndOfContainer.into()),
        TlvValue::UnsignedInt(v) => TlvItemValue::Int(v),
        TlvValue::SignedInt(v) => TlvItemValue::SignedInt(v),
        TlvValue::Bool(v) => TlvItemValue::Bool(v),
        TlvValue::Float(v) => TlvItemValue::Float(v),
        TlvValue::Double(v) => TlvItemValue::Double(v),
        TlvValue::String(v) => TlvItemValue::String(v),
        TlvValue::Bytes(v) => TlvItemValue::OctetString(v),
        TlvValue::Null => TlvItemValue::Null,
    };
    Ok(TlvItem {
        tag: element.tag,
        value,
    })
}

/// Decode all top-level elements of a buffer.
pub fn decode_tlv_stream_with_config(data: &[u8], config: &CodecConfig) -> Result<Vec<TlvItem>> {
    let mut reader = TlvReader::with_max_depth(data, config.max_tlv_depth);
    let mut out = Vec::new();
    while let Some(element) = reader.next_element()? {
        out.push(read_item(&mut reader, element)?);
    }
    Ok(out)
}

pub fn decode_tlv_stream(data: &[u8]) -> Result<Vec<TlvItem>> {
    decode_tlv_stream_with_config(data, &CodecConfig::default())
}

/// decode raw buffer with tlv data which holds exactly one top-level element
pub fn decode_tlv_with_config(data: &[u8], config: &CodecConfig) -> Result<TlvItem> {
    let mut items = decode_tlv_stream_with_config(data, config)?;
    if items.len() != 1 {
        return Err(TlvError::TopLevelCount(items.len()).into());
    }
    items
        .pop()
        .ok_or_else(|| TlvError::TopLevelCount(0).into())
}

pub fn decode_tlv(data: &[u8]) -> Result<TlvItem> {
    decode_tlv_with_config(data, &CodecConfig::default())
}
