//! Declarative TLV layouts.
//!
//! A layout is a static table of [Field]s. [validate] walks a decoded
//! [TlvItem] against it and reports the first violation with the path of the
//! offending field, e.g. `certificate.extensions.subject_key_id: length 19 out of range 20..=20`.

use anyhow::Result;

use crate::{
    error::TlvError,
    tlv::{TlvItem, TlvItemValue},
};

#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    UInt {
        max: u64,
    },
    Bool,
    Utf8 {
        min: usize,
        max: usize,
    },
    Bytes {
        min: usize,
        max: usize,
    },
    Struct(&'static [Field]),
    /// List whose members are identified by context tags.
    TaggedList(&'static [Field]),
    Array {
        element: &'static FieldType,
        min: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    Repeated { max: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub tag: u8,
    pub name: &'static str,
    pub kind: FieldType,
    pub presence: Presence,
}

pub const fn required(tag: u8, name: &'static str, kind: FieldType) -> Field {
    Field {
        tag,
        name,
        kind,
        presence: Presence::Required,
    }
}

pub const fn optional(tag: u8, name: &'static str, kind: FieldType) -> Field {
    Field {
        tag,
        name,
        kind,
        presence: Presence::Optional,
    }
}

pub const fn repeated(tag: u8, name: &'static str, kind: FieldType, max: usize) -> Field {
    Field {
        tag,
        name,
        kind,
        presence: Presence::Repeated { max },
    }
}

pub const U8: FieldType = FieldType::UInt {
    max: u8::MAX as u64,
};
pub const U16: FieldType = FieldType::UInt {
    max: u16::MAX as u64,
};
pub const U32: FieldType = FieldType::UInt {
    max: u32::MAX as u64,
};
pub const U64: FieldType = FieldType::UInt { max: u64::MAX };

fn schema_error(path: &str, reason: impl Into<String>) -> anyhow::Error {
    TlvError::Schema {
        field: path.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_len(path: &str, len: usize, min: usize, max: usize) -> Result<()> {
    if len < min || len > max {
        return Err(schema_error(
            path,
            format!("length {} out of range {}..={}", len, min, max),
        ));
    }
    Ok(())
}

/// Validate `item` against `kind`. `name` is used as the root of reported paths.
pub fn validate(item: &TlvItem, kind: &FieldType, name: &str) -> Result<()> {
    validate_at(item, kind, name)
}

fn validate_at(item: &TlvItem, kind: &FieldType, path: &str) -> Result<()> {
    match (kind, &item.value) {
        (FieldType::UInt { max }, TlvItemValue::Int(v)) => {
            if v > max {
                return Err(schema_error(
                    path,
                    format!("value {} exceeds maximum {}", v, max),
                ));
            }
            Ok(())
        }
        (FieldType::Bool, TlvItemValue::Bool(_)) => Ok(()),
        (FieldType::Utf8 { min, max }, TlvItemValue::String(s)) => {
            check_len(path, s.len(), *min, *max)
        }
        (FieldType::Bytes { min, max }, TlvItemValue::OctetString(o)) => {
            check_len(path, o.len(), *min, *max)
        }
        (FieldType::Struct(fields), TlvItemValue::Struct(children))
        | (FieldType::TaggedList(fields), TlvItemValue::List(children)) => {
            validate_fields(children, fields, path)
        }
        (FieldType::Array { element, min, max }, TlvItemValue::Array(children)) => {
            if children.len() < *min || children.len() > *max {
                return Err(schema_error(
                    path,
                    format!(
                        "element count {} out of range {}..={}",
                        children.len(),
                        min,
                        max
                    ),
                ));
            }
            for (i, child) in children.iter().enumerate() {
                validate_at(child, element, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        (kind, value) => Err(schema_error(
            path,
            format!("expected {}, found {}", kind_name(kind), value_name(value)),
        )),
    }
}

fn validate_fields(children: &[TlvItem], fields: &[Field], path: &str) -> Result<()> {
    let mut counts = vec![0usize; fields.len()];
    for child in children {
        let tag = child
            .tag
            .context_id()
            .ok_or_else(|| schema_error(path, format!("unexpected tag {:?}", child.tag)))?;
        let index = fields
            .iter()
            .position(|f| f.tag == tag)
            .ok_or_else(|| schema_error(path, format!("unknown tag {}", tag)))?;
        let field = &fields[index];
        counts[index] += 1;
        validate_at(child, &field.kind, &format!("{}.{}", path, field.name))?;
    }
    for (field, count) in fields.iter().zip(counts) {
        let field_path = format!("{}.{}", path, field.name);
        match field.presence {
            Presence::Required if count == 0 => return Err(schema_error(&field_path, "missing")),
            Presence::Required | Presence::Optional if count > 1 => {
                return Err(schema_error(&field_path, "duplicate"))
            }
            Presence::Repeated { max } if count > max => {
                return Err(schema_error(
                    &field_path,
                    format!("{} occurrences, at most {} allowed", count, max),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

fn kind_name(kind: &FieldType) -> &'static str {
    match kind {
        FieldType::UInt { .. } => "unsigned integer",
        FieldType::Bool => "boolean",
        FieldType::Utf8 { .. } => "utf8 string",
        FieldType::Bytes { .. } => "byte string",
        FieldType::Struct(_) => "structure",
        FieldType::TaggedList(_) => "list",
        FieldType::Array { .. } => "array",
    }
}

fn value_name(value: &TlvItemValue) -> &'static str {
    match value {
        TlvItemValue::Int(_) => "unsigned integer",
        TlvItemValue::SignedInt(_) => "signed integer",
        TlvItemValue::Bool(_) => "boolean",
        TlvItemValue::Float(_) | TlvItemValue::Double(_) => "floating point",
        TlvItemValue::String(_) => "utf8 string",
        TlvItemValue::OctetString(_) => "byte string",
        TlvItemValue::Null => "null",
        TlvItemValue::Struct(_) => "structure",
        TlvItemValue::Array(_) => "array",
        TlvItemValue::List(_) => "list",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::{decode_tlv, TlvBuffer};

    const INNER: &[Field] = &[
        required(1, "flag", FieldType::Bool),
        optional(2, "depth", U8),
    ];
    const LAYOUT: FieldType = FieldType::Struct(&[
        required(1, "id", U16),
        optional(2, "name", FieldType::Utf8 { min: 1, max: 4 }),
        required(3, "inner", FieldType::Struct(INNER)),
        repeated(4, "tag", U32, 2),
        optional(
            5,
            "codes",
            FieldType::Array {
                element: &U8,
                min: 1,
                max: 3,
            },
        ),
    ]);

    fn encode(f: impl Fn(&mut TlvBuffer) -> Result<()>) -> Result<TlvItem> {
        let mut tlv = TlvBuffer::new();
        tlv.write_anon_struct()?;
        f(&mut tlv)?;
        tlv.write_struct_end()?;
        decode_tlv(tlv.data())
    }

    fn reason(err: anyhow::Error) -> (String, String) {
        match err.downcast_ref::<TlvError>() {
            Some(TlvError::Schema { field, reason }) => (field.clone(), reason.clone()),
            other => panic!("unexpected error {:?}", other),
        }
    }

    fn inner(tlv: &mut TlvBuffer) -> Result<()> {
        tlv.write_struct(3)?;
        tlv.write_bool(1, true)?;
        tlv.write_struct_end()
    }

    #[test]
    fn accepts_valid() -> Result<()> {
        let item = encode(|tlv| {
            tlv.write_uint16(1, 7)?;
            tlv.write_string(2, "abc")?;
            inner(tlv)?;
            tlv.write_uint32(4, 1)?;
            tlv.write_uint32(4, 2)?;
            tlv.write_array(5)?;
            tlv.write_uint8_notag(1)?;
            tlv.write_struct_end()
        })?;
        validate(&item, &LAYOUT, "root")
    }

    #[test]
    fn reports_path() -> Result<()> {
        let item = encode(|tlv| {
            tlv.write_uint16(1, 7)?;
            tlv.write_struct(3)?;
            tlv.write_uint8(2, 1)?;
            tlv.write_struct_end()
        })?;
        let (field, why) = reason(validate(&item, &LAYOUT, "root").unwrap_err());
        assert_eq!(field, "root.inner.flag");
        assert_eq!(why, "missing");

        let item = encode(|tlv| {
            tlv.write_uint(1, 0x10000)?;
            inner(tlv)
        })?;
        let (field, _) = reason(validate(&item, &LAYOUT, "root").unwrap_err());
        assert_eq!(field, "root.id");
        Ok(())
    }

    #[test]
    fn presence_rules() -> Result<()> {
        let item = encode(|tlv| {
            tlv.write_uint16(1, 7)?;
            tlv.write_uint16(1, 8)?;
            inner(tlv)
        })?;
        assert_eq!(
            reason(validate(&item, &LAYOUT, "root").unwrap_err()).1,
            "duplicate"
        );

        let item = encode(|tlv| {
            tlv.write_uint16(1, 7)?;
            inner(tlv)?;
            tlv.write_uint32(4, 1)?;
            tlv.write_uint32(4, 2)?;
            tlv.write_uint32(4, 3)
        })?;
        assert_eq!(
            reason(validate(&item, &LAYOUT, "root").unwrap_err()).0,
            "root.tag"
        );

        let item = encode(|tlv| {
            tlv.write_uint16(1, 7)?;
            inner(tlv)?;
            tlv.write_bool(9, true)
        })?;
        assert_eq!(
            reason(validate(&item, &LAYOUT, "root").unwrap_err()).1,
            "unknown tag 9"
        );
        Ok(())
    }

    #[test]
    fn bounds_and_types() -> Result<()> {
        let item = encode(|tlv| {
            tlv.write_uint16(1, 7)?;
            tlv.write_string(2, "too long")?;
            inner(tlv)
        })?;
        assert_eq!(
            reason(validate(&item, &LAYOUT, "root").unwrap_err()),
            ("root.name".to_owned(), "length 8 out of range 1..=4".to_owned())
        );

        let item = encode(|tlv| {
            tlv.write_uint16(1, 7)?;
            inner(tlv)?;
            tlv.write_array(5)?;
            tlv.write_octetstring_notag(&[1])?;
            tlv.write_struct_end()
        })?;
        assert_eq!(
            reason(validate(&item, &LAYOUT, "root").unwrap_err()),
            (
                "root.codes[0]".to_owned(),
                "expected unsigned integer, found byte string".to_owned()
            )
        );

        let item = encode(|tlv| {
            tlv.write_string(1, "x")?;
            inner(tlv)
        })?;
        assert!(validate(&item, &LAYOUT, "root").is_err());
        Ok(())
    }
}
