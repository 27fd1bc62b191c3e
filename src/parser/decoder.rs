//! Decoding of typed fields from packet bytes into [`FieldValue`]s.

use super::bits::{BitReader, OutOfBounds};
use super::event::{find_field, FieldValue};
use super::types::{ByteOrder, FieldType, IntegerType, Length, StructType, VariantType};
use crate::utils::config::MAX_SEQUENCE_LENGTH;

/// Why a field could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    OutOfBounds { offset: u64 },
    Invalid(String),
}

impl From<OutOfBounds> for DecodeFailure {
    fn from(e: OutOfBounds) -> Self {
        DecodeFailure::OutOfBounds { offset: e.offset }
    }
}

/// Already decoded fields visible to sequence lengths and variant tags,
/// innermost first.
#[derive(Clone, Copy)]
pub struct Lookup<'p> {
    fields: &'p [(String, FieldValue)],
    parent: Option<&'p Lookup<'p>>,
}

impl<'p> Lookup<'p> {
    pub fn new(fields: &'p [(String, FieldValue)], parent: Option<&'p Lookup<'p>>) -> Self {
        Self { fields, parent }
    }

    /// Resolve a (possibly dotted, possibly scope-qualified) field path
    pub fn resolve(&self, path: &str) -> Option<&'p FieldValue> {
        let path = strip_scope_prefix(path);
        let mut segments = path.split('.');
        let first = segments.next()?;

        let mut scope = Some(self);
        let root = loop {
            let current = scope?;
            if let Some(value) = find_field(current.fields, first) {
                break value;
            }
            scope = current.parent;
        };

        segments.try_fold(root, |value, segment| value.member(segment))
    }
}

fn strip_scope_prefix(path: &str) -> &str {
    const PREFIXES: [&str; 6] = [
        "trace.packet.header.",
        "stream.packet.context.",
        "stream.event.header.",
        "stream.event.context.",
        "event.context.",
        "event.fields.",
    ];
    PREFIXES
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))
        .unwrap_or(path)
}

/// Mutable decoding state shared across the scopes of one packet
pub struct DecodeState {
    pub trace_order: ByteOrder,
    /// Current clock value in cycles
    pub clock: u64,
    /// Whether clock-mapped integers update `clock`
    pub track_clock: bool,
}

impl DecodeState {
    pub fn new(trace_order: ByteOrder) -> Self {
        Self {
            trace_order,
            clock: 0,
            track_clock: false,
        }
    }

    /// Fold an N-bit clock sample into the full 64-bit clock value
    pub fn update_clock(&mut self, value: u64, size: u32) {
        self.clock = reconstruct_clock(self.clock, value, size);
    }
}

/// Reconstruct a full clock value from its `size` low-order bits.
///
/// A sample smaller than the previous low-order bits means the counter
/// wrapped once.
pub fn reconstruct_clock(previous: u64, sample: u64, size: u32) -> u64 {
    if size >= 64 {
        return sample;
    }
    let mask = (1u64 << size) - 1;
    let mut value = (previous & !mask) | (sample & mask);
    if sample & mask < previous & mask {
        value = value.wrapping_add(1u64 << size);
    }
    value
}

/// Decode a structure scope into its named fields
pub fn decode_struct(
    ty: &StructType,
    reader: &mut BitReader<'_>,
    state: &mut DecodeState,
    parent: Option<&Lookup<'_>>,
) -> Result<Vec<(String, FieldValue)>, DecodeFailure> {
    reader.align(ty.alignment())?;
    decode_members(ty, reader, state, parent)
}

fn decode_members(
    ty: &StructType,
    reader: &mut BitReader<'_>,
    state: &mut DecodeState,
    parent: Option<&Lookup<'_>>,
) -> Result<Vec<(String, FieldValue)>, DecodeFailure> {
    let mut fields: Vec<(String, FieldValue)> = Vec::with_capacity(ty.fields.len());

    for (name, field_ty) in &ty.fields {
        let value = {
            let here = Lookup {
                fields: &fields,
                parent,
            };
            decode_field(field_ty, reader, state, &here)?
        };

        if state.track_clock {
            if let (FieldType::Integer(int), Some(sample)) = (field_ty, value.as_u64()) {
                if int.clock.is_some() || name == "timestamp" {
                    state.update_clock(sample, int.size);
                }
            }
        }

        fields.push((name.clone(), value));
    }

    Ok(fields)
}

/// Decode one field of any type
pub fn decode_field(
    ty: &FieldType,
    reader: &mut BitReader<'_>,
    state: &mut DecodeState,
    lookup: &Lookup<'_>,
) -> Result<FieldValue, DecodeFailure> {
    match ty {
        FieldType::Integer(int) => decode_integer(int, reader, state),
        FieldType::Float(float) => {
            reader.align(float.align)?;
            let order = float.byte_order.resolve(state.trace_order);
            let bits = reader.read_uint(float.size(), order)?;
            let value = if float.size() == 32 {
                f64::from(f32::from_bits(bits as u32))
            } else {
                f64::from_bits(bits)
            };
            Ok(FieldValue::Float(value))
        }
        FieldType::String(_) => {
            let bytes = reader.read_cstr()?;
            Ok(FieldValue::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        FieldType::Enum(e) => {
            let value = match decode_integer(&e.container, reader, state)? {
                FieldValue::Signed(v) => v,
                FieldValue::Unsigned(v) => v as i64,
                other => {
                    return Err(DecodeFailure::Invalid(format!(
                        "enumeration container decoded as {other:?}"
                    )))
                }
            };
            Ok(FieldValue::Enum {
                value,
                label: e.label_for(value).map(str::to_string),
            })
        }
        FieldType::Struct(s) => {
            reader.align(ty.alignment())?;
            Ok(FieldValue::Struct(decode_members(s, reader, state, Some(lookup))?))
        }
        FieldType::Array { element, length } => {
            let count = array_length(length, lookup)?;
            reader.align(element.alignment())?;

            if let FieldType::Integer(int) = element.as_ref() {
                if int.is_char() && int.align % 8 == 0 {
                    let bytes = reader.read_bytes(count)?;
                    let text = bytes.split(|&b| b == 0).next().unwrap_or_default();
                    return Ok(FieldValue::String(String::from_utf8_lossy(text).into_owned()));
                }
            }

            let items = (0..count)
                .map(|_| decode_field(element, reader, state, lookup))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FieldValue::Array(items))
        }
        FieldType::Variant(v) => decode_variant(v, reader, state, lookup),
    }
}

fn decode_integer(
    int: &IntegerType,
    reader: &mut BitReader<'_>,
    state: &DecodeState,
) -> Result<FieldValue, DecodeFailure> {
    reader.align(int.align)?;
    let order = int.byte_order.resolve(state.trace_order);
    if int.signed {
        Ok(FieldValue::Signed(reader.read_int(int.size, order)?))
    } else {
        Ok(FieldValue::Unsigned(reader.read_uint(int.size, order)?))
    }
}

fn array_length(length: &Length, lookup: &Lookup<'_>) -> Result<u64, DecodeFailure> {
    let count = match length {
        Length::Fixed(n) => *n,
        Length::Field(path) => lookup
            .resolve(path)
            .ok_or_else(|| DecodeFailure::Invalid(format!("sequence length `{path}` not found")))?
            .as_u64()
            .ok_or_else(|| {
                DecodeFailure::Invalid(format!("sequence length `{path}` is not an integer"))
            })?,
    };
    if count > MAX_SEQUENCE_LENGTH {
        return Err(DecodeFailure::Invalid(format!(
            "sequence length {count} exceeds {MAX_SEQUENCE_LENGTH}"
        )));
    }
    Ok(count)
}

fn decode_variant(
    v: &VariantType,
    reader: &mut BitReader<'_>,
    state: &mut DecodeState,
    lookup: &Lookup<'_>,
) -> Result<FieldValue, DecodeFailure> {
    if v.tag.is_empty() {
        return Err(DecodeFailure::Invalid("variant has no tag".to_string()));
    }

    let label = match lookup.resolve(&v.tag) {
        Some(FieldValue::Enum {
            label: Some(label), ..
        }) => label.as_str(),
        Some(FieldValue::Enum { value, label: None }) => {
            return Err(DecodeFailure::Invalid(format!(
                "variant tag `{}` value {value} has no label",
                v.tag
            )))
        }
        Some(_) => {
            return Err(DecodeFailure::Invalid(format!(
                "variant tag `{}` is not an enumeration",
                v.tag
            )))
        }
        None => {
            return Err(DecodeFailure::Invalid(format!(
                "variant tag `{}` not found",
                v.tag
            )))
        }
    };

    let (_, option) = v
        .options
        .iter()
        .find(|(name, _)| name == label)
        .ok_or_else(|| DecodeFailure::Invalid(format!("variant has no option `{label}`")))?;

    // A selected structure keeps its own members, others are wrapped under the option name
    match option {
        FieldType::Struct(s) => {
            reader.align(option.alignment())?;
            Ok(FieldValue::Struct(decode_members(s, reader, state, Some(lookup))?))
        }
        other => decode_field(other, reader, state, lookup),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{EnumMapping, EnumType, Encoding};

    fn uint(size: u32) -> FieldType {
        FieldType::Integer(IntegerType::new(size))
    }

    #[test]
    fn clock_reconstruction_handles_wrap() {
        assert_eq!(reconstruct_clock(1000, 1010, 27), 1010);
        let previous = (5u64 << 27) | ((1 << 27) - 10);
        assert_eq!(reconstruct_clock(previous, 4, 27), (6u64 << 27) | 4);
        assert_eq!(reconstruct_clock(123, 7, 64), 7);
    }

    #[test]
    fn decodes_sequence_from_sibling_length() {
        let ty = StructType {
            fields: vec![
                ("len".into(), uint(8)),
                (
                    "items".into(),
                    FieldType::Array {
                        element: Box::new(uint(16)),
                        length: Length::Field("len".into()),
                    },
                ),
            ],
            min_align: 1,
        };
        let data = [2, 0x01, 0x00, 0x02, 0x00];
        let mut reader = BitReader::new(&data);
        let mut state = DecodeState::new(ByteOrder::Little);
        let fields = decode_struct(&ty, &mut reader, &mut state, None).unwrap();
        assert_eq!(
            fields[1].1,
            FieldValue::Array(vec![FieldValue::Unsigned(1), FieldValue::Unsigned(2)])
        );
    }

    #[test]
    fn char_sequences_become_strings() {
        let mut ch = IntegerType::new(8);
        ch.encoding = Encoding::Utf8;
        let ty = FieldType::Array {
            element: Box::new(FieldType::Integer(ch)),
            length: Length::Fixed(6),
        };
        let data = b"hi\0\0\0\0";
        let mut reader = BitReader::new(data);
        let mut state = DecodeState::new(ByteOrder::Little);
        let value = decode_field(&ty, &mut reader, &mut state, &Lookup::new(&[], None)).unwrap();
        assert_eq!(value, FieldValue::String("hi".into()));
        assert_eq!(reader.position(), 48);
    }

    #[test]
    fn variant_selects_option_by_label() {
        let tag = FieldType::Enum(EnumType {
            container: IntegerType::new(8),
            mappings: vec![
                EnumMapping { label: "small".into(), start: 0, end: 0 },
                EnumMapping { label: "big".into(), start: 1, end: 1 },
            ],
        });
        let ty = StructType {
            fields: vec![
                ("sel".into(), tag),
                (
                    "v".into(),
                    FieldType::Variant(VariantType {
                        tag: "sel".into(),
                        options: vec![("small".into(), uint(8)), ("big".into(), uint(32))],
                    }),
                ),
            ],
            min_align: 1,
        };
        let data = [1, 0x10, 0, 0, 0];
        let mut reader = BitReader::new(&data);
        let mut state = DecodeState::new(ByteOrder::Little);
        let fields = decode_struct(&ty, &mut reader, &mut state, None).unwrap();
        assert_eq!(fields[1].1, FieldValue::Unsigned(16));
    }

    #[test]
    fn clock_mapped_fields_update_state() {
        let mut ts = IntegerType::new(27);
        ts.clock = Some("monotonic".into());
        let ty = StructType {
            fields: vec![("id".into(), uint(5)), ("timestamp".into(), FieldType::Integer(ts))],
            min_align: 8,
        };
        let word: u32 = 2 | (500 << 5);
        let data = word.to_le_bytes();
        let mut reader = BitReader::new(&data);
        let mut state = DecodeState::new(ByteOrder::Little);
        state.clock = 400;
        state.track_clock = true;
        decode_struct(&ty, &mut reader, &mut state, None).unwrap();
        assert_eq!(state.clock, 500);
    }

    #[test]
    fn missing_sequence_length_is_invalid() {
        let ty = FieldType::Array {
            element: Box::new(uint(8)),
            length: Length::Field("nope".into()),
        };
        let data = [0u8; 4];
        let mut reader = BitReader::new(&data);
        let mut state = DecodeState::new(ByteOrder::Little);
        let err = decode_field(&ty, &mut reader, &mut state, &Lookup::new(&[], None)).unwrap_err();
        assert!(matches!(err, DecodeFailure::Invalid(_)));
    }

    #[test]
    fn lookup_strips_scope_prefix_and_walks_parents() {
        let outer = vec![("len".to_string(), FieldValue::Unsigned(3))];
        let inner: Vec<(String, FieldValue)> = Vec::new();
        let parent = Lookup::new(&outer, None);
        let lookup = Lookup::new(&inner, Some(&parent));
        assert_eq!(
            lookup.resolve("event.fields.len"),
            Some(&FieldValue::Unsigned(3))
        );
    }
}
