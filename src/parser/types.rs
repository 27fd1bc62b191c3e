//! Field type declarations built from TSDL metadata.
//!
//! These describe how to decode the binary layout of each scope
//! (packet header, packet context, event header, contexts, payload).

/// Byte order of an integer or floating point field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Whatever the trace block declares
    Native,
    Little,
    Big,
}

impl ByteOrder {
    /// Resolve `Native` against the trace's byte order
    pub fn resolve(self, trace_order: ByteOrder) -> ByteOrder {
        match self {
            ByteOrder::Native => trace_order,
            other => other,
        }
    }

    /// Byte order of the machine running the reader
    pub fn host() -> ByteOrder {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Parse a TSDL `byte_order` value
    pub fn from_tsdl(value: &str) -> Option<ByteOrder> {
        match value {
            "native" => Some(ByteOrder::Native),
            "le" | "little_endian" => Some(ByteOrder::Little),
            "be" | "big_endian" | "network" => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

/// Character encoding of strings and char arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    None,
    Utf8,
    Ascii,
}

impl Encoding {
    pub fn from_tsdl(value: &str) -> Option<Encoding> {
        match value {
            "none" => Some(Encoding::None),
            "UTF8" | "utf8" => Some(Encoding::Utf8),
            "ASCII" | "ascii" => Some(Encoding::Ascii),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerType {
    /// Size in bits, 1..=64
    pub size: u32,
    /// Alignment in bits
    pub align: u32,
    pub signed: bool,
    pub byte_order: ByteOrder,
    pub encoding: Encoding,
    /// Clock this integer is mapped to (`map = clock.<name>.value`)
    pub clock: Option<String>,
}

impl IntegerType {
    /// Byte-aligned when the size is a whole number of bytes, bit-packed otherwise.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            align: if size % 8 == 0 { 8 } else { 1 },
            signed: false,
            byte_order: ByteOrder::Native,
            encoding: Encoding::None,
            clock: None,
        }
    }

    /// An 8-bit integer carrying text
    pub fn is_char(&self) -> bool {
        self.size == 8 && self.encoding != Encoding::None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatType {
    pub exp_dig: u32,
    pub mant_dig: u32,
    pub align: u32,
    pub byte_order: ByteOrder,
}

impl FloatType {
    pub fn size(&self) -> u32 {
        self.exp_dig + self.mant_dig
    }
}

/// One label of an enumeration, covering `start..=end`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMapping {
    pub label: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub container: IntegerType,
    pub mappings: Vec<EnumMapping>,
}

impl EnumType {
    /// First label whose range contains `value`
    pub fn label_for(&self, value: i64) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.start <= value && value <= m.end)
            .map(|m| m.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub fields: Vec<(String, FieldType)>,
    /// Minimum alignment from an `align(n)` attribute
    pub min_align: u32,
}

impl StructType {
    /// Largest member alignment, at least `min_align`
    pub fn alignment(&self) -> u32 {
        self.fields
            .iter()
            .map(|(_, ty)| ty.alignment())
            .fold(self.min_align.max(1), u32::max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantType {
    /// Path of the enumeration field selecting the option
    pub tag: String,
    pub options: Vec<(String, FieldType)>,
}

/// Element count of an array or sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Length {
    Fixed(u64),
    /// Sequence: length read from a previously decoded field
    Field(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Integer(IntegerType),
    Float(FloatType),
    String(Encoding),
    Enum(EnumType),
    Struct(StructType),
    Array {
        element: Box<FieldType>,
        length: Length,
    },
    Variant(VariantType),
}

impl FieldType {
    /// Alignment in bits applied before decoding this field
    pub fn alignment(&self) -> u32 {
        match self {
            FieldType::Integer(int) => int.align,
            FieldType::Float(float) => float.align,
            FieldType::String(_) => 8,
            FieldType::Enum(e) => e.container.align,
            FieldType::Struct(s) => s.alignment(),
            FieldType::Array { element, .. } => element.alignment(),
            // The selected option aligns itself
            FieldType::Variant(_) => 1,
        }
    }
}
