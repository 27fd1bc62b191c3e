//! TSDL declaration parser.
//!
//! Consumes the token stream from [`super::lexer`] and builds the
//! [`TraceMetadata`] classes. Type names are global: aliases, named structs,
//! enums and variants declared inside a block stay visible after it.

use super::lexer::{tokenize, Token};
use super::metadata::{ClockClass, EventClass, StreamClass, TraceMetadata};
use super::types::{
    ByteOrder, Encoding, EnumMapping, EnumType, FieldType, FloatType, IntegerType, Length,
    StructType, VariantType,
};
use crate::utils::error::MetadataError;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Parse TSDL text into trace metadata
///
/// # Errors
/// Returns a [`MetadataError`] on lexing errors, syntax errors, unknown type
/// names or declarations that cannot be decoded.
pub fn parse_tsdl(text: &str) -> Result<TraceMetadata, MetadataError> {
    let tokens = tokenize(text)?;
    debug!("Tokenized metadata into {} tokens", tokens.len());
    TsdlParser::new(tokens).parse_document()
}

/// Right-hand side of an attribute
#[derive(Debug, Clone)]
enum AttrValue {
    Int(i128),
    Str(String),
    /// Bare identifier or dotted path (`le`, `clock.monotonic.value`)
    Path(String),
    Type(FieldType),
}

impl AttrValue {
    fn describe(&self) -> String {
        match self {
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Str(s) | AttrValue::Path(s) => s.clone(),
            AttrValue::Type(_) => "type".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Attribute {
    key: String,
    value: AttrValue,
}

impl Attribute {
    fn invalid(&self) -> MetadataError {
        MetadataError::Invalid(format!(
            "bad value `{}` for `{}`",
            self.value.describe(),
            self.key
        ))
    }

    fn as_u64(&self) -> Result<u64, MetadataError> {
        match self.value {
            AttrValue::Int(v) => u64::try_from(v).map_err(|_| self.invalid()),
            _ => Err(self.invalid()),
        }
    }

    fn as_i64(&self) -> Result<i64, MetadataError> {
        match self.value {
            AttrValue::Int(v) => i64::try_from(v).map_err(|_| self.invalid()),
            _ => Err(self.invalid()),
        }
    }

    fn as_u32(&self) -> Result<u32, MetadataError> {
        u32::try_from(self.as_u64()?).map_err(|_| self.invalid())
    }

    fn as_text(&self) -> Result<&str, MetadataError> {
        match &self.value {
            AttrValue::Str(s) | AttrValue::Path(s) => Ok(s),
            _ => Err(self.invalid()),
        }
    }

    fn as_bool(&self) -> Result<bool, MetadataError> {
        match &self.value {
            AttrValue::Int(v) => Ok(*v != 0),
            AttrValue::Path(s) => match s.as_str() {
                "true" | "TRUE" => Ok(true),
                "false" | "FALSE" => Ok(false),
                _ => Err(self.invalid()),
            },
            _ => Err(self.invalid()),
        }
    }

    fn as_struct(&self) -> Result<StructType, MetadataError> {
        match &self.value {
            AttrValue::Type(FieldType::Struct(s)) => Ok(s.clone()),
            _ => Err(MetadataError::Invalid(format!(
                "`{}` must be a structure",
                self.key
            ))),
        }
    }
}

struct TsdlParser {
    tokens: Vec<Token>,
    pos: usize,
    aliases: HashMap<String, FieldType>,
    structs: HashMap<String, StructType>,
    enums: HashMap<String, EnumType>,
    variants: HashMap<String, VariantType>,
}

/// Declarations collected while walking the document
#[derive(Default)]
struct Document {
    major: u64,
    minor: u64,
    uuid: Option<String>,
    byte_order: Option<ByteOrder>,
    packet_header: Option<StructType>,
    env: Vec<(String, String)>,
    clocks: Vec<ClockClass>,
    streams: BTreeMap<u64, StreamClass>,
    events: Vec<EventClass>,
}

impl TsdlParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            aliases: HashMap::new(),
            structs: HashMap::new(),
            enums: HashMap::new(),
            variants: HashMap::new(),
        }
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn syntax_error(&self, expected: &str) -> MetadataError {
        MetadataError::Syntax {
            expected: expected.to_string(),
            found: self
                .peek()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "end of metadata".to_string()),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), MetadataError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.syntax_error(&token.to_string()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, MetadataError> {
        match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.syntax_error("identifier")),
        }
    }

    fn expect_integer(&mut self) -> Result<u64, MetadataError> {
        match self.peek() {
            Some(Token::Integer(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(v)
            }
            _ => Err(self.syntax_error("integer")),
        }
    }

    /// Signed integer literal (`-5`, `+3`, `7`)
    fn expect_signed(&mut self) -> Result<i128, MetadataError> {
        let negative = if self.eat(&Token::Minus) {
            true
        } else {
            self.eat(&Token::Plus);
            false
        };
        let magnitude = i128::from(self.expect_integer()?);
        Ok(if negative { -magnitude } else { magnitude })
    }

    /// `ident(.ident)*`
    fn parse_path(&mut self) -> Result<String, MetadataError> {
        let mut path = self.expect_ident()?;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            path.push('.');
            path.push_str(&self.expect_ident()?);
        }
        Ok(path)
    }

    // ---- document level ----

    fn parse_document(mut self) -> Result<TraceMetadata, MetadataError> {
        let mut doc = Document::default();

        while let Some(token) = self.peek() {
            if *token == Token::Semi {
                self.pos += 1;
                continue;
            }
            let keyword = self
                .peek_ident()
                .ok_or_else(|| self.syntax_error("declaration"))?
                .to_string();
            let opens_block = self.peek_at(1) == Some(&Token::LBrace);

            match keyword.as_str() {
                "typealias" => self.parse_typealias()?,
                "typedef" => self.parse_typedef()?,
                "struct" | "enum" | "variant" => {
                    self.parse_type(false)?;
                    self.expect(&Token::Semi)?;
                }
                "trace" | "env" | "clock" | "stream" | "event" | "callsite" if opens_block => {
                    self.pos += 1;
                    let attrs = self.parse_block()?;
                    self.expect(&Token::Semi)?;
                    match keyword.as_str() {
                        "trace" => apply_trace(&mut doc, &attrs)?,
                        "env" => apply_env(&mut doc, &attrs),
                        "clock" => doc.clocks.push(build_clock(&attrs)?),
                        "stream" => {
                            let stream = build_stream(&attrs)?;
                            doc.streams.insert(stream.id, stream);
                        }
                        "event" => doc.events.push(build_event(&attrs)?),
                        _ => {}
                    }
                }
                _ => return Err(self.syntax_error("declaration")),
            }
        }

        finish(doc)
    }

    /// `{ key = value; key := type; typealias ...; }`, braces included
    fn parse_block(&mut self) -> Result<Vec<Attribute>, MetadataError> {
        self.expect(&Token::LBrace)?;
        let mut attrs = Vec::new();

        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return Ok(attrs);
                }
                Some(Token::Semi) => {
                    self.pos += 1;
                    continue;
                }
                None => return Err(self.syntax_error("`}`")),
                _ => {}
            }

            match self.peek_ident() {
                Some("typealias") => {
                    self.parse_typealias()?;
                    continue;
                }
                Some("typedef") => {
                    self.parse_typedef()?;
                    continue;
                }
                _ => {}
            }

            let key = self.parse_path()?;
            let value = if self.eat(&Token::TypeAssign) {
                AttrValue::Type(self.parse_type(false)?)
            } else {
                self.expect(&Token::Assign)?;
                self.parse_value()?
            };
            self.expect(&Token::Semi)?;
            attrs.push(Attribute { key, value });
        }
    }

    fn parse_value(&mut self) -> Result<AttrValue, MetadataError> {
        match self.peek() {
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(AttrValue::Str(s))
            }
            Some(Token::Ident(_)) => Ok(AttrValue::Path(self.parse_path()?)),
            Some(Token::Integer(_) | Token::Minus | Token::Plus) => {
                Ok(AttrValue::Int(self.expect_signed()?))
            }
            _ => Err(self.syntax_error("value")),
        }
    }

    fn parse_typealias(&mut self) -> Result<(), MetadataError> {
        self.expect_ident()?;
        let ty = self.parse_type(false)?;
        self.expect(&Token::TypeAssign)?;

        let mut words = Vec::new();
        while let Some(Token::Ident(word)) = self.peek() {
            words.push(word.clone());
            self.pos += 1;
        }
        if words.is_empty() {
            return Err(self.syntax_error("alias name"));
        }
        self.expect(&Token::Semi)?;

        self.aliases.insert(words.join(" "), ty);
        Ok(())
    }

    fn parse_typedef(&mut self) -> Result<(), MetadataError> {
        self.expect_ident()?;
        let ty = self.parse_type(true)?;
        let name = self.expect_ident()?;
        let ty = self.parse_array_suffix(ty)?;
        self.expect(&Token::Semi)?;
        self.aliases.insert(name, ty);
        Ok(())
    }

    // ---- types ----

    /// Parse a type specifier.
    ///
    /// With `declarator` set, a trailing identifier is left for the caller
    /// as the declared field name (`unsigned long count;`).
    fn parse_type(&mut self, declarator: bool) -> Result<FieldType, MetadataError> {
        let keyword = self
            .peek_ident()
            .ok_or_else(|| self.syntax_error("type"))?
            .to_string();

        match keyword.as_str() {
            "integer" => {
                self.pos += 1;
                let attrs = self.parse_block()?;
                Ok(FieldType::Integer(build_integer(&attrs)?))
            }
            "floating_point" => {
                self.pos += 1;
                let attrs = self.parse_block()?;
                Ok(FieldType::Float(build_float(&attrs)?))
            }
            "string" => {
                self.pos += 1;
                let mut encoding = Encoding::Utf8;
                if self.peek() == Some(&Token::LBrace) {
                    for attr in self.parse_block()? {
                        if attr.key == "encoding" {
                            encoding = Encoding::from_tsdl(attr.as_text()?)
                                .ok_or_else(|| attr.invalid())?;
                        }
                    }
                }
                Ok(FieldType::String(encoding))
            }
            "struct" => {
                self.pos += 1;
                self.parse_struct()
            }
            "enum" => {
                self.pos += 1;
                self.parse_enum()
            }
            "variant" => {
                self.pos += 1;
                self.parse_variant()
            }
            _ => self.parse_alias_ref(declarator),
        }
    }

    fn parse_alias_ref(&mut self, declarator: bool) -> Result<FieldType, MetadataError> {
        let mut run = 0;
        while let Some(Token::Ident(_)) = self.peek_at(run) {
            run += 1;
        }
        let take = if declarator && run >= 2 { run - 1 } else { run };

        let words: Vec<String> = self.tokens[self.pos..self.pos + take]
            .iter()
            .filter_map(|t| match t {
                Token::Ident(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        self.pos += take;

        let name = words.join(" ");
        self.aliases
            .get(&name)
            .cloned()
            .ok_or(MetadataError::UnknownType(name))
    }

    fn parse_struct(&mut self) -> Result<FieldType, MetadataError> {
        let name = match self.peek() {
            Some(Token::Ident(s)) if s != "align" => {
                let s = s.clone();
                self.pos += 1;
                Some(s)
            }
            _ => None,
        };

        if self.peek() != Some(&Token::LBrace) {
            let name = name.ok_or_else(|| self.syntax_error("struct body"))?;
            return self
                .structs
                .get(&name)
                .cloned()
                .map(FieldType::Struct)
                .ok_or(MetadataError::UnknownType(format!("struct {name}")));
        }

        let fields = self.parse_fields()?;
        let mut min_align = 1;
        if self.peek_ident() == Some("align") {
            self.pos += 1;
            self.expect(&Token::LParen)?;
            min_align = u32::try_from(self.expect_integer()?)
                .map_err(|_| MetadataError::Invalid("struct alignment too large".to_string()))?;
            self.expect(&Token::RParen)?;
        }

        let ty = StructType { fields, min_align };
        if let Some(name) = name {
            self.structs.insert(name, ty.clone());
        }
        Ok(FieldType::Struct(ty))
    }

    fn parse_enum(&mut self) -> Result<FieldType, MetadataError> {
        let mut name = None;
        if let Some(Token::Ident(s)) = self.peek() {
            let s = s.clone();
            self.pos += 1;
            if !matches!(self.peek(), Some(Token::Colon | Token::LBrace)) {
                // Reference to a named enumeration
                return self
                    .enums
                    .get(&s)
                    .cloned()
                    .map(FieldType::Enum)
                    .ok_or(MetadataError::UnknownType(format!("enum {s}")));
            }
            name = Some(s);
        }

        let container = if self.eat(&Token::Colon) {
            match self.parse_type(false)? {
                FieldType::Integer(int) => int,
                _ => {
                    return Err(MetadataError::Invalid(
                        "enumeration container must be an integer".to_string(),
                    ))
                }
            }
        } else {
            match self.aliases.get("int") {
                Some(FieldType::Integer(int)) => int.clone(),
                _ => return Err(MetadataError::UnknownType("int".to_string())),
            }
        };

        self.expect(&Token::LBrace)?;
        let mut mappings = Vec::new();
        let mut next_value: i64 = 0;
        while !self.eat(&Token::RBrace) {
            let label = match self.advance() {
                Some(Token::Ident(s) | Token::Str(s)) => s,
                _ => return Err(self.syntax_error("enumerator label")),
            };
            let (start, end) = if self.eat(&Token::Assign) {
                let start = to_i64(self.expect_signed()?)?;
                let end = if self.eat(&Token::Ellipsis) {
                    to_i64(self.expect_signed()?)?
                } else {
                    start
                };
                (start, end)
            } else {
                (next_value, next_value)
            };
            next_value = end.wrapping_add(1);
            mappings.push(EnumMapping { label, start, end });

            if !self.eat(&Token::Comma) && self.peek() != Some(&Token::RBrace) {
                return Err(self.syntax_error("`,` or `}`"));
            }
        }

        let ty = EnumType { container, mappings };
        if let Some(name) = name {
            self.enums.insert(name, ty.clone());
        }
        Ok(FieldType::Enum(ty))
    }

    fn parse_variant(&mut self) -> Result<FieldType, MetadataError> {
        let name = match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Some(s)
            }
            _ => None,
        };

        let mut tag = None;
        if self.eat(&Token::LAngle) {
            tag = Some(self.parse_path()?);
            self.expect(&Token::RAngle)?;
        }

        let mut ty = if self.peek() == Some(&Token::LBrace) {
            let options = self.parse_fields()?;
            let ty = VariantType {
                tag: tag.clone().unwrap_or_default(),
                options,
            };
            if let Some(name) = &name {
                self.variants.insert(name.clone(), ty.clone());
            }
            ty
        } else {
            let name = name.ok_or_else(|| self.syntax_error("variant body"))?;
            self.variants
                .get(&name)
                .cloned()
                .ok_or(MetadataError::UnknownType(format!("variant {name}")))?
        };

        if let Some(tag) = tag {
            ty.tag = tag;
        }
        Ok(FieldType::Variant(ty))
    }

    /// `{ type name[len]...; ... }` for structures and variants
    fn parse_fields(&mut self) -> Result<Vec<(String, FieldType)>, MetadataError> {
        self.expect(&Token::LBrace)?;
        let mut fields = Vec::new();

        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return Ok(fields);
                }
                Some(Token::Semi) => {
                    self.pos += 1;
                    continue;
                }
                None => return Err(self.syntax_error("`}`")),
                _ => {}
            }

            match self.peek_ident() {
                Some("typealias") => {
                    self.parse_typealias()?;
                    continue;
                }
                Some("typedef") => {
                    self.parse_typedef()?;
                    continue;
                }
                _ => {}
            }

            let ty = self.parse_type(true)?;
            let name = self.expect_ident()?;
            let ty = self.parse_array_suffix(ty)?;
            self.expect(&Token::Semi)?;
            fields.push((name, ty));
        }
    }

    /// `[N]` or `[length_field]` suffixes; `x[2][3]` is two arrays of three
    fn parse_array_suffix(&mut self, ty: FieldType) -> Result<FieldType, MetadataError> {
        let mut lengths = Vec::new();
        while self.eat(&Token::LBracket) {
            let length = match self.peek() {
                Some(Token::Integer(_)) => Length::Fixed(self.expect_integer()?),
                _ => Length::Field(self.parse_path()?),
            };
            self.expect(&Token::RBracket)?;
            lengths.push(length);
        }

        Ok(lengths
            .into_iter()
            .rev()
            .fold(ty, |element, length| FieldType::Array {
                element: Box::new(element),
                length,
            }))
    }
}

fn to_i64(value: i128) -> Result<i64, MetadataError> {
    i64::try_from(value)
        .map_err(|_| MetadataError::Invalid(format!("enumeration value {value} out of range")))
}

fn build_integer(attrs: &[Attribute]) -> Result<IntegerType, MetadataError> {
    let size = attrs
        .iter()
        .find(|a| a.key == "size")
        .ok_or_else(|| MetadataError::Invalid("integer without size".to_string()))?
        .as_u32()?;
    if size == 0 || size > 64 {
        return Err(MetadataError::Invalid(format!(
            "unsupported integer size {size}"
        )));
    }

    let mut int = IntegerType::new(size);
    for attr in attrs {
        match attr.key.as_str() {
            "size" => {}
            "align" => int.align = attr.as_u32()?.max(1),
            "signed" => int.signed = attr.as_bool()?,
            "byte_order" => {
                int.byte_order =
                    ByteOrder::from_tsdl(attr.as_text()?).ok_or_else(|| attr.invalid())?
            }
            // Values print in decimal whatever the display base
            "base" => {}
            "encoding" => {
                int.encoding = Encoding::from_tsdl(attr.as_text()?).ok_or_else(|| attr.invalid())?
            }
            "map" => {
                // clock.<name>.value
                let path = attr.as_text()?;
                let clock = path
                    .strip_prefix("clock.")
                    .and_then(|rest| rest.strip_suffix(".value"))
                    .ok_or_else(|| attr.invalid())?;
                int.clock = Some(clock.to_string());
            }
            _ => debug!("Ignoring integer attribute `{}`", attr.key),
        }
    }
    Ok(int)
}

fn build_float(attrs: &[Attribute]) -> Result<FloatType, MetadataError> {
    let mut float = FloatType {
        exp_dig: 0,
        mant_dig: 0,
        align: 8,
        byte_order: ByteOrder::Native,
    };
    for attr in attrs {
        match attr.key.as_str() {
            "exp_dig" => float.exp_dig = attr.as_u32()?,
            "mant_dig" => float.mant_dig = attr.as_u32()?,
            "align" => float.align = attr.as_u32()?.max(1),
            "byte_order" => {
                float.byte_order =
                    ByteOrder::from_tsdl(attr.as_text()?).ok_or_else(|| attr.invalid())?
            }
            _ => debug!("Ignoring floating point attribute `{}`", attr.key),
        }
    }
    match (float.exp_dig, float.mant_dig) {
        (8, 24) | (11, 53) => Ok(float),
        (e, m) => Err(MetadataError::Invalid(format!(
            "unsupported floating point layout (exp_dig {e}, mant_dig {m})"
        ))),
    }
}

fn apply_trace(doc: &mut Document, attrs: &[Attribute]) -> Result<(), MetadataError> {
    for attr in attrs {
        match attr.key.as_str() {
            "major" => doc.major = attr.as_u64()?,
            "minor" => doc.minor = attr.as_u64()?,
            "uuid" => doc.uuid = Some(attr.as_text()?.to_string()),
            "byte_order" => {
                doc.byte_order =
                    Some(ByteOrder::from_tsdl(attr.as_text()?).ok_or_else(|| attr.invalid())?)
            }
            "packet.header" => doc.packet_header = Some(attr.as_struct()?),
            _ => debug!("Ignoring trace attribute `{}`", attr.key),
        }
    }
    Ok(())
}

fn apply_env(doc: &mut Document, attrs: &[Attribute]) {
    for attr in attrs {
        doc.env.push((attr.key.clone(), attr.value.describe()));
    }
}

fn build_clock(attrs: &[Attribute]) -> Result<ClockClass, MetadataError> {
    let mut clock = ClockClass::default();
    for attr in attrs {
        match attr.key.as_str() {
            "name" => clock.name = attr.as_text()?.to_string(),
            "uuid" => clock.uuid = Some(attr.as_text()?.to_string()),
            "description" => clock.description = Some(attr.as_text()?.to_string()),
            "freq" => clock.freq = attr.as_u64()?,
            "precision" => clock.precision = attr.as_u64()?,
            "offset_s" => clock.offset_s = attr.as_i64()?,
            "offset" => clock.offset = attr.as_i64()?,
            "absolute" => clock.absolute = attr.as_bool()?,
            _ => debug!("Ignoring clock attribute `{}`", attr.key),
        }
    }
    Ok(clock)
}

fn build_stream(attrs: &[Attribute]) -> Result<StreamClass, MetadataError> {
    let mut stream = StreamClass::default();
    for attr in attrs {
        match attr.key.as_str() {
            "id" => stream.id = attr.as_u64()?,
            "packet.context" => stream.packet_context = Some(attr.as_struct()?),
            "event.header" => stream.event_header = Some(attr.as_struct()?),
            "event.context" => stream.event_context = Some(attr.as_struct()?),
            _ => debug!("Ignoring stream attribute `{}`", attr.key),
        }
    }
    Ok(stream)
}

fn build_event(attrs: &[Attribute]) -> Result<EventClass, MetadataError> {
    let mut event = EventClass::default();
    for attr in attrs {
        match attr.key.as_str() {
            "name" => event.name = attr.as_text()?.to_string(),
            "id" => event.id = attr.as_u64()?,
            "stream_id" => event.stream_id = attr.as_u64()?,
            "loglevel" => event.loglevel = Some(attr.as_i64()?),
            "context" => event.context = Some(attr.as_struct()?),
            "fields" => event.fields = Some(attr.as_struct()?),
            _ => debug!("Ignoring event attribute `{}`", attr.key),
        }
    }
    Ok(event)
}

/// Attach event classes to their streams and resolve the trace byte order
fn finish(doc: Document) -> Result<TraceMetadata, MetadataError> {
    let mut streams = doc.streams;
    let implicit_stream = streams.is_empty();

    for event in doc.events {
        if implicit_stream && event.stream_id == 0 {
            streams.entry(0).or_default();
        }
        let stream = streams.get_mut(&event.stream_id).ok_or_else(|| {
            MetadataError::Invalid(format!(
                "event `{}` references undeclared stream {}",
                event.name, event.stream_id
            ))
        })?;
        if stream.events.contains_key(&event.id) {
            return Err(MetadataError::Invalid(format!(
                "duplicate event id {} in stream {}",
                event.id, event.stream_id
            )));
        }
        stream.events.insert(event.id, event);
    }

    let byte_order = match doc.byte_order {
        Some(ByteOrder::Native) | None => ByteOrder::host(),
        Some(order) => order,
    };

    debug!(
        "Parsed metadata: CTF {}.{}, {} stream class(es)",
        doc.major,
        doc.minor,
        streams.len()
    );

    Ok(TraceMetadata {
        major: doc.major,
        minor: doc.minor,
        uuid: doc.uuid,
        byte_order,
        packet_header: doc.packet_header,
        env: doc.env,
        clocks: doc.clocks,
        streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LTTNG_LIKE: &str = r#"/* CTF 1.8 */
typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
typealias integer { size = 64; align = 8; signed = false; } := uint64_t;
typealias integer { size = 64; align = 8; signed = false; } := unsigned long;
typealias integer { size = 5; align = 1; signed = false; } := uint5_t;
typealias integer { size = 27; align = 1; signed = false; } := uint27_t;

trace {
    major = 1;
    minor = 8;
    uuid = "c3a5e7b2-0000-4000-8000-000000000000";
    byte_order = le;
    packet.header := struct {
        uint32_t magic;
        uint8_t  uuid[16];
        uint32_t stream_id;
        uint64_t stream_instance_id;
    };
};

env {
    hostname = "node1";
    domain = "ust";
    tracer_major = 2;
};

clock {
    name = "monotonic";
    freq = 1000000000;
    offset_s = 1500000000;
    offset = -12;
    absolute = FALSE;
};

typealias integer {
    size = 27; align = 1; signed = false;
    map = clock.monotonic.value;
} := uint27_clock_monotonic_t;

typealias integer {
    size = 64; align = 8; signed = false;
    map = clock.monotonic.value;
} := uint64_clock_monotonic_t;

struct packet_context {
    uint64_clock_monotonic_t timestamp_begin;
    uint64_clock_monotonic_t timestamp_end;
    uint64_t content_size;
    uint64_t packet_size;
    unsigned long events_discarded;
    uint32_t cpu_id;
};

struct event_header_compact {
    enum : uint5_t { compact = 0 ... 30, extended = 31 } id;
    variant <id> {
        struct {
            uint27_clock_monotonic_t timestamp;
        } compact;
        struct {
            uint32_t id;
            uint64_clock_monotonic_t timestamp;
        } extended;
    } v;
} align(8);

stream {
    id = 0;
    event.header := struct event_header_compact;
    packet.context := struct packet_context;
};

event {
    name = "service_fabric:tracepoint_Info";
    id = 0;
    stream_id = 0;
    loglevel = 13;
    fields := struct {
        string taskNameField;
        string eventNameField;
        uint32_t _dataField_length;
        uint8_t dataField[_dataField_length];
    };
};
"#;

    #[test]
    fn parses_lttng_style_metadata() {
        let meta = parse_tsdl(LTTNG_LIKE).unwrap();
        assert_eq!((meta.major, meta.minor), (1, 8));
        assert_eq!(meta.byte_order, ByteOrder::Little);
        assert_eq!(meta.env_value("hostname"), Some("node1"));
        assert_eq!(meta.env_value("tracer_major"), Some("2"));

        let header = meta.packet_header.as_ref().unwrap();
        assert_eq!(header.fields.len(), 4);
        assert!(matches!(
            header.fields[1].1,
            FieldType::Array { length: Length::Fixed(16), .. }
        ));

        let clock = &meta.clocks[0];
        assert_eq!(clock.name, "monotonic");
        assert_eq!(clock.offset, -12);
        assert!(!clock.absolute);

        let stream = meta.stream(Some(0)).unwrap();
        let event_header = stream.event_header.as_ref().unwrap();
        assert_eq!(event_header.min_align, 8);
        match &event_header.fields[1].1 {
            FieldType::Variant(v) => {
                assert_eq!(v.tag, "id");
                assert_eq!(v.options[1].0, "extended");
            }
            other => panic!("expected variant, got {other:?}"),
        }

        let context = stream.packet_context.as_ref().unwrap();
        match &context.fields[0].1 {
            FieldType::Integer(int) => assert_eq!(int.clock.as_deref(), Some("monotonic")),
            other => panic!("expected integer, got {other:?}"),
        }
        // multi-word alias
        assert!(matches!(&context.fields[4].1, FieldType::Integer(i) if i.size == 64));

        let event = &stream.events[&0];
        assert_eq!(event.name, "service_fabric:tracepoint_Info");
        assert_eq!(event.loglevel, Some(13));
        let fields = event.fields.as_ref().unwrap();
        assert!(matches!(
            &fields.fields[3].1,
            FieldType::Array { length: Length::Field(f), .. } if f == "_dataField_length"
        ));
    }

    #[test]
    fn enum_values_auto_increment() {
        let meta = parse_tsdl(
            r#"typealias integer { size = 8; } := uint8_t;
               event { name = e; fields := struct {
                   enum : uint8_t { A, B = 5, C, "D E" = 10 ... 12 } state;
               }; };"#,
        )
        .unwrap();
        let fields = meta.streams[&0].events[&0].fields.clone().unwrap();
        match &fields.fields[0].1 {
            FieldType::Enum(e) => {
                assert_eq!(e.label_for(0), Some("A"));
                assert_eq!(e.label_for(5), Some("B"));
                assert_eq!(e.label_for(6), Some("C"));
                assert_eq!(e.label_for(11), Some("D E"));
            }
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    fn implicit_stream_when_none_declared() {
        let meta = parse_tsdl(r#"event { name = "a"; id = 3; };"#).unwrap();
        assert_eq!(meta.streams.len(), 1);
        assert!(meta.stream(None).unwrap().events.contains_key(&3));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = parse_tsdl("event { name = a; fields := struct { foo_t x; }; };").unwrap_err();
        assert!(matches!(err, MetadataError::UnknownType(name) if name == "foo_t"));
    }

    #[test]
    fn rejects_event_on_undeclared_stream() {
        let err = parse_tsdl(
            "stream { id = 0; }; event { name = a; stream_id = 4; };",
        )
        .unwrap_err();
        assert!(matches!(err, MetadataError::Invalid(_)));
    }

    #[test]
    fn rejects_missing_semicolon() {
        assert!(parse_tsdl("trace { major = 1 }").is_err());
    }

    #[test]
    fn rejects_odd_float() {
        let err = parse_tsdl(
            "typealias floating_point { exp_dig = 5; mant_dig = 11; } := half;",
        )
        .unwrap_err();
        assert!(matches!(err, MetadataError::Invalid(_)));
    }
}
