//! Decoded events and field values.

use std::fmt;

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    Enum { value: i64, label: Option<String> },
    Array(Vec<FieldValue>),
    Struct(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Integer view of the value; enumerations yield their numeric value
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => Some(*v),
            FieldValue::Signed(v) => u64::try_from(*v).ok(),
            FieldValue::Enum { value, .. } => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Member of a structure value
    pub fn member(&self, name: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Struct(fields) => find_field(fields, name),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Signed(v) => write!(f, "{v}"),
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            // Whole values keep a fraction digit: `1.0`, not `1`
            FieldValue::Float(v) => write!(f, "{v:?}"),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Enum {
                label: Some(label), ..
            } => f.write_str(label),
            FieldValue::Enum { value, label: None } => write!(f, "{value}"),
            FieldValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            FieldValue::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// First field with the given name
pub fn find_field<'a>(fields: &'a [(String, FieldValue)], name: &str) -> Option<&'a FieldValue> {
    fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// Last field with the given name in decode order, searching nested structures
pub fn find_last<'a>(fields: &'a [(String, FieldValue)], name: &str) -> Option<&'a FieldValue> {
    let mut found = None;
    for (field_name, value) in fields {
        if field_name == name {
            found = Some(value);
        }
        if let FieldValue::Struct(inner) = value {
            if let Some(nested) = find_last(inner, name) {
                found = Some(nested);
            }
        }
    }
    found
}

/// CTF dynamic scopes, from outermost to innermost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    PacketHeader,
    PacketContext,
    EventHeader,
    StreamEventContext,
    EventContext,
    Payload,
}

/// One recorded event.
///
/// Field lookup spans every scope; when two scopes carry the same name the
/// innermost one (payload first) wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    stream_id: u64,
    timestamp: u64,
    scopes: Vec<(Scope, Vec<(String, FieldValue)>)>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream_id: 0,
            timestamp: 0,
            scopes: Vec::new(),
        }
    }

    pub fn with_stream_id(mut self, stream_id: u64) -> Self {
        self.stream_id = stream_id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the decoded fields of one scope; scopes must be added outermost first
    pub fn with_scope(mut self, scope: Scope, fields: Vec<(String, FieldValue)>) -> Self {
        self.scopes.push((scope, fields));
        self
    }

    /// Add a single payload field
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        match self.scopes.last_mut() {
            Some((Scope::Payload, fields)) => fields.push((name.into(), value)),
            _ => self.scopes.push((Scope::Payload, vec![(name.into(), value)])),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    /// Clock value in cycles, reconstructed from the event header
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Look up a field by exact name across all scopes
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.scopes
            .iter()
            .rev()
            .find_map(|(_, fields)| find_field(fields, name))
    }

    /// Fields of one scope, if the event carries it
    pub fn scope(&self, scope: Scope) -> Option<&[(String, FieldValue)]> {
        self.scopes
            .iter()
            .find(|(s, _)| *s == scope)
            .map(|(_, fields)| fields.as_slice())
    }

    /// All field names, outermost scope first
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.scopes
            .iter()
            .flat_map(|(_, fields)| fields.iter().map(|(n, _)| n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shadows_packet_context() {
        let event = Event::new("e")
            .with_scope(
                Scope::PacketContext,
                vec![("cpu_id".into(), FieldValue::Unsigned(1))],
            )
            .with_scope(
                Scope::Payload,
                vec![("cpu_id".into(), FieldValue::Unsigned(7))],
            );
        assert_eq!(event.get("cpu_id"), Some(&FieldValue::Unsigned(7)));
        assert_eq!(event.keys().count(), 2);
    }

    #[test]
    fn find_last_prefers_nested_later_fields() {
        let header = vec![
            (
                "id".to_string(),
                FieldValue::Enum { value: 31, label: Some("extended".into()) },
            ),
            (
                "v".to_string(),
                FieldValue::Struct(vec![("id".into(), FieldValue::Unsigned(400))]),
            ),
        ];
        assert_eq!(find_last(&header, "id"), Some(&FieldValue::Unsigned(400)));
    }

    #[test]
    fn display_floats() {
        assert_eq!(FieldValue::Float(1.0).to_string(), "1.0");
        assert_eq!(FieldValue::Float(-2.5).to_string(), "-2.5");
        assert_eq!(FieldValue::Float(0.1).to_string(), "0.1");
    }

    #[test]
    fn display_compound_values() {
        let value = FieldValue::Struct(vec![
            ("a".into(), FieldValue::Signed(-3)),
            (
                "b".into(),
                FieldValue::Array(vec![FieldValue::Unsigned(1), FieldValue::Unsigned(2)]),
            ),
        ]);
        assert_eq!(value.to_string(), "{a: -3, b: [1, 2]}");
        let unlabelled = FieldValue::Enum { value: 4, label: None };
        assert_eq!(unlabelled.to_string(), "4");
    }
}
