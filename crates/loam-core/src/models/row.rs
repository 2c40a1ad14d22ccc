//! Mirror row model

/// A single typed business-field value held by the local mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit SQL NULL (absent or null remote values are stored as null)
    Null,
    /// Text value
    Text(String),
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Real(f64),
    /// Boolean value (stored as 0/1)
    Boolean(bool),
}

impl FieldValue {
    /// Borrow this value as text, when it holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this value is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<FieldValue> for libsql::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Self::Null,
            FieldValue::Text(text) => Self::Text(text),
            FieldValue::Integer(value) => Self::Integer(value),
            FieldValue::Real(value) => Self::Real(value),
            FieldValue::Boolean(value) => Self::Integer(i64::from(value)),
        }
    }
}

impl From<&FieldValue> for libsql::Value {
    fn from(value: &FieldValue) -> Self {
        value.clone().into()
    }
}

/// A remote record translated into the local mirror's flat representation,
/// ready to be written by the mirror repository.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedRow {
    /// Remote identifier the row is keyed by
    pub server_id: String,
    /// Remote creation time (Unix ms, 0 when the remote omits it)
    pub created_at: i64,
    /// Remote last-update time (Unix ms, 0 when the remote omits it)
    pub updated_at: i64,
    /// Business fields in table-schema column order
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl TranslatedRow {
    /// Look up a translated business field by column name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, value)| value)
    }
}

/// One entity as the local mirror holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorRow {
    /// Local row identity assigned by the store; never synced
    pub row_id: i64,
    /// Remote identifier, unique within the table
    pub server_id: String,
    /// Remote creation time (Unix ms)
    pub created_at: i64,
    /// Remote last-update time (Unix ms)
    pub updated_at: i64,
    /// Business fields in table-schema column order
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl MirrorRow {
    /// Look up a business field by column name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, value)| value)
    }
}
