//! Field translation from the remote wire representation to mirror rows.

use serde_json::Value;
use thiserror::Error;

use crate::models::{FieldValue, RemoteRecord, TranslatedRow};
use crate::schema::{FieldType, TableSchema};

/// Protocol metadata keys that must never become business fields, even when
/// a caller hands us a record whose field map still contains them.
const METADATA_FIELDS: &[&str] = &[
    "id",
    "created",
    "updated",
    "collectionId",
    "collectionName",
    "expand",
];

/// Translation failures.
///
/// Timestamps never fail (malformed values fall open to 0); only the typed
/// field schema produces errors, so unexpected remote fields fail loudly
/// instead of being silently merged into the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The remote record carries a business field the table schema does not
    /// allow-list
    #[error("Collection {collection} sent unknown field {field:?}")]
    UnknownField {
        /// Remote collection name
        collection: &'static str,
        /// Offending field name
        field: String,
    },
    /// A remote value did not match the column's declared type
    #[error("Field {field:?} of collection {collection} is not {expected:?}")]
    TypeMismatch {
        /// Remote collection name
        collection: &'static str,
        /// Offending field name
        field: &'static str,
        /// Declared column type
        expected: FieldType,
    },
}

/// Translate one remote record into the flat local row representation.
///
/// `created_at`/`updated_at` become epoch-millisecond integers, `server_id`
/// is the remote identifier, and each schema column is copied from the
/// record. Absent or null remote values become explicit nulls; protocol
/// metadata is never copied.
pub fn translate(
    schema: &TableSchema,
    record: &RemoteRecord,
) -> Result<TranslatedRow, TranslateError> {
    for field in record.fields.keys() {
        if METADATA_FIELDS.contains(&field.as_str()) {
            continue;
        }
        if schema.column(field).is_none() {
            return Err(TranslateError::UnknownField {
                collection: schema.collection,
                field: field.clone(),
            });
        }
    }

    let mut fields = Vec::with_capacity(schema.columns.len());
    for column in schema.columns {
        let value = record.fields.get(column.name).unwrap_or(&Value::Null);
        fields.push((column.name, coerce(schema, column.name, column.field_type, value)?));
    }

    Ok(TranslatedRow {
        server_id: record.id.clone(),
        created_at: parse_remote_timestamp(&record.created),
        updated_at: parse_remote_timestamp(&record.updated),
        fields,
    })
}

/// Parse a remote protocol timestamp into epoch milliseconds.
///
/// Accepts RFC 3339 (`2024-01-01T00:00:00Z`) and the backend's space
/// separated variant (`2024-01-01 00:00:00.000Z`). Absent, empty, or
/// malformed values yield 0, never an error.
pub fn parse_remote_timestamp(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }

    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return parsed.timestamp_millis();
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.fZ") {
        return parsed.and_utc().timestamp_millis();
    }

    tracing::debug!("Unparseable remote timestamp {raw:?}, treating as 0");
    0
}

fn coerce(
    schema: &TableSchema,
    field: &'static str,
    expected: FieldType,
    value: &Value,
) -> Result<FieldValue, TranslateError> {
    let mismatch = || TranslateError::TypeMismatch {
        collection: schema.collection,
        field,
        expected,
    };

    match (expected, value) {
        (_, Value::Null) => Ok(FieldValue::Null),
        (FieldType::Text, Value::String(text)) => Ok(FieldValue::Text(text.clone())),
        (FieldType::Integer, Value::Number(number)) => {
            number.as_i64().map(FieldValue::Integer).ok_or_else(mismatch)
        }
        (FieldType::Real, Value::Number(number)) => {
            number.as_f64().map(FieldValue::Real).ok_or_else(mismatch)
        }
        (FieldType::Boolean, Value::Bool(flag)) => Ok(FieldValue::Boolean(*flag)),
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NOTES;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(json: Value) -> RemoteRecord {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn timestamps_parse_both_remote_formats() {
        assert_eq!(parse_remote_timestamp("2024-01-01T00:00:00Z"), 1_704_067_200_000);
        assert_eq!(
            parse_remote_timestamp("2024-01-01 00:00:00.000Z"),
            1_704_067_200_000
        );
        assert_eq!(
            parse_remote_timestamp("2024-01-01 00:00:00.500Z"),
            1_704_067_200_500
        );
    }

    #[test]
    fn timestamps_fail_open_to_zero() {
        assert_eq!(parse_remote_timestamp(""), 0);
        assert_eq!(parse_remote_timestamp("   "), 0);
        assert_eq!(parse_remote_timestamp("not-a-date"), 0);
        assert_eq!(parse_remote_timestamp("2024-13-45"), 0);
    }

    #[test]
    fn translates_scenario_record() {
        let record = record(json!({
            "id": "a",
            "title": "A",
            "updated": "2024-01-01T00:00:00Z"
        }));

        let row = translate(&NOTES, &record).unwrap();
        assert_eq!(row.server_id, "a");
        assert_eq!(row.updated_at, 1_704_067_200_000);
        assert_eq!(row.created_at, 0);
        assert_eq!(row.field("title").and_then(FieldValue::as_text), Some("A"));
    }

    #[test]
    fn excludes_protocol_metadata() {
        let record = record(json!({
            "id": "a",
            "created": "2024-01-01 00:00:00.000Z",
            "updated": "2024-01-02 00:00:00.000Z",
            "collectionId": "c1",
            "collectionName": "notes",
            "expand": {"user_id": {"id": "u1"}},
            "title": "A"
        }));

        let row = translate(&NOTES, &record).unwrap();
        for metadata in super::METADATA_FIELDS {
            assert!(row.field(metadata).is_none(), "{metadata} leaked into row");
        }
        assert!(row.created_at > 0);
        assert!(row.updated_at > row.created_at);
    }

    #[test]
    fn absent_and_null_fields_become_explicit_null() {
        let record = record(json!({ "id": "a", "title": "A", "content": null }));

        let row = translate(&NOTES, &record).unwrap();
        assert!(row.field("content").unwrap().is_null());
        assert!(row.field("user_id").unwrap().is_null());
    }

    #[test]
    fn unknown_field_fails_loudly() {
        let record = record(json!({ "id": "a", "title": "A", "rank": 3 }));

        assert_eq!(
            translate(&NOTES, &record),
            Err(TranslateError::UnknownField {
                collection: "notes",
                field: "rank".to_string(),
            })
        );
    }

    #[test]
    fn type_mismatch_fails_loudly() {
        let record = record(json!({ "id": "a", "title": 42 }));

        assert_eq!(
            translate(&NOTES, &record),
            Err(TranslateError::TypeMismatch {
                collection: "notes",
                field: "title",
                expected: FieldType::Text,
            })
        );
    }
}
