//! Static table/collection mapping and typed field schemas.
//!
//! Only tables declared here are watched or synchronized. Adding an entity
//! type means adding a `TableSchema` constant to [`WATCHED_TABLES`]; the
//! migration layer derives the table's DDL from it.

/// Type of one business field column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// UTF-8 text
    Text,
    /// 64-bit integer
    Integer,
    /// 64-bit float
    Real,
    /// Boolean, stored as 0/1
    Boolean,
}

impl FieldType {
    /// SQL column type for this field type.
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
        }
    }
}

/// One allow-listed business field column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name, identical on the remote record and the local table
    pub name: &'static str,
    /// Expected value type
    pub field_type: FieldType,
}

/// Static association between a remote collection and a local mirror table,
/// plus the typed allow-list of business fields copied between them.
///
/// Remote fields not listed here are rejected at translation time rather
/// than silently merged into the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Local table name
    pub table: &'static str,
    /// Remote collection name
    pub collection: &'static str,
    /// Business field columns; local rows additionally carry `id` (rowid),
    /// `server_id`, `created_at` and `updated_at`
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    /// Look up a business column by name.
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// DDL for this table.
    ///
    /// Business columns are nullable: the remote store may omit any field
    /// and the mirror stores the omission as an explicit NULL.
    pub fn create_table_sql(&self) -> String {
        let mut columns = String::new();
        for column in self.columns {
            columns.push_str(&format!(
                ",\n            {} {}",
                column.name,
                column.field_type.sql_type()
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL DEFAULT 0{columns}
        )",
            table = self.table,
        )
    }

    /// DDL for this table's indexes.
    pub fn create_index_sql(&self) -> Vec<String> {
        vec![
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_server_id ON {table}(server_id)",
                table = self.table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_updated ON {table}(updated_at DESC)",
                table = self.table
            ),
        ]
    }
}

/// All synchronized tables, in reconciliation order.
pub const WATCHED_TABLES: &[TableSchema] = &[NOTES];

/// The notes mirror table.
pub const NOTES: TableSchema = TableSchema {
    table: "notes",
    collection: "notes",
    columns: &[
        ColumnDef {
            name: "title",
            field_type: FieldType::Text,
        },
        ColumnDef {
            name: "content",
            field_type: FieldType::Text,
        },
        ColumnDef {
            name: "user_id",
            field_type: FieldType::Text,
        },
    ],
};

/// Find the schema watching the given remote collection.
pub fn schema_for_collection(collection: &str) -> Option<&'static TableSchema> {
    WATCHED_TABLES
        .iter()
        .find(|schema| schema.collection == collection)
}

/// Find the schema for the given local table.
pub fn schema_for_table(table: &str) -> Option<&'static TableSchema> {
    WATCHED_TABLES.iter().find(|schema| schema.table == table)
}
