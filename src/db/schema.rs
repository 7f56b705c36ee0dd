//! Static entity descriptors: the declarative mapping from a model's fields to
//! table columns that the reconciler in [`super::migrations`] works from.
//!
//! Descriptors are plain data built once at startup. Nothing here touches a
//! connection; the SQL rendered by these types is executed by the reconciler.

use std::collections::HashSet;
use std::fmt;

/// Storage type of a column, rendered as a SQLite type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Text,
    Varchar(u32),
    Boolean,
    Real,
    DateTime,
    Blob,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Integer => "INTEGER".into(),
            ColumnType::BigInt => "BIGINT".into(),
            ColumnType::Text => "TEXT".into(),
            ColumnType::Varchar(len) => format!("VARCHAR({len})"),
            ColumnType::Boolean => "BOOLEAN".into(),
            ColumnType::Real => "REAL".into(),
            ColumnType::DateTime => "DATETIME".into(),
            ColumnType::Blob => "BLOB".into(),
        }
    }

    /// Literal used as the default when a NOT NULL column is appended to a
    /// table that may already hold rows. SQLite rejects such a column otherwise.
    pub fn zero_value(&self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::BigInt | ColumnType::Boolean => "0",
            ColumnType::Real => "0.0",
            ColumnType::Text | ColumnType::Varchar(_) => "''",
            ColumnType::DateTime => "'0001-01-01 00:00:00'",
            ColumnType::Blob => "X''",
        }
    }

    fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInt)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

/// One declared field of an entity and the column it is stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub column: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<String>,
}

impl FieldDescriptor {
    /// A nullable, non-key field.
    pub fn new(name: impl Into<String>, column: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            column_type,
            primary_key: false,
            auto_increment: false,
            nullable: true,
            unique: false,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the field as an auto-increment primary key.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.primary_key()
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Raw SQL literal, e.g. `'draft'` or `0`.
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    fn storage_type(&self) -> String {
        // SQLite only honours AUTOINCREMENT on a column declared exactly INTEGER.
        if self.auto_increment {
            ColumnType::Integer.sql()
        } else {
            self.column_type.sql()
        }
    }

    fn column_definition(&self, inline_key: bool) -> String {
        let mut def = format!("{} {}", quote_ident(&self.column), self.storage_type());
        if inline_key {
            def.push_str(" PRIMARY KEY AUTOINCREMENT");
        } else if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }

    /// `ALTER TABLE .. ADD COLUMN` for this field.
    ///
    /// Key clauses are dropped because SQLite cannot append key columns. A NOT
    /// NULL field without a declared default gets its type's zero value.
    pub fn add_column_sql(&self, table: &str) -> String {
        let mut def = format!("{} {}", quote_ident(&self.column), self.storage_type());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        match (&self.default, self.nullable) {
            (Some(default), _) => {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            (None, false) => {
                def.push_str(" DEFAULT ");
                def.push_str(self.column_type.zero_value());
            }
            (None, true) => {}
        }
        format!("ALTER TABLE {} ADD COLUMN {}", quote_ident(table), def)
    }
}

/// A named record type and its storage mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn primary_keys(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column.as_str())
    }

    /// Structural checks that must hold before any DDL is rendered.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("entity name cannot be empty".into());
        }
        if self.table.trim().is_empty() {
            return Err("table name cannot be empty".into());
        }
        if self.fields.is_empty() {
            return Err("entity declares no fields".into());
        }

        // SQLite identifiers are case-insensitive.
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() || field.column.trim().is_empty() {
                return Err("field and column names cannot be empty".into());
            }
            if !seen.insert(field.column.to_ascii_lowercase()) {
                return Err(format!("duplicate column '{}'", field.column));
            }
        }

        let keys = self.primary_keys();
        for field in self.fields.iter().filter(|f| f.auto_increment) {
            if keys.len() != 1 {
                return Err(format!(
                    "auto-increment column '{}' must be the only primary key",
                    field.column
                ));
            }
            if !field.column_type.is_integer() {
                return Err(format!(
                    "auto-increment column '{}' must be an integer",
                    field.column
                ));
            }
        }
        Ok(())
    }

    /// One `CREATE TABLE` statement carrying every declared column and key.
    pub fn create_table_sql(&self) -> String {
        let keys = self.primary_keys();
        let inline_key = keys.len() == 1 && keys[0].auto_increment;

        let mut parts: Vec<String> = self
            .fields
            .iter()
            .map(|f| f.column_definition(inline_key && f.primary_key))
            .collect();

        if !inline_key && !keys.is_empty() {
            let cols: Vec<String> = keys.iter().map(|f| quote_ident(&f.column)).collect();
            parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }

        format!("CREATE TABLE {} ({})", quote_ident(&self.table), parts.join(", "))
    }
}

/// Double-quote an identifier, doubling any embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
