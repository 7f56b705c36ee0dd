use rusqlite::{params, Connection};
use tokio_util::sync::CancellationToken;

use super::schema::EntityDescriptor;

/// Failures that abort a reconciliation pass. Each names the model it was
/// working on; anything committed before the failure stays in place.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("create table {table} failed for model {model}: {source}")]
    TableCreation {
        model: String,
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("add column {column} failed for model {model}: {source}")]
    ColumnAddition {
        model: String,
        column: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema introspection failed for model {model}: {source}")]
    Introspection {
        model: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid descriptor for model {model}: {reason}")]
    InvalidDescriptor { model: String, reason: String },

    #[error("reconciliation cancelled before model {model}")]
    Cancelled { model: String },
}

impl MigrationError {
    /// The model being reconciled when the pass stopped.
    pub fn model(&self) -> &str {
        match self {
            MigrationError::TableCreation { model, .. }
            | MigrationError::ColumnAddition { model, .. }
            | MigrationError::Introspection { model, .. }
            | MigrationError::InvalidDescriptor { model, .. }
            | MigrationError::Cancelled { model } => model,
        }
    }
}

/// DDL performed by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub tables_created: Vec<String>,
    /// `(table, column)` pairs.
    pub columns_added: Vec<(String, String)>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.tables_created.is_empty() && self.columns_added.is_empty()
    }
}

/// Bring the live schema up to date with `entities`, additively.
///
/// Missing tables are created with every declared column and key; existing
/// tables only get their missing columns appended. Nothing is ever dropped or
/// altered, and existing column types are not compared against the
/// declaration. The pass stops at the first failure without rolling back
/// earlier DDL.
pub fn reconcile(
    conn: &Connection,
    entities: &[EntityDescriptor],
    cancel: &CancellationToken,
) -> Result<ReconcileReport, MigrationError> {
    tracing::debug!(models = entities.len(), "Reconciling database schema");

    let mut report = ReconcileReport::default();

    for entity in entities {
        if cancel.is_cancelled() {
            tracing::warn!(model = %entity.name, "Schema reconciliation cancelled");
            return Err(MigrationError::Cancelled {
                model: entity.name.clone(),
            });
        }

        entity
            .validate()
            .map_err(|reason| {
                tracing::error!(model = %entity.name, reason = %reason, "invalid descriptor: {}", reason);
                MigrationError::InvalidDescriptor {
                    model: entity.name.clone(),
                    reason,
                }
            })?;

        let exists = has_table(conn, &entity.table).map_err(|source| {
            tracing::error!(model = %entity.name, error = %source, "table lookup failed: {}", source);
            MigrationError::Introspection {
                model: entity.name.clone(),
                source,
            }
        })?;

        if !exists {
            let sql = entity.create_table_sql();
            tracing::debug!(sql = %sql, "Creating table");
            if let Err(source) = conn.execute_batch(&sql) {
                tracing::error!(model = %entity.name, error = %source, "create table failed: {}", source);
                return Err(MigrationError::TableCreation {
                    model: entity.name.clone(),
                    table: entity.table.clone(),
                    source,
                });
            }
            tracing::info!(model = %entity.name, table = %entity.table, "created table for model {}", entity.name);
            report.tables_created.push(entity.table.clone());
            continue;
        }

        for field in &entity.fields {
            if cancel.is_cancelled() {
                tracing::warn!(model = %entity.name, "Schema reconciliation cancelled");
                return Err(MigrationError::Cancelled {
                    model: entity.name.clone(),
                });
            }

            let present = has_column(conn, &entity.table, &field.column).map_err(|source| {
                tracing::error!(model = %entity.name, column = %field.column, error = %source, "column lookup failed: {}", source);
                MigrationError::Introspection {
                    model: entity.name.clone(),
                    source,
                }
            })?;
            if present {
                continue;
            }

            let sql = field.add_column_sql(&entity.table);
            tracing::debug!(sql = %sql, "Adding column");
            if let Err(source) = conn.execute_batch(&sql) {
                tracing::error!(
                    model = %entity.name,
                    column = %field.column,
                    error = %source,
                    "add column {} failed: {}",
                    field.column,
                    source
                );
                return Err(MigrationError::ColumnAddition {
                    model: entity.name.clone(),
                    column: field.column.clone(),
                    source,
                });
            }
            tracing::info!(model = %entity.name, table = %entity.table, "added missing column {}", field.column);
            report
                .columns_added
                .push((entity.table.clone(), field.column.clone()));
        }
    }

    tracing::debug!(
        tables_created = report.tables_created.len(),
        columns_added = report.columns_added.len(),
        "Schema reconciliation complete"
    );
    Ok(report)
}

fn has_table(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Uses `table_xinfo` so generated and hidden columns count as present.
fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_xinfo(?1) WHERE name = ?2 COLLATE NOCASE",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::User;
    use crate::db::schema::{ColumnType, FieldDescriptor};
    use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
    use std::panic::AssertUnwindSafe;

    fn columns_of(conn: &Connection, table: &str) -> Vec<(String, String)> {
        let mut stmt = conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .unwrap();
        stmt.query_map(params![table], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    fn tag() -> EntityDescriptor {
        EntityDescriptor::new("Tag", "tags")
            .field(FieldDescriptor::new("Id", "id", ColumnType::Integer).auto_increment())
            .field(FieldDescriptor::new("Label", "label", ColumnType::Text).not_null())
    }

    fn note() -> EntityDescriptor {
        EntityDescriptor::new("Note", "notes")
            .field(FieldDescriptor::new("Id", "id", ColumnType::Integer).auto_increment())
            .field(FieldDescriptor::new("Body", "body", ColumnType::Text))
    }

    #[test]
    fn test_empty_database_creates_users_and_second_run_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let cancel = CancellationToken::new();

        let first = reconcile(&conn, &[User::descriptor()], &cancel).unwrap();
        assert_eq!(first.tables_created, vec!["users".to_string()]);
        assert!(first.columns_added.is_empty());

        let names: Vec<String> = columns_of(&conn, "users").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "uuid", "nick_name", "created_at", "updated_at"]);

        let pk: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('users') WHERE pk > 0")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(pk, vec!["id"]);

        let second = reconcile(&conn, &[User::descriptor()], &cancel).unwrap();
        assert!(second.is_noop());
    }

    #[test]
    fn test_adds_only_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid VARCHAR(100) NOT NULL,
                created_at DATETIME,
                updated_at DATETIME
            );
            INSERT INTO users (uuid) VALUES ('existing');",
        )
        .unwrap();
        let before = columns_of(&conn, "users");

        let report = reconcile(&conn, &[User::descriptor()], &CancellationToken::new()).unwrap();
        assert!(report.tables_created.is_empty());
        assert_eq!(
            report.columns_added,
            vec![("users".to_string(), "nick_name".to_string())]
        );

        let after = columns_of(&conn, "users");
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after.last().unwrap().0, "nick_name");

        // Existing rows pick up the zero value.
        let nick: String = conn
            .query_row("SELECT nick_name FROM users WHERE uuid = 'existing'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(nick, "");
    }

    #[test]
    fn test_leaves_undeclared_and_mistyped_columns_alone() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                uuid TEXT,
                nick_name BLOB,
                created_at DATETIME,
                updated_at DATETIME,
                legacy_flag INTEGER
            );",
        )
        .unwrap();
        let before = columns_of(&conn, "users");

        let report = reconcile(&conn, &[User::descriptor()], &CancellationToken::new()).unwrap();
        assert!(report.is_noop());
        assert_eq!(columns_of(&conn, "users"), before);
    }

    #[test]
    fn test_empty_descriptor_list_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let report = reconcile(&conn, &[], &CancellationToken::new()).unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn test_create_failure_stops_pass_and_keeps_earlier_work() {
        let conn = Connection::open_in_memory().unwrap();
        // A view occupies the name, so the table lookup misses but CREATE TABLE fails.
        conn.execute_batch("CREATE VIEW notes AS SELECT 1 AS id;").unwrap();

        let err = reconcile(
            &conn,
            &[tag(), note(), User::descriptor()],
            &CancellationToken::new(),
        )
        .unwrap_err();

        match &err {
            MigrationError::TableCreation { model, table, .. } => {
                assert_eq!(model, "Note");
                assert_eq!(table, "notes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.model(), "Note");
        assert!(has_table(&conn, "tags").unwrap());
        assert!(!has_table(&conn, "users").unwrap());
    }

    #[test]
    fn test_column_failure_names_column_and_model() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE tags (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL);")
            .unwrap();

        // SQLite refuses to append UNIQUE columns.
        let entity = tag().field(FieldDescriptor::new("Slug", "slug", ColumnType::Text).unique());
        let err = reconcile(&conn, &[entity], &CancellationToken::new()).unwrap_err();

        match err {
            MigrationError::ColumnAddition { model, column, .. } => {
                assert_eq!(model, "Tag");
                assert_eq!(column, "slug");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_descriptor_is_rejected_before_ddl() {
        let conn = Connection::open_in_memory().unwrap();
        let err = reconcile(
            &conn,
            &[EntityDescriptor::new("Ghost", "ghosts")],
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidDescriptor { .. }));
        assert!(!has_table(&conn, "ghosts").unwrap());
    }

    #[test]
    fn test_generated_column_counts_as_present() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid VARCHAR(100) NOT NULL,
                nick_name TEXT GENERATED ALWAYS AS (uuid) VIRTUAL,
                created_at DATETIME,
                updated_at DATETIME
            );",
        )
        .unwrap();

        let report = reconcile(&conn, &[User::descriptor()], &CancellationToken::new()).unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn test_table_lookup_failure_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        conn.authorizer(Some(|ctx: AuthContext<'_>| match ctx.action {
            AuthAction::Select => Authorization::Deny,
            _ => Authorization::Allow,
        }));

        let err = reconcile(&conn, &[tag(), note()], &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, MigrationError::Introspection { ref model, .. } if model == "Tag"));

        conn.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);
        assert!(!has_table(&conn, "tags").unwrap());
        assert!(!has_table(&conn, "notes").unwrap());
    }

    #[test]
    fn test_column_lookup_failure_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE tags (id INTEGER PRIMARY KEY AUTOINCREMENT);")
            .unwrap();

        // Let the table lookup through, then refuse every later query.
        let mut selects = 0usize;
        conn.authorizer(Some(move |ctx: AuthContext<'_>| match ctx.action {
            AuthAction::Select => {
                selects += 1;
                if selects > 1 {
                    Authorization::Deny
                } else {
                    Authorization::Allow
                }
            }
            _ => Authorization::Allow,
        }));

        let err = reconcile(&conn, &[tag()], &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, MigrationError::Introspection { ref model, .. } if model == "Tag"));

        conn.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);
        assert_eq!(columns_of(&conn, "tags").len(), 1);
    }

    #[test]
    fn test_cancel_mid_pass_keeps_committed_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let cancel = CancellationToken::new();

        // Cancel as soon as the first table is being created.
        let trigger = AssertUnwindSafe(cancel.clone());
        conn.authorizer(Some(move |ctx: AuthContext<'_>| {
            if let AuthAction::CreateTable { table_name } = ctx.action {
                if table_name == "tags" {
                    trigger.0.cancel();
                }
            }
            Authorization::Allow
        }));

        let err = reconcile(&conn, &[tag(), note()], &cancel).unwrap_err();
        assert!(matches!(err, MigrationError::Cancelled { ref model } if model == "Note"));

        conn.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);
        assert!(has_table(&conn, "tags").unwrap());
        assert!(!has_table(&conn, "notes").unwrap());
    }

    #[test]
    fn test_cancelled_token_aborts_before_ddl() {
        let conn = Connection::open_in_memory().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = reconcile(&conn, &[tag()], &cancel).unwrap_err();
        assert!(matches!(err, MigrationError::Cancelled { ref model } if model == "Tag"));
        assert!(!has_table(&conn, "tags").unwrap());
    }
}
