use rusqlite::{params, Row};

use crate::db::models::User;
use crate::db::DbPool;
use crate::error::AppError;

/// Persistence seam for users, so the service layer can run against any store.
pub trait UserRepository: Send + Sync {
    /// A missing row yields `User::default()`, not an error.
    fn query(&self, id: i64) -> Result<User, AppError>;

    fn create(&self, nick_name: &str) -> Result<User, AppError>;
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        uuid: row.get("uuid")?,
        nick_name: row.get("nick_name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for SqliteUserRepository {
    fn query(&self, id: i64) -> Result<User, AppError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT id, uuid, nick_name, created_at, updated_at FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(User::default()),
            other => Err(AppError::Database(other)),
        })
    }

    fn create(&self, nick_name: &str) -> Result<User, AppError> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (uuid, nick_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![uuid, nick_name, now],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.query(id)
    }
}
