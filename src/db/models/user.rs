use serde::{Deserialize, Serialize};

use crate::db::schema::{ColumnType, EntityDescriptor, FieldDescriptor};

// ============================================================================
// User
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub nick_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

impl User {
    pub const TABLE: &'static str = "users";

    pub fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("User", Self::TABLE)
            .field(FieldDescriptor::new("ID", "id", ColumnType::BigInt).auto_increment())
            .field(FieldDescriptor::new("UUID", "uuid", ColumnType::Varchar(100)).not_null())
            .field(FieldDescriptor::new("NickName", "nick_name", ColumnType::Varchar(100)).not_null())
            .field(FieldDescriptor::new("CreatedAt", "created_at", ColumnType::DateTime))
            .field(FieldDescriptor::new("UpdatedAt", "updated_at", ColumnType::DateTime))
    }
}
