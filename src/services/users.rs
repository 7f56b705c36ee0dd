use std::sync::Arc;

use crate::db::models::User;
use crate::db::repos::users::UserRepository;
use crate::error::AppError;

/// User-facing operations. Currently a straight pass-through to the repository.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    #[tracing::instrument(skip(self))]
    pub fn get_user(&self, id: i64) -> Result<User, AppError> {
        tracing::debug!("Querying user");
        self.repo.query(id)
    }
}
