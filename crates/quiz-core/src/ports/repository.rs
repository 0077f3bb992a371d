use async_trait::async_trait;

use crate::domain::{Quiz, User};
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Save an entity. Entities with id `0` are inserted and receive a new id.
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, i64> {
    /// Find a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    /// Every user, ordered by id.
    async fn find_all(&self) -> Result<Vec<User>, RepoError>;
}

/// Quiz repository.
#[async_trait]
pub trait QuizRepository: BaseRepository<Quiz, i64> {
    /// All quizzes created by a user, newest first.
    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Quiz>, RepoError>;
}
