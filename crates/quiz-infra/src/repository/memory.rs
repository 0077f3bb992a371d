//! In-process repositories backed by `RwLock<HashMap>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use quiz_core::domain::{Quiz, User};
use quiz_core::error::RepoError;
use quiz_core::ports::{BaseRepository, QuizRepository, UserRepository};

/// Users keyed by id. Emails are unique, compared case-insensitively.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseRepository<User, i64> for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn save(&self, mut user: User) -> Result<User, RepoError> {
        let mut users = self.users.write().await;

        let taken = users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(RepoError::Constraint(format!(
                "email `{}` is already registered",
                user.email
            )));
        }

        if user.id == 0 {
            user.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        } else if !users.contains_key(&user.id) {
            return Err(RepoError::NotFound);
        } else {
            user.updated_at = Utc::now();
        }

        users.insert(user.id, user.clone());
        tracing::debug!(user_id = user.id, "User saved");
        Ok(user)
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<User>, RepoError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}

/// Quizzes keyed by id. Questions get their own id sequence on first save.
#[derive(Default)]
pub struct InMemoryQuizRepository {
    quizzes: RwLock<HashMap<i64, Quiz>>,
    next_quiz_id: AtomicI64,
    next_question_id: AtomicI64,
}

impl InMemoryQuizRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseRepository<Quiz, i64> for InMemoryQuizRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Quiz>, RepoError> {
        Ok(self.quizzes.read().await.get(&id).cloned())
    }

    async fn save(&self, mut quiz: Quiz) -> Result<Quiz, RepoError> {
        let mut quizzes = self.quizzes.write().await;

        if quiz.id == 0 {
            quiz.id = self.next_quiz_id.fetch_add(1, Ordering::Relaxed) + 1;
        } else if !quizzes.contains_key(&quiz.id) {
            return Err(RepoError::NotFound);
        }

        for question in quiz.questions.iter_mut().filter(|q| q.id == 0) {
            question.id = self.next_question_id.fetch_add(1, Ordering::Relaxed) + 1;
        }

        quizzes.insert(quiz.id, quiz.clone());
        tracing::debug!(quiz_id = quiz.id, user_id = quiz.user_id, "Quiz saved");
        Ok(quiz)
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        self.quizzes
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Quiz>, RepoError> {
        let mut owned: Vec<Quiz> = self
            .quizzes
            .read()
            .await
            .values()
            .filter(|q| q.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }
}
