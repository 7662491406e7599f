use std::fmt;

use crate::passages::Difficulty;
use crate::session::{ReferenceText, ResultRecord};
use crate::store::{LeaderboardEntry, Store, StoreError, StoredResult, UserRecord, UserUpdate};

/// What can go wrong between a caller and the store.
///
/// Validation failures are rejected before any store call. A missing
/// passage is a `NotFound`, not a fault. Backend failures arrive here as
/// `Store` with a message; the raw driver error never crosses this
/// boundary.
#[derive(Debug)]
pub enum ServiceError {
    Validation(String),
    NotFound(String),
    Store(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Validation(msg) => write!(f, "validation error: {msg}"),
            ServiceError::NotFound(msg) => write!(f, "not found: {msg}"),
            ServiceError::Store(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Store(err.to_string())
    }
}

/// Business-logic bridge between the front-end and the store: validation
/// first, then a pass-through to the matching store capability.
pub struct TypeMaster<S> {
    store: S,
}

impl<S: Store> TypeMaster<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the user with this username, creating it on first sight.
    pub fn register_user(
        &self,
        username: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<UserRecord, ServiceError> {
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(ServiceError::Validation(
                "username and email are required".to_string(),
            ));
        }
        if let Some(existing) = self.store.find_user(username)? {
            return Ok(existing);
        }
        Ok(self.store.create_user(username, email, full_name)?)
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>, ServiceError> {
        Ok(self.store.list_users()?)
    }

    pub fn update_user(&self, id: i64, update: &UserUpdate) -> Result<UserRecord, ServiceError> {
        self.store
            .update_user(id, update)?
            .ok_or_else(|| ServiceError::NotFound(format!("no user with id {id}")))
    }

    pub fn delete_user(&self, id: i64) -> Result<(), ServiceError> {
        if self.store.delete_user(id)? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("no user with id {id}")))
        }
    }

    pub fn add_text(
        &self,
        content: &str,
        difficulty: Difficulty,
    ) -> Result<ReferenceText, ServiceError> {
        if content.trim().is_empty() {
            return Err(ServiceError::Validation("content is required".to_string()));
        }
        Ok(self.store.add_text(content, difficulty)?)
    }

    /// One random passage for the requested tier.
    pub fn random_text(&self, difficulty: Difficulty) -> Result<ReferenceText, ServiceError> {
        self.store
            .random_text(difficulty)?
            .ok_or_else(|| ServiceError::NotFound(format!("no {difficulty} passages available")))
    }

    pub fn submit_result(&self, record: &ResultRecord) -> Result<StoredResult, ServiceError> {
        if record.user_id <= 0 || record.text_id <= 0 {
            return Err(ServiceError::Validation(
                "user id and text id are required".to_string(),
            ));
        }
        Ok(self.store.insert_result(record)?)
    }

    pub fn user_results(&self, user_id: i64) -> Result<Vec<StoredResult>, ServiceError> {
        Ok(self.store.results_for_user(user_id)?)
    }

    pub fn best_result(&self, user_id: i64) -> Result<Option<StoredResult>, ServiceError> {
        Ok(self.store.best_result_for_user(user_id)?)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        Ok(self.store.leaderboard(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use assert_matches::assert_matches;

    fn service() -> TypeMaster<SqliteStore> {
        TypeMaster::new(SqliteStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_register_requires_username_and_email() {
        let tm = service();
        assert_matches!(
            tm.register_user("", "a@example.com", None),
            Err(ServiceError::Validation(_))
        );
        assert_matches!(
            tm.register_user("ada", "   ", None),
            Err(ServiceError::Validation(_))
        );
    }

    #[test]
    fn test_register_is_create_or_fetch() {
        let tm = service();
        let first = tm.register_user("ada", "a@example.com", None).unwrap();
        let second = tm.register_user("ada", "other@example.com", None).unwrap();
        assert_eq!(first.id, second.id);
        // the original row wins
        assert_eq!(second.email, "a@example.com");
    }

    #[test]
    fn test_update_and_delete_surface_not_found() {
        let tm = service();
        assert_matches!(
            tm.update_user(404, &UserUpdate::default()),
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(tm.delete_user(404), Err(ServiceError::NotFound(_)));

        let user = tm.register_user("ada", "a@example.com", None).unwrap();
        tm.delete_user(user.id).unwrap();
        assert!(tm.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_add_text_rejects_blank_content() {
        let tm = service();
        assert_matches!(
            tm.add_text("  \n ", Difficulty::Easy),
            Err(ServiceError::Validation(_))
        );
    }

    #[test]
    fn test_random_text_not_found_on_empty_tier() {
        let tm = service();
        assert_matches!(
            tm.random_text(Difficulty::Hard),
            Err(ServiceError::NotFound(_))
        );

        tm.add_text("a hard passage", Difficulty::Hard).unwrap();
        let text = tm.random_text(Difficulty::Hard).unwrap();
        assert_eq!(text.content, "a hard passage");
    }

    #[test]
    fn test_submit_result_validates_ids() {
        let tm = service();
        let bad = ResultRecord {
            user_id: 0,
            text_id: 1,
            wpm: 50.0,
            accuracy: 100.0,
            mistakes: 0,
            duration: 10.0,
        };
        assert_matches!(tm.submit_result(&bad), Err(ServiceError::Validation(_)));
    }

    #[test]
    fn test_submit_then_leaderboard() {
        let tm = service();
        let user = tm.register_user("ada", "a@example.com", None).unwrap();
        let text = tm.add_text("passage", Difficulty::Easy).unwrap();

        tm.submit_result(&ResultRecord {
            user_id: user.id,
            text_id: text.id,
            wpm: 64.2,
            accuracy: 98.1,
            mistakes: 1,
            duration: 42.0,
        })
        .unwrap();

        let board = tm.leaderboard(10).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].username, "ada");
        assert_eq!(board[0].wpm, 64.2);

        let best = tm.best_result(user.id).unwrap().unwrap();
        assert_eq!(best.wpm, 64.2);
        assert_eq!(tm.user_results(user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_store_error_converts_to_service_variant() {
        let tm = service();
        tm.register_user("ada", "a@example.com", None).unwrap();
        // a second create with the same username hits the UNIQUE constraint
        let err = tm.store().create_user("ada", "b@example.com", None);
        let service_err: ServiceError = err.unwrap_err().into();
        assert_matches!(service_err, ServiceError::Store(_));
    }
}
