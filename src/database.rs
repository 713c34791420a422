//! Database initialization and table definitions
//!
//! This module handles the setup of the embedded redb database, the shared
//! application state, and the user/token tables that identify callers.

use std::sync::Arc;

use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::calculator::DEFAULT_AUCTION_OVERHEAD;
use crate::error::AppResult;
use crate::model::User;

/// Main table for storing listings
///
/// Key: listing id
/// Value: JSON-serialized `Listing`
pub const TABLE_LISTINGS: TableDefinition<&str, &str> = TableDefinition::new("listings_v1");

/// Users that may call the API
///
/// Key: user id
/// Value: JSON-serialized `User`
pub const TABLE_USERS: TableDefinition<&str, &str> = TableDefinition::new("users_v1");

/// Index from bearer token to user id
///
/// Example:
/// - Key: "k3Jd9sPq0aLm2x7Y"
/// - Value: "u8f2k1n0q9z3"
pub const TABLE_USER_TOKENS: TableDefinition<&str, &str> = TableDefinition::new("user_tokens_v1");

/// Runtime settings handlers need besides the database
#[derive(Debug, Clone)]
pub struct Settings {
    /// Auction overhead assumed by the live profit calculator
    pub auction_overhead: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auction_overhead: DEFAULT_AUCTION_OVERHEAD,
        }
    }
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self::with_settings(db, Settings::default())
    }

    pub fn with_settings(db: Database, settings: Settings) -> Self {
        Self {
            db: Arc::new(db),
            settings: Arc::new(settings),
        }
    }
}

/// Initializes the embedded database and creates required tables
///
/// # Example
///
/// ```no_run
/// # use auction_listings::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_LISTINGS)?;
        write_txn.open_table(TABLE_USERS)?;
        write_txn.open_table(TABLE_USER_TOKENS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Generates a random alphanumeric identifier
pub fn random_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Registers a user and binds `token` to it
///
/// An existing user with the same email keeps its id; its profile and admin
/// flag are overwritten and the token is (re)bound to it.
pub fn upsert_user(
    db: &Database,
    email: &str,
    username: &str,
    is_admin: bool,
    token: &str,
) -> AppResult<User> {
    let write_txn = db.begin_write()?;
    let user = {
        let mut users = write_txn.open_table(TABLE_USERS)?;

        let mut existing = None;
        for entry in users.iter()? {
            let (_, value) = entry?;
            let user: User = serde_json::from_str(value.value())?;
            if user.email.eq_ignore_ascii_case(email) {
                existing = Some(user.id);
                break;
            }
        }

        let user = User {
            id: existing.unwrap_or_else(|| random_id(12)),
            email: email.to_string(),
            username: username.to_string(),
            is_admin,
        };
        let user_json = serde_json::to_string(&user)?;
        users.insert(user.id.as_str(), user_json.as_str())?;

        let mut tokens = write_txn.open_table(TABLE_USER_TOKENS)?;
        tokens.insert(token, user.id.as_str())?;

        user
    };
    write_txn.commit()?;

    tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User registered");
    Ok(user)
}

/// Resolves a bearer token to its user, if any
pub fn find_user_by_token(db: &Database, token: &str) -> AppResult<Option<User>> {
    let read_txn = db.begin_read()?;
    let tokens = read_txn.open_table(TABLE_USER_TOKENS)?;

    let Some(user_id) = tokens.get(token)?.map(|guard| guard.value().to_string()) else {
        return Ok(None);
    };

    let users = read_txn.open_table(TABLE_USERS)?;
    let found = users.get(user_id.as_str())?.map(|guard| guard.value().to_string());
    match found {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => {
            tracing::warn!(%user_id, "Token bound to a missing user");
            Ok(None)
        }
    }
}

/// Loads every user keyed by id
pub fn load_users(db: &Database) -> AppResult<std::collections::HashMap<String, User>> {
    let read_txn = db.begin_read()?;
    let users = read_txn.open_table(TABLE_USERS)?;

    let mut by_id = std::collections::HashMap::new();
    for entry in users.iter()? {
        let (_, value) = entry?;
        let user: User = serde_json::from_str(value.value())?;
        by_id.insert(user.id.clone(), user);
    }
    Ok(by_id)
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn token_resolves_to_registered_user() {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();

        let admin = upsert_user(&db, "admin@example.com", "admin", true, "tok-admin").unwrap();
        let found = find_user_by_token(&db, "tok-admin").unwrap().unwrap();

        assert_eq!(found, admin);
        assert!(find_user_by_token(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn upsert_keeps_id_for_same_email() {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();

        let first = upsert_user(&db, "a@example.com", "a", false, "t1").unwrap();
        let second = upsert_user(&db, "A@example.com", "a2", true, "t2").unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_admin);
        assert_eq!(load_users(&db).unwrap().len(), 1);
        assert_eq!(find_user_by_token(&db, "t1").unwrap().unwrap().username, "a2");
    }

    #[test]
    fn random_ids_have_requested_length() {
        let id = random_id(12);
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
