//! User credential storage: a single `users` table in a SQLite database.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("opening users database at {}", db_path.as_ref().display()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL
            )",
            [],
        )
        .context("creating users table")?;
        Ok(UserStore {
            conn: Mutex::new(conn),
        })
    }

    pub async fn create_user(&self, username: &str, password_plain: &str) -> Result<User> {
        let hash = bcrypt::hash(password_plain, bcrypt::DEFAULT_COST).context("hashing password")?;
        let username = username.to_string();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, hash],
        )?;
        let id = conn.last_insert_rowid();
        Ok(User {
            id,
            username,
            password_hash: hash,
        })
    }

    pub async fn verify_credentials(&self, username: &str, password_plain: &str) -> Result<User> {
        let user = self.find_by_username(username)?;
        let ok = bcrypt::verify(password_plain, &user.password_hash).context("verifying password")?;
        if ok {
            Ok(user)
        } else {
            Err(anyhow::anyhow!("invalid username or password"))
        }
    }

    fn find_by_username(&self, username: &str) -> Result<User> {
        let conn = self.lock();
        let user = conn
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| anyhow::anyhow!("invalid username or password"))?;
        Ok(user)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("users db mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_verify_round_trips() {
        let store = UserStore::open(":memory:").unwrap();
        store.create_user("alice", "correct horse").await.unwrap();
        let user = store
            .verify_credentials("alice", "correct horse")
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let store = UserStore::open(":memory:").unwrap();
        store.create_user("bob", "hunter2").await.unwrap();
        assert!(store.verify_credentials("bob", "wrong").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_username_fails() {
        let store = UserStore::open(":memory:").unwrap();
        store.create_user("carol", "pw1").await.unwrap();
        assert!(store.create_user("carol", "pw2").await.is_err());
    }

    #[tokio::test]
    async fn unknown_username_is_rejected() {
        let store = UserStore::open(":memory:").unwrap();
        assert!(store.verify_credentials("ghost", "whatever").await.is_err());
    }
}
