//! SQLite user repository.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, first_name, last_name, email, hashed_password, role, created_at";

/// A stored user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a user. The id and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: String,
}

/// A partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub role: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.hashed_password.is_none()
            && self.role.is_none()
    }
}

/// SQLite-backed user repository. E-mail addresses are unique.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open or create a user store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory user store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL,
                hashed_password TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS unique_email_idx ON users(email);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Unavailable("user store lock poisoned".into()))
    }

    /// Insert a user, failing with [`Error::AlreadyExists`] on a duplicate e-mail.
    pub fn add(&self, user: &NewUser) -> Result<UserRecord> {
        let conn = self.lock()?;
        insert(&conn, user)
    }

    /// Insert several users atomically. A duplicate e-mail rolls the whole
    /// batch back and fails with [`Error::AlreadyExists`].
    pub fn add_batch(&self, users: &[NewUser]) -> Result<Vec<UserRecord>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(users.len());
        for user in users {
            inserted.push(insert(&tx, user)?);
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                [email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Fetch the users with the given ids. Unknown ids are skipped.
    pub fn get_batch(&self, ids: &[String]) -> Result<Vec<UserRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id IN ({placeholders}) ORDER BY created_at, email"
        ))?;
        let users = stmt
            .query_map(params_from_iter(ids), user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// List users, optionally restricted to one role, oldest first.
    pub fn list(&self, role: Option<&str>) -> Result<Vec<UserRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE ?1 IS NULL OR role = ?1
             ORDER BY created_at, email"
        ))?;
        let users = stmt
            .query_map([role], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Apply a partial update to the user with `id`.
    pub fn update(&self, id: &str, changes: &UserChanges) -> Result<UserRecord> {
        self.update_where("id", id, changes)
    }

    /// Apply a partial update to the user with `email`.
    pub fn update_by_email(&self, email: &str, changes: &UserChanges) -> Result<UserRecord> {
        self.update_where("email", email, changes)
    }

    fn update_where(&self, column: &str, value: &str, changes: &UserChanges) -> Result<UserRecord> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                &format!(
                    "UPDATE users SET
                        first_name = COALESCE(?2, first_name),
                        last_name = COALESCE(?3, last_name),
                        email = COALESCE(?4, email),
                        hashed_password = COALESCE(?5, hashed_password),
                        role = COALESCE(?6, role)
                     WHERE {column} = ?1"
                ),
                params![
                    value,
                    changes.first_name,
                    changes.last_name,
                    changes.email,
                    changes.hashed_password,
                    changes.role,
                ],
            )
            .map_err(|e| map_conflict(e, changes.email.as_deref().unwrap_or(value)))?;
        if updated == 0 {
            return Err(Error::NotFound(format!("user {column}={value}")));
        }

        // An e-mail update moves the row; look it up by the new address.
        let (column, value) = match (column, &changes.email) {
            ("email", Some(email)) => ("email", email.as_str()),
            _ => (column, value),
        };
        let user = conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
            [value],
            user_from_row,
        )?;
        Ok(user)
    }

    /// Delete the user with `id`, failing with [`Error::NotFound`] if absent.
    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("user id={id}")));
        }
        Ok(())
    }

    /// Delete the users with the given ids, returning how many were removed.
    pub fn delete_batch(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.lock()?;
        let deleted = conn.execute(
            &format!("DELETE FROM users WHERE id IN ({placeholders})"),
            params_from_iter(ids),
        )?;
        Ok(deleted)
    }
}

fn insert(conn: &Connection, user: &NewUser) -> Result<UserRecord> {
    let record = UserRecord {
        id: Uuid::new_v4().to_string(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        hashed_password: user.hashed_password.clone(),
        role: user.role.clone(),
        created_at: Utc::now(),
    };
    conn.execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            record.id,
            record.first_name,
            record.last_name,
            record.email,
            record.hashed_password,
            record.role,
            record.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| map_conflict(e, &user.email))?;
    tracing::debug!(id = %record.id, "inserted user");
    Ok(record)
}

fn map_conflict(err: rusqlite::Error, email: &str) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Error::AlreadyExists(format!("user with email {email}"))
        }
        other => Error::Database(other),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let created_at: String = row.get(6)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);
    Ok(UserRecord {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        hashed_password: row.get(4)?,
        role: row.get(5)?,
        created_at,
    })
}
