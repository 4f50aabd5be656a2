//! Shared application state.
//!
//! `CoreState` is built once at startup, wrapped in `Arc` and handed to the
//! HTTP layer. The SQLite connection sits behind a `Mutex`: handlers lock it
//! for one synchronous service call and never hold the guard across `.await`.
//! Password hashing and storage uploads run with the guard released.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::Connection;

use crate::auth::TokenSigner;
use crate::config::{Config, StorageConfig};
use crate::db;
use crate::error::ServiceError;
use crate::storage::{HttpStore, LocalStore, ObjectStore};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db: Mutex<Connection>,
    pub signer: TokenSigner,
    pub storage: ObjectStore,
    pub config: Config,
}

impl CoreState {
    pub fn new(conn: Connection, signer: TokenSigner, storage: ObjectStore, config: Config) -> Self {
        Self {
            db: Mutex::new(conn),
            signer,
            storage,
            config,
        }
    }

    /// Open the database, apply migrations and wire the configured backends.
    pub fn from_config(config: Config) -> Result<Self, CoreError> {
        let conn = db::open_database(&config.db_path)?;

        let ttl = chrono::Duration::hours(config.token_ttl_hours);
        let signer = match &config.token_secret {
            Some(secret) => TokenSigner::new(secret.as_bytes(), ttl),
            None => {
                tracing::warn!("CAREHOME_TOKEN_SECRET not set, using a per-process secret; sessions end on restart");
                let mut secret = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                TokenSigner::new(&secret, ttl)
            }
        };

        let storage = match &config.storage {
            StorageConfig::Http { url, bucket, key } => ObjectStore::Http(HttpStore::new(url, bucket, key)),
            StorageConfig::Local { dir, public_base } => {
                std::fs::create_dir_all(dir)?;
                ObjectStore::Local(LocalStore::new(dir.clone(), public_base))
            }
        };

        tracing::info!(db = %config.db_path.display(), "Core state ready");
        Ok(Self::new(conn, signer, storage, config))
    }

    /// Lock the database connection.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn password_iterations(&self) -> u32 {
        self.config.password_iterations
    }

    /// Create the first admin from configuration when no admin exists yet.
    pub fn bootstrap_admin(&self, now: DateTime<Utc>) -> Result<(), CoreError> {
        let (Some(email), Some(password)) = (&self.config.admin_email, &self.config.admin_password) else {
            return Ok(());
        };
        let conn = self.db()?;
        crate::auth::bootstrap_admin(&conn, email, password, self.password_iterations(), now)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Service(#[from] ServiceError),
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => ServiceError::from(e),
            CoreError::Service(e) => e,
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::identity::tests::FAST;

    /// In-memory state with a local object store under `media_dir`.
    pub(crate) fn test_state(media_dir: &std::path::Path) -> CoreState {
        let config = Config {
            password_iterations: FAST,
            token_secret: Some("core-test-secret".into()),
            storage: StorageConfig::Local {
                dir: media_dir.to_path_buf(),
                public_base: "http://media.test".into(),
            },
            ..Config::default()
        };
        CoreState::new(
            db::open_memory_database().unwrap(),
            TokenSigner::new(b"core-test-secret", chrono::Duration::hours(1)),
            ObjectStore::Local(LocalStore::new(media_dir, "http://media.test")),
            config,
        )
    }

    #[test]
    fn bootstrap_admin_only_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        state.bootstrap_admin(Utc::now()).unwrap();
        assert!(db::get_user_by_email(&state.db().unwrap(), "root@example.com").unwrap().is_none());

        state.config.admin_email = Some("root@example.com".into());
        state.config.admin_password = Some("root-password".into());
        state.bootstrap_admin(Utc::now()).unwrap();
        state.bootstrap_admin(Utc::now()).unwrap();
        let conn = state.db().unwrap();
        let admin = db::get_user_by_email(&conn, "root@example.com").unwrap().unwrap();
        assert!(admin.password_set);
    }

    #[test]
    fn from_config_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("nested/carehome.db"),
            storage: StorageConfig::Local {
                dir: dir.path().join("media"),
                public_base: "http://localhost/media".into(),
            },
            ..Config::default()
        };
        let state = CoreState::from_config(config).unwrap();
        assert!(dir.path().join("nested/carehome.db").exists());
        assert!(dir.path().join("media").is_dir());
        assert!(db::count_tables(&state.db().unwrap()).unwrap() > 10);
    }

    #[test]
    fn lock_errors_become_internal() {
        let err = ServiceError::from(CoreError::LockPoisoned);
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
