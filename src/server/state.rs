//! Application state shared across handlers.

use crate::auth::{self, SessionStore};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::library::{self, Book};
use axum::http::{HeaderMap, header};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, built once at startup.
    pub config: Arc<Config>,
    /// Login sessions.
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Create application state from the startup configuration.
    pub fn new(config: Config) -> Self {
        let sessions = SessionStore::new(config.auth.session_days);
        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
        }
    }

    /// Base URL for generating absolute links.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if self.config.proxy.enabled {
            return self.config.proxy.public_url();
        }

        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");

        format!("{}://{}", proto, host)
    }

    /// Whether the request may pass the auth gate.
    pub fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        !self.config.auth.enabled()
            || auth::is_authenticated(&self.config.auth, &self.sessions, headers)
    }

    /// Map an untrusted filename to a path below the books directory.
    pub fn book_path(&self, filename: &str) -> Result<PathBuf> {
        library::resolve_book_path(&self.config.library.books_dir, filename)
    }

    /// Like [`AppState::book_path`], but the file must exist.
    pub fn existing_book_path(&self, filename: &str) -> Result<PathBuf> {
        let path = self.book_path(filename)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(AppError::NotFound(filename.to_string()))
        }
    }

    /// List the books directory off the async runtime.
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        let root = self.config.library.books_dir.clone();
        tokio::task::spawn_blocking(move || library::scan(&root))
            .await
            .map_err(|e| AppError::Internal(format!("Library scan task failed: {}", e)))?
    }
}
