//! Shared application state handed to every request.
//!
//! Built once at startup and wrapped in `Arc`. Holds configuration, the
//! token signer, the injected completion service and the audit buffer.
//! There is no per-request mutable state here: the SQLite file is the
//! only shared resource, reached through `open_db`.

use std::sync::{Arc, Mutex};

use crate::completion_service::{
    OllamaCompletionService, RuleBasedResponder, TextCompletionService,
};
use crate::config::AppConfig;
use crate::crypto::TokenSigner;
use crate::db::{self, AuditEntry};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

pub type SharedCompletionService = Arc<dyn TextCompletionService + Send + Sync>;

pub struct CoreState {
    pub config: AppConfig,
    pub tokens: TokenSigner,
    completion: SharedCompletionService,
    audit: AuditLogger,
}

impl CoreState {
    /// Migrate the configured database and assemble the state.
    pub fn new(
        config: AppConfig,
        completion: SharedCompletionService,
    ) -> Result<Self, CoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        drop(db::open_database(&config.db_path)?);

        Ok(Self {
            tokens: TokenSigner::new(&config.jwt_secret),
            config,
            completion,
            audit: AuditLogger::new(),
        })
    }

    /// Pick the completion backend from configuration: the HTTP client when
    /// a URL is set, the keyword responder otherwise.
    ///
    /// Builds a blocking HTTP client, so call this before entering the runtime.
    pub fn completion_from_config(config: &AppConfig) -> Result<SharedCompletionService, CoreError> {
        match &config.completion {
            Some(completion) => {
                let service = OllamaCompletionService::new(completion)
                    .map_err(|e| CoreError::Completion(e.to_string()))?;
                tracing::info!(url = %completion.url, model = %completion.model, "Completion backend configured");
                Ok(Arc::new(service))
            }
            None => {
                tracing::info!("No completion backend configured, using rule-based responder");
                Ok(Arc::new(RuleBasedResponder))
            }
        }
    }

    /// Open a database connection. One per request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_connection(&self.config.db_path).map_err(CoreError::Database)
    }

    pub fn completion(&self) -> SharedCompletionService {
        Arc::clone(&self.completion)
    }

    // ── Audit ───────────────────────────────────────────────

    /// Record an access event; flushes to SQLite once the buffer fills.
    pub fn log_access(&self, actor: &str, action: &str, outcome: &str) {
        if self.audit.log(actor, action, outcome) {
            if let Err(e) = self.flush_audit() {
                tracing::warn!(error = %e, "Audit flush failed");
            }
        }
    }

    /// Write buffered audit entries and prune old ones.
    pub fn flush_audit(&self) -> Result<usize, CoreError> {
        let conn = self.open_db()?;
        let count = self.audit.flush_to_db(&conn)?;
        if count > 0 {
            db::prune_audit_log(&conn, AUDIT_RETENTION_DAYS)?;
        }
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn buffered_audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Cannot prepare data directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Completion backend unavailable: {0}")]
    Completion(String),
}

// ═══════════════════════════════════════════════════════════
// AuditLogger: buffered request trail
// ═══════════════════════════════════════════════════════════

pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Log an access event to the in-memory buffer.
    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, actor: &str, action: &str, outcome: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                actor: actor.to_string(),
                action: action.to_string(),
                outcome: outcome.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }
        db::insert_audit_entries(conn, &entries)?;
        tracing::debug!(count = entries.len(), "Flushed audit entries to database");
        Ok(entries.len())
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test `CoreState` backed by a temporary SQLite file.

    use super::*;
    use crate::completion_service::MockCompletionService;

    pub fn core_with(completion: SharedCompletionService) -> (Arc<CoreState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_tests(&dir.path().join("medinest.db"));
        let core = Arc::new(CoreState::new(config, completion).unwrap());
        (core, dir)
    }

    pub fn core() -> (Arc<CoreState>, tempfile::TempDir) {
        core_with(Arc::new(MockCompletionService::replying("Please consult a doctor.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_migrates_database() {
        let (core, _dir) = testing::core();
        let conn = core.open_db().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn nested_db_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_tests(&dir.path().join("a").join("b").join("medinest.db"));
        assert!(CoreState::new(config, Arc::new(RuleBasedResponder)).is_ok());
    }

    #[test]
    fn audit_buffer_flushes_to_table() {
        let (core, _dir) = testing::core();
        core.log_access("patient:1", "POST /api/users/profile", "status:200");
        assert_eq!(core.buffered_audit_entries().len(), 1);

        assert_eq!(core.flush_audit().unwrap(), 1);
        assert!(core.buffered_audit_entries().is_empty());

        let conn = core.open_db().unwrap();
        let rows = db::query_audit_by_actor(&conn, "patient:1", 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outcome, "status:200");
    }

    #[test]
    fn audit_logger_signals_flush_at_capacity() {
        let logger = AuditLogger::new();
        for _ in 0..AUDIT_BUFFER_CAPACITY - 1 {
            assert!(!logger.log("a", "b", "c"));
        }
        assert!(logger.log("a", "b", "c"));
    }

    #[test]
    fn rule_based_responder_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_tests(&dir.path().join("medinest.db"));
        assert!(CoreState::completion_from_config(&config).is_ok());
    }
}
