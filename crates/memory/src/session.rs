//! Durable conversation/session history.
//!
//! The orchestrator appends one [`SessionRecord`] per successful extraction.
//! Stores are keyed by `(user_id, session_id)` and injected as
//! `Arc<dyn SessionStore>`.

use std::io::{BufRead, BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use concord_config::{MemoryConfig, SessionStoreKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub event_id: Uuid,
    pub user_id: String,
    pub session_id: String,
    pub recorded_at: DateTime<Utc>,
    pub source_messages_count: usize,
    /// Ids of the records committed by this extraction.
    #[serde(default)]
    pub committed_ids: Vec<Uuid>,
    pub extraction_confidence: f32,
    #[serde(default)]
    pub session_summary: Option<String>,
}

impl SessionRecord {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            recorded_at: Utc::now(),
            source_messages_count: 0,
            committed_ids: Vec::new(),
            extraction_confidence: 0.0,
            session_summary: None,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append(&self, record: SessionRecord) -> Result<()>;

    /// Records for one session, oldest first.
    async fn history(&self, user_id: &str, session_id: &str) -> Result<Vec<SessionRecord>>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: Mutex<Vec<SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(&self, record: SessionRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn history(&self, user_id: &str, session_id: &str) -> Result<Vec<SessionRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && r.session_id == session_id)
            .cloned()
            .collect())
    }
}

/// Append-only JSONL file, one record per line.
///
/// Clones share one write lock, so appends through the same store never
/// interleave.
#[derive(Debug, Clone)]
pub struct JsonlSessionStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every parsable record.  Corrupt lines are skipped and copied to a
    /// `.corrupt` sidecar.
    pub fn load(&self) -> Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut corrupt_count = 0usize;

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<SessionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    corrupt_count += 1;
                    warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt session record, skipping line"
                    );
                    self.preserve_corrupt_line(&line);
                }
            }
        }

        if corrupt_count > 0 {
            warn!(
                corrupt_lines = corrupt_count,
                path = %self.path.display(),
                "session log loaded with skipped corrupt lines"
            );
        }

        Ok(records)
    }

    fn preserve_corrupt_line(&self, line: &str) {
        let corrupt_path = self.path.with_extension("jsonl.corrupt");
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&corrupt_path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(err) = written {
            warn!(error = %err, path = %corrupt_path.display(), "could not write corrupt sidecar");
        }
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn append(&self, record: SessionRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn history(&self, user_id: &str, session_id: &str) -> Result<Vec<SessionRecord>> {
        let store = self.clone();
        let records = tokio::task::spawn_blocking(move || store.load()).await??;
        Ok(records
            .into_iter()
            .filter(|r| r.user_id == user_id && r.session_id == session_id)
            .collect())
    }
}

/// Build the store selected in `[memory]`.
pub fn open_session_store(config: &MemoryConfig) -> Arc<dyn SessionStore> {
    match config.session_store {
        SessionStoreKind::Memory => Arc::new(InMemorySessionStore::new()),
        SessionStoreKind::Jsonl => Arc::new(JsonlSessionStore::new(&config.session_log_path)),
    }
}
