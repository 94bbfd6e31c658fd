//! JSON file gateway
//!
//! Records live in memory and the whole state is rewritten to disk after each
//! successful mutation (write to a sibling temp file, then rename). Reads never
//! touch the disk after open.

use crate::gateway::{BoardGateway, Deletion, StoreState, STORE_FORMAT_VERSION};
use crate::memory::MemoryGateway;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use ticketboard_model::{
    BoardSettings, NewStep, NewTicket, Step, StepId, StepPatch, StoreError, Ticket, TicketId,
    TicketPatch,
};

/// Durable gateway backed by one JSON file
#[derive(Debug)]
pub struct FileGateway {
    path: PathBuf,
    inner: MemoryGateway,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileGateway {
    /// Open a store file, starting empty if it does not exist yet
    ///
    /// # Errors
    /// - `StoreError::Io` if the file cannot be read
    /// - `StoreError::Corrupt` if it is not a store of a known version
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "creating new board store");
                StoreState::default()
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };

        Ok(Self {
            path,
            inner: MemoryGateway::from_state(state).without_journal(),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Path of the backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current state to disk
    ///
    /// # Errors
    /// - `StoreError::Io` if writing or renaming fails
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec_pretty(&self.inner.state())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        let io = |e: std::io::Error| StoreError::Io(format!("{}: {e}", self.path.display()));
        tokio::fs::write(&tmp, bytes).await.map_err(io)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io)?;

        tracing::debug!(path = %self.path.display(), "board store flushed");
        Ok(())
    }

    async fn persisted<R>(&self, result: Result<R, StoreError>) -> Result<R, StoreError> {
        let value = result?;
        self.flush().await?;
        Ok(value)
    }
}

fn decode(bytes: &[u8]) -> Result<StoreState, StoreError> {
    let state: StoreState =
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    if state.format_version != STORE_FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported store format version {}",
            state.format_version
        )));
    }
    Ok(state)
}

#[async_trait]
impl BoardGateway for FileGateway {
    async fn list_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        self.inner.list_tickets().await
    }

    async fn create_ticket(&self, fields: NewTicket) -> Result<Ticket, StoreError> {
        let result = self.inner.create_ticket(fields).await;
        self.persisted(result).await
    }

    async fn update_ticket(&self, id: TicketId, patch: TicketPatch) -> Result<Ticket, StoreError> {
        let result = self.inner.update_ticket(id, patch).await;
        self.persisted(result).await
    }

    async fn delete_ticket(&self, id: TicketId) -> Result<Deletion, StoreError> {
        let result = self.inner.delete_ticket(id).await;
        self.persisted(result).await
    }

    async fn list_steps(&self) -> Result<Vec<Step>, StoreError> {
        self.inner.list_steps().await
    }

    async fn create_step(&self, fields: NewStep) -> Result<Step, StoreError> {
        let result = self.inner.create_step(fields).await;
        self.persisted(result).await
    }

    async fn update_step(&self, id: StepId, patch: StepPatch) -> Result<Step, StoreError> {
        let result = self.inner.update_step(id, patch).await;
        self.persisted(result).await
    }

    async fn delete_step(&self, id: StepId) -> Result<Deletion, StoreError> {
        let result = self.inner.delete_step(id).await;
        self.persisted(result).await
    }

    async fn load_settings(&self) -> Result<BoardSettings, StoreError> {
        self.inner.load_settings().await
    }

    async fn save_settings(&self, settings: BoardSettings) -> Result<(), StoreError> {
        let result = self.inner.save_settings(settings).await;
        self.persisted(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketboard_model::TicketColor;

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");

        let gateway = FileGateway::open(&path).await.unwrap();
        let step = gateway
            .create_step(NewStep {
                name: "Intake".to_string(),
                order_index: None,
            })
            .await
            .unwrap();
        gateway
            .create_ticket(NewTicket {
                ticket_number: 42,
                color: "#00ff00".parse::<TicketColor>().unwrap(),
                notes: "first".to_string(),
                current_step_id: Some(step.id),
                order_index: None,
            })
            .await
            .unwrap();
        gateway
            .save_settings(BoardSettings {
                sequential_numbering: true,
            })
            .await
            .unwrap();
        drop(gateway);

        let reopened = FileGateway::open(&path).await.unwrap();
        let tickets = reopened.list_tickets().await.unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].ticket_number, 42);
        assert_eq!(tickets[0].current_step_id, Some(step.id));
        assert!(reopened.load_settings().await.unwrap().sequential_numbering);
    }

    #[tokio::test]
    async fn mutations_are_not_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::open(dir.path().join("board.json")).await.unwrap();
        for name in ["Intake", "Done"] {
            gateway
                .create_step(NewStep {
                    name: name.to_string(),
                    order_index: None,
                })
                .await
                .unwrap();
        }

        assert!(gateway.inner.journal().is_empty());
        assert_eq!(gateway.list_steps().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::open(dir.path().join("none.json")).await.unwrap();
        assert!(gateway.list_steps().await.unwrap().is_empty());
        assert!(!gateway.path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = FileGateway::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, br#"{"format_version": 99}"#).unwrap();

        let err = FileGateway::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.contains("99")));
    }
}
