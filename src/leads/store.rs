//! Durable lead storage.
//!
//! Leads live in a single JSON file holding the whole collection. Every
//! mutation reloads the file, applies the change, and replaces the file via
//! write-to-temp + rename, so readers only ever see a complete collection.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::model::{Lead, LeadFields, LeadStatus, OperatorId};
use crate::error::StoreError;

/// Append-only collection of leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Persist a new lead with the next id. On error nothing was created.
    async fn append(&self, fields: LeadFields) -> Result<Lead, StoreError>;

    /// Total number of leads ever appended.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Number of leads currently in `status`.
    async fn count_by_status(&self, status: LeadStatus) -> Result<usize, StoreError>;

    /// Move a lead to `status`. Returns `false` if the lead does not exist,
    /// the transition is not allowed (e.g. Claimed → New), or `Claimed` is
    /// requested without an operator.
    async fn set_status(
        &self,
        id: u64,
        status: LeadStatus,
        claimed_by: Option<OperatorId>,
    ) -> Result<bool, StoreError>;

    /// Look up a lead by id.
    async fn get(&self, id: u64) -> Result<Option<Lead>, StoreError>;

    /// All leads in id order.
    async fn list(&self) -> Result<Vec<Lead>, StoreError>;
}

/// JSON-file backed [`LeadStore`].
pub struct JsonFileLeadStore {
    path: PathBuf,
    /// Serializes the read-modify-write cycle.
    write_lock: Mutex<()>,
}

impl JsonFileLeadStore {
    /// Create a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store and verify the existing file (if any) is readable.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(path);
        let leads = store.load().await?;
        info!(path = %store.path.display(), leads = leads.len(), "Lead store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn load(&self) -> Result<Vec<Lead>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn save(&self, leads: &[Lead]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_vec_pretty(leads)?;
        let tmp = self.temp_path();
        if let Err(e) = write_synced(&tmp, &json).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.io_error(e));
        }
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), leads = leads.len(), "Lead file written");
        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl LeadStore for JsonFileLeadStore {
    async fn append(&self, fields: LeadFields) -> Result<Lead, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut leads = self.load().await?;
        let lead = Lead::new(leads.len() as u64 + 1, fields);
        leads.push(lead.clone());
        self.save(&leads).await?;

        info!(lead_id = lead.id, user_id = lead.user_id, "Lead stored");
        Ok(lead)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.len())
    }

    async fn count_by_status(&self, status: LeadStatus) -> Result<usize, StoreError> {
        Ok(self
            .load()
            .await?
            .iter()
            .filter(|l| l.status == status)
            .count())
    }

    async fn set_status(
        &self,
        id: u64,
        status: LeadStatus,
        claimed_by: Option<OperatorId>,
    ) -> Result<bool, StoreError> {
        if status == LeadStatus::Claimed && claimed_by.is_none() {
            warn!(lead_id = id, "Claim without an operator rejected");
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;

        let mut leads = self.load().await?;
        let Some(lead) = leads.iter_mut().find(|l| l.id == id) else {
            debug!(lead_id = id, "Status change for unknown lead");
            return Ok(false);
        };

        if !lead.status.can_transition_to(status) {
            warn!(lead_id = id, from = %lead.status, to = %status, "Rejected lead status change");
            return Ok(false);
        }

        lead.status = status;
        if status == LeadStatus::Claimed {
            lead.claimed_by = claimed_by;
            lead.claimed_at = Some(Utc::now());
        }
        self.save(&leads).await?;

        info!(lead_id = id, status = %status, claimed_by = ?claimed_by, "Lead status changed");
        Ok(true)
    }

    async fn get(&self, id: u64) -> Result<Option<Lead>, StoreError> {
        Ok(self.load().await?.into_iter().find(|l| l.id == id))
    }

    async fn list(&self) -> Result<Vec<Lead>, StoreError> {
        self.load().await
    }
}
