// JSON file backed complaint store.
//
// Every operation takes an advisory lock on `<path>.lock` via fd-lock, so
// several processes can share one file. Writes go to a temp file that is
// fsynced and renamed over the original.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{apply_attachment, apply_status_change, sort_by_id, ComplaintStore, StoreError};
use crate::workflow::types::{
    AttachmentRef, Complaint, ComplaintFilter, ComplaintId, HistoryEntry, NewComplaint,
};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    format_version: u32,
    last_sequence: u64,
    complaints: Vec<Complaint>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            last_sequence: 0,
            complaints: Vec::new(),
        }
    }
}

impl StoreFile {
    fn find_mut(&mut self, id: &ComplaintId) -> Result<&mut Complaint, StoreError> {
        self.complaints
            .iter_mut()
            .find(|complaint| &complaint.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn verify(&self) -> Result<(), StoreError> {
        if self.format_version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        for complaint in &self.complaints {
            let last = complaint.last_entry().map(|entry| entry.status);
            if last != Some(complaint.status) {
                return Err(StoreError::Corrupt(format!(
                    "complaint {} history ends at {:?} but status is {}",
                    complaint.id, last, complaint.status
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileComplaintStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileComplaintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = PathBuf::from(format!("{}.lock", path.display()));
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_with<T, F>(&self, read: F) -> Result<T, StoreError>
    where
        F: FnOnce(StoreFile) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        run_blocking(move || {
            let lock = fd_lock::RwLock::new(open_lock_file(&lock_path)?);
            let _guard = lock.read()?;
            read(load(&path)?)
        })
        .await
    }

    async fn update_with<T, F>(&self, update: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StoreFile) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        run_blocking(move || {
            let mut lock = fd_lock::RwLock::new(open_lock_file(&lock_path)?);
            let _guard = lock.write()?;
            let mut data = load(&path)?;
            // A failed update leaves the file untouched.
            let result = update(&mut data)?;
            persist(&path, &data)?;
            Ok(result)
        })
        .await
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
}

fn open_lock_file(lock_path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

fn load(path: &Path) -> Result<StoreFile, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreFile::default()),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(StoreFile::default());
    }
    let data: StoreFile = serde_json::from_slice(&bytes)?;
    data.verify()?;
    Ok(data)
}

fn persist(path: &Path, data: &StoreFile) -> Result<(), StoreError> {
    let serialized = serde_json::to_vec_pretty(data)?;
    let temp_path = PathBuf::from(format!("{}.tmp", path.display()));
    {
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&serialized)?;
        temp.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    debug!(path = %path.display(), bytes = serialized.len(), "Complaint store persisted");
    Ok(())
}

#[async_trait]
impl ComplaintStore for FileComplaintStore {
    async fn insert(&self, new: NewComplaint) -> Result<Complaint, StoreError> {
        self.update_with(move |data| {
            data.last_sequence += 1;
            let complaint = Complaint::from_new(ComplaintId::from_sequence(data.last_sequence), new);
            data.complaints.push(complaint.clone());
            Ok(complaint)
        })
        .await
    }

    async fn get(&self, id: &ComplaintId) -> Result<Option<Complaint>, StoreError> {
        let id = id.clone();
        self.read_with(move |data| {
            Ok(data
                .complaints
                .into_iter()
                .find(|complaint| complaint.id == id))
        })
        .await
    }

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>, StoreError> {
        let filter = filter.clone();
        self.read_with(move |data| {
            let mut matching: Vec<Complaint> = data
                .complaints
                .into_iter()
                .filter(|complaint| filter.matches(complaint))
                .collect();
            sort_by_id(&mut matching);
            Ok(matching)
        })
        .await
    }

    async fn compare_and_set_status(
        &self,
        id: &ComplaintId,
        expected_version: u64,
        entry: HistoryEntry,
    ) -> Result<Complaint, StoreError> {
        let id = id.clone();
        self.update_with(move |data| {
            let complaint = data.find_mut(&id)?;
            apply_status_change(complaint, expected_version, entry)?;
            Ok(complaint.clone())
        })
        .await
    }

    async fn append_attachment(
        &self,
        id: &ComplaintId,
        attachment: AttachmentRef,
    ) -> Result<Complaint, StoreError> {
        let id = id.clone();
        self.update_with(move |data| {
            let complaint = data.find_mut(&id)?;
            apply_attachment(complaint, attachment);
            Ok(complaint.clone())
        })
        .await
    }
}
