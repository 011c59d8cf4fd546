//! In-memory file store for unit tests.

use std::sync::Mutex;

use super::{FileStore, ServiceError, ServiceResult};
use crate::model::{FileId, FolderId};

#[derive(Debug, Default)]
struct State {
    folders: Vec<(FolderId, String, Option<FolderId>)>,
    files: Vec<(FileId, String, FolderId, Vec<u8>)>,
    create_folder_calls: usize,
    upload_attempts: usize,
    failing_uploads: usize,
    fail_folders: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn create_folder_calls(&self) -> usize {
        self.state().create_folder_calls
    }

    pub fn upload_attempts(&self) -> usize {
        self.state().upload_attempts
    }

    pub fn file_names(&self) -> Vec<String> {
        self.state().files.iter().map(|f| f.1.clone()).collect()
    }

    /// Makes the next `n` uploads fail.
    pub fn fail_uploads(&self, n: usize) {
        self.state().failing_uploads = n;
    }

    pub fn fail_folder_calls(&self) {
        self.state().fail_folders = true;
    }

    /// Names from the root down to `id`.
    pub fn folder_path(&self, id: &FolderId) -> Vec<String> {
        let state = self.state();
        let mut names = Vec::new();
        let mut current = Some(id.clone());
        while let Some(id) = current.take() {
            let Some((_, name, parent)) = state.folders.iter().find(|f| f.0 == id) else {
                break;
            };
            names.push(name.clone());
            current.clone_from(parent);
        }
        names.reverse();
        names
    }
}

fn unavailable() -> ServiceError {
    ServiceError::Api {
        status: 503,
        message: "Service unavailable".to_string(),
    }
}

impl FileStore for MemoryStore {
    async fn list_folders(
        &self,
        name: &str,
        parent: Option<&FolderId>,
    ) -> ServiceResult<Vec<FolderId>> {
        let state = self.state();
        if state.fail_folders {
            return Err(unavailable());
        }
        Ok(state
            .folders
            .iter()
            .filter(|f| f.1 == name && f.2.as_ref() == parent)
            .map(|f| f.0.clone())
            .collect())
    }

    async fn create_folder(&self, name: &str, parent: Option<&FolderId>) -> ServiceResult<FolderId> {
        let mut state = self.state();
        if state.fail_folders {
            return Err(unavailable());
        }
        state.create_folder_calls += 1;
        let id = FolderId(format!("folder-{}", state.folders.len() + 1));
        state
            .folders
            .push((id.clone(), name.to_string(), parent.cloned()));
        Ok(id)
    }

    async fn create_file(&self, name: &str, parent: &FolderId, data: &[u8]) -> ServiceResult<FileId> {
        let mut state = self.state();
        state.upload_attempts += 1;
        if state.failing_uploads > 0 {
            state.failing_uploads -= 1;
            return Err(unavailable());
        }
        let id = FileId(format!("file-{}", state.files.len() + 1));
        state
            .files
            .push((id.clone(), name.to_string(), parent.clone(), data.to_vec()));
        Ok(id)
    }
}
