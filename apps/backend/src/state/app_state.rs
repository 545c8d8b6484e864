use std::sync::Arc;

use crate::game::Directory;
use crate::store::CoordinationStore;
use crate::words::WordService;

/// Shared per-process state handed to every route.
#[derive(Clone)]
pub struct AppState {
    directory: Arc<Directory>,
    store_backend: &'static str,
}

impl AppState {
    pub fn new(directory: Arc<Directory>, store_backend: &'static str) -> Self {
        Self {
            directory,
            store_backend,
        }
    }

    pub fn directory(&self) -> Arc<Directory> {
        self.directory.clone()
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        self.directory.store()
    }

    pub fn words(&self) -> &Arc<dyn WordService> {
        self.directory.words()
    }

    /// Label reported by `/health`: "redis" or "memory".
    pub fn store_backend(&self) -> &'static str {
        self.store_backend
    }
}
