//! In-memory model index for tests and dry runs.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use collab_core::ModelRecord;

use crate::registrar::{ModelIndex, RegistrationError};

/// Records every submitted [`ModelRecord`]. Optionally refuses all of them.
#[derive(Debug, Default)]
pub struct MemoryModelIndex {
    submissions: Mutex<Vec<ModelRecord>>,
    unavailable: bool,
}

impl MemoryModelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index that answers every submission with 503.
    pub fn failing() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    /// Records accepted so far.
    pub fn submissions(&self) -> Vec<ModelRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ModelRecord>> {
        self.submissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ModelIndex for MemoryModelIndex {
    async fn submit(&self, record: &ModelRecord) -> Result<(), RegistrationError> {
        if self.unavailable {
            return Err(RegistrationError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.lock().push(record.clone());
        Ok(())
    }
}
