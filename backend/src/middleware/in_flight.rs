//! Per-quotation request serialization
//!
//! Planning the same quotation twice at once would race on the
//! delete-and-recreate step, so the request layer admits one planning run
//! per quotation and answers the rest with 409 Conflict.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Set of quotations with a planning run in progress
#[derive(Clone, Default)]
pub struct InFlightQuotations {
    active: Arc<Mutex<HashSet<Uuid>>>,
}

/// Held while a quotation is being planned; releases it on drop
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Uuid>>>,
    quotation_id: Uuid,
}

impl InFlightQuotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a quotation, failing if another request already holds it
    pub fn try_acquire(&self, quotation_id: Uuid) -> AppResult<InFlightGuard> {
        let inserted = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quotation_id);

        if !inserted {
            tracing::warn!(%quotation_id, "Rejected concurrent planning request");
            return Err(AppError::Conflict {
                resource: "quotation_id".to_string(),
                message: format!("Quotation {} is already being planned", quotation_id),
                message_es: format!("La cotización {} ya se está procesando", quotation_id),
            });
        }

        Ok(InFlightGuard {
            active: Arc::clone(&self.active),
            quotation_id,
        })
    }

    pub fn is_active(&self, quotation_id: Uuid) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&quotation_id)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.quotation_id);
    }
}
