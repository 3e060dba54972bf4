use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use awareness_core::model::{AssessmentKind, LearnerId, ModuleId};

/// Identity of a serialized submission stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    pub learner: LearnerId,
    pub kind: AssessmentKind,
    pub module: Option<ModuleId>,
}

impl SubmissionKey {
    #[must_use]
    pub fn knowledge_check(learner: LearnerId, module: ModuleId) -> Self {
        Self {
            learner,
            kind: AssessmentKind::KnowledgeCheck,
            module: Some(module),
        }
    }

    #[must_use]
    pub fn final_assessment(learner: LearnerId) -> Self {
        Self {
            learner,
            kind: AssessmentKind::FinalAssessment,
            module: None,
        }
    }
}

/// Per-key async mutexes. Submissions sharing a key run one at a time;
/// different keys never wait on each other.
#[derive(Debug, Default)]
pub struct SubmissionLocks {
    slots: Mutex<HashMap<SubmissionKey, Arc<AsyncMutex<()>>>>,
}

impl SubmissionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `key` remains.
    pub async fn acquire(&self, key: SubmissionKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Slots only referenced by the map are idle.
            slots.retain(|k, slot| *k == key || Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
