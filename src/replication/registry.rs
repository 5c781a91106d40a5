//! Registry of replication records keyed by task configuration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use super::MinReplicationsFn;
use super::record::ReplicationRecord;
use crate::domain::{TaskConfig, TaskConfigId};
use crate::error::{ReplicatorError, Result};
use crate::options::OptionGenerator;
use crate::policy::PolicyFactory;
use crate::sync::lock;

type Slot = Arc<OnceCell<Arc<ReplicationRecord>>>;

/// Thread-safe map from task configuration to its record.
///
/// Records are created lazily by [`get_or_create`](Self::get_or_create). The
/// map lock only guards slot lookup; the slow part (option generation and
/// policy init) runs inside the per-id slot, so unrelated task configurations
/// never wait on each other.
///
/// Every created record gets a fresh generation number, so feedback from
/// jobs dispatched before a `forget` can be told apart from feedback for
/// the record that replaced it.
#[derive(Default)]
pub struct ReplicationRegistry {
    slots: Mutex<HashMap<TaskConfigId, Slot>>,
    generations: AtomicU64,
}

impl ReplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `task`, creating it on first access.
    ///
    /// At most one record is constructed per id even under concurrent first
    /// access; concurrent callers wait for the one construction in flight.
    /// A failed construction (no options, generator error, policy refusal) is
    /// not cached: the next call runs generation again.
    pub async fn get_or_create(
        &self,
        task: &TaskConfig,
        generator: &dyn OptionGenerator,
        min_reps: &MinReplicationsFn,
        policy_factory: &PolicyFactory,
    ) -> Result<Arc<ReplicationRecord>> {
        let slot = self.slot(&task.id);

        let result = slot
            .get_or_try_init(|| async {
                let options = generator.generate(task).await?;
                if options.is_empty() {
                    tracing::warn!(task = %task.id, "Option generator produced no options");
                    return Err(ReplicatorError::NoOptions(task.id.clone()));
                }
                let floor = min_reps(task);
                let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
                let record = ReplicationRecord::new(task, options, policy_factory(), floor)?.with_generation(generation);
                tracing::info!(
                    task = %task.id,
                    generation,
                    options = record.options().len(),
                    min_reps = floor,
                    policy = record.policy_name(),
                    "Replication record created"
                );
                Ok(Arc::new(record))
            })
            .await
            .cloned();

        if result.is_err() {
            self.discard_empty_slot(&task.id, slot);
        }
        result
    }

    /// The record for `id`, if one has been created.
    pub fn get(&self, id: &TaskConfigId) -> Option<Arc<ReplicationRecord>> {
        let slots = lock(&self.slots);
        slots.get(id).and_then(|slot| slot.get().cloned())
    }

    /// Whether a record exists for `id`.
    pub fn contains(&self, id: &TaskConfigId) -> bool {
        self.get(id).is_some()
    }

    /// Drop the record for `id`; the next `get_or_create` starts fresh.
    ///
    /// Replications already in flight keep their own handle on the old
    /// record, but their feedback no longer reaches the registry.
    pub fn forget(&self, id: &TaskConfigId) -> Option<Arc<ReplicationRecord>> {
        let removed = lock(&self.slots).remove(id)?;
        let record = removed.get().cloned();
        if record.is_some() {
            tracing::info!(task = %id, "Replication record forgotten");
        }
        record
    }

    /// Number of created records.
    pub fn len(&self) -> usize {
        lock(&self.slots).values().filter(|s| s.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids with a created record, sorted.
    pub fn ids(&self) -> Vec<TaskConfigId> {
        let slots = lock(&self.slots);
        let mut ids: Vec<TaskConfigId> = slots
            .iter()
            .filter(|(_, s)| s.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn slot(&self, id: &TaskConfigId) -> Slot {
        let mut slots = lock(&self.slots);
        slots.entry(id.clone()).or_default().clone()
    }

    /// Remove a slot left empty by a failed construction once the last
    /// caller holding it gives it up. A caller still holding it may be
    /// retrying construction, and a replaced slot is left alone.
    ///
    /// Slot clones are only taken under the map lock, and every failing
    /// caller releases its clone here under the same lock, so the last one
    /// out always sees a count of one.
    fn discard_empty_slot(&self, id: &TaskConfigId, slot: Slot) {
        let mut slots = lock(&self.slots);
        let Some(current) = slots.get(id) else {
            return;
        };
        if !Arc::ptr_eq(current, &slot) {
            return;
        }
        drop(slot);
        if !current.initialized() && Arc::strong_count(current) == 1 {
            slots.remove(id);
        }
    }
}
