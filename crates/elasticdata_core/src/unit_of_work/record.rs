//! Change record: one tracked entity and its last-persisted baseline.

use crate::entity::{
    Entity, EntityRef, EntityToken, Source, CREATED_AT_FIELD, ID_FIELD, PARENT_FIELD,
    UPDATED_AT_FIELD,
};
use crate::statement::{Operation, WriteStatement};
use crate::unit_of_work::diff::Diff;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;
use tracing::trace;

/// Pending operation of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// The entity will be created.
    PendingCreate,
    /// The entity will be updated if its diff is not empty.
    PendingUpdate,
    /// The entity will be deleted.
    PendingDelete,
}

impl RecordState {
    /// Returns the bulk operation this state maps to.
    #[must_use]
    pub const fn operation(self) -> Operation {
        match self {
            RecordState::PendingCreate => Operation::Create,
            RecordState::PendingUpdate => Operation::Update,
            RecordState::PendingDelete => Operation::Delete,
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation().as_str())
    }
}

/// Tracks one entity between flushes.
///
/// The record holds a handle to the live entity, a deep copy of its storage
/// snapshot as of the last successful flush (the baseline, identity field
/// stripped) and a memoized diff against that baseline.
pub struct ChangeRecord {
    /// The tracked entity.
    entity: EntityRef,
    /// What the next flush will do.
    state: RecordState,
    /// What the most recent flush did.
    last_applied_state: RecordState,
    /// Snapshot as of the last synchronization, `None` until then.
    baseline: Option<Source>,
    /// Memoized non-empty diff. Cleared whenever the baseline changes.
    cached_diff: Option<Diff>,
}

impl ChangeRecord {
    /// Creates a record.
    ///
    /// A record created in [`RecordState::PendingUpdate`] captures its
    /// baseline immediately: the entity is taken to be in sync with the store.
    pub fn new(entity: EntityRef, state: RecordState) -> Self {
        let mut record = Self {
            entity,
            state,
            last_applied_state: state,
            baseline: None,
            cached_diff: None,
        };
        if state == RecordState::PendingUpdate {
            record.capture_baseline();
        }
        record
    }

    /// Returns the tracked entity.
    #[must_use]
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Returns the entity's token.
    #[must_use]
    pub fn token(&self) -> EntityToken {
        self.entity.token()
    }

    /// Returns the pending state.
    #[must_use]
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Changes the pending state. The baseline is kept.
    pub fn set_state(&mut self, state: RecordState) {
        self.state = state;
    }

    /// Returns the state executed by the most recent flush.
    #[must_use]
    pub fn last_applied_state(&self) -> RecordState {
        self.last_applied_state
    }

    /// Returns the baseline snapshot.
    #[must_use]
    pub fn baseline(&self) -> Option<&Source> {
        self.baseline.as_ref()
    }

    /// Returns whether the next flush has to write anything for this entity.
    pub fn is_action_needed(&mut self) -> bool {
        match self.state {
            RecordState::PendingCreate => true,
            RecordState::PendingUpdate => self.has_identity() && self.diff().is_some(),
            RecordState::PendingDelete => self.has_identity(),
        }
    }

    /// Returns the diff against the baseline, computing it if needed.
    ///
    /// Only a non-empty diff is memoized, so a clean record always looks at
    /// the live entity again.
    pub fn diff(&mut self) -> Option<&Diff> {
        if self.cached_diff.is_none() {
            self.cached_diff = self.compute_diff();
        }
        self.cached_diff.as_ref()
    }

    /// Builds the write statement for the pending state.
    ///
    /// Returns `None` for an update with an empty diff, and for an update or
    /// delete of an entity without identity.
    ///
    /// Repeated calls without mutation return equal statements only for
    /// types without timestamps. On a timestamped type every create or update
    /// statement writes a fresh `updated_at` into the entity (and `created_at`
    /// for a create), so two calls may differ in those fields.
    pub fn statement(&mut self, index: &str) -> Option<WriteStatement> {
        match self.state {
            RecordState::PendingCreate => Some(self.create_statement(index)),
            RecordState::PendingUpdate => self.update_statement(index),
            RecordState::PendingDelete => self.delete_statement(index),
        }
    }

    /// Marks the entity as synchronized after a successful write.
    ///
    /// Re-captures the baseline and moves the record to
    /// [`RecordState::PendingUpdate`], including after a delete. The executed
    /// state stays readable through [`ChangeRecord::last_applied_state`].
    pub fn reset_state(&mut self) {
        self.capture_baseline();
        self.last_applied_state = self.state;
        self.state = RecordState::PendingUpdate;
        trace!(
            token = %self.token(),
            applied = %self.last_applied_state,
            "record synchronized"
        );
    }

    /// Writes the id generated by the store into the entity.
    pub fn assign_identity(&self, id: &str) {
        self.entity
            .write()
            .set_field(ID_FIELD, Value::String(id.to_owned()));
    }

    fn has_identity(&self) -> bool {
        self.entity.read().id().is_some()
    }

    fn capture_baseline(&mut self) {
        // to_storage returns an owned map; the baseline never aliases the entity
        self.baseline = Some(snapshot_without_identity(&*self.entity.read()));
        self.cached_diff = None;
    }

    fn compute_diff(&self) -> Option<Diff> {
        let current = snapshot_without_identity(&*self.entity.read());
        match &self.baseline {
            Some(baseline) => Diff::compute(baseline, &current),
            None => Diff::compute(&Source::new(), &current),
        }
    }

    fn create_statement(&mut self, index: &str) -> WriteStatement {
        let mut entity = self.entity.write();
        if entity.timestamps() {
            let now = now();
            entity.set_field(CREATED_AT_FIELD, now.clone());
            entity.set_field(UPDATED_AT_FIELD, now);
        }

        let mut body = entity.to_storage();
        let id = body.remove(ID_FIELD).map(|value| crate::entity::id_to_string(&value));
        body.remove(PARENT_FIELD);

        WriteStatement::create(index, entity.entity_type(), body)
            .with_id(id)
            .with_parent(entity.parent())
    }

    fn update_statement(&mut self, index: &str) -> Option<WriteStatement> {
        {
            let mut entity = self.entity.write();
            if entity.timestamps() {
                // must precede the diff so the refreshed stamp is written
                entity.set_field(UPDATED_AT_FIELD, now());
            }
        }

        self.cached_diff = self.compute_diff();
        let mut body = self.cached_diff.as_ref()?.to_body();
        body.remove(PARENT_FIELD);

        let entity = self.entity.read();
        let id = entity.id()?;
        Some(
            WriteStatement::update(index, entity.entity_type(), id, body)
                .with_parent(entity.parent()),
        )
    }

    fn delete_statement(&self, index: &str) -> Option<WriteStatement> {
        let entity = self.entity.read();
        let id = entity.id()?;
        Some(WriteStatement::delete(index, entity.entity_type(), id).with_parent(entity.parent()))
    }
}

impl fmt::Debug for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRecord")
            .field("token", &self.token())
            .field("state", &self.state)
            .field("last_applied_state", &self.last_applied_state)
            .field("baseline", &self.baseline)
            .finish_non_exhaustive()
    }
}

fn snapshot_without_identity(entity: &dyn Entity) -> Source {
    let mut snapshot = entity.to_storage();
    snapshot.remove(ID_FIELD);
    snapshot
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}
