//! Unit of work: the change-tracking registry and its flush protocol.
//!
//! ## Flush
//!
//! A flush runs over the records that need an action, in registration
//! order:
//!
//! 1. PRE hooks, keyed by the pending state
//! 2. statements are built
//! 3. the batch goes through the [`BulkDriver`]
//! 4. generated ids are written into created entities
//! 5. successful records are re-baselined
//! 6. POST hooks, keyed by the state that was just executed
//!
//! Items refused by the store keep their pending state and baseline and are
//! retried by the next flush; they are listed in the [`FlushReport`].

mod diff;
mod record;

pub use diff::{Diff, FieldChange};
pub use record::{ChangeRecord, RecordState};

use crate::bulk::BulkDriver;
use crate::entity::{Entity, EntityRef, EntityToken};
use crate::error::{ItemFailure, RepositoryError, RepositoryResult};
use crate::statement::{Operation, WriteStatement};
use crate::store::DocumentStore;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// The registry of tracked entities.
///
/// Records are keyed by [`EntityToken`], never by storage id: an entity
/// pending creation has no id yet.
///
/// Hooks run while the entity's write lock is held. A hook must not read
/// its own entity back through the registry.
#[derive(Debug)]
pub struct UnitOfWork {
    index: String,
    evict_deleted: bool,
    records: HashMap<EntityToken, ChangeRecord>,
    order: Vec<EntityToken>,
}

impl UnitOfWork {
    /// Creates an empty registry writing to `index`.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            evict_deleted: false,
            records: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Drops records from the registry once their delete succeeded.
    #[must_use]
    pub fn with_evict_deleted(mut self, evict: bool) -> Self {
        self.evict_deleted = evict;
        self
    }

    /// Returns the index statements are written to.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Tracks an entity with the given pending state.
    ///
    /// An already tracked entity only changes state; its baseline is kept.
    pub fn track(&mut self, entity: EntityRef, state: RecordState) {
        let token = entity.token();
        if let Some(record) = self.records.get_mut(&token) {
            trace!(%token, from = %record.state(), to = %state, "record state changed");
            record.set_state(state);
            return;
        }

        trace!(%token, %state, "record tracked");
        self.records.insert(token, ChangeRecord::new(entity, state));
        self.order.push(token);
    }

    /// Schedules an entity for creation.
    pub fn persist<E: Entity>(&mut self, entity: &EntityRef<E>) {
        self.track(entity.erase(), RecordState::PendingCreate);
    }

    /// Schedules an entity for deletion.
    pub fn remove<E: Entity>(&mut self, entity: &EntityRef<E>) {
        self.track(entity.erase(), RecordState::PendingDelete);
    }

    /// Tracks an entity that is in sync with the store.
    pub fn attach<E: Entity>(&mut self, entity: &EntityRef<E>) {
        self.track(entity.erase(), RecordState::PendingUpdate);
    }

    /// Stops tracking one entity without writing anything for it.
    pub fn untrack(&mut self, token: EntityToken) -> Option<ChangeRecord> {
        let record = self.records.remove(&token)?;
        self.order.retain(|t| *t != token);
        Some(record)
    }

    /// Abandons every record without writing anything.
    pub fn untrack_all(&mut self) {
        debug!(records = self.records.len(), "unit of work cleared");
        self.records.clear();
        self.order.clear();
    }

    /// Returns true if the entity is tracked.
    #[must_use]
    pub fn contains(&self, token: EntityToken) -> bool {
        self.records.contains_key(&token)
    }

    /// Returns the number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record of a tracked entity.
    #[must_use]
    pub fn record(&self, token: EntityToken) -> Option<&ChangeRecord> {
        self.records.get(&token)
    }

    /// Returns the record of a tracked entity, mutably.
    pub fn record_mut(&mut self, token: EntityToken) -> Option<&mut ChangeRecord> {
        self.records.get_mut(&token)
    }

    /// Iterates records in registration order.
    pub fn records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.order.iter().filter_map(|token| self.records.get(token))
    }

    /// Statements the next flush would write, without running hooks.
    ///
    /// Building a statement refreshes `updated_at` on timestamped entities,
    /// so calling this twice on such a type yields different stamps.
    pub fn pending_statements(&mut self) -> Vec<WriteStatement> {
        let mut statements = Vec::new();
        for token in &self.order {
            if let Some(record) = self.records.get_mut(token) {
                if record.is_action_needed() {
                    statements.extend(record.statement(&self.index));
                }
            }
        }
        statements
    }

    /// Writes every pending change through `driver`.
    ///
    /// Refused items are reported in the returned [`FlushReport`]. When a
    /// bulk request fails outright, the chunks answered before it are still
    /// applied to their records (identity, state reset, POST hooks); records
    /// from the failed chunk onward stay pending and the error is returned.
    pub fn flush<S: DocumentStore + ?Sized>(
        &mut self,
        driver: &BulkDriver<'_, S>,
    ) -> RepositoryResult<FlushReport> {
        let mut working = Vec::new();
        for token in &self.order {
            if let Some(record) = self.records.get_mut(token) {
                if record.is_action_needed() {
                    working.push(*token);
                }
            }
        }

        if working.is_empty() {
            trace!("flush skipped, nothing to write");
            return Ok(FlushReport::default());
        }
        debug!(working = working.len(), tracked = self.records.len(), "flush started");

        for token in &working {
            if let Some((entity, state)) = self.hook_target(*token, Phase::Pre) {
                self.run_hook(&entity, state, Phase::Pre);
            }
        }

        let mut tokens = Vec::with_capacity(working.len());
        let mut statements = Vec::with_capacity(working.len());
        for token in working {
            let Some(record) = self.records.get_mut(&token) else {
                continue;
            };
            match record.statement(&self.index) {
                Some(statement) => {
                    tokens.push(token);
                    statements.push(statement);
                }
                None => trace!(%token, "record dropped from batch, nothing left to write"),
            }
        }

        let mut report = FlushReport {
            attempted: statements.len(),
            ..FlushReport::default()
        };
        if statements.is_empty() {
            return Ok(report);
        }

        let run = driver.execute(&statements);
        let unanswered = statements.len() - run.outcomes.len();
        if let Some(error) = &run.error {
            warn!(
                answered = run.outcomes.len(),
                unanswered,
                error = %error,
                "bulk run interrupted, unanswered records stay pending"
            );
        }

        let mut applied = Vec::with_capacity(tokens.len());
        let answered = tokens.into_iter().zip(&statements).zip(run.outcomes);
        for ((token, statement), outcome) in answered {
            if !outcome.is_success() {
                let failure = ItemFailure {
                    token,
                    op: statement.op,
                    id: outcome.id.clone().or_else(|| statement.id.clone()),
                    status: outcome.status,
                    reason: outcome.error.unwrap_or_default(),
                };
                warn!(
                    %token,
                    op = %failure.op,
                    id = failure.id.as_deref().unwrap_or(""),
                    status = failure.status,
                    reason = %failure.reason,
                    "bulk item failed"
                );
                report.failures.push(failure);
                continue;
            }

            let Some(record) = self.records.get_mut(&token) else {
                continue;
            };
            if let Some(id) = outcome.created_id() {
                record.assign_identity(id);
            }
            match statement.op {
                Operation::Create => report.created += 1,
                Operation::Update => report.updated += 1,
                Operation::Delete => report.deleted += 1,
            }
            applied.push(token);
        }

        for token in &applied {
            if let Some(record) = self.records.get_mut(token) {
                record.reset_state();
            }
        }

        let mut post = Vec::with_capacity(applied.len());
        for token in applied {
            let Some((entity, state)) = self.hook_target(token, Phase::Post) else {
                continue;
            };
            if self.evict_deleted && state == RecordState::PendingDelete {
                self.untrack(token);
                trace!(%token, "deleted record evicted");
            }
            post.push((entity, state));
        }
        for (entity, state) in post {
            self.run_hook(&entity, state, Phase::Post);
        }

        debug!(
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            failed = report.failures.len(),
            unanswered,
            "flush finished"
        );
        match run.error {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }

    fn hook_target(&self, token: EntityToken, phase: Phase) -> Option<(EntityRef, RecordState)> {
        let record = self.records.get(&token)?;
        let state = match phase {
            Phase::Pre => record.state(),
            Phase::Post => record.last_applied_state(),
        };
        Some((record.entity().clone(), state))
    }

    fn run_hook(&mut self, entity: &EntityRef, state: RecordState, phase: Phase) {
        let mut entity = entity.write();
        match (phase, state) {
            (Phase::Pre, RecordState::PendingCreate) => entity.pre_create(self),
            (Phase::Pre, RecordState::PendingUpdate) => entity.pre_update(self),
            (Phase::Pre, RecordState::PendingDelete) => entity.pre_delete(self),
            (Phase::Post, RecordState::PendingCreate) => entity.post_create(self),
            (Phase::Post, RecordState::PendingUpdate) => entity.post_update(self),
            (Phase::Post, RecordState::PendingDelete) => entity.post_delete(self),
        }
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Pre,
    Post,
}

/// What a flush wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Statements submitted to the store.
    pub attempted: usize,
    /// Documents created.
    pub created: usize,
    /// Documents updated.
    pub updated: usize,
    /// Documents deleted.
    pub deleted: usize,
    /// Items the store refused.
    pub failures: Vec<ItemFailure>,
}

impl FlushReport {
    /// Returns true if every submitted statement succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts refused items into [`RepositoryError::PartialFailure`].
    pub fn into_result(self) -> RepositoryResult<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(RepositoryError::PartialFailure {
                attempted: self.attempted,
                failures: self.failures,
            })
        }
    }
}
