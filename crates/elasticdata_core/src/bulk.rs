//! Bulk write driver.

use crate::error::{RepositoryError, RepositoryResult};
use crate::statement::{BulkOutcome, WriteStatement};
use crate::store::DocumentStore;
use tracing::debug;

/// Default number of statements sent per bulk request.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Feeds statements to a store's bulk endpoint.
///
/// Outcomes come back in submission order, one per statement. The unit of
/// work pairs them with its records by position, so a store answering with
/// a different count is an error rather than something to paper over.
pub struct BulkDriver<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    chunk_size: usize,
}

impl<'a, S: DocumentStore + ?Sized> BulkDriver<'a, S> {
    /// Creates a driver with the default chunk size.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the number of statements per request. Zero is treated as one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns the chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Executes the statements chunk by chunk.
    ///
    /// A failing chunk stops the run. The outcomes of the chunks before it
    /// are kept in the returned [`BulkRun`]: the store has applied them.
    pub fn execute(&self, statements: &[WriteStatement]) -> BulkRun {
        let mut outcomes = Vec::with_capacity(statements.len());

        for (n, chunk) in statements.chunks(self.chunk_size).enumerate() {
            debug!(chunk = n, statements = chunk.len(), "bulk request");
            let returned = match self.store.bulk(chunk) {
                Ok(returned) => returned,
                Err(e) => {
                    return BulkRun::interrupted(
                        outcomes,
                        RepositoryError::store("Bulk request failed", e),
                    );
                }
            };

            if returned.len() != chunk.len() {
                let error = RepositoryError::OutcomeMismatch {
                    submitted: chunk.len(),
                    returned: returned.len(),
                };
                return BulkRun::interrupted(outcomes, error);
            }
            outcomes.extend(returned);
        }

        BulkRun {
            outcomes,
            error: None,
        }
    }
}

/// What a bulk run produced.
///
/// `outcomes` pairs by position with the leading statements of the batch.
/// When `error` is set, the statements past `outcomes.len()` were not
/// written, or their fate is unknown.
#[derive(Debug)]
pub struct BulkRun {
    /// Outcomes of every chunk the store answered, in order.
    pub outcomes: Vec<BulkOutcome>,
    /// The failure that stopped the run.
    pub error: Option<RepositoryError>,
}

impl BulkRun {
    fn interrupted(outcomes: Vec<BulkOutcome>, error: RepositoryError) -> Self {
        debug!(answered = outcomes.len(), "bulk run interrupted");
        Self {
            outcomes,
            error: Some(error),
        }
    }

    /// Returns true if every chunk was answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the outcomes, or the error if the run was interrupted.
    pub fn into_result(self) -> RepositoryResult<Vec<BulkOutcome>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.outcomes),
        }
    }
}
