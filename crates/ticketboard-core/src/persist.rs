//! Joined persistence batches

use futures::future::join_all;
use std::future::Future;
use ticketboard_model::{BoardError, StoreError};

/// Outcome of one or more joined persistence calls
#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    total: usize,
    errors: Vec<StoreError>,
}

impl BatchOutcome {
    /// Outcome of a single call
    pub(crate) fn single<T>(result: Result<T, StoreError>) -> Self {
        Self {
            total: 1,
            errors: result.err().into_iter().collect(),
        }
    }

    /// Fold another outcome into this one
    pub(crate) fn merge(&mut self, other: BatchOutcome) {
        self.total += other.total;
        self.errors.extend(other.errors);
    }

    /// A lone failed call keeps its own error; anything larger is partial
    pub(crate) fn into_result(mut self) -> Result<(), BoardError> {
        if self.total == 1 && self.errors.len() == 1 {
            return Err(BoardError::Persistence(self.errors.remove(0)));
        }
        BoardError::from_batch(self.total, self.errors)
    }
}

/// Run calls concurrently and collect every failure
pub(crate) async fn run_batch<I, F>(calls: I) -> BatchOutcome
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<(), StoreError>>,
{
    let results = join_all(calls).await;
    BatchOutcome {
        total: results.len(),
        errors: results.into_iter().filter_map(Result::err).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn batch_collects_every_failure() {
        let calls = (0..4).map(|i| async move {
            if i % 2 == 0 {
                Ok(())
            } else {
                Err(StoreError::Io(format!("call {i}")))
            }
        });
        let outcome = run_batch(calls).await;
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, BoardError::PartialPersistence { total: 4, ref errors } if errors.len() == 2));
    }

    #[test]
    fn single_failure_stays_unwrapped() {
        let outcome = BatchOutcome::single::<()>(Err(StoreError::Io("disk".to_string())));
        assert!(matches!(outcome.into_result(), Err(BoardError::Persistence(_))));
    }

    #[tokio::test]
    async fn empty_batch_succeeds() {
        let calls: Vec<std::future::Ready<Result<(), StoreError>>> = Vec::new();
        let mut outcome = run_batch(calls).await;
        outcome.merge(BatchOutcome::single(Ok(())));
        assert!(outcome.into_result().is_ok());
    }
}
