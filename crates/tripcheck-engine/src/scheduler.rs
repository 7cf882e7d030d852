//! Runs classifications in fixed-size batches over one shared browser context.

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tripcheck_core::{StoreSpec, TestResult};

use crate::classifier::Classifier;
use crate::driver::NavigationContext;

/// Default number of stores classified concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 3;

pub struct BatchScheduler {
    classifier: Classifier,
    batch_size: usize,
}

impl BatchScheduler {
    /// A `batch_size` of zero is treated as one.
    #[must_use]
    pub fn new(classifier: Classifier, batch_size: usize) -> Self {
        Self {
            classifier,
            batch_size: batch_size.max(1),
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Classifies every store and returns the results in input order.
    ///
    /// Stores run in consecutive batches of `batch_size`; each batch is fully
    /// joined before the next starts. Each result is sent to `sink` as soon as
    /// it completes. A closed sink is ignored and the run carries on.
    pub async fn run(
        &self,
        context: &dyn NavigationContext,
        stores: &[StoreSpec],
        sink: Option<&mpsc::Sender<TestResult>>,
    ) -> Vec<TestResult> {
        let mut slots: Vec<Option<TestResult>> = vec![None; stores.len()];
        let batch_count = stores.len().div_ceil(self.batch_size);
        let mut sink_open = sink.is_some();

        for (batch_index, batch) in stores.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            tracing::info!(
                batch = batch_index + 1,
                batches = batch_count,
                size = batch.len(),
                "starting batch"
            );

            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .enumerate()
                .map(|(i, store)| {
                    let verify = self.verify_store(context, store);
                    async move { (offset + i, verify.await) }
                })
                .collect();

            while let Some((index, result)) = in_flight.next().await {
                if let Some(tx) = sink.filter(|_| sink_open) {
                    if tx.send(result.clone()).await.is_err() {
                        tracing::debug!("result receiver dropped, continuing run");
                        sink_open = false;
                    }
                }
                slots[index] = Some(result);
            }
        }

        slots.into_iter().flatten().collect()
    }

    async fn verify_store(&self, context: &dyn NavigationContext, store: &StoreSpec) -> TestResult {
        let page = match context.open_page().await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(store_id = %store.store_id, error = %e, "could not open page");
                return self
                    .classifier
                    .error_result(store, format!("could not open page: {e}"));
            }
        };

        let result = self.classifier.classify(page.as_ref(), store).await;

        if let Err(e) = page.close().await {
            tracing::debug!(store_id = %store.store_id, error = %e, "page close failed");
        }
        result
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
