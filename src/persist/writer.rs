//! Batched, retrying result writer.
//!
//! One writer is opened per worker at the start of a persistence superstep
//! and flushed at its end. Pairs are buffered until `batch_size` is reached.
//! A flush writes the whole pending batch in one read-write transaction:
//!
//! | Existing result on the vertex | Action |
//! |-------------------------------|--------|
//! | none | create and attach |
//! | same value | keep it, detach any others |
//! | different value | detach, create and attach |
//!
//! Any failure rolls the transaction back and retries the same batch up to
//! `max_retries` times. When the last retry fails too, the flush fails with
//! `Error::Persistence` carrying the attempt count and the last cause. Vertices deleted since the snapshot are skipped.

use std::sync::Arc;

use crate::config::AnalyticsConfig;
use crate::model::{ConceptId, Value};
use crate::storage::GraphStore;
use crate::tx::TxMode;
use crate::{Error, Result};

pub struct BatchedResultWriter<B: GraphStore> {
    store: Arc<B>,
    result_type: String,
    batch_size: usize,
    max_retries: u32,
    pending: Vec<(ConceptId, Value)>,
}

impl<B: GraphStore> BatchedResultWriter<B> {
    pub fn new(store: Arc<B>, result_type: impl Into<String>, batch_size: usize, max_retries: u32) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            result_type: result_type.into(),
            batch_size,
            max_retries,
            pending: Vec::with_capacity(batch_size),
        }
    }

    pub fn from_config(store: Arc<B>, result_type: impl Into<String>, config: &AnalyticsConfig) -> Self {
        Self::new(store, result_type, config.write_batch_size, config.write_max_retries)
    }

    pub fn result_type(&self) -> &str {
        &self.result_type
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Buffer one result, flushing when the batch is full.
    pub async fn add(&mut self, id: ConceptId, value: impl Into<Value>) -> Result<()> {
        self.pending.push((id, value.into()));
        if self.pending.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write everything pending.
    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_write().await {
                Ok(()) => {
                    tracing::debug!(
                        result_type = %self.result_type,
                        written = self.pending.len(),
                        attempt,
                        "result batch written"
                    );
                    self.pending.clear();
                    return Ok(());
                }
                Err(e) if attempt > self.max_retries => {
                    tracing::error!(result_type = %self.result_type, attempts = attempt, error = %e, "result batch failed");
                    return Err(Error::Persistence { attempts: attempt, source: Box::new(e) });
                }
                Err(e) => {
                    tracing::warn!(result_type = %self.result_type, attempt, error = %e, "result batch failed, retrying");
                }
            }
        }
    }

    async fn try_write(&self) -> Result<()> {
        let mut tx = self.store.begin(TxMode::ReadWrite).await?;
        match self.write_batch(&mut tx).await {
            Ok(()) => self.store.commit(tx).await,
            Err(e) => {
                if let Err(rollback) = self.store.rollback(tx).await {
                    tracing::warn!(error = %rollback, "rollback after failed batch failed");
                }
                Err(e)
            }
        }
    }

    async fn write_batch(&self, tx: &mut B::Tx) -> Result<()> {
        for (id, value) in &self.pending {
            if self.store.get_concept(tx, id).await?.is_none() {
                tracing::debug!(%id, "vertex gone, result skipped");
                continue;
            }
            let existing: Vec<_> = self
                .store
                .owned_attributes(tx, id)
                .await?
                .into_iter()
                .filter(|c| c.type_label == self.result_type)
                .collect();

            let current = existing.iter().find(|c| c.value.as_ref() == Some(value)).map(|c| c.id.clone());
            for stale in existing.iter().filter(|c| Some(&c.id) != current.as_ref()) {
                self.store.detach_attribute(tx, id, &stale.id).await?;
            }
            if current.is_none() {
                let attribute = self.store.put_attribute(tx, &self.result_type, value.clone()).await?;
                self.store.attach_attribute(tx, id, &attribute).await?;
            }
        }
        Ok(())
    }
}
