use std::collections::HashSet;

use log::{info, Level};
use logging_timer::timer;

use crate::error::UnmigratorError;
use crate::records::{Record, RecordId};
use crate::selector::Selector;
use crate::store::{AttachmentRenderer, RecordStore};
use crate::transformer::{Outcome, Transformer};

/// Receives per-record results as the driver works through batches.
pub trait ProgressSink {
    /// A batch of `size` records is about to be processed. `first_ordinal`
    /// is the running position of its first record.
    fn batch_started(&mut self, first_ordinal: u64, size: usize);

    fn record_processed(&mut self, ordinal: u64, record: &Record, outcome: Outcome);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Running count, including any count carried in from earlier runs.
    pub processed: u64,
    pub changed: u64,
    pub batches: u64,
    /// False when the run stopped at the batch cap with work remaining.
    pub completed: bool,
}

/// Repeatedly selects a batch and transforms each record in it until the
/// selector comes back empty.
pub struct Driver<'a, S: RecordStore, R: AttachmentRenderer> {
    selector: Selector<'a, S>,
    transformer: Transformer<'a, S, R>,
    batch_size: usize,
    max_batches: Option<u64>,
}

impl<'a, S: RecordStore, R: AttachmentRenderer> Driver<'a, S, R> {
    pub fn new(
        store: &'a S,
        renderer: &'a R,
        batch_size: usize,
        image_size: &str,
        max_batches: Option<u64>,
    ) -> Result<Self, UnmigratorError> {
        if batch_size == 0 {
            return Err(UnmigratorError::Error("Batch size must be at least 1".into()));
        }

        Ok(Self {
            selector: Selector::new(store),
            transformer: Transformer::new(store, renderer, image_size),
            batch_size,
            max_batches,
        })
    }

    pub fn selector(&self) -> &Selector<'a, S> {
        &self.selector
    }

    /// Runs batches until nothing is left or `max_batches` is reached.
    ///
    /// `processed` seeds the running count. Stopping between batches is
    /// always safe: each record's completion marker is its own unit of
    /// progress.
    ///
    /// A record the transformer could not mark stays eligible. If a batch
    /// holds nothing but records already attempted in this run, the run
    /// stops with an error instead of selecting them forever.
    pub fn run(&self, processed: u64, sink: &mut dyn ProgressSink) -> Result<RunSummary, UnmigratorError> {
        let mut summary = RunSummary {
            processed,
            ..RunSummary::default()
        };
        let mut attempted: HashSet<RecordId> = HashSet::new();

        loop {
            if self.max_batches.is_some_and(|max| summary.batches >= max) {
                info!("Stopping after {} batches", summary.batches);
                return Ok(summary);
            }

            let _tmr = timer!(Level::Trace; "Driver::batch", "{}", summary.batches + 1);

            let batch = self.selector.select(self.batch_size)?;
            if batch.is_empty() {
                summary.completed = true;
                info!(
                    "Migration complete: {} processed, {} changed",
                    summary.processed, summary.changed
                );
                return Ok(summary);
            }

            let fresh: Vec<&Record> = batch
                .iter()
                .filter(|record| !attempted.contains(&record.record_id()))
                .collect();

            if fresh.is_empty() {
                let stuck: Vec<String> = batch.iter().map(|r| r.record_id().to_string()).collect();
                return Err(UnmigratorError::Error(format!(
                    "Records remain pending after processing: {}",
                    stuck.join(", ")
                )));
            }

            summary.batches += 1;
            sink.batch_started(summary.processed + 1, fresh.len());

            for record in fresh {
                attempted.insert(record.record_id());

                let outcome = self.transformer.transform(record.record_id());
                summary.processed += 1;
                if outcome.changed {
                    summary.changed += 1;
                }

                sink.record_processed(summary.processed, record, outcome);
            }
        }
    }
}

/// Prints one numbered line per record.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn batch_started(&mut self, _first_ordinal: u64, size: usize) {
        println!("Processing {} records...", size);
    }

    fn record_processed(&mut self, ordinal: u64, record: &Record, outcome: Outcome) {
        let status = if outcome.changed {
            "Processed"
        } else {
            "No action taken"
        };
        println!("{:>6}. {}: {}", ordinal, record.title(), status);
    }
}
