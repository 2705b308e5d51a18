//! Run supervisor: one buffer, N producers, M consumers.
//!
//! [`Run::start`] spawns one named thread per worker and returns at once.
//! [`Run::stop`] fires the shared [`StopToken`], joins every thread and
//! collects the per-worker reports.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::buffer::{BoundedBuffer, ItemId};
use crate::events::WorkerRole;
use crate::utilities::config::RunConfig;
use crate::utilities::errors::{BufferError, RunError};
use crate::workers::{Consumer, Producer, StopToken, WorkerReport};

struct WorkerHandle {
    name: String,
    handle: JoinHandle<Result<WorkerReport, BufferError>>,
}

/// A running set of workers around one buffer.
pub struct Run {
    buffer: Arc<BoundedBuffer>,
    stop: StopToken,
    workers: Vec<WorkerHandle>,
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("capacity", &self.buffer.capacity())
            .field("workers", &self.workers.len())
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}

impl Run {
    /// Validate `config`, create a buffer for it and start the workers.
    pub fn start(config: &RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        let buffer = Arc::new(BoundedBuffer::new(config.capacity)?);
        Self::start_with(config, buffer)
    }

    /// Start workers against a caller-supplied buffer, e.g. one whose event
    /// bus already has listeners. `config.capacity` is ignored.
    pub fn start_with(config: &RunConfig, buffer: Arc<BoundedBuffer>) -> Result<Self, RunError> {
        config.validate()?;

        let mut run = Self {
            buffer,
            stop: StopToken::new(),
            workers: Vec::with_capacity(config.producers + config.consumers),
        };

        tracing::info!(
            capacity = run.buffer.capacity(),
            producers = config.producers,
            consumers = config.consumers,
            "starting run"
        );

        for id in 1..=config.producers {
            let producer = Producer::new(id, config.producer_interval());
            let spawned = run.spawn(WorkerRole::Producer, id, move |buffer, stop| {
                producer.run(buffer, stop)
            });
            if let Err(err) = spawned {
                run.abort();
                return Err(err);
            }
        }
        for id in 1..=config.consumers {
            let consumer = Consumer::new(id, config.consumer_interval(), config.poll_interval());
            let spawned = run.spawn(WorkerRole::Consumer, id, move |buffer, stop| {
                consumer.run(buffer, stop)
            });
            if let Err(err) = spawned {
                run.abort();
                return Err(err);
            }
        }

        Ok(run)
    }

    fn spawn<F>(&mut self, role: WorkerRole, id: usize, body: F) -> Result<(), RunError>
    where
        F: FnOnce(&BoundedBuffer, &StopToken) -> Result<WorkerReport, BufferError>
            + Send
            + 'static,
    {
        let name = format!("{}-{}", role.label(), id);
        let buffer = Arc::clone(&self.buffer);
        let stop = self.stop.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let result = body(&buffer, &stop);
                if let Err(err) = &result {
                    tracing::error!(error = %err, "worker failed");
                }
                result
            })
            .map_err(|source| RunError::Spawn {
                name: name.clone(),
                source,
            })?;

        self.workers.push(WorkerHandle { name, handle });
        Ok(())
    }

    /// Stop and join whatever was already spawned, discarding the results.
    fn abort(&mut self) {
        self.stop.stop();
        for worker in self.workers.drain(..) {
            let _ = worker.handle.join();
        }
    }

    pub fn buffer(&self) -> &Arc<BoundedBuffer> {
        &self.buffer
    }

    /// Token shared by every worker; stopping it ends the run.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Signal every worker to stop and wait for all of them.
    ///
    /// All workers are joined even if one of them failed; the first failure
    /// is returned.
    pub fn stop(mut self) -> Result<RunSummary, RunError> {
        self.stop.stop();

        let workers = std::mem::take(&mut self.workers);
        let mut reports = Vec::with_capacity(workers.len());
        let mut first_error = None;
        for worker in workers {
            match worker.handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(source)) => {
                    if first_error.is_none() {
                        first_error = Some(RunError::Worker {
                            name: worker.name,
                            source,
                        });
                    }
                }
                Err(_) => {
                    tracing::error!(worker = %worker.name, "worker panicked");
                    if first_error.is_none() {
                        first_error = Some(RunError::WorkerPanicked { name: worker.name });
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let summary = RunSummary { reports };
        tracing::info!(
            produced = summary.produced().len(),
            consumed = summary.consumed().len(),
            "run stopped"
        );
        Ok(summary)
    }
}

impl Drop for Run {
    /// A dropped run stops its workers without waiting for them.
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop.stop();
        }
    }
}

/// Reports from every worker of a stopped run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub reports: Vec<WorkerReport>,
}

impl RunSummary {
    fn items_of(&self, role: WorkerRole) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = self
            .reports
            .iter()
            .filter(|report| report.role == role)
            .flat_map(|report| report.items.iter().copied())
            .collect();
        items.sort_unstable();
        items
    }

    /// Every item placed, sorted.
    pub fn produced(&self) -> Vec<ItemId> {
        self.items_of(WorkerRole::Producer)
    }

    /// Every item removed, sorted.
    pub fn consumed(&self) -> Vec<ItemId> {
        self.items_of(WorkerRole::Consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AdmissionTokens;
    use crate::utilities::errors::ConfigError;
    use std::time::{Duration, Instant};

    fn fast_config(capacity: usize, producers: usize, consumers: usize) -> RunConfig {
        RunConfig {
            capacity,
            producers,
            consumers,
            producer_interval_ms: 0,
            consumer_interval_ms: 0,
            poll_interval_ms: 5,
        }
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn test_invalid_config_starts_nothing() {
        let err = Run::start(&fast_config(0, 1, 1)).unwrap_err();
        assert!(matches!(
            err,
            RunError::Config(ConfigError::InvalidCapacity { .. })
        ));

        let err = Run::start(&fast_config(4, 0, 1)).unwrap_err();
        assert!(matches!(
            err,
            RunError::Config(ConfigError::InvalidWorkerCount { .. })
        ));
    }

    #[test]
    fn test_run_to_exhaustion_conserves_items() {
        let run = Run::start(&fast_config(30, 3, 4)).unwrap();
        let buffer = Arc::clone(run.buffer());

        assert!(wait_until(Duration::from_secs(10), || {
            let stats = buffer.stats();
            stats.claimed == 30 && stats.consumed == 30
        }));

        let summary = run.stop().unwrap();
        let expected: Vec<ItemId> = (1..=30).collect();
        assert_eq!(summary.produced(), expected);
        assert_eq!(summary.consumed(), expected);
        assert_eq!(summary.reports.len(), 7);

        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.tokens(), AdmissionTokens { free: 30, filled: 0 });
    }

    #[test]
    fn test_stop_mid_run_accounts_for_every_item() {
        let config = RunConfig {
            capacity: 50,
            producers: 2,
            consumers: 1,
            producer_interval_ms: 1,
            consumer_interval_ms: 5,
            poll_interval_ms: 5,
        };
        let run = Run::start(&config).unwrap();
        let buffer = Arc::clone(run.buffer());
        thread::sleep(Duration::from_millis(30));

        let summary = run.stop().unwrap();
        let remaining = buffer.snapshot().items();

        let mut accounted = summary.consumed();
        accounted.extend(remaining);
        accounted.sort_unstable();
        assert_eq!(accounted, summary.produced());
    }

    #[test]
    fn test_start_with_shared_buffer_publishes_to_its_bus() {
        let buffer = Arc::new(BoundedBuffer::new(3).unwrap());
        let (_id, rx) = buffer.event_bus().subscribe();

        let run = Run::start_with(&fast_config(99, 1, 1), Arc::clone(&buffer)).unwrap();
        assert!(wait_until(Duration::from_secs(10), || buffer.stats().consumed == 3));
        run.stop().unwrap();

        // Three produce and three consume transactions, two events each.
        assert_eq!(rx.try_iter().count(), 12);
    }

    #[test]
    fn test_stop_token_from_outside_ends_run() {
        let run = Run::start(&fast_config(5, 1, 1)).unwrap();
        let token = run.stop_token();
        token.stop();
        assert!(run.stop().is_ok());
    }
}
