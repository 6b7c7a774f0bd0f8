//! Pool manager: spawn, fan-out, fan-in, reduce, tear down
//!
//! [`DuplexPool`] owns a fixed-size set of looping workers and their duplex
//! channels. Each `evaluate` call broadcasts one parameter vector to every
//! worker, collects exactly one partial result per worker, and sums them
//! into the scalar the minimizer asked for. [`run_once`] covers the
//! single-shot mode where each worker produces exactly one result and
//! terminates on its own.

use crate::channel::ChannelConfig;
use crate::error::{Error, Result};
use crate::heartbeat::HeartbeatMonitor;
use crate::kernel::{Kernel, SingleKernel};
use crate::worker::{spawn_looping, spawn_single, LoopingWorker, WorkerConfig};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers in the pool; fixed for the pool's lifetime
    pub workers: usize,

    /// Configuration template for workers
    pub worker: WorkerConfig,

    /// Configuration for the per-worker duplex channels
    pub channel: ChannelConfig,

    /// Whether to pin workers across the available cores
    pub pin_workers: bool,

    /// Whether to show the heartbeat status line during rounds
    pub progress: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            worker: WorkerConfig::default(),
            channel: ChannelConfig::default(),
            pin_workers: false,
            progress: false,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the worker configuration template
    pub fn with_worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker = config;
        self
    }

    /// Set the channel configuration
    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel = config;
        self
    }

    /// Enable CPU pinning across the available cores
    pub fn with_pinned_workers(mut self, pin: bool) -> Self {
        self.pin_workers = pin;
        self
    }

    /// Enable the heartbeat status line
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// Derive one worker's configuration from the pool template: pinning by
/// index modulo core count, and the `calc-{index}` default name. Shared by
/// both the looping and single-shot spawn paths.
fn worker_config_for(config: &PoolConfig, index: usize) -> WorkerConfig {
    let mut worker_config = config.worker.clone();
    if config.pin_workers {
        worker_config.cpu_affinity = Some(index % num_cpus::get());
    }
    if worker_config.name.is_none() {
        worker_config.name = Some(format!("calc-{}", index));
    }
    worker_config
}

/// A fixed-size pool of looping calculation workers
///
/// The worker set is created once by [`DuplexPool::start`] and never
/// resized; after [`DuplexPool::stop`] it is empty and further rounds fail
/// with [`Error::PoolStopped`].
pub struct DuplexPool<I> {
    config: PoolConfig,
    workers: Mutex<Vec<LoopingWorker<I>>>,
    monitor: Mutex<HeartbeatMonitor>,
}

impl<I: Clone + Send + 'static> DuplexPool<I> {
    /// Spawn the pool and block until every worker is READY
    ///
    /// Each worker wraps a fresh kernel from `factory`, which receives the
    /// worker's index so callers can hand each kernel its shard. If any
    /// kernel's setup fails, the already-spawned workers are torn down and
    /// the setup error is returned; no half-ready pool escapes.
    pub fn start<K, F>(config: PoolConfig, mut factory: F) -> Result<Self>
    where
        K: Kernel<Input = I>,
        F: FnMut(usize) -> K,
    {
        if config.workers == 0 {
            return Err(Error::InvalidConfig(
                "pool needs at least one worker".to_string(),
            ));
        }

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            workers.push(spawn_looping(
                index,
                factory(index),
                worker_config_for(&config, index),
                &config.channel,
            )?);
        }

        // Ready barrier: every worker must finish setup before the driver
        // gets control back.
        let mut setup_error = None;
        for worker in &workers {
            if let Err(e) = worker.wait_ready() {
                setup_error = Some(e);
                break;
            }
        }

        if let Some(error) = setup_error {
            for worker in &workers {
                let _ = worker.send_die();
            }
            for worker in &mut workers {
                let _ = worker.join();
            }
            return Err(error);
        }

        debug!(workers = config.workers, "pool ready");

        Ok(Self {
            config,
            workers: Mutex::new(workers),
            monitor: Mutex::new(HeartbeatMonitor::new()),
        })
    }

    /// Run one full calculation round and return the sum of all partials
    ///
    /// Broadcasts a copy of `input` to every worker, blocks until every
    /// channel has produced exactly one result, and reduces by summation.
    /// A worker that dies mid-round is detected through its dropped channel
    /// and surfaces as [`Error::WorkerLost`] instead of hanging the fan-in.
    pub fn evaluate(&self, input: I) -> Result<f64> {
        let workers = self.workers.lock();
        if workers.is_empty() {
            return Err(Error::PoolStopped);
        }

        if self.config.progress {
            self.monitor.lock().begin();
        }

        let result = Self::round(&workers, input);

        if self.config.progress {
            self.monitor.lock().end(result.as_ref().ok().copied());
        }

        if let Ok(value) = &result {
            info!(value = *value, "round complete");
        }
        result
    }

    fn round(workers: &[LoopingWorker<I>], input: I) -> Result<f64> {
        // Fan-out: every live channel gets its own copy of the input.
        for worker in workers {
            worker
                .send(input.clone())
                .map_err(|_| Error::WorkerLost { worker: worker.id() })?;
        }

        // Fan-in: exactly one value per worker, order irrelevant to the sum.
        let mut total = 0.0;
        for worker in workers {
            let envelope = worker
                .recv()
                .map_err(|_| Error::WorkerLost { worker: worker.id() })?;
            total += envelope.payload;
        }

        Ok(total)
    }

    /// Number of live workers (zero after [`DuplexPool::stop`])
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// The last reduced value the heartbeat recorded, if any
    pub fn last_value(&self) -> Option<f64> {
        self.monitor.lock().last_value()
    }

    /// Send the die sentinel to every worker and join them all
    ///
    /// Idempotent: stopping an already-stopped pool is a no-op.
    pub fn stop(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if workers.is_empty() {
            return Ok(());
        }

        for worker in workers.iter() {
            // A worker that already died cannot receive the sentinel; join
            // below still reaps it.
            let _ = worker.send_die();
        }

        let mut first_error = None;
        for worker in workers.iter_mut() {
            if let Err(e) = worker.join() {
                first_error.get_or_insert(e);
            }
        }
        workers.clear();

        debug!("pool stopped");
        first_error.map_or(Ok(()), Err)
    }
}

impl<I> Drop for DuplexPool<I> {
    fn drop(&mut self) {
        let workers = self.workers.get_mut();
        for worker in workers.iter() {
            let _ = worker.send_die();
        }
        for worker in workers.iter_mut() {
            let _ = worker.join();
        }
        workers.clear();
    }
}

/// Run a single-shot pool to completion and collect one output per worker
///
/// Spawns `config.workers` single-shot workers, waits for every setup to
/// finish, gathers each worker's single result in worker order, and waits
/// for natural termination. No die sentinel is sent. The reduction is left
/// to the caller; see [`run_once_reduced`] for the closed form.
pub fn run_once<K, F>(config: &PoolConfig, mut factory: F) -> Result<Vec<K::Output>>
where
    K: SingleKernel,
    F: FnMut(usize) -> K,
{
    if config.workers == 0 {
        return Err(Error::InvalidConfig(
            "pool needs at least one worker".to_string(),
        ));
    }

    let mut workers = Vec::with_capacity(config.workers);
    for index in 0..config.workers {
        workers.push(spawn_single(
            index,
            factory(index),
            worker_config_for(config, index),
            &config.channel,
        )?);
    }

    let result = (|| -> Result<Vec<K::Output>> {
        for worker in &workers {
            worker.wait_ready()?;
        }

        let mut outputs = Vec::with_capacity(workers.len());
        for worker in &workers {
            let envelope = worker
                .recv()
                .map_err(|_| Error::WorkerLost { worker: worker.id() })?;
            outputs.push(envelope.payload);
        }
        Ok(outputs)
    })();

    // Single-shot workers self-terminate; reap them regardless of outcome.
    for worker in &mut workers {
        let _ = worker.join();
    }

    result
}

/// Run a single-shot pool and reduce the collected outputs
///
/// The reduction strategy is a parameter by design: likelihood-style
/// workloads sum, simulation-style workloads concatenate or pass through.
pub fn run_once_reduced<K, F, R, T>(config: &PoolConfig, factory: F, reduce: R) -> Result<T>
where
    K: SingleKernel,
    F: FnMut(usize) -> K,
    R: FnOnce(Vec<K::Output>) -> T,
{
    run_once(config, factory).map(reduce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Parameters;

    struct SumKernel {
        weight: f64,
    }

    impl Kernel for SumKernel {
        type Input = Parameters;

        fn setup(&mut self) -> Result<()> {
            Ok(())
        }

        fn process(&mut self, input: &Parameters) -> Result<f64> {
            Ok(input.iter().sum::<f64>() * self.weight)
        }
    }

    struct CountSingle {
        events: usize,
    }

    impl SingleKernel for CountSingle {
        type Output = usize;

        fn setup(&mut self) -> Result<()> {
            Ok(())
        }

        fn process(&mut self) -> Result<usize> {
            Ok(self.events)
        }
    }

    #[test]
    fn test_pool_creation_and_stop() {
        let config = PoolConfig::new().with_workers(4);
        let pool = DuplexPool::start(config, |_| SumKernel { weight: 1.0 }).unwrap();

        assert_eq!(pool.worker_count(), 4);
        pool.stop().unwrap();
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_evaluate_sums_partials() {
        let config = PoolConfig::new().with_workers(3);
        let pool = DuplexPool::start(config, |_| SumKernel { weight: 1.0 }).unwrap();

        // Three workers each return 6.0.
        assert_eq!(pool.evaluate(vec![1.0, 2.0, 3.0]).unwrap(), 18.0);
        pool.stop().unwrap();
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = PoolConfig::new().with_workers(0);
        let result = DuplexPool::start(config, |_| SumKernel { weight: 1.0 });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_worker_naming_defaults_per_index() {
        let config = PoolConfig::new().with_workers(2);
        assert_eq!(
            worker_config_for(&config, 0).name.as_deref(),
            Some("calc-0")
        );
        assert_eq!(
            worker_config_for(&config, 1).name.as_deref(),
            Some("calc-1")
        );

        // An explicit name on the template wins over the default.
        let named = PoolConfig::new()
            .with_worker_config(WorkerConfig::new().with_name("fit"));
        assert_eq!(worker_config_for(&named, 0).name.as_deref(), Some("fit"));
    }

    #[test]
    fn test_run_once_collects_in_order() {
        let config = PoolConfig::new().with_workers(3);
        let counts = run_once(&config, |i| CountSingle { events: 100 + i }).unwrap();
        assert_eq!(counts, vec![100, 101, 102]);
    }

    #[test]
    fn test_run_once_reduced_sum() {
        let config = PoolConfig::new().with_workers(3);
        let total =
            run_once_reduced(&config, |_| CountSingle { events: 5 }, |outputs| {
                outputs.iter().sum::<usize>()
            })
            .unwrap();
        assert_eq!(total, 15);
    }
}
