//! Worker lifecycle: isolated execution contexts owning one kernel each
//!
//! A worker is an OS thread with ownership-enforced isolation: the kernel
//! and its event shard are moved in at spawn time and the duplex channel is
//! the only communication path back to the controller. The lifecycle is
//!
//! ```text
//! SPAWNED -> SETUP -> READY <-> BUSY -> (READY | TERMINATED)
//! ```
//!
//! Looping workers run receive -> process -> send until the die sentinel or
//! a kernel failure; single-shot workers run one setup -> process -> send
//! cycle and terminate on their own.

use crate::channel::{duplex, Channel, ChannelConfig, ControllerEnd, Receiver};
use crate::error::{Error, Result};
use crate::kernel::{Kernel, SingleKernel};
use crate::message::{Envelope, Request};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Worker index within its pool
pub type WorkerId = usize;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Thread created, kernel and channel end bound, nothing executed yet
    Spawned = 0,

    /// Kernel setup in progress
    Setup = 1,

    /// Blocked on receive, waiting for the next round
    Ready = 2,

    /// Executing the kernel's process step
    Busy = 3,

    /// Worker has exited, normally or abnormally
    Terminated = 4,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WorkerState::Spawned,
            1 => WorkerState::Setup,
            2 => WorkerState::Ready,
            3 => WorkerState::Busy,
            _ => WorkerState::Terminated,
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker name (for thread naming and diagnostics)
    pub name: Option<String>,

    /// CPU core to pin this worker to (None = no pinning)
    pub cpu_affinity: Option<usize>,

    /// Stack size for the worker thread (None = default)
    pub stack_size: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: None,
            cpu_affinity: None,
            stack_size: None,
        }
    }
}

impl WorkerConfig {
    /// Create a new worker configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set CPU affinity
    pub fn with_cpu_affinity(mut self, cpu: usize) -> Self {
        self.cpu_affinity = Some(cpu);
        self
    }

    /// Set stack size
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

// The setup acknowledgement carries either readiness or the setup failure
// message; kernel errors are not Clone so the message crosses as a String.
type ReadySignal = std::result::Result<(), String>;

/// Handle to a running looping worker
pub struct LoopingWorker<I> {
    id: WorkerId,
    config: WorkerConfig,
    channel: ControllerEnd<I, f64>,
    ready: Receiver<ReadySignal>,
    thread: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
}

impl<I> LoopingWorker<I> {
    /// Get the worker's pool index
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Get the worker name
    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Block until the worker has finished setup and reached READY
    ///
    /// Surfaces setup failures as [`Error::SetupFailed`], including the case
    /// where the worker died before acknowledging.
    pub fn wait_ready(&self) -> Result<()> {
        match self.ready.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(Error::SetupFailed {
                worker: self.id,
                message,
            }),
            Err(_) => Err(Error::SetupFailed {
                worker: self.id,
                message: "worker terminated before signalling ready".to_string(),
            }),
        }
    }

    /// Send one round's input to this worker
    pub fn send(&self, input: I) -> Result<()> {
        self.channel.send(input)
    }

    /// Block until this worker's partial result for the current round
    pub fn recv(&self) -> Result<Envelope<f64>> {
        self.channel.recv()
    }

    /// Send the die sentinel
    pub fn send_die(&self) -> Result<()> {
        self.channel.send_die()
    }

    /// Join the worker thread, waiting for TERMINATED
    pub fn join(&mut self) -> Result<()> {
        if let Some(handle) = self.thread.take() {
            handle.join().map_err(|_| Error::WorkerPanicked(self.id))?;
        }
        Ok(())
    }
}

/// Spawn a looping worker around a kernel
///
/// The kernel is moved into the worker thread; `setup` runs there, then the
/// worker loops on receive -> process -> send until it observes the die
/// sentinel, the controller end is dropped, or the kernel fails.
pub fn spawn_looping<K: Kernel>(
    id: WorkerId,
    mut kernel: K,
    config: WorkerConfig,
    channel_config: &ChannelConfig,
) -> Result<LoopingWorker<K::Input>> {
    let (controller, worker_end) = duplex::<K::Input, f64>(channel_config);
    let (ready_tx, ready_rx) = Channel::bounded::<ReadySignal>(1);

    let state = Arc::new(AtomicU8::new(WorkerState::Spawned as u8));
    let thread_state = Arc::clone(&state);
    let thread_config = config.clone();

    let handle = builder_for(id, &config)
        .spawn(move || {
            pin_to_core(thread_config.cpu_affinity);

            thread_state.store(WorkerState::Setup as u8, Ordering::Release);
            if let Err(e) = kernel.setup() {
                error!(worker = id, error = %e, "kernel setup failed");
                let _ = ready_tx.send(Err(e.to_string()));
                thread_state.store(WorkerState::Terminated as u8, Ordering::Release);
                return;
            }
            if ready_tx.send(Ok(())).is_err() {
                thread_state.store(WorkerState::Terminated as u8, Ordering::Release);
                return;
            }

            loop {
                thread_state.store(WorkerState::Ready as u8, Ordering::Release);
                match worker_end.recv() {
                    Ok(Request::Payload(input)) => {
                        thread_state.store(WorkerState::Busy as u8, Ordering::Release);
                        match kernel.process(&input) {
                            Ok(value) => {
                                let envelope = Envelope::new(value).with_source(id);
                                if worker_end.send(envelope).is_err() {
                                    // Controller gone; nothing left to serve.
                                    break;
                                }
                            }
                            Err(e) => {
                                error!(worker = id, error = %e, "kernel processing failed");
                                break;
                            }
                        }
                    }
                    Ok(Request::Die) | Err(_) => {
                        debug!(worker = id, "worker shutting down");
                        break;
                    }
                }
            }
            thread_state.store(WorkerState::Terminated as u8, Ordering::Release);
        })
        .map_err(Error::Io)?;

    Ok(LoopingWorker {
        id,
        config,
        channel: controller,
        ready: ready_rx,
        thread: Some(handle),
        state,
    })
}

/// Handle to a running single-shot worker
pub struct SingleWorker<O> {
    id: WorkerId,
    replies: Receiver<Envelope<O>>,
    ready: Receiver<ReadySignal>,
    thread: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
}

impl<O> SingleWorker<O> {
    /// Get the worker's pool index
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Block until the worker has finished setup
    pub fn wait_ready(&self) -> Result<()> {
        match self.ready.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(Error::SetupFailed {
                worker: self.id,
                message,
            }),
            Err(_) => Err(Error::SetupFailed {
                worker: self.id,
                message: "worker terminated before signalling ready".to_string(),
            }),
        }
    }

    /// Block until the worker's single result
    pub fn recv(&self) -> Result<Envelope<O>> {
        self.replies.recv()
    }

    /// Join the worker thread, waiting for TERMINATED
    pub fn join(&mut self) -> Result<()> {
        if let Some(handle) = self.thread.take() {
            handle.join().map_err(|_| Error::WorkerPanicked(self.id))?;
        }
        Ok(())
    }
}

/// Spawn a single-shot worker: setup, one process call, one send, exit
///
/// No die sentinel is involved; the worker terminates naturally after
/// sending its result.
pub fn spawn_single<K: SingleKernel>(
    id: WorkerId,
    mut kernel: K,
    config: WorkerConfig,
    channel_config: &ChannelConfig,
) -> Result<SingleWorker<K::Output>> {
    let (reply_tx, reply_rx) = Channel::with_config::<Envelope<K::Output>>(channel_config);
    let (ready_tx, ready_rx) = Channel::bounded::<ReadySignal>(1);

    let state = Arc::new(AtomicU8::new(WorkerState::Spawned as u8));
    let thread_state = Arc::clone(&state);
    let cpu = config.cpu_affinity;

    let handle = builder_for(id, &config)
        .spawn(move || {
            pin_to_core(cpu);

            thread_state.store(WorkerState::Setup as u8, Ordering::Release);
            if let Err(e) = kernel.setup() {
                error!(worker = id, error = %e, "kernel setup failed");
                let _ = ready_tx.send(Err(e.to_string()));
                thread_state.store(WorkerState::Terminated as u8, Ordering::Release);
                return;
            }
            let _ = ready_tx.send(Ok(()));

            thread_state.store(WorkerState::Busy as u8, Ordering::Release);
            match kernel.process() {
                Ok(value) => {
                    let _ = reply_tx.send(Envelope::new(value).with_source(id));
                }
                Err(e) => {
                    error!(worker = id, error = %e, "kernel processing failed");
                }
            }
            thread_state.store(WorkerState::Terminated as u8, Ordering::Release);
        })
        .map_err(Error::Io)?;

    Ok(SingleWorker {
        id,
        replies: reply_rx,
        ready: ready_rx,
        thread: Some(handle),
        state,
    })
}

fn builder_for(id: WorkerId, config: &WorkerConfig) -> thread::Builder {
    let mut builder = thread::Builder::new();

    builder = match &config.name {
        Some(name) => builder.name(format!("worker-{}-{}", id, name)),
        None => builder.name(format!("worker-{}", id)),
    };

    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    builder
}

fn pin_to_core(cpu: Option<usize>) {
    if let Some(cpu) = cpu {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if cpu < core_ids.len() {
                core_affinity::set_for_current(core_ids[cpu]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Parameters;

    struct ScaleKernel {
        factor: f64,
        ready: bool,
    }

    impl Kernel for ScaleKernel {
        type Input = Parameters;

        fn setup(&mut self) -> Result<()> {
            self.ready = true;
            Ok(())
        }

        fn process(&mut self, input: &Parameters) -> Result<f64> {
            assert!(self.ready, "process before setup");
            Ok(input.iter().sum::<f64>() * self.factor)
        }
    }

    struct FailingSetup;

    impl Kernel for FailingSetup {
        type Input = Parameters;

        fn setup(&mut self) -> Result<()> {
            Err(Error::Kernel("normalization integral diverged".to_string()))
        }

        fn process(&mut self, _input: &Parameters) -> Result<f64> {
            unreachable!("setup always fails")
        }
    }

    struct ConstantSingle(f64);

    impl SingleKernel for ConstantSingle {
        type Output = f64;

        fn setup(&mut self) -> Result<()> {
            Ok(())
        }

        fn process(&mut self) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_looping_lifecycle() {
        let kernel = ScaleKernel {
            factor: 2.0,
            ready: false,
        };
        let mut worker =
            spawn_looping(0, kernel, WorkerConfig::new(), &ChannelConfig::new()).unwrap();

        worker.wait_ready().unwrap();

        worker.send(vec![1.0, 2.0]).unwrap();
        let envelope = worker.recv().unwrap();
        assert_eq!(envelope.payload, 6.0);
        assert_eq!(envelope.source, Some(0));

        worker.send_die().unwrap();
        worker.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Terminated);
    }

    #[test]
    fn test_setup_failure_surfaces() {
        let mut worker =
            spawn_looping(3, FailingSetup, WorkerConfig::new(), &ChannelConfig::new()).unwrap();

        let err = worker.wait_ready().unwrap_err();
        match err {
            Error::SetupFailed { worker: id, message } => {
                assert_eq!(id, 3);
                assert!(message.contains("diverged"));
            }
            other => panic!("unexpected error: {other}"),
        }

        worker.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Terminated);
    }

    #[test]
    fn test_single_shot_terminates_without_die() {
        let mut worker = spawn_single(
            1,
            ConstantSingle(7.5),
            WorkerConfig::new().with_name("once"),
            &ChannelConfig::new(),
        )
        .unwrap();

        worker.wait_ready().unwrap();
        assert_eq!(worker.recv().unwrap().payload, 7.5);
        worker.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Terminated);
    }

    #[test]
    fn test_dropped_controller_stops_worker() {
        let kernel = ScaleKernel {
            factor: 1.0,
            ready: false,
        };
        let mut worker =
            spawn_looping(0, kernel, WorkerConfig::new(), &ChannelConfig::new()).unwrap();
        worker.wait_ready().unwrap();

        // Dropping the handle's channel is only possible by dropping the
        // handle itself, so exercise the path through join after die.
        worker.send_die().unwrap();
        worker.join().unwrap();
        assert!(worker.recv().is_err());
    }
}
