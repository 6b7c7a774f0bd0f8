//! Point-to-point duplex channels between the controller and one worker
//!
//! Each worker is connected to the controller by exactly one duplex channel:
//! a pair of one-directional FIFO queues, one carrying requests (parameter
//! vectors or the die sentinel) down to the worker, the other carrying
//! result envelopes back up. Exactly one reader and one writer per
//! direction; closure is implicit when either side is dropped.

use crate::error::{Error, Result};
use crate::message::{Envelope, Request};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Channel backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Flume channels (default)
    #[default]
    Flume,

    /// Crossbeam channels
    Crossbeam,
}

/// Channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Buffer capacity
    pub capacity: usize,

    /// Whether to use bounded or unbounded channels
    pub bounded: bool,

    /// Timeout for receive operations (None = block indefinitely)
    pub timeout: Option<Duration>,

    /// Which channel implementation to use
    pub backend: Backend,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            bounded: true,
            timeout: None,
            backend: Backend::Flume,
        }
    }
}

impl ChannelConfig {
    /// Create a new channel configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set whether the channel is bounded
    pub fn with_bounded(mut self, bounded: bool) -> Self {
        self.bounded = bounded;
        self
    }

    /// Set the receive timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the backend
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}

/// Per-direction message counters
///
/// Fan-in accounting leans on these in tests: one round must move exactly
/// one message per direction per worker.
#[derive(Debug, Default)]
pub struct ChannelStats {
    sent: AtomicU64,
    received: AtomicU64,
}

impl ChannelStats {
    /// Number of messages sent
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Number of messages received
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// Sender half of a one-directional queue
pub struct Sender<T> {
    inner: SenderInner<T>,
    stats: Arc<ChannelStats>,
}

enum SenderInner<T> {
    Flume(flume::Sender<T>),
    Crossbeam(crossbeam::channel::Sender<T>),
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: match &self.inner {
                SenderInner::Flume(s) => SenderInner::Flume(s.clone()),
                SenderInner::Crossbeam(s) => SenderInner::Crossbeam(s.clone()),
            },
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> Sender<T> {
    /// Enqueue a message; messages are delivered in FIFO order
    pub fn send(&self, msg: T) -> Result<()> {
        let result = match &self.inner {
            SenderInner::Flume(s) => s.send(msg).map_err(|e| Error::Send(e.to_string())),
            SenderInner::Crossbeam(s) => s.send(msg).map_err(|e| Error::Send(e.to_string())),
        };

        if result.is_ok() {
            self.stats.sent.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Get channel statistics
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }
}

/// Receiver half of a one-directional queue
pub struct Receiver<T> {
    inner: ReceiverInner<T>,
    stats: Arc<ChannelStats>,
    timeout: Option<Duration>,
}

enum ReceiverInner<T> {
    Flume(flume::Receiver<T>),
    Crossbeam(crossbeam::channel::Receiver<T>),
}

impl<T> Receiver<T> {
    /// Block until a message is available and return it
    ///
    /// Returns [`Error::Receive`] once the sending side has been dropped and
    /// the queue is drained, or [`Error::Timeout`] if the channel was
    /// configured with a receive timeout that elapsed.
    pub fn recv(&self) -> Result<T> {
        let result = match &self.inner {
            ReceiverInner::Flume(r) => {
                if let Some(timeout) = self.timeout {
                    r.recv_timeout(timeout).map_err(|e| match e {
                        flume::RecvTimeoutError::Timeout => Error::Timeout,
                        flume::RecvTimeoutError::Disconnected => {
                            Error::Receive("channel disconnected".to_string())
                        }
                    })
                } else {
                    r.recv().map_err(|e| Error::Receive(e.to_string()))
                }
            }
            ReceiverInner::Crossbeam(r) => {
                if let Some(timeout) = self.timeout {
                    r.recv_timeout(timeout).map_err(|e| match e {
                        crossbeam::channel::RecvTimeoutError::Timeout => Error::Timeout,
                        crossbeam::channel::RecvTimeoutError::Disconnected => {
                            Error::Receive("channel disconnected".to_string())
                        }
                    })
                } else {
                    r.recv().map_err(|e| Error::Receive(e.to_string()))
                }
            }
        };

        if result.is_ok() {
            self.stats.received.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Result<T> {
        let result = match &self.inner {
            ReceiverInner::Flume(r) => match r.try_recv() {
                Ok(msg) => Ok(msg),
                Err(flume::TryRecvError::Empty) => Err(Error::Receive("channel empty".to_string())),
                Err(flume::TryRecvError::Disconnected) => {
                    Err(Error::Receive("channel disconnected".to_string()))
                }
            },
            ReceiverInner::Crossbeam(r) => match r.try_recv() {
                Ok(msg) => Ok(msg),
                Err(crossbeam::channel::TryRecvError::Empty) => {
                    Err(Error::Receive("channel empty".to_string()))
                }
                Err(crossbeam::channel::TryRecvError::Disconnected) => {
                    Err(Error::Receive("channel disconnected".to_string()))
                }
            },
        };

        if result.is_ok() {
            self.stats.received.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Get channel statistics
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }
}

/// Channel factory
pub struct Channel;

impl Channel {
    /// Create a one-directional queue with the given configuration
    pub fn with_config<T>(config: &ChannelConfig) -> (Sender<T>, Receiver<T>) {
        let stats = Arc::new(ChannelStats::default());

        let (tx_inner, rx_inner) = match config.backend {
            Backend::Flume => {
                let (tx, rx) = if config.bounded {
                    flume::bounded(config.capacity)
                } else {
                    flume::unbounded()
                };
                (SenderInner::Flume(tx), ReceiverInner::Flume(rx))
            }
            Backend::Crossbeam => {
                let (tx, rx) = if config.bounded {
                    crossbeam::channel::bounded(config.capacity)
                } else {
                    crossbeam::channel::unbounded()
                };
                (SenderInner::Crossbeam(tx), ReceiverInner::Crossbeam(rx))
            }
        };

        (
            Sender {
                inner: tx_inner,
                stats: Arc::clone(&stats),
            },
            Receiver {
                inner: rx_inner,
                stats,
                timeout: config.timeout,
            },
        )
    }

    /// Create a bounded queue with the default backend
    pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
        Self::with_config(&ChannelConfig::new().with_capacity(capacity))
    }

    /// Create an unbounded queue with the default backend
    pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
        Self::with_config(&ChannelConfig::new().with_bounded(false))
    }
}

/// Controller-side end of a duplex channel
///
/// Sends requests down to one worker, receives that worker's result
/// envelopes. Owned by the pool manager.
pub struct ControllerEnd<I, O> {
    requests: Sender<Request<I>>,
    replies: Receiver<Envelope<O>>,
}

impl<I, O> ControllerEnd<I, O> {
    /// Send one round's input to the worker
    pub fn send(&self, input: I) -> Result<()> {
        self.requests.send(Request::Payload(input))
    }

    /// Send the die sentinel, terminating the worker's receive loop
    pub fn send_die(&self) -> Result<()> {
        self.requests.send(Request::Die)
    }

    /// Block until the worker's next result envelope arrives
    ///
    /// Fails once the worker has exited and its queue is drained, which is
    /// how a silent (dead) worker is detected during fan-in.
    pub fn recv(&self) -> Result<Envelope<O>> {
        self.replies.recv()
    }

    /// Statistics for the request direction
    pub fn request_stats(&self) -> Arc<ChannelStats> {
        self.requests.stats()
    }

    /// Statistics for the reply direction
    pub fn reply_stats(&self) -> Arc<ChannelStats> {
        self.replies.stats()
    }
}

/// Worker-side end of a duplex channel
pub struct WorkerEnd<I, O> {
    requests: Receiver<Request<I>>,
    replies: Sender<Envelope<O>>,
}

impl<I, O> WorkerEnd<I, O> {
    /// Block until the next request from the controller
    pub fn recv(&self) -> Result<Request<I>> {
        self.requests.recv()
    }

    /// Send one result envelope back to the controller
    pub fn send(&self, envelope: Envelope<O>) -> Result<()> {
        self.replies.send(envelope)
    }
}

/// Create a duplex channel: one controller end, one worker end
pub fn duplex<I, O>(config: &ChannelConfig) -> (ControllerEnd<I, O>, WorkerEnd<I, O>) {
    let (request_tx, request_rx) = Channel::with_config(config);
    let (reply_tx, reply_rx) = Channel::with_config(config);

    (
        ControllerEnd {
            requests: request_tx,
            replies: reply_rx,
        },
        WorkerEnd {
            requests: request_rx,
            replies: reply_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_delivery() {
        let (tx, rx) = Channel::bounded::<i32>(10);

        tx.send(42).unwrap();
        tx.send(43).unwrap();

        assert_eq!(rx.recv().unwrap(), 42);
        assert_eq!(rx.recv().unwrap(), 43);

        assert_eq!(tx.stats().sent(), 2);
        assert_eq!(rx.stats().received(), 2);
    }

    #[test]
    fn test_crossbeam_backend() {
        let config = ChannelConfig::new()
            .with_capacity(4)
            .with_backend(Backend::Crossbeam);
        let (tx, rx) = Channel::with_config::<u64>(&config);

        for i in 0..4 {
            tx.send(i).unwrap();
        }
        for i in 0..4 {
            assert_eq!(rx.recv().unwrap(), i);
        }
    }

    #[test]
    fn test_recv_timeout() {
        let config = ChannelConfig::new().with_timeout(Duration::from_millis(10));
        let (_tx, rx) = Channel::with_config::<i32>(&config);

        assert!(matches!(rx.recv(), Err(Error::Timeout)));
    }

    #[test]
    fn test_recv_after_sender_dropped() {
        let (tx, rx) = Channel::bounded::<i32>(4);
        tx.send(7).unwrap();
        drop(tx);

        // Buffered message is still delivered, then disconnection surfaces.
        assert_eq!(rx.recv().unwrap(), 7);
        assert!(matches!(rx.recv(), Err(Error::Receive(_))));
    }

    #[test]
    fn test_duplex_round() {
        let (controller, worker) = duplex::<Vec<f64>, f64>(&ChannelConfig::new());

        let handle = thread::spawn(move || loop {
            match worker.recv().unwrap() {
                Request::Payload(p) => {
                    let sum = p.iter().sum::<f64>();
                    worker.send(Envelope::new(sum).with_source(0)).unwrap();
                }
                Request::Die => break,
            }
        });

        controller.send(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(controller.recv().unwrap().payload, 6.0);

        controller.send_die().unwrap();
        handle.join().unwrap();

        assert_eq!(controller.request_stats().sent(), 2);
        assert_eq!(controller.reply_stats().received(), 1);
    }
}
