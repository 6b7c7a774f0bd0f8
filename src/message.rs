//! Message types carried over the controller/worker channels

use std::fmt::Debug;

/// Trait for values that can cross a worker boundary
///
/// Payloads must be Send + 'static so they can be moved into a worker
/// without sharing references with the controller.
pub trait Message: Send + 'static {}

// Blanket implementation for all types that meet the requirements
impl<T: Send + 'static> Message for T {}

/// Controller-to-worker message: either a payload for one calculation round
/// or the control sentinel that terminates the worker's receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<I> {
    /// One round's input, typically a parameter vector
    Payload(I),

    /// Unconditionally terminate the receiving loop
    Die,
}

/// A worker-to-controller reply wrapping one partial result
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    /// The partial result itself
    pub payload: T,

    /// Index of the worker that produced it
    pub source: Option<usize>,

    /// Timestamp (in microseconds since epoch)
    pub timestamp: u64,
}

impl<T> Envelope<T> {
    /// Wrap a payload, stamping it with the current time
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            source: None,
            timestamp: current_timestamp_micros(),
        }
    }

    /// Set the producing worker's index
    pub fn with_source(mut self, source: usize) -> Self {
        self.source = Some(source);
        self
    }
}

/// Get current timestamp in microseconds
fn current_timestamp_micros() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_creation() {
        let envelope = Envelope::new(42.0).with_source(3);

        assert_eq!(envelope.payload, 42.0);
        assert_eq!(envelope.source, Some(3));
        assert!(envelope.timestamp > 0);
    }

    #[test]
    fn test_payload_types_satisfy_message() {
        fn assert_message<T: Message>() {}

        assert_message::<Vec<f64>>();
        assert_message::<Request<Vec<f64>>>();
        assert_message::<Envelope<f64>>();
    }

    #[test]
    fn test_request_die_is_distinct() {
        let payload: Request<Vec<f64>> = Request::Payload(vec![1.0]);
        let die: Request<Vec<f64>> = Request::Die;

        assert_ne!(payload, die);
    }
}
