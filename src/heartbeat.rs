//! Heartbeat monitor: a controller-side status line for long rounds
//!
//! While the pool is blocked on fan-in, a background display task redraws a
//! single console line once per second: a pulse glyph, the elapsed time, and
//! once a prior round has completed, the last reduced value and the running
//! average round duration. The task is coordinated through two one-slot
//! signals (stop and acknowledge) and never touches the numeric path.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::warn;

const PULSE_FRAMES: [char; 4] = ['-', '/', '|', '\\'];
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// Accumulated display state, owned by the pool manager for the life of a run
///
/// Mutated only on `begin`/`end`; the display thread works from a snapshot
/// taken at `begin`.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    last_value: Option<f64>,
    times: Vec<Duration>,
    round: Option<RoundGuard>,
}

#[derive(Debug)]
struct RoundGuard {
    stop: flume::Sender<()>,
    done: flume::Receiver<Duration>,
    thread: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    /// Create an empty monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the display task for one round
    ///
    /// A no-op if a round is already being displayed. Failure to spawn the
    /// display thread is logged and swallowed; observation must never fail
    /// an evaluation.
    pub fn begin(&mut self) {
        if self.round.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let (done_tx, done_rx) = flume::bounded::<Duration>(1);
        let last_value = self.last_value;
        let average = self.average_time();

        match thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || display_loop(stop_rx, done_tx, last_value, average))
        {
            Ok(handle) => {
                self.round = Some(RoundGuard {
                    stop: stop_tx,
                    done: done_rx,
                    thread: Some(handle),
                });
            }
            Err(e) => warn!(error = %e, "could not start heartbeat display"),
        }
    }

    /// Stop the display task, record the round's elapsed time, and remember
    /// the reduced value for the next round's status line
    pub fn end(&mut self, value: Option<f64>) {
        if let Some(mut round) = self.round.take() {
            let _ = round.stop.send(());
            if let Ok(elapsed) = round.done.recv() {
                self.times.push(elapsed);
            }
            if let Some(handle) = round.thread.take() {
                let _ = handle.join();
            }
        }

        if value.is_some() {
            self.last_value = value;
        }
    }

    /// The last reduced value, absent before the first completed round
    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    /// Number of completed rounds recorded so far
    pub fn rounds(&self) -> usize {
        self.times.len()
    }

    /// Running average round duration (zero before the first round)
    pub fn average_time(&self) -> Duration {
        if self.times.is_empty() {
            Duration::ZERO
        } else {
            self.times.iter().sum::<Duration>() / self.times.len() as u32
        }
    }
}

fn display_loop(
    stop: flume::Receiver<()>,
    done: flume::Sender<Duration>,
    last_value: Option<f64>,
    average: Duration,
) {
    let start = Instant::now();
    let mut frame = 0usize;

    loop {
        match stop.recv_timeout(REDRAW_INTERVAL) {
            Err(flume::RecvTimeoutError::Timeout) => {
                let pulse = PULSE_FRAMES[frame % PULSE_FRAMES.len()];
                frame += 1;
                print!("\r{}", render(pulse, start.elapsed(), last_value, average));
                let _ = io::stdout().flush();
            }
            Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = done.send(start.elapsed());
}

fn render(pulse: char, elapsed: Duration, last_value: Option<f64>, average: Duration) -> String {
    match last_value {
        None => format!("Elapsed time: {:>6.1}s {}", elapsed.as_secs_f64(), pulse),
        Some(value) => format!(
            "Last value: {:>14.6}, average time: {:>6.1}s, elapsed time: {:>6.1}s {}",
            value,
            average.as_secs_f64(),
            elapsed.as_secs_f64(),
            pulse
        ),
    }
}
