//! Periodic sampler for the voice parameters.
//!
//! The sampler reads `energy`, `darkness` and `hats` from the
//! [`ParamStore`] at a fixed wall-clock cadence (100 ms by default) and hands
//! each reading to a [`FrameSink`], where synthesis logic attaches.
//!
//! Pacing is against absolute deadlines, so time spent in the sink does not
//! accumulate as drift. If the loop falls behind by more than one interval
//! it skips the missed deadlines instead of bursting to catch up.
//!
//! The loop runs until its [`StopToken`] is triggered, or for a bounded
//! number of iterations via [`Sampler::run`].

use crate::error::Result;
use crate::params::ParamStore;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default read interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 100;

/// One reading of the voice parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceFrame {
    /// 1-based index of the reading within its sampler.
    pub seq: u64,
    pub energy: f64,
    pub darkness: f64,
    pub hats: f64,
}

impl VoiceFrame {
    /// Low-pass cutoff (MIDI note) derived from darkness: `60 + darkness * 100`.
    pub fn cutoff(&self) -> f64 {
        60.0 + self.darkness * 100.0
    }
}

/// Receives every sampled frame.
pub trait FrameSink: Send {
    fn on_frame(&mut self, frame: &VoiceFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(&VoiceFrame) + Send,
{
    fn on_frame(&mut self, frame: &VoiceFrame) {
        self(frame)
    }
}

/// Sink that forwards frames into a channel.
///
/// Frames are dropped once the receiving side has gone away.
pub fn channel_sink(tx: Sender<VoiceFrame>) -> impl FrameSink {
    move |frame: &VoiceFrame| {
        let _ = tx.send(*frame);
    }
}

/// Cancellation handle shared between a loop and whoever stops it.
///
/// Stopping wakes a loop that is waiting for its next deadline.
#[derive(Clone)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

impl StopToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Request stop. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout`. Returns `true` if stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) => {
                // Leave the wake-up in place for any other waiter.
                let _ = self.wake_tx.try_send(());
                true
            }
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

impl std::fmt::Debug for StopToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopToken")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Reads the voice parameters on a fixed cadence.
pub struct Sampler<S: FrameSink> {
    store: ParamStore,
    interval: Duration,
    sink: S,
    seq: u64,
}

impl<S: FrameSink> Sampler<S> {
    /// Create a sampler reading `store` every `interval`.
    ///
    /// A zero interval is raised to 1 ms.
    pub fn new(store: ParamStore, interval: Duration, sink: S) -> Self {
        Self {
            store,
            interval: interval.max(Duration::from_millis(1)),
            sink,
            seq: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of frames produced so far.
    pub fn frames(&self) -> u64 {
        self.seq
    }

    /// Take one reading and forward it to the sink.
    pub fn tick(&mut self) -> VoiceFrame {
        let (energy, darkness, hats) = self.store.voice_params();
        self.seq += 1;
        let frame = VoiceFrame {
            seq: self.seq,
            energy,
            darkness,
            hats,
        };
        log::trace!(
            "[SAMPLER] #{} energy={:.3} darkness={:.3} hats={:.3}",
            frame.seq,
            frame.energy,
            frame.darkness,
            frame.hats
        );
        self.sink.on_frame(&frame);
        frame
    }

    /// Run the loop until `stop` fires or `max_ticks` frames were produced.
    ///
    /// The first frame is taken immediately. Returns the number of frames
    /// produced by this call.
    pub fn run(&mut self, stop: &StopToken, max_ticks: Option<u64>) -> u64 {
        let mut produced = 0u64;
        let mut deadline = Instant::now();

        loop {
            if stop.is_stopped() {
                break;
            }
            self.tick();
            produced += 1;
            if max_ticks.is_some_and(|max| produced >= max) {
                break;
            }

            deadline += self.interval;
            let now = Instant::now();
            if deadline < now {
                log::debug!(
                    "[SAMPLER] Fell behind by {:?}, skipping missed deadlines",
                    now - deadline
                );
                deadline = now;
            }
            if stop.wait_timeout(deadline.saturating_duration_since(now)) {
                break;
            }
        }

        produced
    }

    /// Hand the sink back, e.g. to inspect what it collected.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// A sampler running on its own thread.
///
/// Dropping the task stops the loop and joins the thread.
pub struct SamplerTask {
    stop: StopToken,
    thread_handle: Option<JoinHandle<u64>>,
}

impl SamplerTask {
    /// Start `sampler` on a dedicated thread.
    pub fn spawn<S: FrameSink + 'static>(mut sampler: Sampler<S>) -> Result<Self> {
        let stop = StopToken::new();
        let thread_stop = stop.clone();
        log::info!("[SAMPLER] Starting, interval {:?}", sampler.interval());
        let thread_handle = thread::Builder::new()
            .name("voice-sampler".to_string())
            .spawn(move || sampler.run(&thread_stop, None))?;
        Ok(Self {
            stop,
            thread_handle: Some(thread_handle),
        })
    }

    /// Token that stops this task when triggered.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Stop the loop and return how many frames it produced.
    pub fn stop(mut self) -> u64 {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> u64 {
        self.stop.stop();
        let Some(handle) = self.thread_handle.take() else {
            return 0;
        };
        match handle.join() {
            Ok(frames) => {
                log::info!("[SAMPLER] Stopped after {} frames", frames);
                frames
            }
            Err(_) => {
                log::error!("[SAMPLER] Sampler thread panicked");
                0
            }
        }
    }
}

impl Drop for SamplerTask {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
