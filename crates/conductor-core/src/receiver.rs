//! OSC receiver that feeds the parameter store.
//!
//! The receiver owns the UDP socket (port 4560 by default) and runs a
//! listener thread that decodes every incoming packet and applies it to a
//! shared [`ParamStore`]. Malformed packets are logged and counted; they
//! never stop the listener.

use crate::config::OscSettings;
use crate::error::Result;
use crate::params::ParamStore;
use crate::protocol::{decode_packet, AddressMode, ParamCommand};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a blocking receive waits before re-checking the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Largest datagram the listener accepts.
const RECV_BUFFER_SIZE: usize = 65536;

/// Counters describing what the listener has seen so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams received
    pub packets: u64,
    /// Commands applied to the store
    pub applied: u64,
    /// Datagrams or messages that failed to decode
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    packets: AtomicU64,
    applied: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ReceiverStats {
        ReceiverStats {
            packets: self.packets.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Apply one decoded command to the store.
pub fn apply_command(store: &ParamStore, cmd: ParamCommand) {
    match cmd {
        ParamCommand::Set { key, value } => store.set(&key, value),
        ParamCommand::Save => store.save(),
        ParamCommand::Undo => {
            store.undo();
        }
        ParamCommand::Reset => store.reset(),
    }
}

/// Running OSC listener.
///
/// Dropping the receiver stops the listener thread and closes the socket.
pub struct OscReceiver {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    thread_handle: Option<JoinHandle<()>>,
}

impl OscReceiver {
    /// Bind `bind_addr` and start listening for parameter messages.
    ///
    /// # Arguments
    /// * `bind_addr` - Local address to bind (e.g. "0.0.0.0:4560", or port 0 for an ephemeral port)
    /// * `base` - Base OSC address, usually `/ai`
    /// * `mode` - Which addressing convention(s) to accept
    /// * `store` - Store that receives the decoded writes
    pub fn start<A: ToSocketAddrs>(
        bind_addr: A,
        base: impl Into<String>,
        mode: AddressMode,
        store: ParamStore,
    ) -> Result<Self> {
        let sock = UdpSocket::bind(bind_addr)?;
        sock.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = sock.local_addr()?;
        let base = base.into();

        log::info!(
            "[OSC_RECEIVER] Listening on {} for {} ({} addressing)",
            local_addr,
            base,
            mode
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());

        let thread_shutdown = shutdown.clone();
        let thread_counters = counters.clone();
        let thread_handle = thread::Builder::new()
            .name("osc-receiver".to_string())
            .spawn(move || {
                let listener = Listener {
                    sock,
                    base,
                    mode,
                    store,
                    counters: thread_counters,
                };
                listener.run(&thread_shutdown);
            })?;

        Ok(Self {
            local_addr,
            shutdown,
            counters,
            thread_handle: Some(thread_handle),
        })
    }

    /// Start a receiver from the `[osc]` config section.
    pub fn from_settings(settings: &OscSettings, store: ParamStore) -> Result<Self> {
        Self::start(
            (settings.bind.as_str(), settings.port),
            settings.address.clone(),
            settings.mode,
            store,
        )
    }

    /// The address the socket is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current listener counters.
    pub fn stats(&self) -> ReceiverStats {
        self.counters.snapshot()
    }

    /// Check if the listener thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the listener and wait for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("[OSC_RECEIVER] Listener thread panicked");
            }
            log::info!("[OSC_RECEIVER] Stopped listening on {}", self.local_addr);
        }
    }
}

impl Drop for OscReceiver {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl std::fmt::Debug for OscReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscReceiver")
            .field("local_addr", &self.local_addr)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// State owned by the listener thread.
struct Listener {
    sock: UdpSocket,
    base: String,
    mode: AddressMode,
    store: ParamStore,
    counters: Arc<Counters>,
}

impl Listener {
    fn run(&self, shutdown: &AtomicBool) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        while !shutdown.load(Ordering::Relaxed) {
            match self.sock.recv_from(&mut buf) {
                Ok((size, from)) => self.handle_datagram(&buf[..size], from),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    log::trace!("[OSC_RECEIVER] recv timeout");
                }
                Err(e) => {
                    log::warn!("[OSC_RECEIVER] Failed to receive: {}", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        self.counters.packets.fetch_add(1, Ordering::Relaxed);

        let packet = match rosc::decoder::decode_udp(bytes) {
            Ok((_, packet)) => packet,
            Err(e) => {
                log::warn!("[OSC_RECEIVER] Failed to decode OSC packet from {}: {}", from, e);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        for result in decode_packet(packet, &self.base, self.mode) {
            match result {
                Ok(cmd) => {
                    log::debug!("[OSC_RECEIVER] {} from {}", cmd, from);
                    apply_command(&self.store, cmd);
                    self.counters.applied.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    log::warn!("[OSC_RECEIVER] Ignoring message from {}: {}", from, e);
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
