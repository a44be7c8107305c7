//! Conductor Core - Parameter store and OSC plumbing for the voice conductor.
//!
//! A controlling application sends parameter changes as OSC messages; this
//! crate receives them, keeps the current values, and samples them for the
//! synthesis side:
//!
//! - **Params** - Shared store of the named performance parameters
//! - **Protocol** - `/ai` message conventions (pair and path addressing)
//! - **OSC** - UDP client for sending parameter messages
//! - **Receiver** - UDP listener applying incoming messages to the store
//! - **Sampler** - Cancellable periodic reader of `energy`/`darkness`/`hats`
//! - **Config** - TOML configuration file
//!
//! # Architecture
//!
//! The [`ParamStore`] is an explicit handle cloned into both the
//! [`OscReceiver`] thread (the writer) and the [`SamplerTask`] thread (the
//! reader). Reads are eventually consistent: the sampler sees whatever write
//! landed last before its tick.
//!
//! ```no_run
//! use conductor_core::{AddressMode, OscReceiver, ParamStore, Sampler, SamplerTask, VoiceFrame};
//! use std::time::Duration;
//!
//! let store = ParamStore::new();
//! let receiver = OscReceiver::start("0.0.0.0:4560", "/ai", AddressMode::Either, store.clone())?;
//! let sampler = Sampler::new(store, Duration::from_millis(100), |frame: &VoiceFrame| {
//!     println!("cutoff {}", frame.cutoff());
//! });
//! let task = SamplerTask::spawn(sampler)?;
//! # task.stop();
//! # receiver.shutdown();
//! # Ok::<(), conductor_core::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod osc;
pub mod params;
pub mod protocol;
pub mod receiver;
pub mod sampler;

pub use config::{Config, OscSettings, SamplerSettings};
pub use error::{Error, Result};
pub use osc::OscClient;
pub use params::{ParamStore, ParamValue, PARAM_NAMES};
pub use protocol::{
    is_control_key, AddressMode, ParamCommand, CONTROL_KEYS, DEFAULT_ADDRESS, DEFAULT_PORT,
    OSC_KEYS,
};
pub use receiver::{apply_command, OscReceiver, ReceiverStats};
pub use sampler::{channel_sink, FrameSink, Sampler, SamplerTask, StopToken, VoiceFrame};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_all_params_start_at_defaults() {
        let store = ParamStore::new();
        for name in PARAM_NAMES {
            assert_eq!(Some(store.get(name)), params::default_value(name));
        }
    }

    #[test]
    fn test_sender_receiver_sampler_pipeline() {
        let store = ParamStore::new();
        let receiver =
            OscReceiver::start("127.0.0.1:0", DEFAULT_ADDRESS, AddressMode::Either, store.clone())
                .unwrap();
        let client = OscClient::new(receiver.local_addr().to_string()).unwrap();
        client
            .send_batch(vec![("energy", 0.8), ("darkness", 0.2), ("hats", 0.6)])
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while receiver.stats().applied < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let mut sampler = Sampler::new(store, Duration::from_millis(1), |_: &VoiceFrame| {});
        let frame = sampler.tick();
        assert_eq!(frame.energy, 0.8);
        assert_eq!(frame.darkness, 0.2);
        assert_eq!(frame.hats, 0.6);
    }
}
