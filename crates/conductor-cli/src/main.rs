//! Conductor CLI - The `conductor` command.
//!
//! Runs the parameter receiver and sampler, or sends single parameter
//! messages to a running receiver.
//!
//! # Architecture
//!
//! - **conductor-core**: Parameter store, OSC protocol, receiver, sampler

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use conductor_core::params::default_value;
use conductor_core::{
    channel_sink, is_control_key, AddressMode, Config, OscClient, OscReceiver, ParamStore,
    ParamValue, Sampler, SamplerTask, VoiceFrame, PARAM_NAMES,
};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Conductor - OSC parameter receiver for live performance
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Receive and sample live performance parameters over OSC", long_about = None)]
struct Args {
    /// Config file path (default: ~/.config/conductor/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for parameter messages and sample them
    Listen {
        /// Interface to bind
        #[arg(long)]
        bind: Option<String>,

        /// UDP port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Base OSC address
        #[arg(long)]
        address: Option<String>,

        /// Addressing convention: pair, path or either
        #[arg(long)]
        mode: Option<AddressMode>,

        /// Sampler interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Send one parameter message
    Send {
        /// Parameter name (e.g. energy, bpm, profile, save)
        key: String,

        /// Value; parsed as integer, then float, otherwise sent as a string.
        /// Optional for save, undo and reset
        value: Option<String>,

        /// Target host
        #[arg(long)]
        host: Option<String>,

        /// Target UDP port
        #[arg(short, long)]
        port: Option<u16>,

        /// Base OSC address
        #[arg(long)]
        address: Option<String>,

        /// Addressing convention: pair or path
        #[arg(long)]
        mode: Option<AddressMode>,
    },

    /// Print the parameters and their default values
    Defaults,

    /// Create a default configuration file
    Init,

    /// Show the configuration file path
    ConfigPath,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Commands::Listen {
            bind,
            port,
            address,
            mode,
            interval_ms,
        } => {
            let mut config = load_config(args.config.as_deref())?;
            if let Some(bind) = bind {
                config.osc.bind = bind;
            }
            if let Some(port) = port {
                config.osc.port = port;
            }
            if let Some(address) = address {
                config.osc.address = address;
            }
            if let Some(mode) = mode {
                config.osc.mode = mode;
            }
            if let Some(interval_ms) = interval_ms {
                config.sampler.interval_ms = interval_ms;
            }
            config.validate()?;
            listen(config)
        }
        Commands::Send {
            key,
            value,
            host,
            port,
            address,
            mode,
        } => {
            let mut config = load_config(args.config.as_deref())?;
            if let Some(host) = host {
                config.osc.host = host;
            }
            if let Some(port) = port {
                config.osc.port = port;
            }
            if let Some(address) = address {
                config.osc.address = address;
            }
            if let Some(mode) = mode {
                config.osc.mode = mode;
            }
            config.validate()?;
            let value = param_value(&key, value.as_deref())?;
            send(&config, &key, value)
        }
        Commands::Defaults => {
            for name in PARAM_NAMES {
                let value = default_value(name).unwrap_or(ParamValue::Nil);
                println!("{:<12} {}", name, value);
            }
            Ok(())
        }
        Commands::Init => {
            let path = match args.config {
                Some(path) => {
                    Config::write_default_config_file(&path)?;
                    path
                }
                None => Config::create_default_config_file()?,
            };
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = match args.config {
                Some(path) => path,
                None => Config::config_path()?,
            };
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::load_or_default()),
    }
}

/// Control keys carry `1` when no value is given, like the sending application does.
fn param_value(key: &str, value: Option<&str>) -> Result<ParamValue> {
    match value {
        Some(text) => Ok(ParamValue::parse(text)),
        None if is_control_key(key) => Ok(ParamValue::Int(1)),
        None => bail!("Missing value for '{}'", key),
    }
}

fn send(config: &Config, key: &str, value: ParamValue) -> Result<()> {
    let target = config.osc.target();
    let client = OscClient::new(target.clone())
        .context("Failed to open UDP socket")?
        .with_address(config.osc.address.clone(), config.osc.mode);

    client
        .send_param(key, value.clone())
        .with_context(|| format!("Failed to send {} to {}", key, target))?;

    println!("Sent {} = {} to {}{}", key, value, target, config.osc.address);
    Ok(())
}

fn listen(config: Config) -> Result<()> {
    // SIGINT/SIGTERM set this flag; the main loop polls it
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())
        .context("Failed to install SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())
        .context("Failed to install SIGTERM handler")?;

    let store = ParamStore::new();

    let receiver = OscReceiver::from_settings(&config.osc, store.clone()).with_context(|| {
        format!(
            "Failed to bind {}:{} (is another OSC host already listening?)",
            config.osc.bind, config.osc.port
        )
    })?;

    let (frame_tx, frame_rx) = unbounded();
    let sampler = Sampler::new(store.clone(), config.sampler.interval(), channel_sink(frame_tx));
    let task = SamplerTask::spawn(sampler).context("Failed to start sampler")?;

    log::info!(
        "Listening on {} ({} addressing under {}), sampling every {}ms. Press Ctrl+C to exit.",
        receiver.local_addr(),
        config.osc.mode,
        config.osc.address,
        config.sampler.interval_ms
    );

    let mut last: Option<VoiceFrame> = None;
    while !shutdown.load(Ordering::Relaxed) {
        match frame_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => {
                log::debug!(
                    "frame #{} energy={:.3} darkness={:.3} hats={:.3} cutoff={:.1}",
                    frame.seq,
                    frame.energy,
                    frame.darkness,
                    frame.hats,
                    frame.cutoff()
                );
                if last.map_or(true, |prev| voice_changed(&prev, &frame)) {
                    log::info!(
                        "energy={:.2} darkness={:.2} hats={:.2} bpm={} kick={} profile={}",
                        frame.energy,
                        frame.darkness,
                        frame.hats,
                        store.bpm(),
                        if store.kick_on() { "on" } else { "off" },
                        store.profile()
                    );
                }
                last = Some(frame);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("Sampler stopped unexpectedly");
                break;
            }
        }
    }

    log::info!("Shutting down...");
    let frames = task.stop();
    let stats = receiver.stats();
    receiver.shutdown();
    log::info!(
        "Sampled {} frames; received {} packets ({} applied, {} rejected)",
        frames,
        stats.packets,
        stats.applied,
        stats.rejected
    );
    Ok(())
}

fn voice_changed(prev: &VoiceFrame, next: &VoiceFrame) -> bool {
    const EPSILON: f64 = 1e-6;
    (prev.energy - next.energy).abs() > EPSILON
        || (prev.darkness - next.darkness).abs() > EPSILON
        || (prev.hats - next.hats).abs() > EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_send() {
        let args =
            Args::try_parse_from(["conductor", "send", "energy", "0.8", "--mode", "path"]).unwrap();
        match args.command {
            Commands::Send {
                key,
                value,
                mode,
                ..
            } => {
                assert_eq!(key, "energy");
                assert_eq!(value.as_deref(), Some("0.8"));
                assert_eq!(mode, Some(AddressMode::Path));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_listen_overrides() {
        let args = Args::try_parse_from([
            "conductor",
            "--config",
            "/tmp/c.toml",
            "listen",
            "--port",
            "9000",
            "--interval-ms",
            "50",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        match args.command {
            Commands::Listen {
                port,
                interval_ms,
                mode,
                ..
            } => {
                assert_eq!(port, Some(9000));
                assert_eq!(interval_ms, Some(50));
                assert_eq!(mode, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        let args = Args::try_parse_from(["conductor", "send", "hats", "1", "--mode", "json"]);
        assert!(args.is_err());
    }

    #[test]
    fn test_control_keys_need_no_value() {
        let args = Args::try_parse_from(["conductor", "send", "undo"]).unwrap();
        match args.command {
            Commands::Send { key, value, .. } => {
                assert_eq!(key, "undo");
                assert_eq!(value, None);
                assert_eq!(param_value(&key, None).unwrap(), ParamValue::Int(1));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(param_value("save", None).unwrap(), ParamValue::Int(1));
        assert_eq!(param_value("reset", Some("0")).unwrap(), ParamValue::Int(0));
    }

    #[test]
    fn test_plain_keys_need_a_value() {
        assert!(param_value("energy", None).is_err());
        assert_eq!(param_value("energy", Some("1.0")).unwrap(), ParamValue::Float(1.0));
        assert_eq!(param_value("profile", Some("dark")).unwrap(), ParamValue::from("dark"));
    }

    #[test]
    fn test_voice_changed() {
        let a = VoiceFrame {
            seq: 1,
            energy: 0.5,
            darkness: 0.5,
            hats: 0.5,
        };
        let b = VoiceFrame { seq: 2, ..a };
        let c = VoiceFrame { energy: 0.8, ..b };
        assert!(!voice_changed(&a, &b));
        assert!(voice_changed(&b, &c));
    }
}
