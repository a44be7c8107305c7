//! Parameter protocol on top of OSC.
//!
//! The controlling application addresses parameters under a base address
//! (`/ai` by default). Two conventions are in use and neither is treated as
//! authoritative, so both are selectable via [`AddressMode`]:
//!
//! - **Pair**: `/ai ["energy", 0.8]` - key and value as message arguments
//! - **Path**: `/ai/energy/0.8` - key and value encoded in the address
//!
//! The control keys `save`, `undo` and `reset` become store operations; any
//! other key is a plain value write.

use crate::error::{Error, Result};
use crate::params::ParamValue;
use rosc::{OscMessage, OscPacket, OscType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default OSC address for parameter messages.
pub const DEFAULT_ADDRESS: &str = "/ai";

/// Default UDP port the receiver listens on.
pub const DEFAULT_PORT: u16 = 4560;

/// Every key the controlling application may send.
pub const OSC_KEYS: [&str; 14] = [
    "energy", "darkness", "hats", "bpm", "kick_on", "save", "undo", "break", "drop", "reset",
    "profile", "macro", "schedule", "hold",
];

/// Keys that trigger store operations instead of value writes.
pub const CONTROL_KEYS: [&str; 3] = ["save", "undo", "reset"];

/// Whether `key` is one of [`CONTROL_KEYS`].
pub fn is_control_key(key: &str) -> bool {
    CONTROL_KEYS.contains(&key)
}

/// Which addressing convention to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMode {
    /// `/ai [key, value]`
    Pair,
    /// `/ai/<key>/<value>`
    Path,
    /// Accept both when receiving. Senders treat this as `Pair`.
    Either,
}

impl Default for AddressMode {
    fn default() -> Self {
        Self::Either
    }
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddressMode::Pair => "pair",
            AddressMode::Path => "path",
            AddressMode::Either => "either",
        };
        f.write_str(s)
    }
}

impl FromStr for AddressMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pair" => Ok(AddressMode::Pair),
            "path" => Ok(AddressMode::Path),
            "either" | "both" => Ok(AddressMode::Either),
            other => Err(format!(
                "unknown address mode '{}' (expected pair, path or either)",
                other
            )),
        }
    }
}

/// A decoded parameter message.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamCommand {
    /// Write `value` to `key`.
    Set { key: String, value: ParamValue },
    /// Capture the live parameters into `saved_state`.
    Save,
    /// Restore the live parameters from `saved_state`.
    Undo,
    /// Restore the live parameters to their defaults.
    Reset,
}

impl ParamCommand {
    fn from_key_value(key: String, value: Option<ParamValue>) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::decode("empty parameter key"));
        }
        match key.as_str() {
            "save" => Ok(ParamCommand::Save),
            "undo" => Ok(ParamCommand::Undo),
            "reset" => Ok(ParamCommand::Reset),
            _ => match value {
                Some(value) => Ok(ParamCommand::Set { key, value }),
                None => Err(Error::decode(format!("missing value for key '{}'", key))),
            },
        }
    }
}

impl fmt::Display for ParamCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamCommand::Set { key, value } => write!(f, "{} = {}", key, value),
            ParamCommand::Save => f.write_str("save"),
            ParamCommand::Undo => f.write_str("undo"),
            ParamCommand::Reset => f.write_str("reset"),
        }
    }
}

/// Widen an OSC float through its shortest decimal form, so a sender's
/// `0.8` reads back as `0.8` rather than `0.800000011920929`.
fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or_else(|_| f64::from(v))
}

/// Convert an OSC argument to a parameter value.
pub fn value_from_osc(arg: &OscType) -> Result<ParamValue> {
    match arg {
        OscType::Float(v) => Ok(ParamValue::Float(widen_f32(*v))),
        OscType::Double(v) => Ok(ParamValue::Float(*v)),
        OscType::Int(v) => Ok(ParamValue::Int(i64::from(*v))),
        OscType::Long(v) => Ok(ParamValue::Int(*v)),
        OscType::String(s) => Ok(ParamValue::Str(s.clone())),
        OscType::Bool(b) => Ok(ParamValue::Bool(*b)),
        OscType::Nil => Ok(ParamValue::Nil),
        other => Err(Error::decode(format!("unsupported argument type {:?}", other))),
    }
}

/// Convert a parameter value to an OSC argument.
///
/// Integers that fit in 32 bits are sent as `Int`, larger ones as `Long`.
/// Floats are narrowed to a 32-bit OSC `f`, so values beyond f32 precision
/// or range are rounded on the wire.
pub fn value_to_osc(value: &ParamValue) -> Result<OscType> {
    match value {
        ParamValue::Float(v) => Ok(OscType::Float(*v as f32)),
        ParamValue::Int(v) => Ok(match i32::try_from(*v) {
            Ok(small) => OscType::Int(small),
            Err(_) => OscType::Long(*v),
        }),
        ParamValue::Str(s) => Ok(OscType::String(s.clone())),
        ParamValue::Bool(b) => Ok(OscType::Bool(*b)),
        ParamValue::Nil => Ok(OscType::Nil),
        ParamValue::Snapshot(_) => Err(Error::decode("snapshots cannot be sent over OSC")),
    }
}

fn path_segment(value: &ParamValue) -> Result<String> {
    let text = match value {
        // `{:?}` keeps the fraction, so `1.0` is not read back as an integer
        ParamValue::Float(v) => format!("{:?}", v),
        ParamValue::Int(v) => v.to_string(),
        ParamValue::Str(s) => s.clone(),
        ParamValue::Bool(b) => i64::from(*b).to_string(),
        ParamValue::Nil | ParamValue::Snapshot(_) => {
            return Err(Error::decode(format!(
                "value {} cannot be encoded in an address",
                value
            )))
        }
    };
    if text.is_empty() || text.contains('/') {
        return Err(Error::decode(format!("invalid address segment '{}'", text)));
    }
    Ok(text)
}

/// Build the message that sets `key` to `value` under `base`.
pub fn encode_param(
    base: &str,
    mode: AddressMode,
    key: &str,
    value: &ParamValue,
) -> Result<OscMessage> {
    if key.is_empty() || key.contains('/') {
        return Err(Error::decode(format!("invalid parameter key '{}'", key)));
    }
    match mode {
        AddressMode::Pair | AddressMode::Either => Ok(OscMessage {
            addr: base.to_string(),
            args: vec![OscType::String(key.to_string()), value_to_osc(value)?],
        }),
        AddressMode::Path => Ok(OscMessage {
            addr: format!("{}/{}/{}", base, key, path_segment(value)?),
            args: vec![],
        }),
    }
}

fn decode_pair(msg: &OscMessage) -> Result<ParamCommand> {
    let key = match msg.args.first() {
        Some(OscType::String(key)) => key.clone(),
        Some(other) => {
            return Err(Error::decode(format!(
                "expected string key as first argument, got {:?}",
                other
            )))
        }
        None => return Err(Error::decode(format!("{} without arguments", msg.addr))),
    };
    let value = msg.args.get(1).map(value_from_osc).transpose()?;
    ParamCommand::from_key_value(key, value)
}

fn decode_path(rest: &str) -> Result<ParamCommand> {
    let mut segments = rest.split('/');
    let key = segments.next().unwrap_or_default().to_string();
    let value = match segments.next() {
        Some("") => return Err(Error::decode(format!("empty value segment in '{}'", rest))),
        other => other.map(ParamValue::parse),
    };
    if segments.next().is_some() {
        return Err(Error::decode(format!("too many address segments in '{}'", rest)));
    }
    ParamCommand::from_key_value(key, value)
}

/// Decode one message addressed under `base` according to `mode`.
pub fn decode_message(msg: &OscMessage, base: &str, mode: AddressMode) -> Result<ParamCommand> {
    if msg.addr == base {
        return match mode {
            AddressMode::Pair | AddressMode::Either => decode_pair(msg),
            AddressMode::Path => Err(Error::decode(format!(
                "{} carries arguments but path addressing is configured",
                msg.addr
            ))),
        };
    }

    let rest = msg
        .addr
        .strip_prefix(base)
        .and_then(|r| r.strip_prefix('/'))
        .ok_or_else(|| Error::decode(format!("unexpected address {}", msg.addr)))?;

    match mode {
        AddressMode::Path | AddressMode::Either => decode_path(rest),
        AddressMode::Pair => Err(Error::decode(format!(
            "{} is path-encoded but pair addressing is configured",
            msg.addr
        ))),
    }
}

/// Flatten a packet into its messages, descending into nested bundles.
///
/// Bundle timetags are ignored; messages apply on receipt.
pub fn flatten_packet(packet: OscPacket) -> Vec<OscMessage> {
    let mut out = Vec::new();
    let mut stack = vec![packet];
    while let Some(p) = stack.pop() {
        match p {
            OscPacket::Message(msg) => out.push(msg),
            OscPacket::Bundle(bundle) => stack.extend(bundle.content.into_iter().rev()),
        }
    }
    out
}

/// Decode every message in `packet`, one result per message.
pub fn decode_packet(
    packet: OscPacket,
    base: &str,
    mode: AddressMode,
) -> Vec<Result<ParamCommand>> {
    flatten_packet(packet)
        .iter()
        .map(|msg| decode_message(msg, base, mode))
        .collect()
}
