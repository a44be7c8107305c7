//! Parameter values and the fixed parameter table.

use std::collections::BTreeMap;
use std::fmt;

/// Name of the energy parameter.
pub const ENERGY: &str = "energy";
/// Name of the darkness parameter.
pub const DARKNESS: &str = "darkness";
/// Name of the hi-hat density parameter.
pub const HATS: &str = "hats";
/// Name of the tempo parameter.
pub const BPM: &str = "bpm";
/// Name of the kick toggle (0 or 1).
pub const KICK_ON: &str = "kick_on";
/// Name of the active profile.
pub const PROFILE: &str = "profile";
/// Name of the slot holding the last saved snapshot.
pub const SAVED_STATE: &str = "saved_state";

pub const DEFAULT_ENERGY: f64 = 0.5;
pub const DEFAULT_DARKNESS: f64 = 0.5;
pub const DEFAULT_HATS: f64 = 0.5;
pub const DEFAULT_BPM: i64 = 128;
pub const DEFAULT_KICK_ON: i64 = 1;
pub const DEFAULT_PROFILE: &str = "peak";

/// The parameters a `save` captures and an `undo`/`reset` restores.
///
/// `saved_state` itself is excluded so snapshots never nest.
pub const LIVE_PARAMS: [&str; 6] = [ENERGY, DARKNESS, HATS, BPM, KICK_ON, PROFILE];

/// All parameter names known at startup, in declaration order.
pub const PARAM_NAMES: [&str; 7] = [ENERGY, DARKNESS, HATS, BPM, KICK_ON, PROFILE, SAVED_STATE];

/// A single parameter value.
///
/// The store never coerces between variants: whatever is written is read
/// back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Str(String),
    Bool(bool),
    /// A captured set of parameter values (used by `saved_state`).
    Snapshot(BTreeMap<String, ParamValue>),
    /// Absent value.
    Nil,
}

impl ParamValue {
    /// Numeric view of the value. Integers and booleans widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view of the value. Floats are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.is_finite() => Some(*v as i64),
            ParamValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ParamValue::Nil)
    }

    /// Parse a textual value the way the path-encoded OSC form and the CLI
    /// do: integer first, then float, otherwise the raw string.
    pub fn parse(text: &str) -> Self {
        if let Ok(i) = text.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            ParamValue::Float(f)
        } else {
            ParamValue::Str(text.to_string())
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Str(s) => write!(f, "\"{}\"", s),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Snapshot(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            ParamValue::Nil => write!(f, "nil"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(f64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Documented default for a known parameter, `None` for anything else.
pub fn default_value(key: &str) -> Option<ParamValue> {
    let value = match key {
        ENERGY => ParamValue::Float(DEFAULT_ENERGY),
        DARKNESS => ParamValue::Float(DEFAULT_DARKNESS),
        HATS => ParamValue::Float(DEFAULT_HATS),
        BPM => ParamValue::Int(DEFAULT_BPM),
        KICK_ON => ParamValue::Int(DEFAULT_KICK_ON),
        PROFILE => ParamValue::Str(DEFAULT_PROFILE.to_string()),
        SAVED_STATE => ParamValue::Nil,
        _ => return None,
    };
    Some(value)
}

/// Whether `key` is one of the parameters declared at startup.
pub fn is_known(key: &str) -> bool {
    PARAM_NAMES.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_param_has_a_default() {
        for name in PARAM_NAMES {
            assert!(default_value(name).is_some(), "missing default for {}", name);
        }
        assert_eq!(default_value("volume"), None);
    }

    #[test]
    fn test_parse_prefers_int_then_float() {
        assert_eq!(ParamValue::parse("128"), ParamValue::Int(128));
        assert_eq!(ParamValue::parse("0.8"), ParamValue::Float(0.8));
        assert_eq!(ParamValue::parse("-3"), ParamValue::Int(-3));
        assert_eq!(ParamValue::parse("peak"), ParamValue::Str("peak".to_string()));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(ParamValue::Int(1).as_f64(), Some(1.0));
        assert_eq!(ParamValue::Float(2.9).as_i64(), Some(2));
        assert_eq!(ParamValue::Bool(true).as_i64(), Some(1));
        assert_eq!(ParamValue::Str("x".into()).as_f64(), None);
        assert_eq!(ParamValue::Float(f64::NAN).as_i64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ParamValue::Nil.to_string(), "nil");
        assert_eq!(ParamValue::from("peak").to_string(), "\"peak\"");
        let mut map = BTreeMap::new();
        map.insert("bpm".to_string(), ParamValue::Int(128));
        map.insert("energy".to_string(), ParamValue::Float(0.5));
        assert_eq!(ParamValue::Snapshot(map).to_string(), "{bpm: 128, energy: 0.5}");
    }
}
