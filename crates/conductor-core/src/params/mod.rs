//! Parameter store for the voice conductor.
//!
//! The store holds a fixed set of named values with documented defaults:
//!
//! | Name          | Default  |
//! |---------------|----------|
//! | `energy`      | `0.5`    |
//! | `darkness`    | `0.5`    |
//! | `hats`        | `0.5`    |
//! | `bpm`         | `128`    |
//! | `kick_on`     | `1`      |
//! | `profile`     | `"peak"` |
//! | `saved_state` | nil      |
//!
//! - [`ParamValue`] - A single stored value
//! - [`ParamStore`] - Thread-safe shared handle

mod store;
mod value;

pub use store::ParamStore;
pub use value::{
    default_value, is_known, ParamValue, BPM, DARKNESS, DEFAULT_BPM, DEFAULT_DARKNESS,
    DEFAULT_ENERGY, DEFAULT_HATS, DEFAULT_KICK_ON, DEFAULT_PROFILE, ENERGY, HATS, KICK_ON,
    LIVE_PARAMS, PARAM_NAMES, PROFILE, SAVED_STATE,
};
