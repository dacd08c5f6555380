//! Single-flight chat state machine
//!
//! Pure transitions in the Elm style: the session feeds events in and
//! executes the effects that come out.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::SessionState;
pub use transition::{transition, TransitionError};

#[cfg(test)]
pub use transition::RATE_LIMIT_ALERT_DURATION;
