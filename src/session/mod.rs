//! # Session Controller
//!
//! The kiosk state machine. One session at a time walks through:
//!
//! ```text
//!            trigger            N ticks           frame
//!   Idle ───────────► Countdown ───────► Capturing ──────► Processing
//!    ▲                   │ abort            │ abort / timeout    │
//!    │◄──────────────────┘◄─────────────────┤                    │ job ready
//!    │                                      ▼                    ▼
//!    │           cooldown              ┌───────┐   failure   Printing
//!    │◄────────────────────────────────│ Error │◄────────────────┤
//!    │                                 └───────┘                 │
//!    │◄──────────────────────────────────────────────────────────┘ printed
//! ```
//!
//! The controller never blocks on its own and never reads a clock: inputs
//! carry their arrival `Instant` and the runtime calls
//! [`Controller::poll`] with the current time.

mod controller;
mod state;

pub use controller::Controller;
pub use state::{InputEvent, Outcome, Session, SessionEvent, State};
