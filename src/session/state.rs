//! States, inputs and observable events of the session controller.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::frame::Frame;
use crate::protocol::PrintJob;
use crate::render::MonochromeCanvas;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum State {
    Idle,
    Countdown,
    Capturing,
    Processing,
    Printing,
    Error,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputEvent {
    /// Button, touch or key press asking for a photo.
    Trigger,
    /// Cancel a running countdown or capture.
    Abort,
}

/// How the last session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Printed,
    Cancelled,
    Failed { kind: ErrorKind, reason: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Printed => f.write_str("printed"),
            Outcome::Cancelled => f.write_str("cancelled"),
            Outcome::Failed { kind, reason } => write!(f, "failed ({}): {}", kind, reason),
        }
    }
}

/// Something the UI layer may want to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted { id: Uuid },
    StateChanged { from: State, to: State },
    /// Emitted once per elapsed countdown second.
    CountdownTick { remaining: u32 },
    Finished { id: Uuid, outcome: Outcome },
}

/// One photo-to-receipt run. At most one exists at a time.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Instant the trigger arrived; the countdown runs from here.
    pub started: Instant,
    pub frame: Option<Frame>,
    pub gain: Option<f32>,
    pub canvas: Option<MonochromeCanvas>,
    pub job: Option<PrintJob>,
    /// Set once the session has ended.
    pub outcome: Option<Outcome>,
}

impl Session {
    pub fn new(started: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            started,
            frame: None,
            gain: None,
            canvas: None,
            job: None,
            outcome: None,
        }
    }
}
