use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::state::{InputEvent, Outcome, Session, SessionEvent, State};
use crate::config::Settings;
use crate::error::{CaptureError, DeviceFault, ErrorKind, KioskError};
use crate::frame::{FaceLocator, FrameSource};
use crate::pipeline;
use crate::transport::{PrintTransport, SendReport};

/// Drives one session at a time from trigger to printed receipt.
///
/// All timing comes from the `Instant`s the caller passes in, so the
/// controller is deterministic under test. Each [`poll`](Self::poll)
/// performs at most one state transition.
pub struct Controller {
    settings: Settings,
    frames: Box<dyn FrameSource>,
    faces: Box<dyn FaceLocator>,
    transport: PrintTransport,

    state: State,
    state_since: Instant,
    idle_since: Instant,
    session: Option<Session>,
    ticks: u32,
    send_result: Option<Result<SendReport, DeviceFault>>,
    /// The most recently ended session, kept for its outcome.
    finished: Option<Session>,
}

impl Controller {
    pub fn new(
        settings: Settings,
        frames: Box<dyn FrameSource>,
        faces: Box<dyn FaceLocator>,
        transport: PrintTransport,
        now: Instant,
    ) -> Self {
        Self {
            settings,
            frames,
            faces,
            transport,
            state: State::Idle,
            state_since: now,
            idle_since: now,
            session: None,
            ticks: 0,
            send_result: None,
            finished: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.finished.as_ref().and_then(|session| session.outcome.as_ref())
    }

    /// The last session that ran to an end, with its outcome filled in.
    pub fn last_session(&self) -> Option<&Session> {
        self.finished.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transport_mut(&mut self) -> &mut PrintTransport {
        &mut self.transport
    }

    /// Feed one operator input that arrived at `arrived_at`.
    ///
    /// Triggers are accepted only in `Idle` and only if they arrived after
    /// the controller became idle; everything else is dropped, never queued.
    /// Aborts are honored in `Countdown` and `Capturing` only.
    pub fn on_input(&mut self, event: InputEvent, arrived_at: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        match event {
            InputEvent::Trigger => {
                if self.state != State::Idle {
                    debug!(state = %self.state, "trigger dropped: busy");
                    return events;
                }
                if arrived_at < self.idle_since {
                    debug!("trigger dropped: arrived before the kiosk became idle");
                    return events;
                }

                let session = Session::new(arrived_at);
                info!(session = %session.id, "session started");
                events.push(SessionEvent::SessionStarted { id: session.id });
                self.session = Some(session);
                self.ticks = 0;
                self.transition(State::Countdown, arrived_at, &mut events);
            }
            InputEvent::Abort => match self.state {
                State::Countdown | State::Capturing => {
                    info!(state = %self.state, "session aborted");
                    self.finish(Outcome::Cancelled, arrived_at, &mut events);
                }
                _ => debug!(state = %self.state, "abort ignored"),
            },
        }

        events
    }

    /// Advance time-driven work up to `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        match self.state {
            State::Idle => {}
            State::Countdown => self.poll_countdown(now, &mut events),
            State::Capturing => self.poll_capture(now, &mut events),
            State::Processing => self.poll_processing(now, &mut events),
            State::Printing => self.poll_printing(now, &mut events),
            State::Error => {
                if now.saturating_duration_since(self.state_since) >= self.settings.session.cooldown() {
                    self.transition(State::Idle, now, &mut events);
                }
            }
        }

        events
    }

    fn poll_countdown(&mut self, now: Instant, events: &mut Vec<SessionEvent>) {
        let total = self.settings.session.countdown_secs;
        let elapsed = now.saturating_duration_since(self.state_since);
        let due = elapsed.as_secs().min(total as u64) as u32;

        while self.ticks < due {
            self.ticks += 1;
            events.push(SessionEvent::CountdownTick {
                remaining: total - self.ticks,
            });
        }

        if elapsed >= self.settings.session.countdown() {
            self.transition(State::Capturing, now, events);
        }
    }

    fn poll_capture(&mut self, now: Instant, events: &mut Vec<SessionEvent>) {
        match self.frames.latest_frame() {
            Ok(Some(frame)) => {
                debug!(width = frame.width(), height = frame.height(), "frame captured");
                if let Some(session) = self.session.as_mut() {
                    session.frame = Some(frame);
                }
                self.transition(State::Processing, now, events);
            }
            Ok(None) => {
                let timeout = self.settings.session.capture_timeout();
                if now.saturating_duration_since(self.state_since) >= timeout {
                    let err = KioskError::from(CaptureError::Timeout(timeout.as_millis()));
                    self.fail(err.kind(), err.to_string(), now, events);
                }
            }
            Err(e) => {
                let err = KioskError::from(e);
                self.fail(err.kind(), err.to_string(), now, events);
            }
        }
    }

    fn poll_processing(&mut self, now: Instant, events: &mut Vec<SessionEvent>) {
        let Some(session) = self.session.as_mut() else {
            return self.fail(ErrorKind::Other, "no active session".into(), now, events);
        };
        let Some(frame) = session.frame.take() else {
            return self.fail(ErrorKind::CaptureError, "no frame captured".into(), now, events);
        };

        let faces = self.faces.locate(&frame);
        match pipeline::process(&frame, &faces, &self.settings) {
            Ok(processed) => {
                info!(
                    gain = processed.gain,
                    faces = faces.len(),
                    rows = processed.canvas.height(),
                    bytes = processed.job.len(),
                    "receipt ready"
                );
                session.frame = Some(frame);
                session.gain = Some(processed.gain);
                session.canvas = Some(processed.canvas);
                session.job = Some(processed.job);
                self.transition(State::Printing, now, events);
            }
            Err(err) => self.fail(err.kind(), err.to_string(), now, events),
        }
    }

    /// The first poll in `Printing` sends the job; the outcome is applied on
    /// the next poll so the idle timestamp is taken after the device returned.
    fn poll_printing(&mut self, now: Instant, events: &mut Vec<SessionEvent>) {
        if let Some(result) = self.send_result.take() {
            match result {
                Ok(_) => self.finish(Outcome::Printed, now, events),
                Err(fault) => self.fail(fault.kind(), fault.to_string(), now, events),
            }
            return;
        }

        let Some(job) = self.session.as_mut().and_then(|s| s.job.take()) else {
            return self.fail(ErrorKind::Other, "no print job".into(), now, events);
        };
        self.send_result = Some(self.transport.send(&job));
    }

    fn fail(&mut self, kind: ErrorKind, reason: String, now: Instant, events: &mut Vec<SessionEvent>) {
        warn!(%kind, %reason, "session failed");
        self.finish(Outcome::Failed { kind, reason }, now, events);
    }

    /// End the session and move to `Idle` (or `Error` for failures).
    fn finish(&mut self, outcome: Outcome, now: Instant, events: &mut Vec<SessionEvent>) {
        let next = match outcome {
            Outcome::Failed { .. } => State::Error,
            _ => State::Idle,
        };
        let mut session = self.session.take().unwrap_or_else(|| Session::new(now));
        events.push(SessionEvent::Finished {
            id: session.id,
            outcome: outcome.clone(),
        });
        // The frame is the bulk of a session; the job and canvas stay for inspection.
        session.frame = None;
        session.outcome = Some(outcome);
        self.finished = Some(session);
        self.send_result = None;
        self.transition(next, now, events);
    }

    fn transition(&mut self, to: State, now: Instant, events: &mut Vec<SessionEvent>) {
        let from = self.state;
        self.state = to;
        self.state_since = now;
        if to == State::Idle {
            self.idle_since = now;
        }
        debug!(%from, %to, "state changed");
        events.push(SessionEvent::StateChanged { from, to });
    }

    /// Time left before the error screen clears, if in `Error`.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        (self.state == State::Error).then(|| {
            self.settings
                .session
                .cooldown()
                .saturating_sub(now.saturating_duration_since(self.state_since))
        })
    }
}
