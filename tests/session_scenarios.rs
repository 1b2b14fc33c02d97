//! # Session Scenarios
//!
//! Drives the kiosk controller through whole sessions with a scripted
//! printer and a fixed camera image. Time is simulated: every call passes an
//! explicit `Instant` offset from the start of the test.

use std::time::{Duration, Instant};

use chrono::Utc;
use image::{DynamicImage, Rgb, RgbImage};
use pretty_assertions::assert_eq;

use snapreceipt::config::Settings;
use snapreceipt::error::{DeviceFault, ErrorKind};
use snapreceipt::frame::{Frame, NoFaces, StaticFrameSource};
use snapreceipt::pipeline;
use snapreceipt::session::{Controller, InputEvent, Outcome, SessionEvent, State};
use snapreceipt::transport::PrintTransport;
use snapreceipt::transport::PrinterStatus;
use snapreceipt::transport::mock::{MockPort, MockWrite};

// ============================================================================
// HARNESS
// ============================================================================

fn camera_image() -> DynamicImage {
    let mut img = RgbImage::from_pixel(160, 120, Rgb([90, 110, 130]));
    for x in 40..120 {
        img.put_pixel(x, 60, Rgb([10, 10, 10]));
    }
    DynamicImage::ImageRgb8(img)
}

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.transport.initial_backoff_ms = 1;
    settings.transport.max_backoff_ms = 2;
    settings
}

struct Kiosk {
    controller: Controller,
    port: MockPort,
    settings: Settings,
    t0: Instant,
}

impl Kiosk {
    fn new(settings: Settings) -> Self {
        Self::with_frames(settings, StaticFrameSource::new(camera_image()))
    }

    fn with_frames(settings: Settings, frames: StaticFrameSource) -> Self {
        let port = MockPort::new();
        let t0 = Instant::now();
        let transport = PrintTransport::new(Box::new(port.clone()), &settings.transport);
        let controller = Controller::new(
            settings.clone(),
            Box::new(frames),
            Box::new(NoFaces),
            transport,
            t0,
        );
        Self {
            controller,
            port,
            settings,
            t0,
        }
    }

    fn at(&self, secs: f64) -> Instant {
        self.t0 + Duration::from_secs_f64(secs)
    }

    fn trigger(&mut self, secs: f64) -> Vec<SessionEvent> {
        let at = self.at(secs);
        self.controller.on_input(InputEvent::Trigger, at)
    }

    fn abort(&mut self, secs: f64) -> Vec<SessionEvent> {
        let at = self.at(secs);
        self.controller.on_input(InputEvent::Abort, at)
    }

    fn poll(&mut self, secs: f64) -> Vec<SessionEvent> {
        let at = self.at(secs);
        self.controller.poll(at)
    }

    fn state(&self) -> State {
        self.controller.state()
    }

    /// Poll every 100 ms from `from` until the state is `target`.
    /// Returns the simulated time at which it got there.
    fn poll_until(&mut self, from: f64, target: State) -> f64 {
        let mut t = from;
        for _ in 0..500 {
            self.poll(t);
            if self.state() == target {
                return t;
            }
            t += 0.1;
        }
        panic!("never reached {:?}, stuck in {:?}", target, self.state());
    }

    /// The bytes a single successful print of the camera image must produce.
    fn expected_job(&self) -> Vec<u8> {
        let frame = Frame::new(camera_image(), Utc::now());
        let processed = pipeline::process(&frame, &[], &self.settings).unwrap();
        processed.job.as_bytes().to_vec()
    }

    fn failure_kind(&self) -> Option<ErrorKind> {
        match self.controller.last_outcome() {
            Some(Outcome::Failed { kind, .. }) => Some(*kind),
            _ => None,
        }
    }
}

fn ticks(events: &[SessionEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::CountdownTick { remaining } => Some(*remaining),
            _ => None,
        })
        .collect()
}

// ============================================================================
// COUNTDOWN
// ============================================================================

#[test]
fn test_countdown_ticks_once_per_second() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.trigger(0.0);

    assert!(ticks(&kiosk.poll(0.5)).is_empty());
    assert_eq!(ticks(&kiosk.poll(1.0)), vec![2]);
    assert_eq!(kiosk.state(), State::Countdown);
    assert_eq!(ticks(&kiosk.poll(2.0)), vec![1]);
    assert!(ticks(&kiosk.poll(2.9)).is_empty());
    assert_eq!(kiosk.state(), State::Countdown);

    let events = kiosk.poll(3.0);
    assert_eq!(ticks(&events), vec![0]);
    assert!(events.contains(&SessionEvent::StateChanged {
        from: State::Countdown,
        to: State::Capturing
    }));
    assert_eq!(kiosk.state(), State::Capturing);
}

#[test]
fn test_late_poll_catches_up_on_ticks() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.trigger(0.0);
    let events = kiosk.poll(5.0);
    assert_eq!(ticks(&events), vec![2, 1, 0]);
    assert_eq!(kiosk.state(), State::Capturing);
}

#[test]
fn test_abort_during_countdown_cancels() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.trigger(0.0);
    kiosk.poll(1.0);

    let events = kiosk.abort(1.5);
    assert!(matches!(
        events.first(),
        Some(SessionEvent::Finished {
            outcome: Outcome::Cancelled,
            ..
        })
    ));
    assert_eq!(kiosk.state(), State::Idle);
    assert_eq!(kiosk.controller.last_outcome(), Some(&Outcome::Cancelled));

    // Nothing was printed and later polls do nothing.
    assert!(kiosk.poll(10.0).is_empty());
    assert!(kiosk.port.received().is_empty());
}

// ============================================================================
// TRIGGER DISCIPLINE
// ============================================================================

#[test]
fn test_trigger_while_busy_is_ignored() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.trigger(0.0);
    let id = kiosk.controller.session().unwrap().id;

    assert!(kiosk.trigger(0.5).is_empty());
    assert_eq!(kiosk.controller.session().unwrap().id, id);

    kiosk.poll_until(3.0, State::Printing);
    assert!(kiosk.trigger(3.3).is_empty());
    assert_eq!(kiosk.controller.session().unwrap().id, id);
}

#[test]
fn test_trigger_from_before_idle_is_dropped() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.trigger(0.0);
    let idle_at = kiosk.poll_until(3.0, State::Idle);

    // Pressed while the receipt was printing, delivered afterwards.
    assert!(kiosk.trigger(idle_at - 0.05).is_empty());
    assert_eq!(kiosk.state(), State::Idle);

    // A fresh press works.
    assert!(!kiosk.trigger(idle_at + 0.5).is_empty());
    assert_eq!(kiosk.state(), State::Countdown);
}

// ============================================================================
// HAPPY PATH
// ============================================================================

#[test]
fn test_session_prints_one_receipt() {
    let mut kiosk = Kiosk::new(fast_settings());
    let events = kiosk.trigger(0.0);
    let Some(SessionEvent::SessionStarted { id }) = events.first().cloned() else {
        panic!("expected SessionStarted, got {:?}", events);
    };

    let mut all = Vec::new();
    let mut t = 0.0;
    while t < 10.0 {
        all.extend(kiosk.poll(t));
        t += 0.25;
    }

    let states: Vec<State> = all
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![State::Capturing, State::Processing, State::Printing, State::Idle]
    );
    assert!(all.contains(&SessionEvent::Finished {
        id,
        outcome: Outcome::Printed
    }));
    assert_eq!(kiosk.port.received(), kiosk.expected_job());
    assert!(kiosk.controller.session().is_none());
}

#[test]
fn test_transient_fault_retried_before_any_byte() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.port.script([
        MockWrite::Fail(DeviceFault::Transient("busy".into())),
        MockWrite::Fail(DeviceFault::Transient("busy".into())),
    ]);

    kiosk.trigger(0.0);
    kiosk.poll_until(3.0, State::Idle);

    assert_eq!(kiosk.controller.last_outcome(), Some(&Outcome::Printed));
    assert_eq!(kiosk.port.received(), kiosk.expected_job());
}

#[test]
fn test_busy_device_node_at_first_job_is_retried() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk
        .port
        .fail_reconnect(DeviceFault::Transient("open: device busy".into()));

    kiosk.trigger(0.0);
    kiosk.poll_until(3.0, State::Idle);

    assert_eq!(kiosk.controller.last_outcome(), Some(&Outcome::Printed));
    assert_eq!(kiosk.port.reconnects(), 2);
    assert_eq!(kiosk.port.received(), kiosk.expected_job());
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_paper_out_then_recovery_never_duplicates() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.port.set_status(PrinterStatus::PaperOut);

    kiosk.trigger(0.0);
    let failed_at = kiosk.poll_until(3.0, State::Error);
    assert_eq!(kiosk.failure_kind(), Some(ErrorKind::RecoverableDeviceError));
    assert!(kiosk.port.received().is_empty());

    // Triggers are ignored on the error screen.
    assert!(kiosk.trigger(failed_at + 1.0).is_empty());

    // Cooldown returns to idle.
    kiosk.poll(failed_at + 4.9);
    assert_eq!(kiosk.state(), State::Error);
    kiosk.poll(failed_at + 5.05);
    assert_eq!(kiosk.state(), State::Idle);
    assert!(kiosk.port.received().is_empty());

    // Paper reloaded: the next session prints exactly one receipt.
    kiosk.port.set_status(PrinterStatus::Ready);
    kiosk.trigger(failed_at + 6.0);
    kiosk.poll_until(failed_at + 9.0, State::Idle);
    assert_eq!(kiosk.controller.last_outcome(), Some(&Outcome::Printed));
    assert_eq!(kiosk.port.received(), kiosk.expected_job());
}

#[test]
fn test_partial_write_is_not_resent() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.port.script([
        MockWrite::AcceptUpTo(100),
        MockWrite::Fail(DeviceFault::Transient("stalled".into())),
    ]);

    kiosk.trigger(0.0);
    kiosk.poll_until(3.0, State::Error);

    assert_eq!(kiosk.failure_kind(), Some(ErrorKind::RecoverableDeviceError));
    assert_eq!(kiosk.port.received().len(), 100);
}

#[test]
fn test_unplugged_printer_reconnects_next_session() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.port.set_present(false);

    kiosk.trigger(0.0);
    let failed_at = kiosk.poll_until(3.0, State::Error);
    assert_eq!(kiosk.failure_kind(), Some(ErrorKind::FatalDeviceError));
    assert!(kiosk.controller.transport_mut().is_disabled());

    let idle_at = kiosk.poll_until(failed_at, State::Idle);
    kiosk.port.set_present(true);
    kiosk.trigger(idle_at + 0.1);
    kiosk.poll_until(idle_at + 3.1, State::Idle);

    assert_eq!(kiosk.controller.last_outcome(), Some(&Outcome::Printed));
    assert!(!kiosk.controller.transport_mut().is_disabled());
    assert_eq!(kiosk.port.received(), kiosk.expected_job());
}

#[test]
fn test_capture_timeout() {
    let mut kiosk = Kiosk::with_frames(fast_settings(), StaticFrameSource::empty());
    kiosk.trigger(0.0);
    kiosk.poll(3.0);
    assert_eq!(kiosk.state(), State::Capturing);
    kiosk.poll(4.9);
    assert_eq!(kiosk.state(), State::Capturing);
    kiosk.poll(5.0);
    assert_eq!(kiosk.state(), State::Error);
    assert_eq!(kiosk.failure_kind(), Some(ErrorKind::CaptureError));
}

#[test]
fn test_oversized_qr_fails_before_printing() {
    let mut settings = fast_settings();
    settings.store.qr_url = format!("https://example.com/{}", "q".repeat(3000));
    let mut kiosk = Kiosk::new(settings);

    kiosk.trigger(0.0);
    kiosk.poll_until(3.0, State::Error);

    assert_eq!(kiosk.failure_kind(), Some(ErrorKind::PayloadTooLarge));
    assert_eq!(kiosk.port.write_calls(), 0);
    assert!(kiosk.port.received().is_empty());
}

#[test]
fn test_abort_after_capture_is_ignored() {
    let mut kiosk = Kiosk::new(fast_settings());
    kiosk.trigger(0.0);
    kiosk.poll_until(3.0, State::Processing);

    assert!(kiosk.abort(3.2).is_empty());
    kiosk.poll_until(3.2, State::Idle);
    assert_eq!(kiosk.controller.last_outcome(), Some(&Outcome::Printed));
}
