//! # Kiosk Runtime
//!
//! Async shell around the synchronous [`Controller`]. One task reads operator
//! input and forwards it over a channel stamped with its arrival time; the
//! main loop multiplexes that channel with a poll interval.
//!
//! ```text
//! stdin ──► KeyboardInput ──mpsc──┐
//!                                 ├──► select! ──► Controller::on_input / poll
//! interval (tick) ────────────────┘
//! ```
//!
//! Controller calls may block (frame decode, printing), so they run inside
//! `block_in_place` and need the multi-thread runtime.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::{Controller, InputEvent, SessionEvent};

/// Default interval between controller polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A message from an input source to the kiosk loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Input(InputEvent, Instant),
    Quit,
}

/// Map one line typed by the operator to an input.
///
/// An empty line (Enter, or space then Enter) triggers, `a` aborts and `q`
/// quits. Anything else is ignored.
pub fn parse_line(line: &str, arrived_at: Instant) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Some(Command::Input(InputEvent::Trigger, arrived_at)),
        "a" | "abort" => Some(Command::Input(InputEvent::Abort, arrived_at)),
        "q" | "quit" => Some(Command::Quit),
        _ => None,
    }
}

/// Line-oriented keyboard trigger source.
pub struct KeyboardInput;

impl KeyboardInput {
    /// Read stdin until EOF or `q`, forwarding commands to `tx`.
    pub fn spawn(tx: mpsc::Sender<Command>) -> JoinHandle<()> {
        Self::spawn_reader(BufReader::new(tokio::io::stdin()), tx)
    }

    /// Same as [`spawn`](Self::spawn) for any buffered reader.
    pub fn spawn_reader<R>(reader: R, tx: mpsc::Sender<Command>) -> JoinHandle<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "input read failed");
                        break;
                    }
                };

                let Some(command) = parse_line(&line, Instant::now()) else {
                    debug!(%line, "unrecognised input");
                    continue;
                };
                let quit = command == Command::Quit;
                if tx.send(command).await.is_err() || quit {
                    return;
                }
            }
            // EOF ends the kiosk as well.
            let _ = tx.send(Command::Quit).await;
        })
    }
}

/// Run the kiosk until a [`Command::Quit`] arrives or every sender is gone.
///
/// Returns the controller so callers can inspect the final state.
pub async fn run(mut controller: Controller, mut commands: mpsc::Receiver<Command>, tick: Duration) -> Controller {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(state = %controller.state(), "kiosk ready");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Input(event, arrived_at)) => {
                    let events = tokio::task::block_in_place(|| controller.on_input(event, arrived_at));
                    if events.is_empty()
                        && let Some(left) = controller.cooldown_remaining(Instant::now())
                    {
                        info!(remaining_ms = left.as_millis() as u64, "printer cooling down, input ignored");
                    }
                    report(&events);
                }
                Some(Command::Quit) | None => break,
            },
            _ = interval.tick() => {
                let events = tokio::task::block_in_place(|| controller.poll(Instant::now()));
                report(&events);
            }
        }
    }

    info!(state = %controller.state(), "kiosk stopped");
    controller
}

fn report(events: &[SessionEvent]) {
    for event in events {
        match event {
            SessionEvent::SessionStarted { id } => info!(session = %id, "session started"),
            SessionEvent::StateChanged { from, to } => info!(%from, %to, "state"),
            SessionEvent::CountdownTick { remaining } => info!(remaining, "countdown"),
            SessionEvent::Finished { id, outcome } => info!(session = %id, %outcome, "session finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::frame::{NoFaces, StaticFrameSource};
    use crate::session::{Outcome, State};
    use crate::transport::PrintTransport;
    use crate::transport::mock::MockPort;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn test_parse_line() {
        let now = Instant::now();
        assert_eq!(parse_line("", now), Some(Command::Input(InputEvent::Trigger, now)));
        assert_eq!(parse_line(" ", now), Some(Command::Input(InputEvent::Trigger, now)));
        assert_eq!(parse_line("A", now), Some(Command::Input(InputEvent::Abort, now)));
        assert_eq!(parse_line("q", now), Some(Command::Quit));
        assert_eq!(parse_line("hello", now), None);
    }

    fn controller(port: &MockPort) -> Controller {
        let mut settings = Settings::default();
        settings.session.countdown_secs = 0;
        let transport = PrintTransport::new(Box::new(port.clone()), &settings.transport);
        let frames = StaticFrameSource::new(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            32,
            24,
            Luma([120]),
        )));
        Controller::new(settings, Box::new(frames), Box::new(NoFaces), transport, Instant::now())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_quit_stops_loop() {
        let port = MockPort::new();
        let (tx, rx) = mpsc::channel(8);
        let input = KeyboardInput::spawn_reader(&b"hello\nq\n"[..], tx);
        let controller = tokio::spawn(run(controller(&port), rx, Duration::from_millis(5)))
            .await
            .unwrap();

        input.await.unwrap();
        assert_eq!(controller.state(), State::Idle);
        assert!(controller.last_outcome().is_none());
        assert!(port.received().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_trigger_prints_through_loop() {
        let port = MockPort::new();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run(controller(&port), rx, Duration::from_millis(5)));

        tx.send(Command::Input(InputEvent::Trigger, Instant::now())).await.unwrap();
        for _ in 0..200 {
            if !port.received().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(Command::Quit).await.unwrap();

        let controller = handle.await.unwrap();
        assert_eq!(controller.last_outcome(), Some(&Outcome::Printed));
        assert_eq!(controller.state(), State::Idle);
    }
}
