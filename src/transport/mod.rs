//! # Printer Transport Layer
//!
//! [`PrintTransport`] owns the printer port and turns a [`PrintJob`] into
//! paper, classifying every failure on the way.
//!
//! ## Fault Handling
//!
//! | Fault | Examples | Policy |
//! |-------|----------|--------|
//! | Transient | busy, write stalled | Retry with backoff while **no byte** of the job was accepted |
//! | Recoverable | paper out, cover open | Surface, no retry |
//! | Fatal | device missing, offline | Surface, disable; next send reconnects first |
//!
//! Printing is irreversible: the printer feeds and cuts as soon as the bytes
//! arrive. Once any part of a job has been accepted, a failure is
//! *ambiguous* (part of a receipt may already be on paper), so it is
//! reported as recoverable and the job is never resent automatically.
//!
//! ## Modules
//!
//! - [`device`]: [`PrinterPort`] trait, character device and stream ports
//! - [`status`]: `DLE EOT` status interpretation
//! - [`retry`]: Backoff policy
//! - [`mock`]: Scripted port for tests

pub mod device;
pub mod mock;
pub mod retry;
pub mod status;

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use device::{DevicePort, PrinterPort, StreamPort};
pub use retry::RetryPolicy;
pub use status::PrinterStatus;

use crate::config::TransportSettings;
use crate::error::DeviceFault;
use crate::protocol::PrintJob;
use crate::protocol::commands::StatusRequest;

/// Successful delivery of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub bytes: usize,
    pub attempts: u32,
}

/// Failure of one attempt, with how much of the job got through.
struct AttemptFailure {
    fault: DeviceFault,
    accepted: usize,
}

/// Owns one printer and serialises jobs to it.
///
/// `send` takes `&mut self`, so at most one job is ever in flight.
pub struct PrintTransport {
    port: Box<dyn PrinterPort>,
    policy: RetryPolicy,
    write_timeout: Duration,
    chunk_size: usize,
    status_query: bool,
    disabled: bool,
}

impl PrintTransport {
    /// Wrap a port. The port is connected lazily on the first send.
    pub fn new(port: Box<dyn PrinterPort>, settings: &TransportSettings) -> Self {
        Self {
            port,
            policy: RetryPolicy::from(settings),
            write_timeout: settings.write_timeout(),
            chunk_size: settings.chunk_size.max(1),
            status_query: settings.status_query,
            disabled: true,
        }
    }

    /// Whether a fatal fault (or a missing first connect) blocks printing.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn describe(&self) -> String {
        self.port.describe()
    }

    /// Reconnect if disabled. Fails fast while the device is absent.
    pub fn ensure_connected(&mut self) -> Result<(), DeviceFault> {
        if !self.disabled {
            return Ok(());
        }
        match self.port.reconnect() {
            Ok(()) => {
                info!(port = %self.port.describe(), "printer connected");
                self.disabled = false;
                Ok(())
            }
            Err(fault) => {
                debug!(port = %self.port.describe(), error = %fault, "printer still unavailable");
                Err(fault)
            }
        }
    }

    /// Query `DLE EOT 1`, `2` and `4` and combine them.
    pub fn status(&mut self) -> Result<PrinterStatus, DeviceFault> {
        self.ensure_connected()?;
        let result = self.read_status();
        if let Err(fault) = &result {
            self.note_fault(fault);
        }
        result
    }

    fn read_status(&mut self) -> Result<PrinterStatus, DeviceFault> {
        let printer = self.port.query_status(StatusRequest::Printer)?;
        if printer.is_none() {
            return Ok(PrinterStatus::Unknown);
        }
        let cause = self.port.query_status(StatusRequest::OfflineCause)?;
        let paper = self.port.query_status(StatusRequest::PaperSensor)?;
        Ok(PrinterStatus::from_replies(printer, cause, paper))
    }

    /// Deliver one job.
    ///
    /// Transient faults are retried per the [`RetryPolicy`] only while the
    /// device has accepted nothing; exhausted retries and ambiguous partial
    /// writes are reported as [`DeviceFault::Recoverable`]. Opening the
    /// device is part of every attempt, so a busy device node is retried too.
    pub fn send(&mut self, job: &PrintJob) -> Result<SendReport, DeviceFault> {
        let mut attempt = 1;
        loop {
            match self.attempt(job) {
                Ok(()) => {
                    info!(
                        job = %job.id(),
                        bytes = job.len(),
                        attempts = attempt,
                        "print job delivered"
                    );
                    return Ok(SendReport {
                        bytes: job.len(),
                        attempts: attempt,
                    });
                }
                Err(AttemptFailure { fault, accepted }) => {
                    self.note_fault(&fault);

                    if accepted > 0 {
                        warn!(
                            job = %job.id(),
                            accepted,
                            total = job.len(),
                            error = %fault,
                            "print job interrupted after partial delivery; not resending"
                        );
                        return Err(match fault {
                            DeviceFault::Fatal(_) => fault,
                            other => DeviceFault::Recoverable(format!(
                                "job interrupted after {} of {} bytes: {}",
                                accepted,
                                job.len(),
                                other
                            )),
                        });
                    }

                    match fault {
                        DeviceFault::Transient(_) if self.policy.allows_retry(attempt) => {
                            let delay = self.policy.backoff(attempt);
                            warn!(
                                job = %job.id(),
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %fault,
                                "transient printer fault, retrying"
                            );
                            thread::sleep(delay);
                            attempt += 1;
                        }
                        DeviceFault::Transient(reason) => {
                            return Err(DeviceFault::Recoverable(format!(
                                "gave up after {} attempts: {}",
                                attempt, reason
                            )));
                        }
                        other => return Err(other),
                    }
                }
            }
        }
    }

    fn attempt(&mut self, job: &PrintJob) -> Result<(), AttemptFailure> {
        let nothing = |fault| AttemptFailure { fault, accepted: 0 };

        self.ensure_connected().map_err(nothing)?;

        // A query cut off mid-command comes back as recoverable (see
        // `device::interrupted_query`), which is never retried below.
        if self.status_query {
            let status = self.read_status().map_err(nothing)?;
            debug!(%status, "pre-flight printer status");
            if let Some(fault) = status.fault() {
                return Err(nothing(fault));
            }
        }

        let bytes = job.as_bytes();
        let mut accepted = 0;
        for chunk in bytes.chunks(self.chunk_size) {
            let mut offset = 0;
            while offset < chunk.len() {
                match self.port.write(&chunk[offset..], self.write_timeout) {
                    Ok(n) => offset += n,
                    Err(fault) => {
                        return Err(AttemptFailure {
                            fault,
                            accepted: accepted + offset,
                        });
                    }
                }
            }
            accepted += chunk.len();
        }

        self.port
            .flush()
            .map_err(|fault| AttemptFailure { fault, accepted })
    }

    fn note_fault(&mut self, fault: &DeviceFault) {
        if matches!(fault, DeviceFault::Fatal(_)) && !self.disabled {
            warn!(port = %self.port.describe(), error = %fault, "printer disabled until it reappears");
            self.disabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockPort, MockWrite};
    use super::*;
    use crate::config::CodecSettings;
    use crate::printer::PrinterConfig;
    use crate::protocol::raster;
    use crate::render::MonochromeCanvas;

    fn settings() -> TransportSettings {
        TransportSettings {
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            chunk_size: 64,
            ..TransportSettings::default()
        }
    }

    fn job() -> PrintJob {
        let mut canvas = MonochromeCanvas::new(512, 20);
        canvas.fill_rect(0, 0, 100, 20);
        raster::encode(&canvas, &PrinterConfig::default(), &CodecSettings::default()).unwrap()
    }

    fn transport(port: &MockPort) -> PrintTransport {
        PrintTransport::new(Box::new(port.clone()), &settings())
    }

    #[test]
    fn test_clean_send() {
        let port = MockPort::new();
        let job = job();
        let report = transport(&port).send(&job).unwrap();
        assert_eq!(report, SendReport { bytes: job.len(), attempts: 1 });
        assert_eq!(port.received(), job.as_bytes());
    }

    #[test]
    fn test_short_writes_are_resumed() {
        let port = MockPort::new();
        port.script([MockWrite::AcceptUpTo(10), MockWrite::AcceptUpTo(7)]);
        let job = job();
        transport(&port).send(&job).unwrap();
        assert_eq!(port.received(), job.as_bytes());
    }

    #[test]
    fn test_transient_retried_before_any_byte() {
        let port = MockPort::new();
        let busy = DeviceFault::Transient("busy".into());
        port.script([MockWrite::Fail(busy.clone()), MockWrite::Fail(busy)]);
        let job = job();

        let report = transport(&port).send(&job).unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(port.received(), job.as_bytes());
    }

    #[test]
    fn test_transient_budget_exhausted() {
        let port = MockPort::new();
        port.script((0..4).map(|_| MockWrite::Fail(DeviceFault::Transient("busy".into()))));

        let err = transport(&port).send(&job()).unwrap_err();
        assert!(matches!(err, DeviceFault::Recoverable(ref m) if m.contains("4 attempts")));
        assert!(port.received().is_empty());
    }

    #[test]
    fn test_partial_write_is_never_resent() {
        let port = MockPort::new();
        port.script([
            MockWrite::Accept,
            MockWrite::Fail(DeviceFault::Transient("stalled".into())),
        ]);
        let job = job();

        let err = transport(&port).send(&job).unwrap_err();
        assert!(matches!(err, DeviceFault::Recoverable(_)));
        assert_eq!(port.received(), &job.as_bytes()[..64]);
        assert_eq!(port.write_calls(), 2);
    }

    #[test]
    fn test_paper_out_preflight() {
        let port = MockPort::new();
        port.set_status(PrinterStatus::PaperOut);

        let err = transport(&port).send(&job()).unwrap_err();
        assert_eq!(err, DeviceFault::Recoverable("paper out".into()));
        assert_eq!(port.write_calls(), 0);
    }

    #[test]
    fn test_busy_preflight_is_retried() {
        let port = MockPort::new();
        port.set_status(PrinterStatus::Busy);
        let err = transport(&port).send(&job()).unwrap_err();
        assert!(matches!(err, DeviceFault::Recoverable(ref m) if m.contains("busy")));
        assert_eq!(port.write_calls(), 0);
    }

    #[test]
    fn test_fatal_disables_then_reconnects() {
        let port = MockPort::new();
        let mut transport = transport(&port);
        let job = job();

        port.set_present(false);
        assert!(matches!(transport.send(&job), Err(DeviceFault::Fatal(_))));
        assert!(transport.is_disabled());

        // Still absent: fail fast on the reconnect without writing.
        assert!(matches!(transport.send(&job), Err(DeviceFault::Fatal(_))));
        assert_eq!(port.write_calls(), 0);

        port.set_present(true);
        transport.send(&job).unwrap();
        assert!(!transport.is_disabled());
        assert_eq!(port.received(), job.as_bytes());
    }

    #[test]
    fn test_fatal_mid_job() {
        let port = MockPort::new();
        let mut transport = transport(&port);
        transport.ensure_connected().unwrap();
        port.script([MockWrite::Accept, MockWrite::Fail(DeviceFault::Fatal("unplugged".into()))]);

        let err = transport.send(&job()).unwrap_err();
        assert_eq!(err, DeviceFault::Fatal("unplugged".into()));
        assert!(transport.is_disabled());
    }

    #[test]
    fn test_status_query() {
        let port = MockPort::new();
        port.set_status(PrinterStatus::CoverOpen);
        assert_eq!(transport(&port).status().unwrap(), PrinterStatus::CoverOpen);
    }

    #[test]
    fn test_busy_device_node_is_retried_on_connect() {
        let port = MockPort::new();
        port.fail_reconnect(DeviceFault::Transient("open: device busy".into()));
        let job = job();

        let mut transport = transport(&port);
        let report = transport.send(&job).unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(port.reconnects(), 2);
        assert!(!transport.is_disabled());
        assert_eq!(port.received(), job.as_bytes());
    }

    #[test]
    fn test_connect_budget_exhausted_is_recoverable() {
        let port = MockPort::new();
        for _ in 0..4 {
            port.fail_reconnect(DeviceFault::Transient("open: device busy".into()));
        }

        let mut transport = transport(&port);
        let err = transport.send(&job()).unwrap_err();
        assert!(matches!(err, DeviceFault::Recoverable(ref m) if m.contains("4 attempts")));
        assert!(transport.is_disabled());
        assert_eq!(port.write_calls(), 0);
    }

    #[test]
    fn test_status_query_fault_before_any_byte_is_retried() {
        let port = MockPort::new();
        port.fail_status_query(0, DeviceFault::Transient("stalled".into()));
        let job = job();

        let report = transport(&port).send(&job).unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(port.received(), job.as_bytes());
    }

    #[test]
    fn test_interrupted_status_query_is_not_retried() {
        let port = MockPort::new();
        port.fail_status_query(1, DeviceFault::Transient("stalled".into()));

        let err = transport(&port).send(&job()).unwrap_err();
        assert!(matches!(err, DeviceFault::Recoverable(ref m) if m.contains("status query interrupted")));
        assert_eq!(port.write_calls(), 0);
        assert!(port.received().is_empty());
    }
}
