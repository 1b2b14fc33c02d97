//! Scripted in-memory printer for tests and dry runs.
//!
//! Clones share state, so a test can box one handle into a
//! [`PrintTransport`](super::PrintTransport) and inspect the other.
//!
//! ```
//! use snapreceipt::transport::mock::{MockPort, MockWrite};
//! use snapreceipt::error::DeviceFault;
//!
//! let port = MockPort::new();
//! port.script([MockWrite::Fail(DeviceFault::Transient("busy".into())), MockWrite::Accept]);
//! assert_eq!(port.pending_script(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::device::{PrinterPort, interrupted_query};
use super::status::PrinterStatus;
use crate::error::DeviceFault;
use crate::protocol::commands::StatusRequest;

/// Outcome of one `write` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockWrite {
    /// Accept everything offered.
    Accept,
    /// Accept at most this many bytes.
    AcceptUpTo(usize),
    /// Accept nothing and fail.
    Fail(DeviceFault),
}

#[derive(Debug)]
struct MockState {
    received: Vec<u8>,
    script: VecDeque<MockWrite>,
    status: PrinterStatus,
    present: bool,
    write_calls: usize,
    reconnects: usize,
    reconnect_faults: VecDeque<DeviceFault>,
    /// Query faults with the number of query bytes "sent" before each.
    status_faults: VecDeque<(usize, DeviceFault)>,
}

/// In-memory [`PrinterPort`].
#[derive(Debug, Clone)]
pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPort {
    /// A present, ready printer that accepts everything.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                received: Vec::new(),
                script: VecDeque::new(),
                status: PrinterStatus::Ready,
                present: true,
                write_calls: 0,
                reconnects: 0,
                reconnect_faults: VecDeque::new(),
                status_faults: VecDeque::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue write outcomes; once exhausted every write is accepted.
    pub fn script(&self, steps: impl IntoIterator<Item = MockWrite>) {
        self.state().script.extend(steps);
    }

    pub fn pending_script(&self) -> usize {
        self.state().script.len()
    }

    pub fn set_status(&self, status: PrinterStatus) {
        self.state().status = status;
    }

    /// Simulate unplugging (`false`) or plugging in (`true`) the printer.
    pub fn set_present(&self, present: bool) {
        self.state().present = present;
    }

    /// Make the next `reconnect` fail with `fault`. Calls queue up.
    pub fn fail_reconnect(&self, fault: DeviceFault) {
        self.state().reconnect_faults.push_back(fault);
    }

    /// Make the next status query fail with `fault` after `sent` bytes of
    /// the `DLE EOT` command went out. Calls queue up.
    pub fn fail_status_query(&self, sent: usize, fault: DeviceFault) {
        self.state().status_faults.push_back((sent, fault));
    }

    /// Every byte the "printer" accepted so far.
    pub fn received(&self) -> Vec<u8> {
        self.state().received.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.state().write_calls
    }

    pub fn reconnects(&self) -> usize {
        self.state().reconnects
    }

    fn gone() -> DeviceFault {
        DeviceFault::Fatal("mock printer not connected".into())
    }
}

impl PrinterPort for MockPort {
    fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, DeviceFault> {
        let mut state = self.state();
        state.write_calls += 1;
        if !state.present {
            return Err(Self::gone());
        }

        let accepted = match state.script.pop_front().unwrap_or(MockWrite::Accept) {
            MockWrite::Accept => data.len(),
            MockWrite::AcceptUpTo(n) => n.min(data.len()),
            MockWrite::Fail(fault) => return Err(fault),
        };
        if accepted == 0 && !data.is_empty() {
            return Err(DeviceFault::Transient("mock printer accepted nothing".into()));
        }
        state.received.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    fn flush(&mut self) -> Result<(), DeviceFault> {
        if self.state().present {
            Ok(())
        } else {
            Err(Self::gone())
        }
    }

    fn query_status(&mut self, request: StatusRequest) -> Result<Option<u8>, DeviceFault> {
        let mut state = self.state();
        if !state.present {
            return Err(Self::gone());
        }
        if let Some((sent, fault)) = state.status_faults.pop_front() {
            return Err(interrupted_query(sent, fault));
        }
        let [printer, cause, paper] = state.status.to_replies();
        Ok(match request {
            StatusRequest::Printer => printer,
            StatusRequest::OfflineCause => cause,
            StatusRequest::PaperSensor => paper,
            StatusRequest::ErrorCause => printer.map(|_| 0x12),
        })
    }

    fn reconnect(&mut self) -> Result<(), DeviceFault> {
        let mut state = self.state();
        state.reconnects += 1;
        if !state.present {
            return Err(Self::gone());
        }
        match state.reconnect_faults.pop_front() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
