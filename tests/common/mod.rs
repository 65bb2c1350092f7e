//! Shared test utilities for SyncLink port session tests.
//!
//! Every session here runs against `SimulatedDevice`; no hardware is
//! touched.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};
use synclink::driver::SimulatedDevice;
use synclink::PortSession;

/// Name of the port every harness registers first.
pub const PORT: &str = "MGHDLC1";

/// A simulated driver with one present port and a closed session on it.
pub struct Harness {
    pub device: Arc<SimulatedDevice>,
    pub session: PortSession<SimulatedDevice>,
}

impl Harness {
    pub fn new() -> Self {
        let device = Arc::new(SimulatedDevice::new());
        device.add_port(PORT);
        let session = PortSession::new(Arc::clone(&device), PORT);
        Self { device, session }
    }

    /// Same as [`Harness::new`], with the session already open.
    pub fn open() -> Self {
        let harness = Self::new();
        harness.session.open().expect("open simulated port");
        harness
    }
}

/// Run `f` and return its result together with how long it took.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}
