//! Serial control signal accessors.
//!
//! Only DTR and RTS can be driven. Every call is a fresh driver round-trip;
//! nothing is cached.

use super::error::{PortError, PortResult};
use super::session::PortSession;
use crate::driver::{DeviceApi, Signals};

impl<D: DeviceApi> PortSession<D> {
    /// Current state of all eight signals.
    pub fn signals(&self) -> PortResult<Signals> {
        let handle = self.handle()?;
        Ok(self.device.get_signals(handle)?)
    }

    /// Drive DTR and RTS to exactly the bits in `signals`.
    ///
    /// # Errors
    /// [`PortError::ReadOnlySignal`] if `signals` contains an input signal.
    pub fn set_signals(&self, signals: Signals) -> PortResult<()> {
        let read_only = signals - Signals::WRITABLE;
        if !read_only.is_empty() {
            return Err(PortError::ReadOnlySignal(read_only));
        }
        let handle = self.handle()?;
        Ok(self.device.set_signals(handle, signals)?)
    }

    fn signal(&self, signal: Signals) -> PortResult<bool> {
        Ok(self.signals()?.contains(signal))
    }

    fn drive(&self, signal: Signals, on: bool) -> PortResult<()> {
        let mut outputs = self.signals()? & Signals::WRITABLE;
        outputs.set(signal, on);
        self.set_signals(outputs)
    }

    pub fn dtr(&self) -> PortResult<bool> {
        self.signal(Signals::DTR)
    }

    pub fn set_dtr(&self, on: bool) -> PortResult<()> {
        self.drive(Signals::DTR, on)
    }

    pub fn rts(&self) -> PortResult<bool> {
        self.signal(Signals::RTS)
    }

    pub fn set_rts(&self, on: bool) -> PortResult<()> {
        self.drive(Signals::RTS, on)
    }

    pub fn dsr(&self) -> PortResult<bool> {
        self.signal(Signals::DSR)
    }

    pub fn cts(&self) -> PortResult<bool> {
        self.signal(Signals::CTS)
    }

    pub fn dcd(&self) -> PortResult<bool> {
        self.signal(Signals::DCD)
    }

    pub fn ri(&self) -> PortResult<bool> {
        self.signal(Signals::RI)
    }

    pub fn txd(&self) -> PortResult<bool> {
        self.signal(Signals::TXD)
    }

    pub fn rxd(&self) -> PortResult<bool> {
        self.signal(Signals::RXD)
    }
}
