//! General purpose I/O.
//!
//! The adapter exposes 32 GPIO bits. Each can be read, driven when
//! configured as an output, and waited on. [`Gpio`] addresses a single bit;
//! the register-wide calls on [`PortSession`] take explicit masks.

use super::error::PortResult;
use super::session::PortSession;
use crate::driver::{wait_gpio_timed, DeviceApi, GpioDesc, Timeout};

/// Number of GPIO bits on a SyncLink adapter.
pub const GPIO_BITS: u32 = 32;

impl<D: DeviceApi> PortSession<D> {
    /// Accessor for one GPIO bit, `None` if `bit` is out of range.
    pub fn gpio(&self, bit: u32) -> Option<Gpio<'_, D>> {
        (bit < GPIO_BITS).then_some(Gpio { session: self, bit })
    }

    /// Accessors for all GPIO bits, lowest first.
    pub fn gpio_bits(&self) -> impl Iterator<Item = Gpio<'_, D>> {
        (0..GPIO_BITS).map(move |bit| Gpio { session: self, bit })
    }

    /// Full GPIO register: levels and directions.
    pub fn gpio_desc(&self) -> PortResult<GpioDesc> {
        let handle = self.handle()?;
        Ok(self.device.get_gpio(handle)?)
    }

    /// Current level of every GPIO bit.
    pub fn get_gpio(&self) -> PortResult<u32> {
        Ok(self.gpio_desc()?.state)
    }

    /// Drive the output bits selected by `mask` to `states`.
    pub fn set_gpio(&self, mask: u32, states: u32) -> PortResult<()> {
        let handle = self.handle()?;
        let desc = GpioDesc {
            state: states,
            smask: mask,
            ..GpioDesc::default()
        };
        Ok(self.device.set_gpio(handle, &desc)?)
    }

    /// Direction of every GPIO bit, 1 for output.
    pub fn get_gpio_direction(&self) -> PortResult<u32> {
        Ok(self.gpio_desc()?.dir)
    }

    /// Set the direction of the bits selected by `mask`, 1 for output.
    pub fn set_gpio_direction(&self, mask: u32, dir: u32) -> PortResult<()> {
        let handle = self.handle()?;
        let desc = GpioDesc {
            dir,
            dmask: mask,
            ..GpioDesc::default()
        };
        Ok(self.device.set_gpio(handle, &desc)?)
    }

    /// Wait until the bits in `desired.smask` match `desired.state`.
    ///
    /// Returns the GPIO register at completion.
    ///
    /// # Errors
    /// [`PortError::Timeout`](super::PortError::Timeout) when `timeout`
    /// expires first.
    pub fn wait_gpio(&self, desired: &GpioDesc, timeout: impl Into<Timeout>) -> PortResult<GpioDesc> {
        let handle = self.handle()?;
        Ok(wait_gpio_timed(&*self.device, handle, desired, timeout.into())?)
    }
}

/// One GPIO bit of an open session.
pub struct Gpio<'a, D: DeviceApi> {
    session: &'a PortSession<D>,
    bit: u32,
}

impl<D: DeviceApi> Gpio<'_, D> {
    pub fn bit(&self) -> u32 {
        self.bit
    }

    fn mask(&self) -> u32 {
        1 << self.bit
    }

    /// Current level of the bit.
    pub fn state(&self) -> PortResult<bool> {
        Ok(self.session.get_gpio()? & self.mask() != 0)
    }

    /// Drive the bit. Has no effect on inputs.
    pub fn set_state(&self, high: bool) -> PortResult<()> {
        let mask = self.mask();
        self.session.set_gpio(mask, if high { mask } else { 0 })
    }

    pub fn is_output(&self) -> PortResult<bool> {
        Ok(self.session.get_gpio_direction()? & self.mask() != 0)
    }

    pub fn set_output(&self, output: bool) -> PortResult<()> {
        let mask = self.mask();
        self.session.set_gpio_direction(mask, if output { mask } else { 0 })
    }

    /// Wait for the bit to reach `high`.
    pub fn wait_for(&self, high: bool, timeout: impl Into<Timeout>) -> PortResult<bool> {
        let mask = self.mask();
        let desired = GpioDesc {
            state: if high { mask } else { 0 },
            smask: mask,
            ..GpioDesc::default()
        };
        let desc = self.session.wait_gpio(&desired, timeout)?;
        Ok(desc.state & mask != 0)
    }
}

impl<D: DeviceApi> std::fmt::Debug for Gpio<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gpio")
            .field("port", &self.session.name())
            .field("bit", &self.bit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SimulatedDevice;
    use crate::port::PortError;
    use std::sync::Arc;
    use std::time::Duration;

    fn open_session() -> (Arc<SimulatedDevice>, PortSession<SimulatedDevice>) {
        let dev = Arc::new(SimulatedDevice::new());
        dev.add_port("MGHDLC1");
        let port = PortSession::new(Arc::clone(&dev), "MGHDLC1");
        port.open().unwrap();
        (dev, port)
    }

    #[test]
    fn test_bit_range() {
        let (_dev, port) = open_session();
        assert!(port.gpio(31).is_some());
        assert!(port.gpio(32).is_none());
        assert_eq!(port.gpio_bits().count(), 32);
    }

    #[test]
    fn test_bits_are_independent() {
        let (_dev, port) = open_session();
        let b3 = port.gpio(3).unwrap();
        let b5 = port.gpio(5).unwrap();

        b3.set_output(true).unwrap();
        b5.set_output(true).unwrap();
        b3.set_state(true).unwrap();
        b5.set_state(true).unwrap();
        b3.set_state(false).unwrap();

        assert!(!b3.state().unwrap());
        assert!(b5.state().unwrap());
        assert_eq!(port.get_gpio_direction().unwrap(), 0b10_1000);
    }

    #[test]
    fn test_inputs_ignore_writes() {
        let (_dev, port) = open_session();
        let b0 = port.gpio(0).unwrap();
        assert!(!b0.is_output().unwrap());
        b0.set_state(true).unwrap();
        assert!(!b0.state().unwrap());
    }

    #[test]
    fn test_wait_for_level() {
        let (dev, port) = open_session();
        let b7 = port.gpio(7).unwrap();

        assert_eq!(
            b7.wait_for(true, Duration::from_millis(20)),
            Err(PortError::Timeout)
        );

        dev.drive_gpio("MGHDLC1", 1 << 7, 1 << 7);
        assert!(b7.wait_for(true, Duration::from_millis(20)).unwrap());
        assert_eq!(dev.live_completions(), 0);
    }
}
