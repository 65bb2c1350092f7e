//! SyncLink serial adapter control library
//!
//! Host-side control of SyncLink synchronous/asynchronous serial adapters:
//! open a port, configure HDLC, async, monosync, bisync, raw or TDM
//! framing, move data, drive and watch serial signals and GPIO bits.
//!
//! # Modules
//!
//! - `driver`: raw device requests, driver records and the overlapped-wait adapter
//! - `settings`: protocol settings, persistent defaults and their translation
//! - `port`: the port session, the only surface applications should use
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup
//! - `error`: unified error handling
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use synclink::driver::{Events, SimulatedDevice};
//! use synclink::PortSession;
//!
//! let device = Arc::new(SimulatedDevice::new());
//! device.add_port("MGHDLC1");
//!
//! let port = PortSession::new(Arc::clone(&device), "MGHDLC1");
//! port.open()?;
//! port.set_local_loopback(true)?;
//! assert!(port.write(b"frame")?);
//! assert_eq!(port.read(None)?, b"frame");
//!
//! // nothing happened on the modem lines
//! assert!(port.wait(Events::DCD, Duration::from_millis(10)).is_empty());
//! # Ok::<(), synclink::Error>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod port;
pub mod settings;

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use driver::{DeviceApi, DriverStatus, Events, GpioDesc, RxStatus, Signals, Timeout};
pub use error::{Error, Result};
pub use port::{open_named, open_profile, PortError, PortResult, PortSession};
pub use settings::{Defaults, IdlePattern, Settings, SettingsError};
