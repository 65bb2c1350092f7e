//! Port sessions over a SyncLink driver.
//!
//! [`PortSession`] is the only surface a caller should use. It owns the
//! device handle, keeps the settings snapshot, and runs the stuck-mode
//! workaround around every settings change and close.

pub mod error;
pub mod gpio;
pub mod session;
pub mod signals;

pub use error::{PortError, PortResult};
pub use gpio::{Gpio, GPIO_BITS};
pub use session::PortSession;

use crate::config::{Config, PortProfile, SessionConfig};
use crate::driver::DeviceApi;
use std::sync::Arc;
use tracing::info;

/// Open the port named by `profile` and apply its defaults, then its
/// settings.
///
/// Defaults are only written when the port id resolves; see
/// [`PortSession::set_defaults`].
pub fn open_profile<D: DeviceApi>(
    device: Arc<D>,
    profile: &PortProfile,
    session: &SessionConfig,
) -> PortResult<PortSession<D>> {
    let port = PortSession::with_config(device, &profile.port, session);
    port.open()?;
    if let Some(defaults) = &profile.defaults {
        port.set_defaults(defaults)?;
    }
    if let Some(settings) = &profile.settings {
        port.apply_settings(settings)?;
    }
    info!(port = %profile.port, "profile applied");
    Ok(port)
}

/// Open the profile called `alias` from `config`, using its session options.
pub fn open_named<D: DeviceApi>(
    device: Arc<D>,
    config: &Config,
    alias: &str,
) -> crate::Result<PortSession<D>> {
    let profile = config
        .profile(alias)
        .ok_or_else(|| crate::Error::UnknownProfile(alias.to_string()))?;
    Ok(open_profile(device, profile, &config.session)?)
}
