//! The [`VrRuntime`] trait: the seam between this crate and a vendor VR SDK.
//!
//! A driver wraps one SDK and is handed to a
//! [`SessionManager`][crate::session::SessionManager], which serialises every
//! call into it.  Drivers never decide when to initialise or tear down; the
//! manager does.

use std::fmt;

use touchhand_perception::RawPoseState;
use touchhand_types::{Handedness, TouchError};

/// Opaque identifier of a runtime-owned device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Result of probing the host for a usable runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeProbe {
    /// The vendor service process is running.
    pub service_running: bool,
    /// A headset is plugged in and recognised by the service.
    pub hmd_connected: bool,
    /// The runtime client library could be located.
    pub library_found: bool,
}

impl RuntimeProbe {
    /// A probe where everything is present.
    pub fn ready() -> Self {
        Self {
            service_running: true,
            hmd_connected: true,
            library_found: true,
        }
    }

    /// `true` when a session can be attempted at all.
    pub fn is_usable(&self) -> bool {
        self.service_running && self.hmd_connected && self.library_found
    }
}

/// A vendor VR runtime driver.
pub trait VrRuntime: Send {
    /// Check whether the runtime and a headset are present.  Must not
    /// initialise anything.
    fn probe(&mut self) -> RuntimeProbe;

    /// Initialise the SDK.
    ///
    /// # Errors
    ///
    /// Returns [`TouchError::Runtime`] when the SDK refuses to initialise.
    fn initialize(&mut self) -> Result<(), TouchError>;

    /// Create a device session.  Only called after a successful
    /// [`initialize`][Self::initialize].
    ///
    /// # Errors
    ///
    /// Returns [`TouchError::Runtime`] when no session could be created.
    fn create_session(&mut self) -> Result<SessionId, TouchError>;

    fn destroy_session(&mut self, session: SessionId);

    fn shutdown(&mut self);

    /// Human-readable description of the most recent SDK error.
    fn last_error(&self) -> String;

    /// Latest pose record for one controller, or `None` when that controller
    /// is not currently tracked.
    fn controller_state(&mut self, session: SessionId, hand: Handedness) -> Option<RawPoseState>;
}
