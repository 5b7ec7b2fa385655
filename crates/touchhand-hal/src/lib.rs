//! `touchhand-hal` – VR runtime abstraction.
//!
//! Owns everything that touches the vendor runtime.  The rest of the stack
//! only ever talks to the [`VrRuntime`] trait through a [`SessionHandle`].
//!
//! # Modules
//!
//! - [`runtime`] – [`VrRuntime`][runtime::VrRuntime]: the seam to the vendor
//!   SDK (availability probe, init/shutdown, sessions, controller telemetry).
//! - [`session`] – [`SessionManager`][session::SessionManager]: reference-counted
//!   session ownership with a configurable [`TeardownPolicy`][touchhand_types::TeardownPolicy].
//! - [`tracking`] – [`HandTracker`][tracking::HandTracker]: polls both
//!   controllers through a held session and corrects them into hand poses.
//! - [`sim`] – [`SimRuntime`][sim::SimRuntime]: in-process runtime for headless
//!   runs and tests.

pub mod runtime;
pub mod session;
pub mod sim;
pub mod tracking;

pub use runtime::{RuntimeProbe, SessionId, VrRuntime};
pub use session::{SessionHandle, SessionManager};
pub use sim::{SimControllerFeed, SimCounters, SimRuntime};
pub use tracking::{HandTracker, TrackedHands};
