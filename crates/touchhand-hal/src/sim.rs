//! In-process simulated runtime for headless runs and CI.
//!
//! [`SimRuntime`] implements [`VrRuntime`] without any vendor SDK.  It hands
//! out sequential session ids, reports whatever controller poses were pushed
//! through its [`SimControllerFeed`], and can be told to fail at
//! initialisation or session creation.  A [`SimCounters`] clone observes how
//! often each lifecycle call happened, even after the runtime has moved into
//! a [`SessionManager`][crate::session::SessionManager].
//!
//! # Example
//!
//! ```rust
//! use touchhand_hal::{SessionManager, SimRuntime};
//! use touchhand_types::TeardownPolicy;
//!
//! let runtime = SimRuntime::new();
//! let counters = runtime.counters();
//! let manager = SessionManager::new(runtime, TeardownPolicy::DestroyOnLastRelease);
//!
//! let handle = manager.acquire().expect("sim session");
//! drop(handle);
//! assert_eq!(counters.shutdowns(), 1);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use touchhand_perception::RawPoseState;
use touchhand_types::{Handedness, TouchError};

use crate::runtime::{RuntimeProbe, SessionId, VrRuntime};

// ────────────────────────────────────────────────────────────────────────────
// Counters
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CallCounts {
    probes: AtomicU32,
    initializes: AtomicU32,
    sessions_created: AtomicU32,
    sessions_destroyed: AtomicU32,
    shutdowns: AtomicU32,
}

/// Shared view of how many lifecycle calls a [`SimRuntime`] has received.
#[derive(Debug, Clone, Default)]
pub struct SimCounters(Arc<CallCounts>);

impl SimCounters {
    pub fn probes(&self) -> u32 {
        self.0.probes.load(Ordering::SeqCst)
    }

    pub fn initializes(&self) -> u32 {
        self.0.initializes.load(Ordering::SeqCst)
    }

    pub fn sessions_created(&self) -> u32 {
        self.0.sessions_created.load(Ordering::SeqCst)
    }

    pub fn sessions_destroyed(&self) -> u32 {
        self.0.sessions_destroyed.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> u32 {
        self.0.shutdowns.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller feed
// ────────────────────────────────────────────────────────────────────────────

/// Writer side of the simulated controller telemetry.
///
/// Cloning is cheap; every clone feeds the same runtime.
#[derive(Debug, Clone, Default)]
pub struct SimControllerFeed(Arc<Mutex<HashMap<Handedness, RawPoseState>>>);

impl SimControllerFeed {
    /// Report `pose` for `hand` from now on.
    pub fn set(&self, hand: Handedness, pose: RawPoseState) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hand, pose);
    }

    /// Mark `hand` as no longer tracked.
    pub fn clear(&self, hand: Handedness) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&hand);
    }

    fn get(&self, hand: Handedness) -> Option<RawPoseState> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hand)
            .copied()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRuntime
// ────────────────────────────────────────────────────────────────────────────

/// A simulated VR runtime.  Succeeds at everything unless told otherwise.
#[derive(Debug)]
pub struct SimRuntime {
    probe: RuntimeProbe,
    fail_initialize: bool,
    fail_create_session: bool,
    initialized: bool,
    live_session: Option<SessionId>,
    next_session: u64,
    last_error: String,
    feed: SimControllerFeed,
    counters: SimCounters,
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRuntime {
    /// A runtime with a connected headset and no tracked controllers.
    pub fn new() -> Self {
        Self {
            probe: RuntimeProbe::ready(),
            fail_initialize: false,
            fail_create_session: false,
            initialized: false,
            live_session: None,
            next_session: 1,
            last_error: String::new(),
            feed: SimControllerFeed::default(),
            counters: SimCounters::default(),
        }
    }

    /// Report `probe` instead of a fully present runtime.
    pub fn with_probe(mut self, probe: RuntimeProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Make every [`VrRuntime::initialize`] call fail.
    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// Make every [`VrRuntime::create_session`] call fail.
    pub fn failing_create_session(mut self) -> Self {
        self.fail_create_session = true;
        self
    }

    /// Start with `pose` reported for `hand`.
    pub fn with_controller(self, hand: Handedness, pose: RawPoseState) -> Self {
        self.feed.set(hand, pose);
        self
    }

    /// A feed that keeps working after the runtime moves into a manager.
    pub fn controller_feed(&self) -> SimControllerFeed {
        self.feed.clone()
    }

    pub fn counters(&self) -> SimCounters {
        self.counters.clone()
    }

    fn fail(&mut self, operation: &str, details: &str) -> TouchError {
        self.last_error = details.to_string();
        TouchError::Runtime {
            operation: operation.to_string(),
            details: details.to_string(),
        }
    }
}

impl VrRuntime for SimRuntime {
    fn probe(&mut self) -> RuntimeProbe {
        self.counters.0.probes.fetch_add(1, Ordering::SeqCst);
        self.probe
    }

    fn initialize(&mut self) -> Result<(), TouchError> {
        self.counters.0.initializes.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            return Err(self.fail("initialize", "simulated initialization failure"));
        }
        self.initialized = true;
        Ok(())
    }

    fn create_session(&mut self) -> Result<SessionId, TouchError> {
        if !self.initialized {
            return Err(self.fail("create_session", "SDK not initialized"));
        }
        if self.fail_create_session {
            return Err(self.fail("create_session", "simulated session creation failure"));
        }
        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.live_session = Some(id);
        self.counters.0.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn destroy_session(&mut self, session: SessionId) {
        if self.live_session == Some(session) {
            self.live_session = None;
        }
        self.counters.0.sessions_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        self.counters.0.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn controller_state(&mut self, session: SessionId, hand: Handedness) -> Option<RawPoseState> {
        if self.live_session != Some(session) {
            return None;
        }
        self.feed.get(hand)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use touchhand_perception::{Quaternion, Vec3};

    #[test]
    fn session_requires_initialize() {
        let mut rt = SimRuntime::new();
        assert!(rt.create_session().is_err());
        assert_eq!(rt.last_error(), "SDK not initialized");

        rt.initialize().unwrap();
        assert_eq!(rt.create_session().unwrap(), SessionId(1));
        assert_eq!(rt.create_session().unwrap(), SessionId(2));
    }

    #[test]
    fn failing_initialize_records_last_error() {
        let mut rt = SimRuntime::new().failing_initialize();
        let err = rt.initialize().unwrap_err();
        assert!(matches!(err, TouchError::Runtime { .. }));
        assert!(rt.last_error().contains("initialization"));
        assert_eq!(rt.counters().initializes(), 1);
    }

    #[test]
    fn controller_state_only_for_live_session() {
        let pose = RawPoseState::at_rest(Vec3::new(0.0, 1.0, 0.0), Quaternion::identity());
        let mut rt = SimRuntime::new().with_controller(Handedness::Left, pose);
        rt.initialize().unwrap();
        let id = rt.create_session().unwrap();

        assert_eq!(rt.controller_state(id, Handedness::Left), Some(pose));
        assert_eq!(rt.controller_state(id, Handedness::Right), None);
        assert_eq!(rt.controller_state(SessionId(99), Handedness::Left), None);

        rt.destroy_session(id);
        assert_eq!(rt.controller_state(id, Handedness::Left), None);
    }

    #[test]
    fn feed_updates_are_visible() {
        let mut rt = SimRuntime::new();
        let feed = rt.controller_feed();
        rt.initialize().unwrap();
        let id = rt.create_session().unwrap();

        let pose = RawPoseState::at_rest(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity());
        feed.set(Handedness::Right, pose);
        assert_eq!(rt.controller_state(id, Handedness::Right), Some(pose));

        feed.clear(Handedness::Right);
        assert_eq!(rt.controller_state(id, Handedness::Right), None);
    }

    #[test]
    fn counters_are_shared_between_clones() {
        let mut rt = SimRuntime::new();
        let counters = rt.counters();
        rt.probe();
        rt.initialize().unwrap();
        rt.shutdown();
        assert_eq!(counters.probes(), 1);
        assert_eq!(counters.initializes(), 1);
        assert_eq!(counters.shutdowns(), 1);
    }
}
