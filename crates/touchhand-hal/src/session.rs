//! [`SessionManager`] – reference-counted ownership of the device session.
//!
//! Everything that needs the headset acquires a [`SessionHandle`].  The first
//! acquisition initialises the SDK and creates the session; later ones share
//! it.  Dropping a handle releases its reference.
//!
//! # Teardown
//!
//! What happens at a reference count of zero depends on the
//! [`TeardownPolicy`]:
//!
//! | Policy | On last release |
//! |---|---|
//! | [`RetainForProcess`][TeardownPolicy::RetainForProcess] | Session and SDK stay up until [`SessionManager::shutdown`]. |
//! | [`DestroyOnLastRelease`][TeardownPolicy::DestroyOnLastRelease] | Session destroyed and SDK shut down; the next acquire starts over. |
//!
//! Some vendor runtimes crash or leak on repeated init/shutdown within one
//! process, so `RetainForProcess` is the default.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};
use touchhand_perception::RawPoseState;
use touchhand_types::{Handedness, TeardownPolicy, TouchError};

use crate::runtime::{SessionId, VrRuntime};

struct SessionState<R> {
    runtime: R,
    /// Cached probe result; the host is only probed once per manager.
    available: Option<bool>,
    initialized: bool,
    session: Option<SessionId>,
    ref_count: u32,
}

impl<R: VrRuntime> SessionState<R> {
    fn is_available(&mut self) -> bool {
        if let Some(available) = self.available {
            return available;
        }
        let probe = self.runtime.probe();
        let available = probe.is_usable();
        debug!(?probe, available, "probed VR runtime");
        self.available = Some(available);
        available
    }

    fn open(&mut self) -> Result<SessionId, TouchError> {
        if !self.initialized {
            if let Err(e) = self.runtime.initialize() {
                warn!(
                    error = %e,
                    sdk_error = %self.runtime.last_error(),
                    "failed to initialize VR SDK"
                );
                return Err(e);
            }
            self.initialized = true;
        }

        match self.runtime.create_session() {
            Ok(id) => {
                info!(session = %id, "VR session created");
                self.session = Some(id);
                Ok(id)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    sdk_error = %self.runtime.last_error(),
                    "failed to acquire VR session"
                );
                Err(e)
            }
        }
    }

    #[instrument(name = "session.teardown", skip_all)]
    fn teardown(&mut self) {
        if let Some(id) = self.session.take() {
            self.runtime.destroy_session(id);
            info!(session = %id, "VR session destroyed");
        }
        if self.initialized {
            self.runtime.shutdown();
            self.initialized = false;
            info!("VR SDK shut down");
        }
    }
}

/// Owns a [`VrRuntime`] and the single device session created from it.
pub struct SessionManager<R: VrRuntime> {
    policy: TeardownPolicy,
    state: Mutex<SessionState<R>>,
}

impl<R: VrRuntime> SessionManager<R> {
    /// Wrap `runtime`.  Nothing is probed or initialised until the first
    /// [`acquire`][Self::acquire].
    pub fn new(runtime: R, policy: TeardownPolicy) -> Arc<Self> {
        Arc::new(Self {
            policy,
            state: Mutex::new(SessionState {
                runtime,
                available: None,
                initialized: false,
                session: None,
                ref_count: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> TeardownPolicy {
        self.policy
    }

    /// Whether a runtime and headset are present.  Probed once, then cached.
    pub fn is_available(&self) -> bool {
        self.lock().is_available()
    }

    /// Number of live [`SessionHandle`]s.
    pub fn ref_count(&self) -> u32 {
        self.lock().ref_count
    }

    /// Whether a device session currently exists (possibly with no handles
    /// under [`TeardownPolicy::RetainForProcess`]).
    pub fn has_session(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Take a reference to the device session, creating it if necessary.
    ///
    /// # Errors
    ///
    /// - [`TouchError::RuntimeUnavailable`] when no session exists and the
    ///   probe found no runtime or headset.
    /// - [`TouchError::Runtime`] when SDK initialisation or session creation
    ///   fails.  A failed creation leaves the SDK initialised, so the next
    ///   attempt goes straight to session creation.
    #[instrument(name = "session.acquire", skip(self), fields(policy = %self.policy))]
    pub fn acquire(self: &Arc<Self>) -> Result<SessionHandle<R>, TouchError> {
        let mut state = self.lock();

        let id = match state.session {
            Some(id) => id,
            None => {
                if !state.is_available() {
                    debug!("no VR runtime or HMD present");
                    return Err(TouchError::RuntimeUnavailable(
                        "no VR runtime or HMD present".to_string(),
                    ));
                }
                debug_assert_eq!(state.ref_count, 0);
                state.open()?
            }
        };

        state.ref_count += 1;
        debug!(session = %id, ref_count = state.ref_count, "VR session acquired");
        Ok(SessionHandle {
            manager: Arc::clone(self),
            id,
        })
    }

    /// Tear the session down and shut the SDK down.
    ///
    /// Intended for process exit under [`TeardownPolicy::RetainForProcess`].
    /// A no-op when nothing is running.
    ///
    /// # Errors
    ///
    /// Returns [`TouchError::SessionInUse`] while any handle is alive.
    pub fn shutdown(&self) -> Result<(), TouchError> {
        let mut state = self.lock();
        if state.ref_count > 0 {
            return Err(TouchError::SessionInUse {
                outstanding: state.ref_count,
            });
        }
        state.teardown();
        Ok(())
    }

    fn retain(&self) {
        self.lock().ref_count += 1;
    }

    fn release(&self) {
        let mut state = self.lock();
        debug_assert!(state.ref_count > 0 && state.session.is_some());
        state.ref_count = state.ref_count.saturating_sub(1);
        if state.ref_count > 0 {
            return;
        }

        match self.policy {
            TeardownPolicy::RetainForProcess => {
                debug!("zero refcount; keeping VR session for the process lifetime");
            }
            TeardownPolicy::DestroyOnLastRelease => {
                debug!("zero refcount; shutting down VR session and SDK");
                state.teardown();
            }
        }
    }

    fn controller_state(&self, session: SessionId, hand: Handedness) -> Option<RawPoseState> {
        self.lock().runtime.controller_state(session, hand)
    }
}

/// A counted reference to the device session.
///
/// Cloning takes another reference; dropping gives one back.
pub struct SessionHandle<R: VrRuntime> {
    manager: Arc<SessionManager<R>>,
    id: SessionId,
}

impl<R: VrRuntime> SessionHandle<R> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Latest raw pose for one controller, `None` when it is not tracked.
    pub fn controller_state(&self, hand: Handedness) -> Option<RawPoseState> {
        self.manager.controller_state(self.id, hand)
    }

    /// Give the reference back.  Equivalent to dropping the handle.
    pub fn release(self) {
        drop(self);
    }
}

impl<R: VrRuntime> Clone for SessionHandle<R> {
    fn clone(&self) -> Self {
        self.manager.retain();
        Self {
            manager: Arc::clone(&self.manager),
            id: self.id,
        }
    }
}

impl<R: VrRuntime> Drop for SessionHandle<R> {
    fn drop(&mut self) {
        self.manager.release();
    }
}

impl<R: VrRuntime> std::fmt::Debug for SessionHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeProbe;
    use crate::sim::SimRuntime;

    #[test]
    fn first_acquire_initializes_and_creates() {
        let rt = SimRuntime::new();
        let counters = rt.counters();
        let manager = SessionManager::new(rt, TeardownPolicy::RetainForProcess);

        assert!(!manager.has_session());
        let handle = manager.acquire().unwrap();
        assert_eq!(handle.id(), SessionId(1));
        assert_eq!(manager.ref_count(), 1);
        assert_eq!(counters.initializes(), 1);
        assert_eq!(counters.sessions_created(), 1);
    }

    #[test]
    fn later_acquires_share_the_session() {
        let rt = SimRuntime::new();
        let counters = rt.counters();
        let manager = SessionManager::new(rt, TeardownPolicy::RetainForProcess);

        let a = manager.acquire().unwrap();
        let b = manager.acquire().unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(manager.ref_count(), 2);
        assert_eq!(counters.sessions_created(), 1);
    }

    #[test]
    fn clone_and_drop_adjust_refcount() {
        let manager = SessionManager::new(SimRuntime::new(), TeardownPolicy::RetainForProcess);
        let a = manager.acquire().unwrap();
        let b = a.clone();
        assert_eq!(manager.ref_count(), 2);
        drop(a);
        assert_eq!(manager.ref_count(), 1);
        b.release();
        assert_eq!(manager.ref_count(), 0);
    }

    #[test]
    fn retain_policy_keeps_session_after_last_release() {
        let rt = SimRuntime::new();
        let counters = rt.counters();
        let manager = SessionManager::new(rt, TeardownPolicy::RetainForProcess);

        let first = manager.acquire().unwrap().id();
        assert_eq!(manager.ref_count(), 0);
        assert!(manager.has_session());
        assert_eq!(counters.shutdowns(), 0);

        // Re-acquiring reuses the retained session without re-initialising.
        let again = manager.acquire().unwrap();
        assert_eq!(again.id(), first);
        assert_eq!(counters.initializes(), 1);
        assert_eq!(counters.sessions_created(), 1);
    }

    #[test]
    fn destroy_policy_tears_down_on_last_release() {
        let rt = SimRuntime::new();
        let counters = rt.counters();
        let manager = SessionManager::new(rt, TeardownPolicy::DestroyOnLastRelease);

        let a = manager.acquire().unwrap();
        let b = manager.acquire().unwrap();
        drop(a);
        assert_eq!(counters.sessions_destroyed(), 0);
        drop(b);
        assert!(!manager.has_session());
        assert_eq!(counters.sessions_destroyed(), 1);
        assert_eq!(counters.shutdowns(), 1);

        // Next acquire starts from scratch.
        let c = manager.acquire().unwrap();
        assert_eq!(c.id(), SessionId(2));
        assert_eq!(counters.initializes(), 2);
    }

    #[test]
    fn unavailable_runtime_is_reported_and_probe_is_cached() {
        let rt = SimRuntime::new().with_probe(RuntimeProbe {
            hmd_connected: false,
            ..RuntimeProbe::ready()
        });
        let counters = rt.counters();
        let manager = SessionManager::new(rt, TeardownPolicy::RetainForProcess);

        for _ in 0..3 {
            let err = manager.acquire().unwrap_err();
            assert!(matches!(err, TouchError::RuntimeUnavailable(_)));
        }
        assert!(!manager.is_available());
        assert_eq!(counters.probes(), 1);
        assert_eq!(counters.initializes(), 0);
        assert_eq!(manager.ref_count(), 0);
    }

    #[test]
    fn initialize_failure_is_propagated() {
        let manager = SessionManager::new(
            SimRuntime::new().failing_initialize(),
            TeardownPolicy::RetainForProcess,
        );
        let err = manager.acquire().unwrap_err();
        assert!(matches!(
            err,
            TouchError::Runtime { ref operation, .. } if operation == "initialize"
        ));
        assert_eq!(manager.ref_count(), 0);
        assert!(!manager.has_session());
    }

    #[test]
    fn create_failure_keeps_sdk_initialized() {
        let rt = SimRuntime::new().failing_create_session();
        let counters = rt.counters();
        let manager = SessionManager::new(rt, TeardownPolicy::RetainForProcess);

        assert!(manager.acquire().is_err());
        assert!(manager.acquire().is_err());
        assert_eq!(counters.initializes(), 1);
        assert_eq!(manager.ref_count(), 0);
    }

    #[test]
    fn shutdown_refuses_while_handles_alive() {
        let rt = SimRuntime::new();
        let counters = rt.counters();
        let manager = SessionManager::new(rt, TeardownPolicy::RetainForProcess);

        let handle = manager.acquire().unwrap();
        assert_eq!(
            manager.shutdown().unwrap_err(),
            TouchError::SessionInUse { outstanding: 1 }
        );

        drop(handle);
        manager.shutdown().unwrap();
        assert!(!manager.has_session());
        assert_eq!(counters.sessions_destroyed(), 1);
        assert_eq!(counters.shutdowns(), 1);

        // Nothing left to tear down.
        manager.shutdown().unwrap();
        assert_eq!(counters.shutdowns(), 1);
    }

    #[test]
    fn handles_work_across_threads() {
        let manager = SessionManager::new(SimRuntime::new(), TeardownPolicy::RetainForProcess);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    let handle = manager.acquire().unwrap();
                    handle.id()
                })
            })
            .collect();
        for t in threads {
            assert_eq!(t.join().unwrap(), SessionId(1));
        }
        assert_eq!(manager.ref_count(), 0);
    }

    /// Collects the names of spans opened while it is installed.
    #[derive(Clone, Default)]
    struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanNames {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().unwrap().push(attrs.metadata().name());
        }
    }

    #[test]
    fn lifecycle_emits_acquire_and_teardown_spans() {
        use tracing_subscriber::layer::SubscriberExt;

        let names = SpanNames::default();
        let subscriber = tracing_subscriber::registry().with(names.clone());
        tracing::subscriber::with_default(subscriber, || {
            let manager =
                SessionManager::new(SimRuntime::new(), TeardownPolicy::DestroyOnLastRelease);
            drop(manager.acquire().unwrap());
        });

        let names = names.0.lock().unwrap();
        assert!(names.contains(&"session.acquire"), "{names:?}");
        assert!(names.contains(&"session.teardown"), "{names:?}");
    }
}
