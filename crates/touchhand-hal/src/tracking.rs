//! [`HandTracker`] – per-frame controller polling.
//!
//! Holds a [`SessionHandle`] for as long as it lives, so the session cannot
//! be torn down underneath it.  Each [`poll`][HandTracker::poll] reads both
//! controllers and runs them through
//! [`correct_pose`][touchhand_perception::correct_pose]; untracked
//! controllers come back as [`HandPose::invalid`].

use tracing::trace;
use touchhand_perception::{HandPose, correct_pose};
use touchhand_types::Handedness;

use crate::runtime::VrRuntime;
use crate::session::SessionHandle;

/// Corrected poses for both hands from one poll.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackedHands {
    pub left: HandPose,
    pub right: HandPose,
}

impl TrackedHands {
    pub fn get(&self, hand: Handedness) -> &HandPose {
        match hand {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }
}

/// Polls both controllers through a held session.
pub struct HandTracker<R: VrRuntime> {
    handle: SessionHandle<R>,
}

impl<R: VrRuntime> HandTracker<R> {
    pub fn new(handle: SessionHandle<R>) -> Self {
        Self { handle }
    }

    /// Read and correct the current pose of both controllers.
    pub fn poll(&self) -> TrackedHands {
        let mut hands = TrackedHands::default();
        for hand in Handedness::ALL {
            let pose = match self.handle.controller_state(hand) {
                Some(raw) => correct_pose(hand, &raw),
                None => HandPose::invalid(),
            };
            trace!(%hand, valid = pose.valid, "polled controller");
            match hand {
                Handedness::Left => hands.left = pose,
                Handedness::Right => hands.right = pose,
            }
        }
        hands
    }

    /// Stop tracking and hand the session reference back to the caller.
    pub fn into_handle(self) -> SessionHandle<R> {
        self.handle
    }
}
