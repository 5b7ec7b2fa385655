//! `touchhand-perception` – pose math for tracked controllers.
//!
//! Turns raw controller telemetry reported by the VR runtime into hand poses
//! expressed in the host's canonical hand space.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3], [`Quaternion`][transform::Quaternion]
//!   and the rigid-body [`Transform3D`][transform::Transform3D] they compose into.
//! - [`hand`] – [`correct_pose`][hand::correct_pose]: the fixed per-hand
//!   correction that maps a controller's native pose onto canonical hand axes.

pub mod hand;
pub mod transform;

pub use hand::{HandPose, RawPoseState, correct_pose, hand_offset};
pub use transform::{Quaternion, Transform3D, Vec3};
