//! Keeps exactly one `StatefulSet` alive for every `StsBug` custom resource.
//!
//! The controller is level triggered: every event for an `StsBug`, or for a
//! `StatefulSet` it controls, re-derives the whole picture from the cluster
//! and issues at most one corrective write.

pub mod error;
pub mod operator;

pub use operator::{operator, register, Registration};
