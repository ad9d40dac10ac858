//! # Controller
//!
//! The ServiceBinding reconciler and its supporting pieces.

pub mod reconciler;
