//! # Workflows Module
//!
//! This module provides the high-level entry points that tie the pipeline
//! together for users of the library.
//!
//! ## Overview
//!
//! Workflows are the top-level API of respfit. They wrap job construction,
//! store handling, progress reporting, and the advance loop behind a single
//! call, so a front end only has to supply molecules, constraints, settings,
//! and a store, and then react to the outcome: charges, pending external
//! work, or failed tasks.
//!
//! ## Architecture
//!
//! - **Charge Derivation** ([`charges`]) - Runs the resumable
//!   optimization → ESP → fit pipeline as far as the store allows.

pub mod charges;
