//! # Task Description Module
//!
//! This module defines how one unit of external quantum-chemistry work is
//! described, identified, and exchanged with the outside world.
//!
//! ## Overview
//!
//! Every external computation the pipeline needs is captured as an immutable
//! [`task::TaskDescriptor`]: a snapshot of the molecular structure, the driver
//! kind (geometry optimization or single-point ESP evaluation), and the method
//! options. At construction the descriptor is normalized and hashed into a
//! [`task::TaskKey`], the content address every cache decision is keyed by.
//!
//! Results travel as self-describing [`bundle::TaskBundle`] JSON documents that
//! embed the full key, the input that produced them, and either an output
//! payload or an error report. External runner scripts rewrite a pending bundle
//! in place; the pipeline never trusts a bundle without re-checking its key and
//! payload shape.
//!
//! ## Key Components
//!
//! - [`hashing`] - Canonical text forms and SHA-256 content hashes
//! - [`options`] - Driver kinds and method options shared by all tasks
//! - [`task`] - Validated task descriptors and their content keys
//! - [`bundle`] - The on-disk bundle document and its status lifecycle

pub mod bundle;
pub mod hashing;
pub mod options;
pub mod task;
