//! # Engine Module
//!
//! This module implements the resumable execution engine that carries a
//! charge-derivation job from raw input structures to fitted charges,
//! coordinating external quantum-chemistry work through the bundle store.
//!
//! ## Overview
//!
//! The engine owns the pipeline state machine. Each stage derives its task
//! descriptors from the current molecular data, checks the store for results
//! computed in earlier runs, dispatches whatever is missing as external work
//! units, and consumes completed outputs back into the molecules. Because
//! every decision is re-derived from content-addressed state, the engine can
//! be stopped and restarted at any point without repeating finished work.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Job-level settings: geometry
//!   optimization, external executable, method options, fit options
//! - **Stage Driver** ([`driver`]) - Partitions a stage's tasks into ready,
//!   pending, and failed, and renders dispatch scripts
//! - **Orchestrator** ([`orchestrator`]) - The `Job` state machine and its
//!   re-entrant `advance` loop
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//!   for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types and error
//!   propagation

pub mod config;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod progress;
