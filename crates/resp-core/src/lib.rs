//! # respfit Core Library
//!
//! A resumable, content-addressed pipeline for deriving restrained electrostatic
//! potential (RESP) atomic partial charges from external quantum-chemistry output.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`Molecule`,
//!   `EspGrid`), the canonical task-hashing scheme, the content-addressed bundle
//!   store, and the pure numerical charge-fitting routines.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer orchestrates the pipeline.
//!   It partitions external tasks into ready and pending sets, emits dispatch
//!   scripts for batch execution, and drives a job through its stage machine
//!   (`NeedsOptimization` → `NeedsEsp` → `ReadyToFit` → `Done`).
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer.
//!   It ties the `engine` and `core` together to execute a complete charge
//!   derivation, and is the entry point used by the command-line interface.

pub mod core;
pub mod engine;
pub mod workflows;
