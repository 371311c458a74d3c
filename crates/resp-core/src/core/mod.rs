//! # Core Module
//!
//! This module provides the fundamental building blocks and algorithms for RESP
//! charge derivation in respfit, serving as the computational core of the library.
//!
//! ## Overview
//!
//! The core module implements the essential data structures, algorithms, and utilities
//! required to turn quantum-chemistry output into fitted atomic partial charges. It
//! provides a complete framework for representing multi-conformer molecules, describing
//! and caching external computations, and solving the restrained least-squares problem
//! that defines the RESP method.
//!
//! ## Architecture
//!
//! The module is organized into specialized submodules that handle different aspects
//! of the charge-derivation problem:
//!
//! - **Molecular Representation** ([`models`]) - Data structures for molecules, conformers,
//!   orientations, ESP grids, and charge constraints
//! - **Task Description** ([`qm`]) - Canonical hashing of external computations and the
//!   self-describing bundle format they are cached in
//! - **Bundle Storage** ([`store`]) - Content-addressed persistence keyed by task identity
//! - **Charge Fitting** ([`fitting`]) - The constrained, hyperbolically restrained
//!   least-squares engine
//! - **File I/O** ([`io`]) - Job-file parsing and tabular charge reports
//!
//! ## Key Capabilities
//!
//! - **Snapshot task identity** computed once from normalized structure and method data
//! - **Byte-stable canonical serialization** so equal inputs always hash equally
//! - **Crash-tolerant caching** that treats partial or corrupt results as not yet computed
//! - **Equivalence and sum constraints** spanning atoms of different molecules
//! - **Two-stage RESP fits** with frozen-charge folding and per-stage diagnostics
//!
//! ## Scientific Foundation
//!
//! The fitting engine implements the RESP method of Bayly, Cieplak, Cornell, and
//! Kollman: atomic point charges are fitted to reproduce the quantum electrostatic
//! potential on a grid of sample points, subject to linear equality constraints and
//! a hyperbolic restraint that damps statistically ill-determined buried charges.

pub mod fitting;
pub mod io;
pub mod models;
pub mod qm;
pub mod store;
