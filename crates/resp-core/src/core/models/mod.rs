//! # Core Models Module
//!
//! This module contains the fundamental data structures used to represent the
//! chemical inputs of a charge-fitting job, providing the foundation for all
//! pipeline and fitting operations.
//!
//! ## Overview
//!
//! The models module defines the core abstractions for describing what is being
//! fitted: molecules with one or more conformers, each sampled in one or more
//! orientations, together with the electrostatic-potential grids produced by
//! external computations and the constraints imposed on the fitted charges.
//! These models are designed to:
//!
//! - **Represent multi-conformer input** - Several geometries of one molecule
//!   contribute to a single charge set
//! - **Keep provenance explicit** - ESP data is attached to the exact orientation
//!   it was computed for
//! - **Support multi-molecule fits** - Constraints may couple charges across
//!   different molecules in the same job
//! - **Maintain type safety** - Strong typing for atom references and constraint
//!   definitions
//!
//! ## Key Components
//!
//! - [`element`] - Element symbol and atomic number tables, Hill formula derivation
//! - [`molecule`] - Molecules, conformers, orientations, and ESP grids
//! - [`constraints`] - Atom references, equivalence groups, and charge-sum constraints

pub mod constraints;
pub mod element;
pub mod molecule;
