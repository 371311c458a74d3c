//! # Core I/O Module
//!
//! This module handles the file formats at the boundaries of a charge-fitting
//! job: the declarative TOML description a job starts from, and the tabular
//! charge report it ends in.
//!
//! ## Overview
//!
//! Everything between those two boundaries is typed: the job file is parsed
//! and validated into the library's model and configuration types in one step,
//! so the rest of the pipeline never sees raw text, and the fitted charges are
//! rendered from the final report without intermediate representations.
//!
//! ## Key Components
//!
//! - [`jobfile`] - TOML job descriptions (molecules, constraints, method and
//!   fit options) loaded into `(Vec<Molecule>, ConstraintSet, JobConfig)`
//! - [`report`] - Fitted-charge tables written as CSV

pub mod jobfile;
pub mod report;
