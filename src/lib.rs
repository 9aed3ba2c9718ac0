//! Gym monitor library
//!
//! Infers trainer/member sessions from identity sightings and evaluates
//! policy violation rules. Exposes modules for integration testing and
//! binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
