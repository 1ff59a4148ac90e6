//! Integration test crate for the playout engine.
//!
//! This crate exists solely to hold cross-crate integration tests.

#[cfg(test)]
mod support;

#[cfg(test)]
mod distribution;

#[cfg(test)]
mod pacing;

#[cfg(test)]
mod gpu;
