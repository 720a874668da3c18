//! Core domain types and logic.

pub mod bar;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod generators;
pub mod metrics;
pub mod permutation;
pub mod report;
pub mod signal;
pub mod simulator;
