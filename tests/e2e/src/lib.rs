//! End-to-end fixtures: a multi-node in-memory mesh plus the small cast
//! of actors the scenarios exercise.

pub mod fixtures;
