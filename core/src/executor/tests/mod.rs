//! Tests for the executor
//!
//! Organized by feature area

mod attribution_tests;
mod frozen_tests;
mod helpers;
mod require_tests;
