//! Integration tests for syncvault-sync
//!
//! Exercise the engine, the change monitor and the scheduler against real
//! temporary directory trees.

mod common;

mod test_engine;
mod test_monitor;
mod test_scheduler;
