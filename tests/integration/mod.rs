//! Integration Tests Module
//!
//! End-to-end coverage of the slice analysis pipeline, the case review
//! workflow and persistence, against a scripted vision provider.

// Scripted provider and case fixtures
mod support;

// Scheduler, aggregation, batching and progress
mod analysis_test;

// Case workflow from intake to patient translation
mod workflow_test;

// SQLite snapshots and the command layer
mod persistence_test;
