//! Test Module
//!
//! Scenario suites for the LeadFlow pipeline.
//!
//! ## Test Categories
//! - `brain_tests`: Detector determinism, monotonic confidence, retrieval and composition
//! - `actor_tests`: Tool menu and tool dispatch against recording collaborators
//! - `integration_tests`: Full turns through the orchestrator
//! - `chaos_test`: Provider and collaborator failures
//! - `support`: Shared scripted provider and recording collaborators

pub mod support;
pub mod actor_tests;
pub mod chaos_test;
