//! Integration tests for Lab-Scout

mod common;
mod extractor_tests;
mod orchestrator_tests;
mod service_tests;
