//! Unit and integration tests for the emitter.

mod pipeline_tests;
