// Integration tests for streamcast
// This file serves as the main entry point for integration tests

mod common;

#[path = "integration/selection_flow.rs"]
mod selection_flow;

#[path = "integration/pipeline_compilation.rs"]
mod pipeline_compilation;

#[path = "integration/supervision.rs"]
mod supervision;

#[path = "integration/config_state.rs"]
mod config_state;
