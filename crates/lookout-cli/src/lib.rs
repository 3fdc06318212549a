//! Library wrapper around the `lookout` binary so `cargo test --lib`
//! typechecks the CLI without building the integration tests.

#[allow(dead_code)]
#[path = "main.rs"]
mod main_bin;
