//! Integration test modules for the CLI suite.

pub mod cli_suite;
pub mod operator_cli;
pub mod shared_build;
