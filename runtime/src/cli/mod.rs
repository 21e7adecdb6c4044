//! CLI subcommand implementations for the Shelfscan binary.

pub mod doctor;
pub mod extract_cmd;
pub mod logging;
pub mod progress_bar;
pub mod resolve_cmd;
pub mod run_cmd;
