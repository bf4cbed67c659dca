//! CLI Commands

pub mod install;
pub mod run;

use serde_json::Value;

/// What a command hands back to `main`
pub struct CommandOutput {
    /// Payload of the JSON envelope
    pub result: Value,
    /// Non-zero process exit code, if any
    pub exit_code: Option<i32>,
}
