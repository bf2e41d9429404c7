//! Results of running a step's commands.

use serde::{Deserialize, Serialize};

/// Raw output of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub cmd: String,
    pub output: String,
}

impl CommandOutput {
    pub fn new(cmd: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            output: output.into(),
        }
    }
}

/// Output of executing one step. Command-level failures live in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub description: String,

    /// One entry per command, in execution order.
    #[serde(default)]
    pub command_outputs: Vec<CommandOutput>,

    #[serde(default)]
    pub errors: Vec<String>,

    /// True when the output came from the simulator or a fixture.
    #[serde(default)]
    pub simulated: bool,
}

impl ExecutionResult {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn push_output(&mut self, cmd: impl Into<String>, output: impl Into<String>) {
        self.command_outputs.push(CommandOutput::new(cmd, output));
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render outputs as the `$ cmd` / output transcript shown to the analyzer.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for co in &self.command_outputs {
            out.push_str("$ ");
            out.push_str(&co.cmd);
            out.push('\n');
            out.push_str(co.output.trim_end());
            out.push_str("\n\n");
        }
        out
    }
}
