/// Operator commands typed on the console
use std::path::PathBuf;

use crate::models::OverrideState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Force the device alert on or off, or hand control back to the model
    Override(OverrideState),
    /// Export the archive log as CSV; uses the configured path when none is given
    Save(Option<PathBuf>),
    /// Print connection state and counters
    Status,
}

impl OperatorCommand {
    /// Parse one console line; `None` for blank or unknown input
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = words.next()?.to_ascii_lowercase();

        match command.as_str() {
            "on" => Some(OperatorCommand::Override(OverrideState::ForcedOn)),
            "off" => Some(OperatorCommand::Override(OverrideState::ForcedOff)),
            "auto" => Some(OperatorCommand::Override(OverrideState::Auto)),
            "save" => Some(OperatorCommand::Save(words.next().map(PathBuf::from))),
            "status" => Some(OperatorCommand::Status),
            _ => None,
        }
    }
}
