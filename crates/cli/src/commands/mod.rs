pub mod chat;
pub mod config_cmd;
pub mod serve;
pub mod tools;

use std::sync::Arc;
use stepwise_config::ToolsConfig;
use stepwise_core::ToolRegistry;
use stepwise_tools::{Confirm, TerminalConfirm};

/// Built-in tools for a local session, confirming scripts on this terminal.
pub fn terminal_tools(config: &ToolsConfig) -> ToolRegistry {
    let confirm: Arc<dyn Confirm> = Arc::new(TerminalConfirm);
    stepwise_tools::default_registry(config, Some(confirm))
}
