//! `stepwise tools`: List the built-in tools.

use stepwise_config::AppConfig;
use stepwise_core::ToolRegistry;

fn listing(tools: &ToolRegistry) -> Vec<String> {
    tools
        .iter()
        .map(|tool| format!("  {:<10} {}", tool.name(), tool.description()))
        .collect()
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let tools = super::terminal_tools(&config.tools);

    println!("Available tools ({}):", tools.len());
    for line in listing(&tools) {
        println!("{line}");
    }
    if config.tools.api_base_url.is_none() {
        println!();
        println!("  Set tools.api_base_url to enable api_call.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_config::ToolsConfig;

    #[test]
    fn lists_tools_in_name_order() {
        let lines = listing(&crate::commands::terminal_tools(&ToolsConfig::default()));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].trim_start().starts_with("datetime"));
        assert!(lines[1].trim_start().starts_with("echo"));
        assert!(lines[2].trim_start().starts_with("script"));
    }

    #[test]
    fn terminal_session_keeps_confirmed_scripts() {
        let config = ToolsConfig {
            script_confirm: true,
            ..ToolsConfig::default()
        };
        assert!(crate::commands::terminal_tools(&config).get("script").is_some());
    }
}
