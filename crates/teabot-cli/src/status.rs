//! `teabot status` — show configuration, provider and tool status.

use anyhow::Result;
use colored::Colorize;

use teabot_core::config::{get_config_path, load_config};
use teabot_core::utils::expand_home;
use teabot_providers::registry::{match_provider, PROVIDERS};

fn found(exists: bool) -> String {
    if exists {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "🍵 Teabot Status".green().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        found(config_path.exists())
    );

    // Model and loop parameters
    let agent = &config.agent;
    println!("  {:<18} {}", "Model:".bold(), agent.model);
    println!(
        "  {:<18} {}",
        "Parameters:".bold(),
        format!(
            "temp: {} | max_tokens: {} | max_iterations: {} | timeout: {}s",
            agent.temperature,
            agent.max_tokens,
            agent.effective_max_iterations(),
            agent.completion_timeout_secs
        )
        .dimmed()
    );
    if let Some(template) = &agent.prompt_template {
        let path = expand_home(template);
        println!(
            "  {:<18} {} {}",
            "Prompt template:".bold(),
            path.display(),
            found(path.exists())
        );
    }

    // Providers
    println!();
    println!("  {}", "Providers:".bold());
    let providers_map = config.providers.to_map();
    let active = match_provider(&agent.model, &providers_map).map(|(_, spec)| spec.name);

    for spec in PROVIDERS {
        let configured = providers_map
            .get(spec.name)
            .map(|c| c.is_configured() || (spec.is_local && c.api_base.is_some()))
            .unwrap_or(false);
        let mut status = if configured {
            format!("{} configured", "✓".green())
        } else {
            format!("{}", "· not configured".dimmed())
        };
        if active == Some(spec.name) {
            status.push_str(&format!(" {}", "(active)".cyan()));
        }
        println!("    {:<20} {}", spec.display_name, status);
    }

    // Tools
    println!();
    println!("  {}", "Tools:".bold());
    let tools = [
        ("product_search", &config.tools.catalog_path),
        ("order_search", &config.tools.orders_path),
        ("similar_products", &config.tools.similar_path),
    ];
    for (name, path) in tools {
        match path {
            Some(path) => {
                let path = expand_home(path);
                println!("    {:<20} {} {}", name, path.display(), found(path.exists()));
            }
            None => println!("    {:<20} {}", name, "· disabled".dimmed()),
        }
    }

    // Sessions and log
    println!();
    println!(
        "  {:<18} max {} | {}",
        "Sessions:".bold(),
        config.sessions.max_sessions,
        if config.sessions.persist {
            "persisted"
        } else {
            "in memory"
        }
    );
    println!(
        "  {:<18} {}",
        "Conversation log:".bold(),
        config
            .log
            .conversation_log
            .as_deref()
            .unwrap_or("disabled")
    );
    println!(
        "  {:<18} http://{}:{}",
        "Server:".bold(),
        config.server.host,
        config.server.port
    );

    println!();

    Ok(())
}
