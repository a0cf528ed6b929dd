//! Shared CLI helpers — response printing, banner, thinking indicator.

use colored::Colorize;

/// Print an agent response to stdout.
pub fn print_response(response: &str) {
    println!();
    println!("{}", "🍵 Teabot".green().bold());
    if response.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// Print the banner shown at REPL and server start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🍵 Teabot".green().bold(), version.dimmed());
    println!(
        "{}",
        "Type a message, \"/reset\" to forget this conversation, or \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print a "thinking" placeholder while the agent works.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}
