//! Console output for the binary's startup and fatal paths

use crate::config::{Settings, StorageBackend};
use colored::*;

/// Startup summary printed before the bot begins polling
pub fn print_banner(settings: &Settings) {
    let title = format!("Vito v{}", env!("CARGO_PKG_VERSION"));
    println!("\n{}", title.bright_cyan().bold());
    println!("{}", "=".repeat(title.len()).bright_cyan());

    let storage = match settings.storage.backend {
        StorageBackend::Filesystem => format!("files in {}", settings.storage.data_dir.display()),
        StorageBackend::Sqlite => format!("sqlite at {}", settings.storage.sqlite_path.display()),
        StorageBackend::Memory => "memory (not persisted)".to_string(),
    };
    println!("{} {}", "Storage:".blue(), storage);
    println!(
        "{} {}",
        "Allowed users:".blue(),
        settings.bot.allowed_users_path.display()
    );
    println!("{} {}ms", "Reply timeout:".blue(), settings.bot.reply_timeout_ms);
    println!("{}\n", "Press Ctrl+C to stop".green());
}

/// Diagnostic for configuration problems that abort startup
pub fn print_fatal(error: &anyhow::Error) {
    eprintln!("{} {:#}", "Startup failed:".red().bold(), error);
}
