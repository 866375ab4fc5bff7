//! Startup banner

use super::config::AppConfig;
use super::constants::APP_NAME;

/// Print the startup banner with the health URL and capture settings
pub fn print_banner(config: &AppConfig, data_dir: &str) {
    let display_host = if config.server.host == "0.0.0.0" || config.server.host == "::" {
        "localhost"
    } else {
        config.server.host.as_str()
    };

    // Label width: "Persistence:" is 12 chars, pad to 14 for alignment
    const W: usize = 14;

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m http://{}:{}{}/health",
        "Health:", display_host, config.server.port, config.capture.mount_path
    );
    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Capture:",
        if config.capture.enabled { "enabled" } else { "disabled" }
    );
    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Persistence:",
        if config.capture.async_mode {
            "async"
        } else {
            "inline"
        }
    );
    println!(
        "  \x1b[90m➜  {:<W$} {} ({})\x1b[0m",
        "Storage:", config.database.backend, data_dir
    );
    println!();
}
