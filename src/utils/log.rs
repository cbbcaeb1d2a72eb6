// src/utils/log.rs

//! Banner and summary helpers on top of the `log` facade.
//!
//! Keeps run reports readable in plain terminal output while still
//! honouring whatever level filter the binary installed.

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Format a summary section as lines.
pub fn summary_lines(title: &str, items: &[(&str, String)]) -> Vec<String> {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(format!("[SUMMARY] {}", title));
    for (key, value) in items {
        lines.push(format!("    {}: {}", key, value));
    }
    lines
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    for line in summary_lines(title, items) {
        log::info!("{}", line);
    }
}
