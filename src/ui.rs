use colored::{ColoredString, Colorize};
use reconcile::Outcome;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Status symbol for an outcome
pub fn outcome_symbol(outcome: Outcome) -> ColoredString {
    match outcome {
        Outcome::Created => "+".green().bold(),
        Outcome::Updated => "~".yellow().bold(),
        Outcome::Unchanged => "✓".green(),
        Outcome::Deleted => "-".red().bold(),
        Outcome::AlreadyAbsent => "·".dimmed(),
        Outcome::ConflictExists => "!".red().bold(),
    }
}

/// Keep the tail of a long handle, which carries the distinguishing segments
pub fn shorten(handle: &str, max_len: usize) -> String {
    let len = handle.chars().count();
    if len <= max_len {
        handle.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let tail: String = handle.chars().skip(len - (max_len - 3)).collect();
        format!("...{tail}")
    }
}

/// `1 resource` / `3 resources`
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Tests
// ============================================================================
