//! Terminal output for sessions and stored objects.
//!
//! Status lines are decorated for humans; objects are printed as JSON so
//! they can be piped into other tools.

use anyhow::Result;
use colored::Colorize;
use serde_json::Value;
use stackmob::SessionState;

pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Human label for a session state.
pub fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::ValidSession => "valid",
        SessionState::ExpiredRefreshable => "expired (will refresh)",
        SessionState::ExpiredTerminal => "expired",
        SessionState::LoggedOut => "logged out",
    }
}

/// Print a single object as indented JSON.
pub fn object(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print query results, one compact object per line.
pub fn objects(values: &[Value]) -> Result<()> {
    let lines = object_lines(values)?;
    if !lines.is_empty() {
        println!("{lines}");
    }
    Ok(())
}

/// Print a bare total.
pub fn count(total: u64) {
    println!("{total}");
}

fn object_lines(values: &[Value]) -> Result<String> {
    let lines = values
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}
