//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::Metadata;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Render a metadata value without JSON quotes around plain strings.
pub fn meta_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print a table of vaults (Id, Name, Created).
pub fn print_vaults_table(vaults: &[(String, Metadata)]) {
    if vaults.is_empty() {
        info("No vaults yet.");
        tip("Run `seedvault create` to store your first seed phrase.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Created"]);

    for (id, meta) in vaults {
        let field = |key: &str| meta.get(key).map(meta_value).unwrap_or_default();
        table.add_row(vec![id.clone(), field("name"), field("created_at")]);
    }

    println!("{table}");
}

/// Print one vault's metadata as a Key / Value table.
pub fn print_meta_table(meta: &Metadata) {
    if meta.is_empty() {
        info("This vault has no metadata.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Key", "Value"]);

    for (key, value) in meta {
        table.add_row(vec![key.clone(), meta_value(value)]);
    }

    println!("{table}");
}
