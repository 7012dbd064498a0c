use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::commands::status::StatusReport;
use crate::orchestrator::state::{Status, StatusSnapshot};

fn status_text(status: Status, use_color: bool) -> String {
    if !use_color {
        return format!("\u{25cf} {}", status);
    }
    match status {
        Status::Running => format!("{} {}", "\u{25cf}".green(), "running".green()),
        Status::Starting | Status::Stopping => {
            format!("{} {}", "\u{25cf}".yellow(), status.to_string().yellow())
        }
        Status::Error => format!("{} {}", "\u{25cf}".red(), "error".red()),
        Status::Stopped => format!("{} {}", "\u{25cf}".dimmed(), "stopped".dimmed()),
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("  {}", line);
    }
}

fn render_running(snapshot: &StatusSnapshot, use_color: bool) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Mode").set_alignment(CellAlignment::Left),
        Cell::new("Gateway").set_alignment(CellAlignment::Left),
        Cell::new("Data home").set_alignment(CellAlignment::Left),
        Cell::new("Status").set_alignment(CellAlignment::Center),
    ]);

    let url = snapshot.gateway_url().unwrap_or_else(|| "-".to_string());
    let home = snapshot
        .data_home
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    table.add_row(vec![
        Cell::new(snapshot.mode),
        Cell::new(&url),
        Cell::new(&home),
        Cell::new(status_text(snapshot.status, use_color)),
    ]);
    table
}

/// Printed once the gateway is healthy.
pub fn print_running_summary(snapshot: &StatusSnapshot) {
    let use_color = std::io::stdout().is_terminal();

    println!();
    if use_color {
        println!("  {} {}", "noderig".bold(), "radicle node".cyan());
    } else {
        println!("  noderig radicle node");
    }
    println!();
    print_indented(&render_running(snapshot, use_color));

    println!();
    if use_color {
        println!("  Press {} to stop", "Ctrl+C".bold());
    } else {
        println!("  Press Ctrl+C to stop");
    }
    println!();
}

fn render_status(report: &StatusReport, use_color: bool) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Item").set_alignment(CellAlignment::Left),
        Cell::new("Value").set_alignment(CellAlignment::Left),
    ]);

    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    let rows = [
        ("Status", status_text(report.status, use_color)),
        ("Mode", report.mode.to_string()),
        ("Gateway", or_dash(report.gateway_url.clone())),
        (
            "Data home",
            or_dash(report.data_home.as_ref().map(|p| p.display().to_string())),
        ),
        (
            "Since",
            or_dash(report.published_at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())),
        ),
        (
            "System node",
            or_dash(report.system_node.as_ref().map(|p| p.display().to_string())),
        ),
        (
            "Default port",
            format!("{} ({})", report.default_port, report.default_port_state),
        ),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}

pub fn print_status(report: &StatusReport) {
    let use_color = std::io::stdout().is_terminal();
    println!();
    print_indented(&render_status(report, use_color));
    println!();
}
