use crate::core::models::ScanStatus;
use crate::core::store::ScanPage;
use crate::plugins::registry::ToolAvailability;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn status_color(status: ScanStatus) -> Color {
    match status {
        ScanStatus::Pending => Color::Yellow,
        ScanStatus::Running => Color::Blue,
        ScanStatus::Completed => Color::Green,
        ScanStatus::Failed => Color::Red,
        ScanStatus::Cancelled => Color::DarkGrey,
    }
}

pub fn scans(page: &ScanPage) -> String {
    let mut t = table(&["ID", "Tool", "Type", "Target", "Status", "Created", "Records"]);
    for scan in &page.scans {
        let records = scan
            .results
            .as_ref()
            .map(|r| r.result.record_count().to_string())
            .unwrap_or_else(|| "-".to_string());
        t.add_row(vec![
            Cell::new(scan.id),
            Cell::new(&scan.tool),
            Cell::new(scan.scan_type),
            Cell::new(&scan.target),
            Cell::new(scan.status).fg(status_color(scan.status)),
            Cell::new(scan.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(records),
        ]);
    }
    t.to_string()
}

pub fn tools(tools: &[ToolAvailability]) -> String {
    let mut t = table(&["Tool", "Launcher", "Timeout", "Status"]);
    for tool in tools {
        let status = match &tool.problem {
            None => Cell::new("available").fg(Color::Green),
            Some(problem) => Cell::new(problem).fg(Color::Red),
        };
        t.add_row(vec![
            Cell::new(tool.tool).add_attribute(Attribute::Bold),
            Cell::new(&tool.launcher),
            Cell::new(format!("{}s", tool.timeout_secs)),
            status,
        ]);
    }
    t.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Scan, ScanId, ScanType, ToolId};

    #[test]
    fn test_scan_table_lists_every_row() {
        let page = ScanPage {
            total: 2,
            scans: vec![
                Scan::new(ScanId(2), ScanType::Port, "masscan", "10.0.0.0/24"),
                Scan::new(ScanId(1), ScanType::Ssl, "testssl", "example.com:443"),
            ],
        };
        let rendered = scans(&page);
        assert!(rendered.contains("masscan"));
        assert!(rendered.contains("example.com:443"));
        assert!(rendered.contains("PENDING"));
    }

    #[test]
    fn test_tools_table_shows_problem() {
        let rendered = tools(&[ToolAvailability {
            tool: ToolId::Nuclei,
            launcher: "/opt/nuclei".to_string(),
            timeout_secs: 900,
            problem: Some("nuclei binary not found at /opt/nuclei".to_string()),
        }]);
        assert!(rendered.contains("900s"));
        assert!(rendered.contains("not found"));
    }
}
