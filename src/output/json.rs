use crate::error::Result;
use crate::ScanReport;

/// Render the full report (metadata, results, summary, load errors) as JSON.
pub fn render(report: &ScanReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}
