use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use crate::pipeline::orchestrator::GenerationReport;

const HEADER: &str = "timestamp,date,polymarket_items,kalshi_items,final_items,fallback,persisted";

/// Appends one CSV row per snapshot generation.
pub struct CsvLogger {
    log_path: String,
}

fn count_or_blank(count: Option<usize>) -> String {
    count.map(|c| c.to_string()).unwrap_or_default()
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !std::path::Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)?;

            writeln!(file, "{}", HEADER)?;
        }

        Ok(Self { log_path })
    }

    /// A blank source count means that source failed to fetch.
    pub fn log_generation(&self, report: &GenerationReport) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)?;

        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            Utc::now().to_rfc3339(),
            report.date,
            count_or_blank(report.polymarket_items),
            count_or_blank(report.kalshi_items),
            report.final_items,
            report.used_fallback,
            report.persisted
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv").to_string_lossy().to_string();

        let logger = CsvLogger::new(path.clone()).unwrap();
        logger.log_generation(&GenerationReport {
            date: "2024-03-01".to_string(),
            polymarket_items: Some(3),
            kalshi_items: None,
            final_items: 3,
            used_fallback: false,
            persisted: true,
        }).unwrap();

        // reopening must not write a second header
        let logger = CsvLogger::new(path.clone()).unwrap();
        logger.log_generation(&GenerationReport {
            date: "2024-03-02".to_string(),
            polymarket_items: None,
            kalshi_items: None,
            final_items: 6,
            used_fallback: true,
            persisted: false,
        }).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].ends_with(",2024-03-01,3,,3,false,true"));
        assert!(lines[2].ends_with(",2024-03-02,,,6,true,false"));
    }
}
