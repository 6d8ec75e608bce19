//! JSON run output.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::path::Path;

use crate::domain::error::RunnerError;
use crate::domain::report::RunOutput;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    /// Four-space indented JSON with a trailing newline.
    pub fn render(output: &RunOutput) -> Result<String, RunnerError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        output.serialize(&mut ser)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|e| RunnerError::Io(std::io::Error::other(e)))
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, output: &RunOutput, path: &Path) -> Result<(), RunnerError> {
        let content = Self::render(output)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::Analyses;
    use crate::domain::report::{Parameters, normalize};
    use tempfile::TempDir;

    fn params() -> Parameters {
        Parameters {
            symbols: vec!["AAPL".into(), "MSFT".into()],
            start_date: "2020-01-01".into(),
            end_date: "2025-03-25".into(),
            fast_period: 10,
            slow_period: 30,
        }
    }

    #[test]
    fn render_uses_four_space_indent() {
        let text = JsonReportAdapter::render(&RunOutput::failure(params(), "boom")).unwrap();
        assert!(text.starts_with("{\n    \"parameters\": {\n        \"symbols\": ["));
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"results\": null"));
        assert!(text.contains("\"error\": \"boom\""));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("output.json");
        let output = RunOutput::success(params(), normalize(&Analyses::new(), 10_000.0, 10_000.0));

        JsonReportAdapter.write(&output, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["parameters"]["symbols"][1], "MSFT");
        assert_eq!(value["results"]["initial_value"], 10_000.0);
        assert!(value["results"]["profit_factor"].is_null());
        assert!(value["error"].is_null());
    }

    #[test]
    fn write_to_bare_file_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.json");
        JsonReportAdapter
            .write(&RunOutput::failure(params(), "x"), &path)
            .unwrap();
        assert!(path.is_file());
    }
}
