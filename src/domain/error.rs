//! Domain error types.
//!
//! Only failures that stop a run live here. Missing or undefined analyzer
//! metrics are never errors; they resolve to per-field defaults in
//! [`crate::domain::report`].

/// Top-level error type for mabt.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: String,
        end: String,
    },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    pub fn data_source(reason: impl Into<String>) -> Self {
        RunnerError::DataSource {
            reason: reason.into(),
        }
    }
}

impl From<&RunnerError> for std::process::ExitCode {
    fn from(err: &RunnerError) -> Self {
        let code: u8 = match err {
            RunnerError::Io(_) | RunnerError::Serialize(_) => 1,
            RunnerError::ConfigParse { .. }
            | RunnerError::ConfigMissing { .. }
            | RunnerError::ConfigInvalid { .. } => 2,
            RunnerError::DataSource { .. } => 3,
            RunnerError::NoData { .. } | RunnerError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn config_errors_map_to_exit_code_two() {
        let err = RunnerError::ConfigMissing {
            section: "backtest".into(),
            key: "start_date".into(),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
        assert_eq!(err.to_string(), "missing config key [backtest] start_date");
    }

    #[test]
    fn data_errors_map_to_exit_code_five() {
        let err = RunnerError::InsufficientData {
            symbol: "AAPL".into(),
            bars: 3,
            minimum: 30,
        };
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));
        assert_eq!(
            err.to_string(),
            "insufficient data for AAPL: have 3 bars, need 30"
        );
    }

    #[test]
    fn data_source_helper() {
        let err = RunnerError::data_source("timeout");
        assert_eq!(err.to_string(), "data source error: timeout");
        assert_eq!(ExitCode::from(&err), ExitCode::from(3));
    }
}
