//! Resolved parameters of one backtest run.

use chrono::NaiveDate;
use std::path::PathBuf;

use super::broker::BrokerConfig;
use super::config_validation::{parse_date, parse_number};
use super::engine::EngineConfig;
use super::error::RunnerError;
use super::report::Parameters;
use super::strategy::{CrossoverParams, Sizer};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_CACHE_DIR: &str = "data";
pub const DEFAULT_OUTPUT_PATH: &str = "./output.json";

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub engine: EngineConfig,
    pub cache_dir: PathBuf,
    pub download: bool,
    pub output_path: PathBuf,
}

impl RunConfig {
    /// Build from an already validated config. `symbols` are resolved by the
    /// caller since they may come from a file or the command line.
    pub fn from_config(
        config: &dyn ConfigPort,
        symbols: Vec<String>,
    ) -> Result<Self, RunnerError> {
        let start_date = parse_date(
            config.get_string("backtest", "start_date").as_deref(),
            "start_date",
        )?;
        let end_date = parse_date(
            config.get_string("backtest", "end_date").as_deref(),
            "end_date",
        )?;

        let sizer = match config
            .get_string("strategy", "sizing")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            Some("percent") => {
                Sizer::PercentOfCash(parse_number(config, "strategy", "position_size", 0.95)?)
            }
            _ => Sizer::Fixed(parse_number(config, "strategy", "stake", 1)?),
        };

        let params = CrossoverParams {
            fast_period: parse_number(config, "strategy", "fast_period", 10)?,
            slow_period: parse_number(config, "strategy", "slow_period", 30)?,
            sizer,
        };

        Ok(RunConfig {
            symbols,
            start_date,
            end_date,
            engine: EngineConfig {
                initial_cash: parse_number(config, "backtest", "initial_cash", 10_000.0)?,
                broker: BrokerConfig {
                    commission_pct: parse_number(config, "backtest", "commission_pct", 0.0)?,
                    slippage_pct: parse_number(config, "backtest", "slippage_pct", 0.0)?,
                },
                params,
                risk_free_rate: parse_number(config, "backtest", "risk_free_rate", 0.01)?,
            },
            cache_dir: config
                .get_string("data", "cache_dir")
                .map_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR), PathBuf::from),
            download: config.get_bool("data", "download", true),
            output_path: config
                .get_string("output", "path")
                .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH), PathBuf::from),
        })
    }

    pub fn parameters(&self) -> Parameters {
        Parameters {
            symbols: self.symbols.clone(),
            start_date: self.start_date.format("%Y-%m-%d").to_string(),
            end_date: self.end_date.format("%Y-%m-%d").to_string(),
            fast_period: self.engine.params.fast_period,
            slow_period: self.engine.params.slow_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn defaults_fill_unset_keys() {
        let config = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2020-01-01\nend_date = 2025-03-25\n",
        )
        .unwrap();
        let run = RunConfig::from_config(&config, vec!["AAPL".into()]).unwrap();

        assert_eq!(run.start_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert!((run.engine.initial_cash - 10_000.0).abs() < f64::EPSILON);
        assert!((run.engine.risk_free_rate - 0.01).abs() < f64::EPSILON);
        assert_eq!(run.engine.params.fast_period, 10);
        assert_eq!(run.engine.params.slow_period, 30);
        assert_eq!(run.engine.params.sizer, Sizer::Fixed(1));
        assert_eq!(run.cache_dir, PathBuf::from("data"));
        assert!(run.download);
        assert_eq!(run.output_path, PathBuf::from("./output.json"));
    }

    #[test]
    fn reads_every_section() {
        let config = FileConfigAdapter::from_string(
            r#"
[backtest]
start_date = 2021-02-01
end_date = 2021-12-31
initial_cash = 50000
risk_free_rate = 0.02
commission_pct = 0.1
slippage_pct = 0.05

[strategy]
fast_period = 5
slow_period = 20
sizing = percent
position_size = 0.5

[data]
cache_dir = /tmp/cache
download = false

[output]
path = out/results.json
"#,
        )
        .unwrap();
        let run = RunConfig::from_config(&config, vec!["MSFT".into()]).unwrap();

        assert!((run.engine.initial_cash - 50_000.0).abs() < f64::EPSILON);
        assert!((run.engine.broker.commission_pct - 0.1).abs() < f64::EPSILON);
        assert!((run.engine.broker.slippage_pct - 0.05).abs() < f64::EPSILON);
        assert_eq!(run.engine.params.sizer, Sizer::PercentOfCash(0.5));
        assert_eq!(run.engine.params.fast_period, 5);
        assert_eq!(run.cache_dir, PathBuf::from("/tmp/cache"));
        assert!(!run.download);
        assert_eq!(run.output_path, PathBuf::from("out/results.json"));
    }

    #[test]
    fn parameters_format_dates() {
        let config = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2020-01-01\nend_date = 2025-03-25\n",
        )
        .unwrap();
        let run = RunConfig::from_config(&config, vec!["AAPL".into(), "T".into()]).unwrap();
        let params = run.parameters();
        assert_eq!(params.start_date, "2020-01-01");
        assert_eq!(params.end_date, "2025-03-25");
        assert_eq!(params.symbols, vec!["AAPL", "T"]);
        assert_eq!(params.slow_period, 30);
    }

    #[test]
    fn missing_start_date_is_reported() {
        let config = FileConfigAdapter::from_string("[backtest]\nend_date = 2025-03-25\n").unwrap();
        let err = RunConfig::from_config(&config, vec![]).unwrap_err();
        assert!(matches!(err, RunnerError::ConfigMissing { key, .. } if key == "start_date"));
    }
}
