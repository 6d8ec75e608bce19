//! Configuration validation.
//!
//! Validates every config field before any data is touched.

use crate::domain::error::RunnerError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    validate_initial_cash(config)?;
    validate_commission(config)?;
    validate_slippage(config)?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    validate_periods(config)?;
    validate_sizing(config)?;
    Ok(())
}

/// Read a numeric key, falling back to `default` when it is absent. A present
/// value that does not parse is an error rather than a silent default.
pub fn parse_number<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, RunnerError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| RunnerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("'{}' is not a valid number", raw.trim()),
        }),
    }
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, RunnerError> {
    match value {
        None => Err(RunnerError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            RunnerError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }
        }),
    }
}

/// Warning text when the fast window is not shorter than the slow one. Such
/// a configuration still runs.
pub fn period_warning(fast_period: usize, slow_period: usize) -> Option<String> {
    (slow_period <= fast_period).then(|| {
        format!(
            "slow_period ({slow_period}) is not greater than fast_period ({fast_period}); \
             crossovers will be inverted or absent"
        )
    })
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    let value: f64 = parse_number(config, "backtest", "initial_cash", 10_000.0)?;
    if value <= 0.0 || !value.is_finite() {
        return Err(RunnerError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_cash".to_string(),
            reason: "initial_cash must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    let pct: f64 = parse_number(config, "backtest", "commission_pct", 0.0)?;
    if pct < 0.0 {
        return Err(RunnerError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "commission_pct".to_string(),
            reason: "commission_pct must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    let value: f64 = parse_number(config, "backtest", "slippage_pct", 0.0)?;
    if value < 0.0 {
        return Err(RunnerError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "slippage_pct".to_string(),
            reason: "slippage_pct must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    let value: f64 = parse_number(config, "backtest", "risk_free_rate", 0.01)?;
    if !(0.0..1.0).contains(&value) {
        return Err(RunnerError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(RunnerError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }
    Ok(())
}

fn validate_periods(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    for (key, default) in [("fast_period", 10i64), ("slow_period", 30i64)] {
        let value: i64 = parse_number(config, "strategy", key, default)?;
        if value < 1 {
            return Err(RunnerError::ConfigInvalid {
                section: "strategy".to_string(),
                key: key.to_string(),
                reason: format!("{key} must be at least 1"),
            });
        }
    }
    Ok(())
}

fn validate_sizing(config: &dyn ConfigPort) -> Result<(), RunnerError> {
    let sizing = config
        .get_string("strategy", "sizing")
        .unwrap_or_else(|| "fixed".to_string());

    match sizing.trim().to_lowercase().as_str() {
        "fixed" => {
            let stake: i64 = parse_number(config, "strategy", "stake", 1)?;
            if stake < 1 {
                return Err(RunnerError::ConfigInvalid {
                    section: "strategy".to_string(),
                    key: "stake".to_string(),
                    reason: "stake must be at least 1".to_string(),
                });
            }
        }
        "percent" => {
            let value: f64 = parse_number(config, "strategy", "position_size", 0.95)?;
            if value <= 0.0 || value > 1.0 {
                return Err(RunnerError::ConfigInvalid {
                    section: "strategy".to_string(),
                    key: "position_size".to_string(),
                    reason: "position_size must be between 0 and 1".to_string(),
                });
            }
        }
        other => {
            return Err(RunnerError::ConfigInvalid {
                section: "strategy".to_string(),
                key: "sizing".to_string(),
                reason: format!("unknown sizing '{other}', expected fixed or percent"),
            });
        }
    }
    Ok(())
}
