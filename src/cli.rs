//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::cached_data_adapter::CachedDataAdapter;
use crate::adapters::csv_adapter::CsvCache;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::yahoo_adapter::YahooAdapter;
use crate::domain::config_validation::{
    period_warning, validate_backtest_config, validate_strategy_config,
};
use crate::domain::engine::Engine;
use crate::domain::error::RunnerError;
use crate::domain::feed::DataFeed;
use crate::domain::report::{Parameters, RunOutput, RunResults, normalize};
use crate::domain::run_config::{DEFAULT_CACHE_DIR, DEFAULT_OUTPUT_PATH, RunConfig};
use crate::domain::symbols::{minimum_bars, parse_symbol_list, parse_symbols_file};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "mabt", about = "Moving-average crossover backtest runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and write the results as JSON
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated symbols, overriding the config file
        #[arg(long)]
        symbols: Option<String>,
        /// Validate the configuration and stop before touching data
        #[arg(long)]
        dry_run: bool,
    },
    /// List symbols present in the data cache
    ListCache {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            symbols,
            dry_run,
        } => run_backtest(&config, output.as_deref(), symbols.as_deref(), dry_run),
        Command::ListCache { config } => run_list_cache(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RunnerError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Symbols from the command line, else `[backtest] symbols`, else the file
/// named by `[backtest] symbols_file` (relative to `config_dir`).
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
    config_dir: &Path,
) -> Result<Vec<String>, RunnerError> {
    let symbols = if let Some(list) = symbols_override {
        parse_symbol_list(list)
    } else if let Some(list) = config.get_string("backtest", "symbols") {
        parse_symbol_list(&list)
    } else if let Some(file) = config.get_string("backtest", "symbols_file") {
        let path = config_dir.join(file.trim());
        let content = fs::read_to_string(&path).map_err(|e| RunnerError::ConfigInvalid {
            section: "backtest".into(),
            key: "symbols_file".into(),
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        parse_symbols_file(&content)
    } else {
        Vec::new()
    };

    if symbols.is_empty() {
        return Err(RunnerError::ConfigMissing {
            section: "backtest".into(),
            key: "symbols".into(),
        });
    }
    Ok(symbols)
}

pub fn build_run_config(
    config: &dyn ConfigPort,
    config_dir: &Path,
    symbols_override: Option<&str>,
    output_override: Option<&Path>,
) -> Result<RunConfig, RunnerError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;

    let symbols = resolve_symbols(symbols_override, config, config_dir)?;
    let mut run_config = RunConfig::from_config(config, symbols)?;
    if let Some(path) = output_override {
        run_config.output_path = path.to_path_buf();
    }

    let params = &run_config.engine.params;
    if let Some(msg) = period_warning(params.fast_period, params.slow_period) {
        warn!("{msg}");
    }
    Ok(run_config)
}

/// Parameters as far as they can be read from a config that failed to
/// resolve. Used only to label an error output.
fn fallback_parameters(config: &dyn ConfigPort, symbols_override: Option<&str>) -> Parameters {
    let symbols = symbols_override
        .map(parse_symbol_list)
        .or_else(|| config.get_string("backtest", "symbols").map(|s| parse_symbol_list(&s)))
        .unwrap_or_default();
    let period = |key: &str, default: i64| {
        usize::try_from(config.get_int("strategy", key, default)).unwrap_or_default()
    };
    Parameters {
        symbols,
        start_date: config.get_string("backtest", "start_date").unwrap_or_default(),
        end_date: config.get_string("backtest", "end_date").unwrap_or_default(),
        fast_period: period("fast_period", 10),
        slow_period: period("slow_period", 30),
    }
}

/// Fetch, run, analyze and normalize. Symbols with fewer bars than the slow
/// window are skipped; the run fails only when none are left.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    run_config: &RunConfig,
) -> Result<RunOutput, RunnerError> {
    let minimum = minimum_bars(run_config.engine.params.slow_period);
    let mut engine = Engine::new(run_config.engine.clone());
    let mut first_short: Option<RunnerError> = None;

    for symbol in &run_config.symbols {
        let bars = data_port.fetch_bars(symbol, run_config.start_date, run_config.end_date)?;
        let total = bars.len();
        let bars: Vec<_> = bars.into_iter().filter(|b| b.is_valid()).collect();
        if bars.len() < total {
            warn!(symbol = %symbol, dropped = total - bars.len(), "dropped invalid bars");
        }

        let feed = DataFeed::new(symbol.clone(), bars);
        if feed.bar_count() < minimum {
            warn!(
                symbol = %symbol,
                bars = feed.bar_count(),
                minimum,
                "skipping symbol with too little data"
            );
            if first_short.is_none() {
                first_short = Some(RunnerError::InsufficientData {
                    symbol: symbol.clone(),
                    bars: feed.bar_count(),
                    minimum,
                });
            }
            continue;
        }
        info!(symbol = %symbol, bars = feed.bar_count(), "added data feed");
        engine.add_feed(feed);
    }

    if engine.feed_count() == 0 {
        return Err(first_short
            .unwrap_or_else(|| RunnerError::data_source("no symbols to backtest")));
    }

    let result = engine.run()?;
    let results = normalize(&result.analyses, result.initial_value, result.final_value);
    log_summary(&results);

    Ok(RunOutput::success(run_config.parameters(), results))
}

fn log_summary(results: &RunResults) {
    info!(
        initial_value = results.initial_value,
        final_value = results.final_value,
        return_pct = results.return_pct,
        "backtest summary"
    );
    info!(
        trades_closed = results.trades_closed,
        win_rate_pct = results.win_rate_pct,
        total_net_pnl = results.total_net_pnl,
        "trade summary"
    );
}

/// Best-effort write of an error output; a failure here is only logged.
fn save_error_output(parameters: Parameters, message: String, path: &Path) {
    let output = RunOutput::failure(parameters, message);
    match JsonReportAdapter.write(&output, path) {
        Ok(()) => info!(path = %path.display(), "saved error state"),
        Err(e) => error!(path = %path.display(), "failed even to save error state: {e}"),
    }
}

fn run_backtest(
    config_path: &Path,
    output_override: Option<&Path>,
    symbols_override: Option<&str>,
    dry_run: bool,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => {
            error!("{e}");
            return (&e).into();
        }
    };
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let built = build_run_config(&adapter, config_dir, symbols_override, output_override);
    let run_config = match built {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            if !dry_run {
                let path = output_override.map(Path::to_path_buf).unwrap_or_else(|| {
                    PathBuf::from(
                        adapter
                            .get_string("output", "path")
                            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string()),
                    )
                });
                save_error_output(
                    fallback_parameters(&adapter, symbols_override),
                    format!("Script failed early: {e}"),
                    &path,
                );
            }
            return (&e).into();
        }
    };

    if dry_run {
        let params = run_config.parameters();
        info!(
            symbols = %params.symbols.join(","),
            start = %params.start_date,
            end = %params.end_date,
            fast = params.fast_period,
            slow = params.slow_period,
            cache_dir = %run_config.cache_dir.display(),
            output = %run_config.output_path.display(),
            "dry run complete: configuration is valid"
        );
        return ExitCode::SUCCESS;
    }

    let yahoo = if run_config.download {
        match YahooAdapter::new() {
            Ok(y) => Some(y),
            Err(e) => {
                error!("{e}");
                save_error_output(run_config.parameters(), e.to_string(), &run_config.output_path);
                return (&e).into();
            }
        }
    } else {
        None
    };
    let data_port = CachedDataAdapter::new(
        CsvCache::new(&run_config.cache_dir),
        yahoo.as_ref().map(|y| y as &dyn DataPort),
    );

    let output = match run_backtest_pipeline(&data_port, &run_config) {
        Ok(o) => o,
        Err(e) => {
            error!("backtest failed: {e}");
            save_error_output(run_config.parameters(), e.to_string(), &run_config.output_path);
            return (&e).into();
        }
    };

    match JsonReportAdapter.write(&output, &run_config.output_path) {
        Ok(()) => {
            info!(path = %run_config.output_path.display(), "results saved");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(path = %run_config.output_path.display(), "failed to save results: {e}");
            let mut failed = output;
            failed.error = Some(format!("Failed to save results: {e}"));
            if let Err(again) = JsonReportAdapter.write(&failed, &run_config.output_path) {
                error!("failed even to save error state: {again}");
            }
            (&e).into()
        }
    }
}

fn run_list_cache(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => {
            error!("{e}");
            return (&e).into();
        }
    };
    let cache_dir = adapter
        .get_string("data", "cache_dir")
        .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string());
    let cache = CsvCache::new(cache_dir);

    match cache.list_symbols() {
        Ok(symbols) if symbols.is_empty() => {
            info!(cache_dir = %cache.base_path().display(), "no cached symbols");
            ExitCode::SUCCESS
        }
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{symbol}");
            }
            info!(count = symbols.len(), "cached symbols listed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}
