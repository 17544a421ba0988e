//! SwingLab CLI: scan, backtest, calibrate and signal tracking commands.
//!
//! Commands:
//! - `scan` scores a watchlist under the current regime
//! - `backtest` replays history and reports bracket accuracy
//! - `calibrate` fits calibration from a backtest, or shows / resets it
//! - `signals` monitors, closes and reports on tracked signals
//! - `watchlists` lists the built-in and configured watchlists

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use swinglab_core::calibration::{CalibrationMode, CalibrationParams};
use swinglab_core::data::MarketDataProvider;
use swinglab_core::domain::AssetClass;
use swinglab_core::session::SystemClock;
use swinglab_runner::calibrate::reset;
use swinglab_runner::export::{export_backtest_csv, export_json, export_signals_csv, write_export};
use swinglab_runner::store::backtest_name;
use swinglab_runner::{
    run_backtest, run_calibration, run_scan, AppConfig, BacktestReport, CalibrationReport,
    CalibrationStore, CheckReport, JsonFileStore, ProviderKind, ScanResult, SignalOverview,
    Tracker,
};

#[derive(Parser)]
#[command(
    name = "swinglab",
    version,
    about = "SwingLab: conviction scoring, walk-forward backtests and signal tracking"
)]
struct Cli {
    /// TOML config file. Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for signals, reports and calibration.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the configured market data provider.
    #[arg(long, global = true, value_enum)]
    provider: Option<ProviderArg>,

    /// Debug logging.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Yahoo,
    Csv,
    Synthetic,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Yahoo => ProviderKind::Yahoo,
            ProviderArg::Csv => ProviderKind::Csv,
            ProviderArg::Synthetic => ProviderKind::Synthetic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Linear,
    Curve,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a watchlist (or explicit symbols) under the current regime.
    Scan {
        symbols: Vec<String>,

        #[arg(long, short)]
        watchlist: Option<String>,

        /// Open tracked signals for qualifying results.
        #[arg(long, default_value_t = false)]
        record: bool,

        /// Apply the saved calibration to conviction.
        #[arg(long, default_value_t = false)]
        calibrated: bool,
    },
    /// Walk-forward backtest with conviction-bracket accuracy.
    Backtest {
        symbols: Vec<String>,

        #[arg(long, short)]
        watchlist: Option<String>,

        #[arg(long)]
        lookback: Option<usize>,

        #[arg(long)]
        forward: Option<usize>,

        #[arg(long)]
        stride: Option<usize>,

        /// Also write every backtest signal as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Fit calibration from a fresh backtest, or inspect / reset it.
    Calibrate {
        symbols: Vec<String>,

        #[arg(long, short)]
        watchlist: Option<String>,

        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Restore raw scoring.
        #[arg(long, default_value_t = false, conflicts_with = "show")]
        reset: bool,

        /// Print the saved calibration.
        #[arg(long, default_value_t = false)]
        show: bool,
    },
    /// Tracked signal commands.
    Signals {
        #[command(subcommand)]
        action: SignalAction,
    },
    /// List watchlists.
    Watchlists,
}

#[derive(Subcommand)]
enum SignalAction {
    /// Refresh prices and apply exits.
    Check,
    /// Show active and closed signals without refreshing.
    List,
    /// Close an active signal at its last price.
    Close {
        id: String,

        #[arg(long)]
        reason: Option<String>,
    },
    /// Open a turbo signal at the live price.
    Turbo {
        symbol: String,

        #[arg(long, default_value_t = false)]
        crypto: bool,
    },
    /// Delete all tracked signals and reports.
    Clear,
    /// Print one case report, or list them all.
    Report { id: Option<String> },
    /// Closed-trade performance by entry regime.
    Regimes,
    /// Export signals: `.csv` writes closed signals, anything else JSON.
    Export { file: PathBuf },
}

/// Everything a command needs, resolved once from flags and config.
struct App {
    config: AppConfig,
    provider: Arc<dyn MarketDataProvider>,
    store: JsonFileStore,
}

type CliTracker = Tracker<JsonFileStore, Arc<dyn MarketDataProvider>, SystemClock>;

impl App {
    fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone().unwrap_or_else(default_config_path);
        let mut config = AppConfig::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        if let Some(kind) = cli.provider {
            config.data.provider = kind.into();
        }
        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| config.store.data_dir.clone())
            .unwrap_or_else(default_data_dir);
        let provider = config
            .data
            .build_provider(Utc::now().date_naive())
            .context("building market data provider")?;
        tracing::debug!(
            config = %config_path.display(),
            data_dir = %data_dir.display(),
            provider = provider.name(),
            "context resolved"
        );
        Ok(Self {
            config,
            provider,
            store: JsonFileStore::new(data_dir),
        })
    }

    fn tracker(&self) -> CliTracker {
        Tracker::new(
            self.store.clone(),
            Arc::clone(&self.provider),
            SystemClock,
            self.config.data.clone(),
            self.config.tracker.clone(),
        )
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("swinglab").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("swinglab.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("swinglab"))
        .unwrap_or_else(|| PathBuf::from("swinglab-data"))
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(fallback)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = App::load(&cli)?;

    match cli.command {
        Commands::Scan {
            symbols,
            watchlist,
            record,
            calibrated,
        } => run_scan_cmd(&ctx, &symbols, watchlist.as_deref(), record, calibrated),
        Commands::Backtest {
            symbols,
            watchlist,
            lookback,
            forward,
            stride,
            csv,
        } => {
            let mut ctx = ctx;
            let bt = &mut ctx.config.backtest;
            bt.lookback = lookback.unwrap_or(bt.lookback);
            bt.forward = forward.unwrap_or(bt.forward);
            bt.stride = stride.unwrap_or(bt.stride);
            if bt.forward == 0 || bt.stride == 0 {
                bail!("--forward and --stride must be at least 1");
            }
            run_backtest_cmd(&ctx, &symbols, watchlist.as_deref(), csv.as_deref())
        }
        Commands::Calibrate {
            symbols,
            watchlist,
            mode,
            reset: do_reset,
            show,
        } => {
            if do_reset {
                let params = reset(&ctx.store)?;
                println!("Calibration reset: {}", describe_params(&params));
                return Ok(());
            }
            if show {
                let params = ctx.store.load_params()?;
                println!("{}", describe_params(&params));
                if params.is_active() {
                    print_preview(&params);
                }
                return Ok(());
            }
            let mut ctx = ctx;
            if let Some(mode) = mode {
                ctx.config.calibration.mode = match mode {
                    ModeArg::Linear => CalibrationMode::Linear,
                    ModeArg::Curve => CalibrationMode::Curve,
                };
            }
            run_calibrate_cmd(&ctx, &symbols, watchlist.as_deref())
        }
        Commands::Signals { action } => run_signals_cmd(&ctx, action),
        Commands::Watchlists => {
            for (name, list) in ctx.config.all_watchlists() {
                println!("{name:<20} {:<22} {}", list.label, list.tickers.join(" "));
            }
            Ok(())
        }
    }
}

// ─── scan ───────────────────────────────────────────────────────────

fn run_scan_cmd(
    ctx: &App,
    symbols: &[String],
    watchlist: Option<&str>,
    record: bool,
    calibrated: bool,
) -> Result<()> {
    let symbols = ctx.config.resolve_symbols(symbols, watchlist)?;
    let params = if calibrated {
        let params = ctx.store.load_params()?;
        if !params.is_active() {
            tracing::warn!("no active calibration, showing raw conviction");
        }
        Some(params).filter(CalibrationParams::is_active)
    } else {
        None
    };

    let scan = run_scan(
        ctx.provider.as_ref(),
        &symbols,
        &ctx.config,
        params.as_ref(),
        Utc::now(),
    );
    print_scan(&scan);

    if record {
        let opened = ctx.tracker().record_from_scan(&scan)?;
        println!();
        println!("Recorded {} new signal(s)", opened.len());
        for s in &opened {
            println!(
                "  {} {:<6} entry {:.2} stop {:.2} tp1 {:.2} conviction {}",
                s.id, s.ticker, s.entry.price, s.targets.stop, s.targets.tp1, s.entry.conviction
            );
        }
    }
    Ok(())
}

fn print_scan(scan: &ScanResult) {
    println!();
    println!("{}", scan.market_header);
    if scan.calibrated {
        println!("(calibrated conviction)");
    }
    println!();
    println!(
        "{:<7} {:>9} {:>5} {:<8} {:<6} {:>4} {:<17} {}",
        "Ticker", "Price", "Conv", "Heat", "Trend", "TAS", "Pillars", "Note"
    );
    println!("{}", "-".repeat(78));
    for r in &scan.results {
        let p = r.pillars.as_array();
        let note = if r.hard_fail {
            r.hard_fail_reason.clone().unwrap_or_default()
        } else {
            r.notes.first().cloned().unwrap_or_default()
        };
        println!(
            "{:<7} {:>9.2} {:>5} {:<8} {:<6} {:>4} {:<17} {}",
            r.ticker,
            r.price,
            r.conviction,
            format!("{:?}", r.heat),
            r.trend.to_string(),
            r.tas(),
            format!("{}/{}/{}/{}/{}", p[0], p[1], p[2], p[3], p[4]),
            note
        );
        if let Some(plan) = &r.plan {
            println!("        {plan}");
        }
    }
    for e in &scan.errors {
        println!("ERROR {}: {}", e.symbol, e.reason);
    }
}

// ─── backtest ───────────────────────────────────────────────────────

fn run_backtest_cmd(
    ctx: &App,
    symbols: &[String],
    watchlist: Option<&str>,
    csv: Option<&Path>,
) -> Result<()> {
    let symbols = ctx.config.resolve_symbols(symbols, watchlist)?;
    let report = run_backtest(
        ctx.provider.as_ref(),
        &symbols,
        &ctx.config,
        &ctx.store,
        Utc::now(),
    )?;
    print_backtest(&report);

    let path = ctx.store.backtest_path(&backtest_name(report.generated_at));
    println!("Report saved to: {}", path.display());
    if let Some(csv_path) = csv {
        write_export(csv_path, &export_backtest_csv(&report.signals)?)?;
        println!("Signals written to: {}", csv_path.display());
    }
    Ok(())
}

fn print_backtest(report: &BacktestReport) {
    let s = &report.summary;
    println!();
    println!("=== Backtest ===");
    println!("Symbols:        {}", s.symbols_tested.join(" "));
    println!(
        "Window:         lookback {} / forward {} / stride {}",
        s.lookback, s.forward, s.stride
    );
    println!("Signals:        {}", s.total_signals);
    println!("Win Rate:       {:.1}%", s.overall_win_rate);
    println!("TP1 Rate:       {:.1}%", s.overall_tp1_rate);
    println!("Avg P&L:        {:.2}%", s.avg_pnl);
    if let Some(best) = &s.best_trade {
        println!("Best:           {} {} {:+.2}%", best.symbol, best.date, best.pnl);
    }
    if let Some(worst) = &s.worst_trade {
        println!("Worst:          {} {} {:+.2}%", worst.symbol, worst.date, worst.pnl);
    }
    println!();
    println!(
        "{:<9} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Bracket", "Count", "Win%", "TP1%", "TP2%", "AvgP&L", "AvgDays"
    );
    println!("{}", "-".repeat(62));
    for b in &report.brackets {
        println!(
            "{:<9} {:>6} {:>8.1} {:>8.1} {:>8.1} {:>8.2} {:>8.1}",
            b.label, b.count, b.win_rate, b.tp1_rate, b.tp2_rate, b.avg_pnl, b.avg_days
        );
    }
    println!();
    for g in &report.accuracy_gap {
        println!(
            "{:<9} expected {:>5.1}  actual {:>5.1}  gap {:>+6.1}  {}",
            g.bracket,
            g.expected,
            g.actual_tp1_rate,
            g.gap,
            serde_json::to_value(g.verdict)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default()
        );
    }
    for e in &report.errors {
        println!("SKIPPED {}: {}", e.symbol, e.reason);
    }
    println!();
}

// ─── calibrate ──────────────────────────────────────────────────────

fn run_calibrate_cmd(ctx: &App, symbols: &[String], watchlist: Option<&str>) -> Result<()> {
    let symbols = ctx.config.resolve_symbols(symbols, watchlist)?;
    let report = run_calibration(
        ctx.provider.as_ref(),
        &symbols,
        &ctx.config,
        &ctx.store,
        Utc::now(),
    )?;
    print_calibration(&report);
    Ok(())
}

fn describe_params(params: &CalibrationParams) -> String {
    match params.mode {
        CalibrationMode::None => "inactive (raw scores)".to_string(),
        CalibrationMode::Linear => format!(
            "linear: calibrated = raw x {} + {} ({} signals)",
            params.scale, params.offset, params.signals_used
        ),
        CalibrationMode::Curve => format!(
            "curve over {} brackets ({} signals)",
            params.mapping.len(),
            params.signals_used
        ),
    }
}

fn print_preview(params: &CalibrationParams) {
    println!();
    println!("{:>5} {:>11}", "Raw", "Calibrated");
    for (raw, calibrated) in params.preview() {
        println!("{raw:>5} {calibrated:>11}");
    }
}

fn print_calibration(report: &CalibrationReport) {
    println!();
    println!("=== Calibration ===");
    println!("{}", describe_params(&report.params));
    print_preview(&report.params);
    println!();
    match report.thresholds.min_conviction {
        Some(cutoff) => println!(
            "Min conviction for target: {cutoff} ({}% win rate)",
            report.thresholds.win_rate_at_cutoff
        ),
        None => println!("No conviction cutoff reaches the target win rate"),
    }
    println!();
    for (i, rec) in report.recommendations.iter().enumerate() {
        println!("{}. {}", i + 1, rec.text);
    }
    println!();
}

// ─── signals ────────────────────────────────────────────────────────

fn run_signals_cmd(ctx: &App, action: SignalAction) -> Result<()> {
    let tracker = ctx.tracker();
    match action {
        SignalAction::Check => {
            let report = tracker.check()?;
            print_check(&report);
        }
        SignalAction::List => print_overview(&tracker.overview()?),
        SignalAction::Close { id, reason } => {
            let s = tracker.close(&id, reason.as_deref())?;
            println!(
                "Closed {} {} at {:.2} ({:+.2}%)",
                s.id, s.ticker, s.current_price, s.pnl_pct
            );
        }
        SignalAction::Turbo { symbol, crypto } => {
            let asset_class = if crypto { AssetClass::Crypto } else { AssetClass::Stock };
            let lookup = asset_class.lookup_symbol(&symbol.to_uppercase());
            let scan = run_scan(
                ctx.provider.as_ref(),
                &[lookup],
                &ctx.config,
                None,
                Utc::now(),
            );
            let scored = scan.results.first().filter(|r| r.snapshot.is_some());
            let s = tracker.create_turbo(&symbol, asset_class, scored)?;
            println!(
                "Turbo {} {} entry {:.4} stop {:.4} tp1 {:.4} ({:?})",
                s.id, s.ticker, s.entry.price, s.targets.stop, s.targets.tp1, s.target_method
            );
        }
        SignalAction::Clear => {
            tracker.clear_all()?;
            println!("All signals cleared");
        }
        SignalAction::Report { id: Some(id) } => {
            println!("{}", export_json(&tracker.report(&id)?)?);
        }
        SignalAction::Report { id: None } => {
            let reports = tracker.reports()?;
            if reports.is_empty() {
                println!("No case reports");
            }
            for r in &reports {
                println!(
                    "{} {:<7} {:<13} {:>+7.2}% {}",
                    r.identity.id,
                    r.identity.ticker,
                    r.identity.status.to_string(),
                    r.performance.pnl_pct,
                    r.exit.closed_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        SignalAction::Regimes => {
            println!(
                "{:<16} {:>6} {:>6} {:>8} {:>8} {:>8} {:>8}",
                "Regime", "Trades", "Wins", "Win%", "AvgP&L", "Best", "Worst"
            );
            for r in tracker.regime_performance()? {
                println!(
                    "{:<16} {:>6} {:>6} {:>8.1} {:>8.2} {:>8.2} {:>8.2}",
                    r.regime.to_string(),
                    r.trades,
                    r.wins,
                    r.win_rate,
                    r.avg_pnl,
                    r.best,
                    r.worst
                );
            }
        }
        SignalAction::Export { file } => {
            let overview = tracker.overview()?;
            let is_csv = file
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            let contents = if is_csv {
                export_signals_csv(&overview.closed)?
            } else {
                export_json(&overview)?
            };
            write_export(&file, &contents)?;
            println!("Exported to {}", file.display());
        }
    }
    Ok(())
}

fn print_check(report: &CheckReport) {
    for s in &report.recently_closed {
        let reason = s.close.as_ref().map(|c| c.reason.as_str()).unwrap_or_default();
        println!("CLOSED {} {} {} {:+.2}%  {reason}", s.id, s.ticker, s.status, s.pnl_pct);
    }
    for w in &report.warnings {
        println!("WARNING: {w}");
    }
    print_overview(&report.overview);
}

fn print_overview(overview: &SignalOverview) {
    println!();
    println!(
        "Market: {}{}",
        overview.market.session,
        if overview.market.is_open { " (open)" } else { "" }
    );
    println!();
    println!(
        "{:<8} {:<7} {:<6} {:<12} {:>9} {:>9} {:>8} {:>5}",
        "ID", "Ticker", "Kind", "Status", "Entry", "Last", "P&L%", "Days"
    );
    println!("{}", "-".repeat(70));
    for s in &overview.active {
        println!(
            "{:<8} {:<7} {:<6} {:<12} {:>9.2} {:>9.2} {:>+8.2} {:>5}",
            s.id,
            s.ticker,
            if s.is_turbo() { "turbo" } else { "swing" },
            s.status.to_string(),
            s.entry.price,
            s.current_price,
            s.pnl_pct,
            s.days_held
        );
        if let Some(note) = &s.price_note {
            println!("         {note}");
        }
    }
    let st = &overview.stats;
    println!();
    println!(
        "Active {}  Closed {}  Wins {}  Losses {}  Timeouts {}",
        st.total_active, st.total_closed, st.wins, st.losses, st.timeouts
    );
    println!(
        "Win Rate {:.1}%  Avg P&L {:+.2}%  Profit Factor {:.2}  Avg MAE {:.2}%  Avg MFE {:.2}%",
        st.win_rate, st.avg_pnl, st.profit_factor, st.avg_mae, st.avg_mfe
    );
    if st.gap_affected_trades > 0 {
        println!(
            "Gap fills {}  total slippage {:.2}%",
            st.gap_affected_trades, st.total_gap_slippage
        );
    }
}
