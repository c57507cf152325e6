use clap::Parser;

use analogs::data::{load_csv, load_json, save_csv};
use analogs::domain::{ColumnMap, IndicatorSnapshot, PriceSeries};
use analogs::engine::{
    find_similar, find_similar_parallel, NormalizeMethod, ScanParams, ScanResult, SimilarityMetric,
};
use analogs::evaluation::{aggregate, aggregate_strict, ForwardStats};

#[derive(Parser)]
#[command(name = "analogs", about = "Historical analogue search over OHLC time series")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct ColumnArgs {
    /// Timestamp column name
    #[arg(long, default_value = "date")]
    time_col: String,
    #[arg(long, default_value = "open")]
    open_col: String,
    #[arg(long, default_value = "high")]
    high_col: String,
    #[arg(long, default_value = "low")]
    low_col: String,
    #[arg(long, default_value = "close")]
    close_col: String,
    #[arg(long, default_value = "volume")]
    volume_col: String,
}

impl ColumnArgs {
    fn to_map(&self) -> ColumnMap {
        ColumnMap {
            timestamp: self.time_col.clone(),
            open: self.open_col.clone(),
            high: self.high_col.clone(),
            low: self.low_col.clone(),
            close: self.close_col.clone(),
            volume: self.volume_col.clone(),
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Find historical analogues of a target window and report what
    /// followed them
    Scan {
        /// CSV or JSON price file
        file: String,
        #[command(flatten)]
        columns: ColumnArgs,
        /// End index of the target window (negative counts from the end)
        #[arg(short, long, default_value = "-1", allow_hyphen_values = true)]
        target_end: i64,
        /// Bars per comparison window
        #[arg(short, long, default_value = "10")]
        window_size: usize,
        /// Bars of forward context per match
        #[arg(short, long, default_value = "10")]
        lookahead: usize,
        /// Maximum matches to keep
        #[arg(short = 'n', long, default_value = "20")]
        top_n: usize,
        /// Similarity floor in [0, 1]
        #[arg(short, long, default_value = "0.7")]
        min_similarity: f64,
        /// Similarity metric: correlation, euclidean or weighted
        #[arg(long, default_value = "correlation")]
        method: SimilarityMetric,
        /// Normalization: relative or minmax
        #[arg(long, default_value = "relative")]
        normalize: NormalizeMethod,
        /// Bars around the target excluded from the search
        /// (defaults to the window size)
        #[arg(long)]
        exclude_recent: Option<usize>,
        /// Partition the sweep across worker threads
        #[arg(long)]
        parallel: bool,
        /// Fail when no match clears the similarity floor
        #[arg(long)]
        strict: bool,
        /// Emit the full result set as JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Print a summary of a price file
    Info {
        /// CSV or JSON price file
        file: String,
        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// Normalize a price file and write it back out as canonical CSV
    Export {
        /// CSV or JSON price file
        file: String,
        #[command(flatten)]
        columns: ColumnArgs,
        /// Destination CSV path
        #[arg(short, long)]
        output: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            file,
            columns,
            target_end,
            window_size,
            lookahead,
            top_n,
            min_similarity,
            method,
            normalize,
            exclude_recent,
            parallel,
            strict,
            json,
        } => {
            let series = load_series(&file, &columns.to_map())?;
            let params = ScanParams {
                target_end,
                window_size,
                lookahead,
                top_n,
                min_similarity,
                metric: method,
                normalize,
                exclude_recent: exclude_recent.unwrap_or(window_size),
            };
            let result = if parallel {
                find_similar_parallel(&series, &params)?
            } else {
                find_similar(&series, &params)?
            };
            let stats = if strict {
                aggregate_strict(&result)?
            } else {
                aggregate(&result)
            };

            if json {
                print_json(&result, &stats)?;
            } else {
                print_report(&file, &series, &params, &result, &stats);
            }
        }
        Commands::Info { file, columns } => {
            let series = load_series(&file, &columns.to_map())?;
            print_info(&file, &series);
        }
        Commands::Export {
            file,
            columns,
            output,
        } => {
            let series = load_series(&file, &columns.to_map())?;
            save_csv(&series, &output, &ColumnMap::default())?;
            println!("Wrote {} bars to {}", series.len(), output);
        }
    }

    Ok(())
}

fn load_series(file: &str, columns: &ColumnMap) -> Result<PriceSeries, Box<dyn std::error::Error>> {
    let series = if file.ends_with(".json") {
        load_json(file, columns)?
    } else {
        load_csv(file, columns)?
    };
    if series.is_empty() {
        return Err(format!("{} contains no rows", file).into());
    }
    Ok(series)
}

fn date_of(series: &PriceSeries, index: usize) -> String {
    series
        .get(index)
        .map(|b| b.datetime().format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn print_report(
    file: &str,
    series: &PriceSeries,
    params: &ScanParams,
    result: &ScanResult,
    stats: &ForwardStats,
) {
    println!("=== Analogue Scan: {} ===", file);
    println!(
        "Series: {} bars ({} .. {})",
        series.len(),
        date_of(series, 0),
        date_of(series, series.len() - 1)
    );
    println!(
        "Target: bars {}..{} ({} .. {}), metric: {}, normalize: {}, floor: {:.2}",
        result.target.start,
        result.target.end,
        date_of(series, result.target.start),
        date_of(series, result.target.end),
        params.metric,
        params.normalize,
        params.min_similarity
    );

    if result.matches.is_empty() {
        println!("\nNo window cleared the similarity floor.");
        return;
    }

    println!(
        "\n  {:>4}  {:10}  {:10}  {:>10}  {:>8}  {:>8}  {:>8}",
        "Rank", "Start", "End", "Similarity", "Fwd%", "Best%", "Worst%"
    );
    for (rank, m) in result.matches.iter().enumerate() {
        println!(
            "  {:>4}  {:10}  {:10}  {:>10.4}  {:>+7.2}  {:>+7.2}  {:>+7.2}",
            rank + 1,
            date_of(series, m.start),
            date_of(series, m.end),
            m.similarity,
            m.forward_return_pct,
            m.max_return_pct,
            m.min_return_pct
        );
    }

    println!("\n--- Forward statistics ({} bars ahead) ---", params.lookahead);
    println!("  Matches:        {:>8}", stats.count);
    println!("  Mean return:    {:>8}", fmt_pct(stats.mean_return_pct));
    println!("  Median return:  {:>8}", fmt_pct(stats.median_return_pct));
    println!("  Std dev:        {:>8}", fmt_pct(stats.std_return_pct));
    println!("  Best:           {:>8}", fmt_pct(stats.max_return_pct));
    println!("  Worst:          {:>8}", fmt_pct(stats.min_return_pct));
    println!(
        "  Positive rate:  {:>8}",
        stats
            .positive_rate
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!(
        "  Avg best:       {:>8}",
        fmt_pct(stats.avg_max_excursion_pct)
    );
    println!(
        "  Avg worst:      {:>8}",
        fmt_pct(stats.avg_min_excursion_pct)
    );

    let context = IndicatorSnapshot::compute(&series.bars()[..=result.target.end]);
    println!(
        "\nTarget context: RSI(14) {:.1}, ATR(14) {:.3}, SMA(20) {:.3}",
        context.rsi_14, context.atr_14, context.sma_20
    );
}

fn fmt_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:+.2}%", v))
        .unwrap_or_else(|| "n/a".to_string())
}

fn print_json(result: &ScanResult, stats: &ForwardStats) -> Result<(), Box<dyn std::error::Error>> {
    let payload = serde_json::json!({
        "target": result.target,
        "matches": result.matches,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn print_info(file: &str, series: &PriceSeries) {
    let first = series.get(0).expect("non-empty");
    let last = series.get(series.len() - 1).expect("non-empty");
    let snap = IndicatorSnapshot::compute(series.bars());

    println!("=== {} ===", file);
    println!("  Bars:        {}", series.len());
    println!(
        "  Range:       {} .. {}",
        first.datetime().format("%Y-%m-%d"),
        last.datetime().format("%Y-%m-%d")
    );
    println!("  Last close:  {:.4}", last.close);
    println!("  RSI(14):     {:.1}", snap.rsi_14);
    println!("  ATR(14):     {:.4}", snap.atr_14);
    println!("  SMA(20):     {:.4}", snap.sma_20);
    println!("  EMA(12):     {:.4}", snap.ema_12);
}
