//! bikeflow CLI module
//!
//! Command-line interface for running the forecasting pipeline and inspecting
//! the raw exports.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::load_directory;
use crate::data::schema::TOTAL_TRAFFIC;
use crate::pipeline::{merge_frames, run_pipeline, PipelineConfig, PipelineOutcome};
use crate::training::HarnessReport;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

/// Importances shown after training
const TOP_FEATURES: usize = 10;

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_num(v: f64) -> String {
    if v.is_nan() { "-".to_string() } else { format!("{:.2}", v) }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bikeflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hourly bicycle traffic forecasting from weather and calendar data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean the data, train the best model and optionally predict the future period
    Run {
        /// Directory with the weather and traffic exports
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// JSON pipeline configuration; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run the model-selection harness first
        #[arg(long)]
        train_many: bool,

        /// Score on the test segment and write future predictions
        #[arg(long)]
        final_run: bool,

        /// Save the fitted best model as JSON
        #[arg(long)]
        save_model: Option<PathBuf>,
    },

    /// Load and merge the exports and print summaries
    Inspect {
        /// Directory with the weather and traffic exports
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// JSON pipeline configuration; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Calendar year held out as the future period
        #[arg(long)]
        future_year: Option<i32>,
    },
}

/// Resolve the effective configuration for `run`
pub fn build_config(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    train_many: bool,
    final_run: bool,
    save_model: Option<PathBuf>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = out_dir {
        config.out_dir = dir;
    }
    config.train_many |= train_many;
    config.final_run |= final_run;
    if save_model.is_some() {
        config.save_model = save_model;
    }
    config.validate()?;
    Ok(config)
}

/// Resolve the effective configuration for `inspect`
pub fn build_inspect_config(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    future_year: Option<i32>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = build_config(config_path, data_dir, None, false, false, None)?;
    if let Some(year) = future_year {
        config.future_year = year;
    }
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(config: &PipelineConfig) -> anyhow::Result<()> {
    println!();
    line_box_top();
    line_box_center(&format!("{}", "bikeflow".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_sep();
    line_box(&kv("Data    ", &config.data_dir.display().to_string()));
    line_box(&kv("Output  ", &config.out_dir.display().to_string()));
    line_box(&kv("Model   ", &config.best_model.label()));
    line_box(&kv("Harness ", if config.train_many { "on" } else { "off" }));
    line_box(&kv("Final   ", if config.final_run { "on" } else { "off" }));
    line_box_bottom();

    section("Pipeline");
    step_run("Cleaning, training and scoring");
    let start = Instant::now();
    let outcome = run_pipeline(config)?;
    step_done(&format!("{:.1?}", start.elapsed()));

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    let rows = &outcome.segment_rows;
    step_ok(&format!(
        "segments {} / {} / {} rows, {} features",
        rows.train,
        rows.validation,
        rows.test,
        outcome.feature_names.len()
    ));

    for report in &outcome.harness {
        print_harness_report(report);
    }

    section("Best model");
    let best = &outcome.best;
    println!("  {:<16} {}", muted("Model"), best.label.white().bold());
    println!("  {:<16} {:?}", muted("Scored on"), best.segment);
    println!("  {:<16} {}", muted("MSE"), format!("{:.3}", best.metrics.mse).white());
    println!("  {:<16} {}", muted("RMSE"), format!("{:.3}", best.metrics.rmse).white().bold());

    if !best.importances.is_empty() {
        println!();
        println!("  {:<28} {:>10}", muted("Feature"), muted("Importance"));
        println!("  {}", dim(&"─".repeat(40)));
        for fi in best.importances.iter().take(TOP_FEATURES) {
            println!("  {:<28} {:>10.4}", fi.feature, fi.importance);
        }
    }

    if let Some(predictions) = &outcome.predictions {
        println!();
        step_ok(&format!("{} hourly predictions for the future period", predictions.len()));
    }

    section("Written");
    for path in &outcome.written {
        println!("  {}", path.display());
    }
    println!();
}

fn print_harness_report(report: &HarnessReport) {
    section(&format!("Harness: {}", report.stage));
    println!("  {:<44} {:>10} {:>10}", muted("Model"), muted("RMSE"), muted("Time"));
    println!("  {}", dim(&"─".repeat(66)));

    for result in &report.results {
        println!(
            "  {:<44} {:>10.3} {:>9.2}s",
            result.label, result.metrics.rmse, result.metrics.training_time_secs
        );
    }
    for failure in &report.failures {
        println!("  {:<44} {}", failure.label, format!("err: {}", failure.error).red());
    }

    if let Some(best) = report.best() {
        println!();
        println!("  {} {} {} {:.3}", ok("best"), best.label.white().bold(), muted("rmse:"), best.metrics.rmse);
    }
}

pub fn cmd_inspect(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Inspect");

    step_run("Loading exports");
    let start = Instant::now();
    let sources = load_directory(&config.data_dir)?;
    step_done(&format!(
        "weather {} rows, traffic {} rows in {:.1?}",
        sources.weather.height(),
        sources.traffic.height(),
        start.elapsed()
    ));

    step_run("Merging");
    let merged = merge_frames(sources.into_frames(), config.future_year)?;
    step_done(&format!(
        "{} training-eligible rows, {} future rows ({})",
        merged.training.height(),
        merged.future.height(),
        config.future_year
    ));

    section("Columns");
    println!(
        "  {:<32} {:>7} {:>7} {:>9} {:>9} {:>9} {:>9}",
        muted("Column"), muted("Count"), muted("NaN"), muted("Mean"), muted("Std"), muted("Min"), muted("Max")
    );
    println!("  {}", dim(&"─".repeat(88)));
    for s in merged.training.summary() {
        println!(
            "  {:<32} {:>7} {:>7} {:>9} {:>9} {:>9} {:>9}",
            s.name,
            s.count,
            s.missing,
            fmt_num(s.mean),
            fmt_num(s.std),
            fmt_num(s.min),
            fmt_num(s.max)
        );
    }

    section("Average hourly traffic");
    for (year, mean) in merged.training.yearly_mean(TOTAL_TRAFFIC)? {
        println!("  {:<12} {:.1}", muted(&year.to_string()), mean);
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", ok("done"));
        assert_eq!(strip_ansi(&colored), "done");
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = build_config(None, Some("raw".into()), None, true, false, Some("m.json".into())).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("raw"));
        assert!(config.train_many);
        assert!(!config.final_run);
        assert_eq!(config.save_model, Some(PathBuf::from("m.json")));
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["bikeflow", "run", "--data-dir", "data", "--final-run"]).unwrap();
        match cli.command {
            Commands::Run { data_dir, final_run, train_many, .. } => {
                assert_eq!(data_dir, Some(PathBuf::from("data")));
                assert!(final_run);
                assert!(!train_many);
            }
            Commands::Inspect { .. } => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn test_inspect_honours_config_file_and_year_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"data_dir": "exports", "future_year": 2022}"#).unwrap();

        let from_file = build_inspect_config(Some(&path), None, None).unwrap();
        assert_eq!(from_file.data_dir, PathBuf::from("exports"));
        assert_eq!(from_file.future_year, 2022);

        let overridden = build_inspect_config(Some(&path), Some("raw".into()), Some(2024)).unwrap();
        assert_eq!(overridden.data_dir, PathBuf::from("raw"));
        assert_eq!(overridden.future_year, 2024);
    }

    #[test]
    fn test_cli_parses_inspect_year() {
        let cli = Cli::try_parse_from(["bikeflow", "inspect", "--data-dir", "data", "--future-year", "2024"]).unwrap();
        match cli.command {
            Commands::Inspect { data_dir, future_year, config } => {
                assert_eq!(data_dir, Some(PathBuf::from("data")));
                assert_eq!(future_year, Some(2024));
                assert!(config.is_none());
            }
            Commands::Run { .. } => panic!("parsed the wrong subcommand"),
        }
    }
}
