//! Print the manifest and metrics summary for a results container.
//! Run with: cargo run --bin summarize -- path/to/latest_results.json

use apdash::analysis::GlucoseAnalyzer;
use apdash::config::DashboardConfig;
use apdash::data::SeriesLoader;
use serde_json::json;
use std::path::PathBuf;

fn main() {
    let cfg = DashboardConfig::from_env();
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.results_file.clone());
    let loader = SeriesLoader::new(path);

    let manifest = match loader.manifest() {
        Ok(m) => m,
        Err(err) => {
            eprintln!("failed to read {}: {:#}", loader.path().display(), err);
            std::process::exit(1);
        }
    };
    let results = match loader.load() {
        Ok(r) => r,
        Err(err) => {
            eprintln!("failed to load {}: {:#}", loader.path().display(), err);
            std::process::exit(1);
        }
    };

    let report = GlucoseAnalyzer::new(cfg.analysis).analyze_series(&results.time_series());
    let out = json!({
        "manifest": manifest,
        "analysis": cfg.analysis,
        "summary": report,
    });
    match serde_json::to_string_pretty(&out) {
        Ok(s) => println!("{}", s),
        Err(err) => {
            eprintln!("failed to render summary: {}", err);
            std::process::exit(1);
        }
    }
}
