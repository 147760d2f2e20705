use anyhow::Result;
use apdash::config::DashboardConfig;
use apdash::logging::{log, obj, v_str, Domain, Level};
use apdash::server;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = DashboardConfig::from_env();

    if !cfg.results_file.exists() {
        log(
            Level::Warn,
            Domain::System,
            "startup",
            obj(&[
                ("msg", v_str("results file not found, serving empty data")),
                ("results_file", v_str(&cfg.results_file.display().to_string())),
            ]),
        );
    }

    server::serve(cfg).await
}
