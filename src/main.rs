use anyhow::Context;
use log::info;

use i94_elt::PipelineConfig;
use i94_elt::pipeline;

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::from_env().context("failed to load configuration")?;
    info!("Writing tables under {}", config.output.root);

    let summary = pipeline::run(&config).context("pipeline run failed")?;

    for (name, rows) in &summary.tables {
        info!("{name}: {rows} rows");
    }
    info!(
        "Pipeline finished: {} tables, {} rows in {:?}",
        summary.tables.len(),
        summary.total_rows(),
        summary.elapsed
    );
    Ok(())
}
