//! The ELT run: four producers feeding the registry, then the quality gate
//!
//! Stages run strictly in order. Each producer reads its sources, writes its
//! tables through the sink and hands the registry back with the tables
//! appended; any error aborts the run.

pub mod demographics;
pub mod immigration;
pub mod labels;
mod registry;
pub mod temperature;

pub use registry::TableRegistry;

use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::quality::{QualityReport, run_checks};
use crate::session::Session;
use crate::sink::{self, Sink};
use crate::utils::logging::{advance_stage, create_stage_progress_bar, finish_progress_bar};

/// Number of stages the progress bar tracks
pub const STAGES: u64 = 4;

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Row count per table, in production order
    pub tables: Vec<(String, usize)>,
    /// Quality gate outcome per table
    pub quality: Vec<QualityReport>,
    /// Wall time for the whole run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Total rows across all tables
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }
}

/// Run the pipeline with a session and the sink `config.output.root` names
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let session = Session::get_or_create(config.session.clone());
    let sink = sink::open(
        &config.output.root,
        config.credentials.as_ref(),
        config.sink.clone(),
    )?;
    let pb = create_stage_progress_bar(STAGES);
    let result = run_with(&session, sink.as_ref(), config, &pb);
    match &result {
        Ok(_) => finish_progress_bar(&pb, Some("pipeline complete")),
        Err(_) => pb.abandon_with_message("pipeline failed"),
    }
    result
}

/// Run the pipeline against an explicit session and sink
pub fn run_with(
    session: &Session,
    sink: &dyn Sink,
    config: &PipelineConfig,
    pb: &ProgressBar,
) -> Result<RunSummary> {
    let start = Instant::now();
    let sources = &config.sources;
    let registry = TableRegistry::new();

    let registry = labels::process_i94_labels(session, sink, sources, registry)?;
    advance_stage(pb, "label dimensions written");

    let registry = demographics::process_city_demographics_data(
        session,
        sink,
        sources,
        &config.cleaning,
        registry,
    )?;
    advance_stage(pb, "city demographics written");

    let registry = immigration::process_immigration_data(session, sink, sources, registry)?;
    advance_stage(pb, "immigration facts written");

    let quality = run_checks(&registry)?;
    advance_stage(pb, "quality checks passed");

    let tables = registry
        .iter()
        .map(|(name, table)| (name.to_string(), table.num_rows()))
        .collect();

    Ok(RunSummary {
        tables,
        quality,
        elapsed: start.elapsed(),
    })
}
