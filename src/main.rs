use anyhow::{Context, Result};
use clap::Parser;
use foray_match::index::build_index;
use foray_match::loader::{load_observations, load_references};
use foray_match::models::{NameStatus, ReferenceEntry};
use foray_match::pipeline::{
    run_pipeline_with_progress, PipelineConfig, PipelineOutput, DEFAULT_CACHE_CAPACITY,
    DEFAULT_PROGRESS_INTERVAL,
};
use foray_match::progress::{self, create_progress_bar, create_spinner, format_duration};
use foray_match::safety::validate_output_path;
use foray_match::scoring::{NameScorer, Scorer};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "foray-match")]
#[command(about = "Match foray observation names against the MycoBank reference list")]
struct Args {
    /// Observations CSV (id, org entry, conf name, foray name)
    observations: PathBuf,

    /// MycoBank reference CSV
    references: PathBuf,

    /// JSON report to write
    output: PathBuf,

    /// Worker threads for candidate scoring (default: 2x CPUs, clamped to 4..=16)
    #[arg(long, env = "FORAY_WORKERS")]
    workers: Option<usize>,

    /// Memoized (query, letter) lookups; 0 disables the cache
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    /// Report progress every N records
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: usize,

    /// Write final stats JSON to this file
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Disable progress bars, print log lines only (tail-friendly)
    #[arg(long)]
    log_only: bool,

    /// Print the best reference match for a name after the run
    #[arg(long)]
    query: Option<String>,
}

fn write_report(path: &Path, output: &PipelineOutput) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report file {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), output)
        .context("Failed to write report")?;
    Ok(())
}

fn test_search(references: &[ReferenceEntry], query: &str) {
    println!("\nBest match for '{}':", query);
    println!("{:-<80}", "");

    let scorer = Scorer::new(build_index(references.iter().cloned()), 0);
    match scorer.best_match(query) {
        Some(best) => {
            let status = match best.entry.status() {
                NameStatus::Updated => "updated",
                NameStatus::Same => "same",
            };
            println!(
                "[{}] {} ({}) score={} status={}",
                best.entry.id,
                best.entry.preferred_name(),
                best.field.label(),
                best.score,
                status
            );
            if !best.entry.authors.is_empty() || !best.entry.year.is_empty() {
                println!("  {} {}", best.entry.authors, best.entry.year);
            }
            if !best.entry.hyperlink.is_empty() {
                println!("  {}", best.entry.hyperlink);
            }
        }
        None => println!("No results found."),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    progress::set_log_only(args.log_only);

    validate_output_path(&args.output, &[&args.observations, &args.references])?;

    let start = Instant::now();

    let spinner = create_spinner("Loading observations");
    let observations = load_observations(&args.observations)
        .with_context(|| format!("Failed to load observations from {:?}", args.observations))?;
    spinner.finish_with_message(format!(
        "Loaded {} observations",
        observations.records.len()
    ));

    let spinner = create_spinner("Loading references");
    let references = load_references(&args.references)
        .with_context(|| format!("Failed to load references from {:?}", args.references))?;
    spinner.finish_with_message(format!(
        "Loaded {} references",
        references.records.len()
    ));

    if observations.recovered_rows > 0 || references.recovered_rows > 0 {
        eprintln!(
            "[WARN] recovered unparseable rows: {} observations, {} references",
            observations.recovered_rows, references.recovered_rows
        );
    }

    let config = PipelineConfig {
        workers: args.workers,
        cache_capacity: args.cache_capacity,
        progress_interval: args.progress_interval,
    };

    let pb = create_progress_bar(observations.records.len() as u64, "Matching");
    let output = run_pipeline_with_progress(
        &observations.records,
        &references.records,
        &config,
        |p| progress::report(&pb, p),
    )
    .context("Matching pipeline failed")?;

    println!("Writing report: {:?}", args.output);
    write_report(&args.output, &output)?;

    let stats = &output.stats;
    stats.log_phase("final");
    if let Some(path) = &args.stats_json {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {:?}", path))?;
    }

    println!("\n{:=<60}", "");
    println!("Matching complete!");
    println!("  Observations: {}", stats.total_observations);
    println!(
        "  References: {} ({} indexed, {} buckets)",
        stats.reference_entries, stats.indexed_references, stats.buckets
    );
    println!("  Exact matches: {}", stats.exact_matches);
    println!("  Identity only: {}", stats.identity_only);
    println!(
        "  Mismatches: {} (ORG=CONF {}, ORG=FORAY {}, CONF=FORAY {}, all different {})",
        stats.mismatches,
        stats.org_conf_agree,
        stats.org_foray_agree,
        stats.conf_foray_agree,
        stats.all_different
    );
    println!(
        "  Candidates: {} ({:.1}%), no candidate: {}, failed: {}",
        stats.scored_with_candidate,
        stats.candidate_rate(),
        stats.no_candidate,
        stats.failures
    );
    println!(
        "  Cache: {} hits / {} misses",
        stats.cache_hits, stats.cache_misses
    );
    println!("  Workers: {}", stats.workers);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    if let Some(query) = args.query {
        test_search(&references.records, &query);
    }

    Ok(())
}
