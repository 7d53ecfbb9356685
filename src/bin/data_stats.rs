//! Print health statistics for the observation and reference datasets
//!
//! Usage: data-stats <observations.csv> <references.csv> [--detailed]

use anyhow::{Context, Result};
use foray_match::index::build_index;
use foray_match::loader::{load_observations, load_references};
use foray_match::models::NameStatus;
use std::path::Path;
use std::time::Instant;

const SAMPLE_ROWS: usize = 3;

fn pct(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * n as f64 / total as f64
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: data-stats <observations.csv> <references.csv> [--detailed]");
        std::process::exit(1);
    }

    let observations_path = Path::new(&args[1]);
    let references_path = Path::new(&args[2]);
    let detailed = args.iter().any(|a| a == "--detailed");

    let start = Instant::now();

    println!("Loading observations...");
    let observations = load_observations(observations_path)
        .with_context(|| format!("Failed to load {:?}", observations_path))?;
    let obs = &observations.records;

    println!("Loading references...");
    let references = load_references(references_path)
        .with_context(|| format!("Failed to load {:?}", references_path))?;
    let refs = &references.records;

    let with_org = obs.iter().filter(|o| !o.org.is_empty()).count();
    let with_conf = obs.iter().filter(|o| !o.conf.is_empty()).count();
    let with_foray = obs.iter().filter(|o| !o.foray.is_empty()).count();

    println!("\nObservations: {}", obs.len());
    println!("  With org entry:  {} ({:.1}%)", with_org, pct(with_org, obs.len()));
    println!("  With conf name:  {} ({:.1}%)", with_conf, pct(with_conf, obs.len()));
    println!("  With foray name: {} ({:.1}%)", with_foray, pct(with_foray, obs.len()));
    println!("  Recovered rows:  {}", observations.recovered_rows);

    let with_current = refs.iter().filter(|r| !r.current_name.is_empty()).count();
    let with_historical = refs.iter().filter(|r| !r.historical_name.is_empty()).count();
    let with_authors = refs.iter().filter(|r| !r.authors.is_empty()).count();
    let updated = refs
        .iter()
        .filter(|r| r.status() == NameStatus::Updated)
        .count();

    println!("\nReferences: {}", refs.len());
    println!("  With current name:    {} ({:.1}%)", with_current, pct(with_current, refs.len()));
    println!("  With historical name: {} ({:.1}%)", with_historical, pct(with_historical, refs.len()));
    println!("  With authors:         {} ({:.1}%)", with_authors, pct(with_authors, refs.len()));
    println!("  Status updated:       {}", updated);
    println!("  Status same:          {}", refs.len() - updated);
    println!("  Recovered rows:       {}", references.recovered_rows);

    let index = build_index(refs.iter().cloned());
    println!("\nIndex:");
    println!("  Indexed entries:  {}", index.len());
    println!("  Unindexed (no name): {}", index.skipped());
    println!("  Buckets:          {}", index.bucket_count());
    println!("  Avg bucket size:  {:.1}", index.average_bucket_size());

    if detailed {
        println!("\nSample observations:");
        for o in obs.iter().take(SAMPLE_ROWS) {
            println!("  [{}] org={:?} conf={:?} foray={:?}", o.id, o.org, o.conf, o.foray);
        }

        println!("\nSample references:");
        for r in refs.iter().take(SAMPLE_ROWS) {
            println!(
                "  [{}] {:?} -> {:?} {} {}",
                r.id, r.historical_name, r.current_name, r.authors, r.year
            );
        }

        println!("\nBuckets:");
        for letter in index.letters() {
            println!("  {}: {}", letter, index.bucket(letter).len());
        }
    }

    println!("\nElapsed: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
