use pbm3c2::config::load_config;
use pbm3c2::epoch::io::read_xyz;
use pbm3c2::io::{write_distances_csv, write_json_file};
use pbm3c2::{DistanceStatus, Pbm3c2};
use std::env;
use std::path::Path;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path))?;

    let epoch0 = read_xyz(&config.epoch0.path, &config.epoch0.columns)?;
    let epoch1 = read_xyz(&config.epoch1.path, &config.epoch1.columns)?;
    let query_ids = config.apply_ids.to_segment_ids();

    let pbm = Pbm3c2::with_params(config.params.clone());
    let report = pbm.compute(
        &epoch0,
        &epoch1,
        &config.correspondences,
        &query_ids,
        config.search_radius,
    )?;

    let stats = &report.trace.distances;
    println!(
        "Measured {}/{} segments (no correspondence: {}, out of radius: {}, geometry unavailable: {}) in {:.3} ms",
        stats.computed,
        stats.queries,
        stats.no_correspondence,
        stats.out_of_radius,
        stats.geometry_unavailable,
        report.trace.timings.total_ms
    );
    if let Some(collision) = &report.trace.collision {
        if collision.relabeled {
            println!("Epoch-1 segment IDs offset by {}", collision.offset);
        }
    }

    match &config.output.distances_csv {
        Some(path) => {
            write_distances_csv(path, &report.results)?;
            println!("Saved distances to {}", path.display());
        }
        None => {
            for r in &report.results {
                if r.status == DistanceStatus::Computed {
                    println!(
                        "{:>6} -> {:>6}  {:+.4} +/- {:.4}",
                        r.query_id,
                        r.correspondent.map(|id| id.to_string()).unwrap_or_default(),
                        r.distance,
                        r.uncertainty
                    );
                } else {
                    println!("{:>6}  {}", r.query_id, r.status);
                }
            }
        }
    }
    if let Some(path) = &config.output.report_json {
        write_json_file(path, &report)?;
        println!("Saved report to {}", path.display());
    }

    Ok(())
}

fn usage() -> String {
    "Usage: pbm3c2_demo <config.json>".to_string()
}
