// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: run one opening placement pass over a JSON scene
//!
//! Usage:
//!   place-openings <scene.json> [options]

use anyhow::{bail, Context};
use mep_openings_engine::{MemoryModel, PlacementConfig, PlacementCoordinator};
use std::env;
use std::fs;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return Ok(());
    }

    let scene_path = &args[1];
    let mut config_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut no_merge = false;
    let mut log_json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).context("--config needs a path")?.clone());
            }
            "--output" => {
                i += 1;
                output_path = Some(args.get(i).context("--output needs a path")?.clone());
            }
            "--no-merge" => no_merge = true,
            "--log-json" => log_json = true,
            other => bail!("Unknown option: {}", other),
        }
        i += 1;
    }

    init_tracing(log_json);

    let mut config = match &config_path {
        Some(path) => PlacementConfig::from_path(path)
            .with_context(|| format!("loading config {}", path))?,
        None => PlacementConfig::default(),
    }
    .with_env_overrides();
    if no_merge {
        config.merge.enabled = false;
    }

    let mut model = MemoryModel::from_path(scene_path)
        .with_context(|| format!("loading scene {}", scene_path))?;

    let report = PlacementCoordinator::new(config).run(&mut model)?;

    if let Some(path) = &output_path {
        fs::write(path, model.to_json_string()?).with_context(|| format!("writing {}", path))?;
        tracing::info!(path = %path, openings = model.opening_count(), "Scene written");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "info,mep_openings_engine=debug".into()),
        )
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_usage() {
    eprintln!("Usage: place-openings <scene.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>   Placement configuration (JSON)");
    eprintln!("  --output <path>   Write the updated scene here");
    eprintln!("  --no-merge        Skip the cluster merge sweep");
    eprintln!("  --log-json        Emit log events as JSON lines on stderr");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG                     Log filter (default info,mep_openings_engine=debug)");
    eprintln!("  OPENINGS_MERGE               Enable/disable merging (true/false)");
    eprintln!("  OPENINGS_GAP_TOLERANCE       Merge gap tolerance in metres");
    eprintln!("  OPENINGS_DISCRETE_TOLERANCE  Suppression radius for discrete openings");
    eprintln!("  OPENINGS_CLUSTER_TOLERANCE   Suppression radius for merged openings");
}
