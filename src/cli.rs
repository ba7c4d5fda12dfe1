use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::ParticleCache;
use crate::cache::ParticleSource;
use crate::diagnostics::Diagnostic;
use crate::params::{HostParams, ParamValue};
use crate::primitive::RecordingSink;
use crate::procedural::PartioProcedural;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the procedural on a cache and record the primitive it produces
    Emit {
        /// JSON object of host options (arg_file, arg_radius, global_motionBlurSteps, ...)
        #[arg(long)]
        params: Option<PathBuf>,

        /// Cache file, overriding arg_file from the options
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Write the recorded renderer calls here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the raw position buffer (little-endian f32 triples, key-major)
        #[arg(long)]
        positions_out: Option<PathBuf>,
    },
    /// List the attributes of a cache file
    Inspect {
        #[arg(long)]
        cache: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmitReport {
    point_count: usize,
    motion_steps: usize,
    diagnostics: Vec<Diagnostic>,
    calls: RecordingSink,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Emit {
            params,
            cache,
            out,
            positions_out,
        } => emit(params.as_deref(), cache, out.as_deref(), positions_out.as_deref()),
        Commands::Inspect { cache } => inspect(&cache),
    }
}

fn emit(
    params_path: Option<&Path>,
    cache: Option<PathBuf>,
    out: Option<&Path>,
    positions_out: Option<&Path>,
) -> Result<()> {
    let mut params = match params_path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read options file {:?}", path))?;
            HostParams::from_json(&contents)
                .with_context(|| format!("Failed to parse options file {:?}", path))?
        }
        None => HostParams::new(),
    };
    if let Some(cache) = cache {
        params.set("arg_file", ParamValue::Str(cache.to_string_lossy().into_owned()));
    }
    if !params.contains("arg_file") {
        anyhow::bail!("No cache given: pass --cache or set arg_file in the options file");
    }

    let procedural = PartioProcedural::init(&params);
    let emission = procedural.get_node();
    let primitive = emission.primitive;

    if let Some(path) = positions_out {
        let bytes: &[u8] = bytemuck::cast_slice(&primitive.positions);
        fs::write(path, bytes).with_context(|| format!("Failed to write positions to {:?}", path))?;
    }

    let point_count = primitive.point_count;
    let motion_steps = primitive.motion_steps;
    let mut sink = RecordingSink::new();
    primitive.submit(&mut sink);

    let report = EmitReport {
        point_count,
        motion_steps,
        diagnostics: emission.diagnostics,
        calls: sink,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write report to {:?}", path))?;
            println!(
                "Emitted {} points ({} motion keys), {} diagnostics -> {:?}",
                point_count,
                motion_steps,
                report.diagnostics.len(),
                path
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let cache = ParticleCache::load(path).with_context(|| format!("Failed to load cache {:?}", path))?;

    println!("{}: {} particles", path.display(), cache.num_particles());
    for attr in cache.attributes() {
        println!(
            "  {:<24} {:?} x{}",
            attr.name, attr.attr_type, attr.count
        );
    }
    Ok(())
}
