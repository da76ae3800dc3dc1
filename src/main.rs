mod aero;
mod config;
mod evaluate;
mod geometry;
mod inputs;
mod io;
mod mass;
mod performance;
mod sensitivity;
mod solver;


use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::evaluate::{Evaluation, Evaluator};
use crate::geometry::WingGeometry;
use crate::inputs::{FlightConditions, TankRow};
use crate::sensitivity::Sensitivity;
use crate::solver::{AvlProcess, Process, XfoilProcess};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SCHEMA_VERSION: &str = "1.0.0";
const PROGRAM_ID: &str = "bwbsize";

#[derive(Parser, Debug)]
#[command(name = "bwbsize")]
#[command(version)]
#[command(about = "Conceptual sizing and design sensitivities for a hydrogen blended-wing-body aircraft")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output path for the CSV result
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate the baseline design and print the full breakdown
    Run {
        /// Also write a JSON result bundle next to the CSV
        #[arg(long)]
        json: bool,
    },
    /// Central-difference sensitivities of objective and range
    Sensitivity {
        /// Perturbation in percent of each baseline value
        #[arg(long)]
        step: Option<f64>,
        /// Evaluate the perturbed designs concurrently
        #[arg(long)]
        parallel: bool,
    },
    /// Extract spar and planform dimensions only (no solver calls)
    Spar,
    /// Validate a configuration and its input files
    Validate,
    /// Print version information
    Version,
}

// ============================================================================
// JSON Output Structures
// ============================================================================

#[derive(Serialize)]
struct Manifest {
    schema_version: String,
    solver_version: String,
    program_id: String,
    timestamp_utc: String,
    platform: String,
    config_hash: String,
    config_snapshot: config::Root,
}

#[derive(Serialize)]
struct ResultBundle<'a> {
    manifest: Manifest,
    conditions: &'a FlightConditions,
    evaluation: &'a Evaluation,
    wall_time_ms: f64,
}

#[derive(Serialize)]
struct SensitivityOutput<'a> {
    manifest: Manifest,
    step_pct: f64,
    baseline: &'a Evaluation,
    sensitivities: &'a [Sensitivity],
    wall_time_ms: f64,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn compute_hash(data: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn create_manifest(cfg: &config::Root, cfg_text: &str) -> Manifest {
    Manifest {
        schema_version: SCHEMA_VERSION.to_string(),
        solver_version: VERSION.to_string(),
        program_id: PROGRAM_ID.to_string(),
        timestamp_utc: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        platform: std::env::consts::OS.to_string(),
        config_hash: compute_hash(cfg_text),
        config_snapshot: cfg.clone(),
    }
}

fn json_path(out_path: &Path) -> PathBuf {
    out_path.with_extension("json")
}

/// Everything a run needs, loaded once.
struct Inputs {
    cfg: config::Root,
    cfg_text: String,
    wing: WingGeometry,
    tanks: Vec<TankRow>,
    conditions: FlightConditions,
}

impl Inputs {
    fn load(cfg_path: &Path) -> Result<Self> {
        let (cfg, cfg_text) = config::Root::load(cfg_path)?;
        cfg.validate()?;

        let wing = WingGeometry::load(&cfg.inputs.geometry)
            .with_context(|| format!("geometry: {}", cfg.inputs.geometry.display()))?;
        let tanks = inputs::load_tanks(&cfg.inputs.tanks)
            .with_context(|| format!("tank table: {}", cfg.inputs.tanks.display()))?;
        let conditions = FlightConditions::load(&cfg.inputs.conditions, &cfg.constants)
            .with_context(|| format!("flight conditions: {}", cfg.inputs.conditions.display()))?;

        eprintln!("[bwbsize] {} v{} - {}", cfg.program.name, cfg.program.version, cfg.program.module);
        Ok(Self {
            cfg,
            cfg_text,
            wing,
            tanks,
            conditions,
        })
    }

    fn solvers(&self) -> (AvlProcess, XfoilProcess) {
        let timeout = Duration::from_secs_f64(self.cfg.solvers.timeout_s);
        let avl = AvlProcess::new(
            Process::new(&self.cfg.solvers.avl, timeout),
            &self.cfg.inputs.avl,
        );
        let xfoil = XfoilProcess::new(
            Process::new(&self.cfg.solvers.xfoil, timeout),
            self.cfg.solvers.airfoils.clone(),
        );
        (avl, xfoil)
    }
}

fn print_report(fc: &FlightConditions, ev: &Evaluation) {
    let d = &ev.design;
    let p = &ev.performance;
    let m = &ev.masses;

    eprintln!("FLIGHT CONDITIONS");
    eprintln!("  propulsion = {}", fc.propulsion.name());
    eprintln!("  bref = {:.4} m", d.span);
    eprintln!("  cref = {:.4} m", d.chord);
    eprintln!("  Sref = {:.4} m2", p.reference_area);
    eprintln!("  Uinf = {:.4} m/s", p.cruise_speed);
    eprintln!("  Re = {:.4}E+6", p.reynolds / 1e6);
    eprintln!("  Time = {:.4} h", p.flight_time / 3600.0);
    eprintln!();
    eprintln!("AIRCRAFT MASS AND PASSENGER CAPACITY");
    eprintln!("  Empty mass = {:.4} kg", m.empty);
    eprintln!("  Landing mass = {:.4} kg", m.landing);
    eprintln!("  Take-off mass = {:.4} kg", m.takeoff);
    eprintln!("  Structure = {:.4} kg", m.structure);
    eprintln!("  Propulsion system = {:.4} kg (not in totals)", m.propulsion);
    eprintln!("  Passengers = {} pax", m.passengers.floor());
    eprintln!();
    eprintln!("AIRCRAFT OBJECTIVE");
    eprintln!("  OBJ = {:.4}E+9 kg s", ev.objective() / 1e9);
    eprintln!();
    eprintln!("AERODYNAMICS");
    eprintln!("  CL = {:.4}", ev.cl);
    eprintln!("  AOA = {:.4} deg", ev.drag.alpha);
    eprintln!("  CDi = {:.6}", ev.drag.cdi);
    eprintln!("  CDv = {:.6}", ev.drag.cdv);
    eprintln!("  CD = {:.6}", ev.drag.cd);
    eprintln!();
    eprintln!("AIRCRAFT RANGE");
    eprintln!("  L/D = {:.4}", ev.lift_to_drag);
    eprintln!("  Range = {:.4} km", ev.range / 1000.0);

    for flag in &ev.drag.degraded {
        eprintln!(
            "[bwbsize] WARNING: {:?} drag replaced by zero ({:?}): {}",
            flag.stage, flag.kind, flag.message
        );
    }
}

// ============================================================================
// Run Modes
// ============================================================================

fn run_single(inputs: &Inputs, out_path: &Path, json_output: bool) -> Result<()> {
    let (avl, xfoil) = inputs.solvers();
    let evaluator = Evaluator {
        wing: &inputs.wing,
        tanks: &inputs.tanks,
        conditions: &inputs.conditions,
        constants: &inputs.cfg.constants,
        vlm: &avl,
        bl: &xfoil,
    };

    let start = Instant::now();
    let design = evaluator.baseline()?;
    let ev = evaluator.evaluate(design)?;
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    print_report(&inputs.conditions, &ev);

    let mut w = io::CsvWriter::create(out_path)?;
    w.write_evaluation_header()?;
    w.write_evaluation("baseline", &ev)?;
    w.flush()?;
    eprintln!("[bwbsize] CSV: {}", out_path.display());

    if json_output {
        let path = json_path(out_path);
        let bundle = ResultBundle {
            manifest: create_manifest(&inputs.cfg, &inputs.cfg_text),
            conditions: &inputs.conditions,
            evaluation: &ev,
            wall_time_ms,
        };
        fs::write(&path, serde_json::to_string_pretty(&bundle)?)?;
        eprintln!("[bwbsize] JSON bundle: {}", path.display());
    }

    if ev.drag.is_degraded() {
        eprintln!("[bwbsize] WARNING: result is degraded by solver failures");
    }

    Ok(())
}

fn run_sensitivity(inputs: &Inputs, out_path: &Path, step_pct: f64, parallel: bool) -> Result<()> {
    if !(step_pct > 0.0 && step_pct <= 10.0) {
        anyhow::bail!("--step must be in (0, 10] percent");
    }

    let (avl, xfoil) = inputs.solvers();
    let evaluator = Evaluator {
        wing: &inputs.wing,
        tanks: &inputs.tanks,
        conditions: &inputs.conditions,
        constants: &inputs.cfg.constants,
        vlm: &avl,
        bl: &xfoil,
    };

    let start = Instant::now();
    let design = evaluator.baseline()?;
    let baseline = evaluator.evaluate(design)?;

    eprintln!(
        "[bwbsize] baseline: b={:.4} m, cref={:.4} m, t={:.4} m, sweep={:.4} deg",
        design.span,
        design.chord,
        design.thickness,
        design.sweep.to_degrees()
    );
    eprintln!(
        "[bwbsize] computing sensitivities at +/-{}% ({})",
        step_pct,
        if parallel { "parallel" } else { "sequential" }
    );

    let results = sensitivity::sweep(design, step_pct, parallel, |dv| {
        evaluator.evaluate(dv).map(|ev| ev.sample())
    })?;
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let mut w = io::CsvWriter::create(out_path)?;
    w.write_sensitivity_header()?;
    for s in &results {
        w.write_sensitivity(s)?;
    }
    w.flush()?;

    for s in &results {
        eprintln!("SENSITIVITY WITH RESPECT TO {}", s.variable.description().to_uppercase());
        eprintln!("  df/d{}: {:.4}E+9 kg s per %", s.variable.name(), s.d_objective / 1e9);
        eprintln!("  dR/d{}: {:.4} km per %", s.variable.name(), s.d_range / 1000.0);
        if s.degraded() {
            eprintln!("  WARNING: solver failures degraded this difference");
        }
    }

    let path = json_path(out_path);
    let output = SensitivityOutput {
        manifest: create_manifest(&inputs.cfg, &inputs.cfg_text),
        step_pct,
        baseline: &baseline,
        sensitivities: &results,
        wall_time_ms,
    };
    fs::write(&path, serde_json::to_string_pretty(&output)?)?;

    eprintln!("[bwbsize] sensitivity analysis complete in {:.1} ms", wall_time_ms);
    eprintln!("[bwbsize] CSV: {}", out_path.display());
    eprintln!("[bwbsize] JSON: {}", path.display());

    Ok(())
}

fn run_spar(inputs: &Inputs) -> Result<()> {
    let spar = inputs.wing.spar(inputs.cfg.constants.spar_chord_fraction)?;
    let (bref, cref) = inputs.wing.reference_dimensions();

    eprintln!("SPAR");
    eprintln!("  b = {:.4} m", spar.span);
    eprintln!("  sweep = {:.4} deg", spar.sweep.to_degrees());
    eprintln!("  t = {:.4} m", spar.thickness);
    eprintln!("  L = {:.4} m", spar.length);
    for (section, depth) in inputs.wing.sections.iter().zip(&spar.depths) {
        eprintln!("  depth at y = {:.4} m: {:.4} m", section.y(), depth);
    }
    eprintln!("PLANFORM");
    eprintln!("  S = {:.4} m2", inputs.wing.planform_area());
    eprintln!("  bref = {:.4} m", bref);
    eprintln!("  cref = {:.4} m", cref);
    eprintln!("  sections = {}", inputs.wing.sections.len());
    Ok(())
}

fn validate_config(inputs: &Inputs) -> Result<()> {
    let cfg = &inputs.cfg;
    inputs.wing.spar(cfg.constants.spar_chord_fraction)?;

    let fuel_rows = inputs.tanks.iter().filter(|t| t.fuel).count();
    eprintln!("[bwbsize] config valid");
    eprintln!("  solvers: avl={}, xfoil={}, timeout={}s",
              cfg.solvers.avl.display(), cfg.solvers.xfoil.display(), cfg.solvers.timeout_s);
    eprintln!("  geometry: {} sections, cref={}", inputs.wing.sections.len(), inputs.wing.cref);
    eprintln!("  tanks: {} rows ({} fuel, {} cabin)",
              inputs.tanks.len(), fuel_rows, inputs.tanks.len() - fuel_rows);
    eprintln!("  conditions: propulsion={}, mach={}, a={} m/s, rho={} kg/m3, nu={} m2/s",
              inputs.conditions.propulsion.name(), inputs.conditions.mach,
              inputs.conditions.sound_speed, inputs.conditions.density,
              inputs.conditions.kinematic_viscosity);
    if fuel_rows == 0 {
        eprintln!("[bwbsize] WARNING: no fuel rows, range will be zero");
    }
    Ok(())
}

fn print_version() {
    eprintln!("BWBSIZE - Hydrogen blended-wing-body sizing and sensitivities");
    eprintln!();
    eprintln!("  Program ID:        {}", PROGRAM_ID);
    eprintln!("  Version:           {}", VERSION);
    eprintln!("  Schema Version:    {}", SCHEMA_VERSION);
    eprintln!("  Platform:          {}", std::env::consts::OS);
    eprintln!("  Architecture:      {}", std::env::consts::ARCH);
    eprintln!();
    eprintln!("External solvers:");
    eprintln!("  - AVL: vortex-lattice trim and induced drag");
    eprintln!("  - XFOIL: section viscous drag");
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    if let Commands::Version = args.command {
        print_version();
        return Ok(());
    }

    let cfg_path = args.config.context("--config required")?;
    let inputs = Inputs::load(&cfg_path)?;

    match args.command {
        Commands::Run { json } => {
            let out_path = args.out.unwrap_or_else(|| PathBuf::from("results/baseline.csv"));
            run_single(&inputs, &out_path, json)
        }
        Commands::Sensitivity { step, parallel } => {
            let out_path = args.out.unwrap_or_else(|| PathBuf::from("results/sensitivities.csv"));
            let step = step.unwrap_or(inputs.cfg.sensitivity.step_pct);
            run_sensitivity(&inputs, &out_path, step, parallel || inputs.cfg.sensitivity.parallel)
        }
        Commands::Spar => run_spar(&inputs),
        Commands::Validate => validate_config(&inputs),
        Commands::Version => unreachable!(),
    }
}
