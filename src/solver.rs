//! External AVL and XFOIL processes.
//!
//! Every invocation gets its own scratch directory, so evaluations can run
//! side by side. The command script is fed on stdin and stdout is captured
//! to a file in the same directory; both are kept for diagnostics when a
//! solve fails.

use crate::aero::{BoundaryLayer, InducedDrag, VortexLattice};
use crate::geometry::{write_airfoil, WingSection};
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const SCRIPT_FILE: &str = "input.txt";
const OUTPUT_FILE: &str = "output.txt";
const FORCES_FILE: &str = "forces.txt";
const POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum SolverFailure {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} did not finish within {seconds:.1} s")]
    Timeout { program: String, seconds: f64 },
    #[error("solution diverged: {0}")]
    Diverged(String),
    #[error("malformed output: {0}")]
    MalformedOutput(String),
    #[error("scratch directory: {0}")]
    Scratch(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Spawn,
    Timeout,
    Diverged,
    MalformedOutput,
    Scratch,
}

impl SolverFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            SolverFailure::Spawn { .. } => FailureKind::Spawn,
            SolverFailure::Timeout { .. } => FailureKind::Timeout,
            SolverFailure::Diverged(_) => FailureKind::Diverged,
            SolverFailure::MalformedOutput(_) => FailureKind::MalformedOutput,
            SolverFailure::Scratch(_) => FailureKind::Scratch,
        }
    }
}

/// A failed solve together with what was sent and what came back.
#[derive(Debug, Error)]
#[error("{failure}")]
pub struct SolverError {
    pub failure: SolverFailure,
    pub script: String,
    pub output: String,
}

impl SolverError {
    pub fn new(failure: SolverFailure) -> Self {
        Self {
            failure,
            script: String::new(),
            output: String::new(),
        }
    }
}

/// A synchronous spawn-and-wait external program with a wall-clock limit.
#[derive(Debug, Clone)]
pub struct Process {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl Process {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn name(&self) -> String {
        self.program.display().to_string()
    }

    /// Run inside `dir` with `script` on stdin; returns captured stdout.
    pub fn run(&self, dir: &Path, script: &str) -> Result<String, SolverFailure> {
        let script_path = dir.join(SCRIPT_FILE);
        let output_path = dir.join(OUTPUT_FILE);
        fs::write(&script_path, script)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .stdin(Stdio::from(File::open(&script_path)?))
            .stdout(Stdio::from(File::create(&output_path)?))
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SolverFailure::Spawn {
                program: self.name(),
                source,
            })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SolverFailure::Timeout {
                    program: self.name(),
                    seconds: self.timeout.as_secs_f64(),
                });
            }
            thread::sleep(POLL);
        };

        let stdout = fs::read_to_string(&output_path)?;
        if !status.success() {
            return Err(SolverFailure::Diverged(format!("{} exited with {}", self.name(), status)));
        }
        Ok(stdout)
    }
}

fn scratch(prefix: &str) -> Result<tempfile::TempDir, SolverError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| SolverError::new(SolverFailure::Scratch(e)))
}

fn read_or_empty(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

// ============================================================================
// AVL
// ============================================================================

pub struct AvlProcess {
    process: Process,
    geometry: PathBuf,
}

impl AvlProcess {
    pub fn new(process: Process, geometry: impl Into<PathBuf>) -> Self {
        Self {
            process,
            geometry: geometry.into(),
        }
    }
}

/// Trim to a target CL and write the total forces report.
pub fn avl_script(geometry: &Path, cl: f64) -> String {
    format!(
        "load {}\n\noper\nA\nC {}\nX\nW\n{}\n\nquit\n",
        geometry.display(),
        cl,
        FORCES_FILE
    )
}

/// Pull `Alpha` and `CDind` out of an AVL total-forces report.
pub fn parse_avl_forces(text: &str) -> Result<InducedDrag, SolverFailure> {
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == '=')
        .filter(|t| !t.is_empty())
        .collect();

    let value = |key: &str| -> Result<f64, SolverFailure> {
        let pos = tokens
            .iter()
            .position(|t| *t == key)
            .ok_or_else(|| SolverFailure::MalformedOutput(format!("no {} in forces report", key)))?;
        let raw = tokens
            .get(pos + 1)
            .ok_or_else(|| SolverFailure::MalformedOutput(format!("no value after {}", key)))?;
        let v: f64 = raw
            .parse()
            .map_err(|_| SolverFailure::MalformedOutput(format!("{} = '{}'", key, raw)))?;
        if !v.is_finite() {
            return Err(SolverFailure::Diverged(format!("{} = {}", key, v)));
        }
        Ok(v)
    };

    Ok(InducedDrag {
        alpha: value("Alpha")?,
        cdi: value("CDind")?,
    })
}

impl VortexLattice for AvlProcess {
    fn solve(&self, cl: f64) -> Result<InducedDrag, SolverError> {
        let dir = scratch("avl-")?;
        let script = avl_script(&self.geometry, cl);

        let result = self.process.run(dir.path(), &script).and_then(|_| {
            let forces = fs::read_to_string(dir.path().join(FORCES_FILE)).map_err(|_| {
                SolverFailure::MalformedOutput("no forces report written".to_string())
            })?;
            parse_avl_forces(&forces)
        });

        result.map_err(|failure| {
            let forces = read_or_empty(&dir.path().join(FORCES_FILE));
            let output = if forces.is_empty() {
                read_or_empty(&dir.path().join(OUTPUT_FILE))
            } else {
                forces
            };
            SolverError {
                failure,
                script,
                output,
            }
        })
    }
}

// ============================================================================
// XFOIL
// ============================================================================

pub struct XfoilProcess {
    process: Process,
    /// Airfoil file pattern with an `{i}` section placeholder
    airfoils: Option<String>,
}

impl XfoilProcess {
    pub fn new(process: Process, airfoils: Option<String>) -> Self {
        Self { process, airfoils }
    }
}

/// Viscous polar at 0, alpha/2 and alpha; only the last point is used.
pub fn xfoil_script(airfoil: &str, reynolds: f64, alpha: f64) -> String {
    format!(
        "load {}\n\noper\nvisc {}\nalfa 0\nalfa {}\nalfa {}\n\nquit\n",
        airfoil,
        reynolds,
        alpha / 2.0,
        alpha
    )
}

/// The last reported `CD = ` value. A convergence failure reported for that
/// final point counts as divergence.
pub fn parse_xfoil_cd(text: &str) -> Result<f64, SolverFailure> {
    const MARKER: &str = "CD = ";
    let last = text
        .rfind(MARKER)
        .ok_or_else(|| SolverFailure::MalformedOutput("no CD in XFOIL output".to_string()))?;

    let previous = text[..last].rfind(MARKER).map(|i| i + MARKER.len()).unwrap_or(0);
    if text[previous..last].contains("Convergence failed") {
        return Err(SolverFailure::Diverged("final point did not converge".to_string()));
    }

    let raw = text[last + MARKER.len()..]
        .split_whitespace()
        .next()
        .unwrap_or("");
    let cd: f64 = raw
        .parse()
        .map_err(|_| SolverFailure::MalformedOutput(format!("CD = '{}'", raw)))?;
    if !cd.is_finite() {
        return Err(SolverFailure::Diverged(format!("CD = {}", cd)));
    }
    Ok(cd)
}

impl BoundaryLayer for XfoilProcess {
    fn section_drag(
        &self,
        index: usize,
        section: &WingSection,
        reynolds: f64,
        alpha: f64,
    ) -> Result<f64, SolverError> {
        let dir = scratch("xfoil-")?;

        let airfoil = match &self.airfoils {
            Some(pattern) => pattern.replace("{i}", &index.to_string()),
            None => {
                let name = format!("section{}.dat", index);
                write_airfoil(&dir.path().join(&name), &format!("SECTION{}", index), &section.airfoil)
                    .map_err(|e| SolverError::new(SolverFailure::Scratch(e)))?;
                name
            }
        };
        let script = xfoil_script(&airfoil, reynolds, alpha);

        self.process
            .run(dir.path(), &script)
            .and_then(|out| parse_xfoil_cd(&out))
            .map_err(|failure| SolverError {
                failure,
                script,
                output: read_or_empty(&dir.path().join(OUTPUT_FILE)),
            })
    }
}
