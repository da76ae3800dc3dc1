use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Root {
    pub program: Program,
    pub inputs: Inputs,
    pub solvers: Solvers,
    #[serde(default)]
    pub constants: Constants,
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Program {
    pub name: String,
    pub module: String,
    pub version: String,
}

/// Input files. Relative paths are resolved against the config file's directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Inputs {
    /// Wing section table (TOML)
    pub geometry: PathBuf,
    /// Vortex-lattice geometry handed to the AVL process
    pub avl: PathBuf,
    /// Cylinder layout table
    pub tanks: PathBuf,
    /// Five-line flight conditions file
    pub conditions: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Solvers {
    pub avl: PathBuf,
    pub xfoil: PathBuf,
    #[serde(default = "default_timeout")]
    pub timeout_s: f64,
    /// Precomputed section airfoils, `{i}` replaced by the section index.
    /// When absent the section polylines from the geometry are written out.
    #[serde(default)]
    pub airfoils: Option<String>,
}

fn default_timeout() -> f64 { 120.0 }

/// Empirical sizing coefficients and fixed physical constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Constants {
    /// Design range used for flight time (m)
    pub target_range: f64,
    /// Fixed payload (kg)
    pub payload: f64,
    /// Liquid hydrogen density (kg/m^3)
    pub rho_h2: f64,
    /// Reference tank diameter for the gravimetric efficiency law (m)
    pub tank_d0: f64,
    /// Unburned fuel fraction at landing
    pub phi: f64,
    pub gravity: f64,
    /// Fuel specific energy (J/kg)
    pub energy: f64,
    /// Cabin floor area per passenger (m^2)
    pub pax_area: f64,
    /// Mass per passenger incl. baggage (kg)
    pub pax_mass: f64,
    /// Spar bending term (1/m)
    pub c1: f64,
    /// Wing areal mass (kg/m^2)
    pub c2: f64,
    /// Turbine power-law coefficient (kg N^-0.89)
    pub c3: f64,
    /// Fuel-cell stack mass per thrust (kg/N)
    pub c4: f64,
    /// Fuel-cell balance-of-plant mass per power (kg/W)
    pub c5: f64,
    pub turbine_efficiency: f64,
    pub fuel_cell_efficiency: f64,
    /// Takeoff mass growth factor for propulsion sizing
    pub takeoff_margin: f64,
    /// Spar chordwise station as a fraction of local chord
    pub spar_chord_fraction: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            target_range: 14_140_000.0,
            payload: 53_000.0,
            rho_h2: 71.0,
            tank_d0: 3.0,
            phi: 0.05,
            gravity: 9.81,
            energy: 141.86e6,
            pax_area: 0.8,
            pax_mass: 176.67,
            c1: 0.003,
            c2: 12.0,
            c3: 0.2,
            c4: 0.015,
            c5: 0.0006,
            turbine_efficiency: 0.40,
            fuel_cell_efficiency: 0.45,
            takeoff_margin: 1.2,
            spar_chord_fraction: 0.4,
        }
    }
}

impl Constants {
    /// Combined fuel-cell system mass per newton of thrust
    pub fn c6(&self) -> f64 {
        self.c4 + 100.0 * self.c5
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Sensitivity {
    /// Relative perturbation in percent of the baseline value
    pub step_pct: f64,
    pub parallel: bool,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            step_pct: 0.1,
            parallel: false,
        }
    }
}

impl Root {
    /// Read and parse a config file, resolving input paths against its directory.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let mut cfg: Root = toml::from_str(&text)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        cfg.inputs.geometry = resolve(base, &cfg.inputs.geometry);
        cfg.inputs.avl = resolve(base, &cfg.inputs.avl);
        cfg.inputs.tanks = resolve(base, &cfg.inputs.tanks);
        cfg.inputs.conditions = resolve(base, &cfg.inputs.conditions);
        cfg.solvers.avl = resolve(base, &cfg.solvers.avl);
        cfg.solvers.xfoil = resolve(base, &cfg.solvers.xfoil);
        if let Some(pattern) = cfg.solvers.airfoils.take() {
            cfg.solvers.airfoils = Some(resolve(base, Path::new(&pattern)).display().to_string());
        }

        Ok((cfg, text))
    }

    pub fn validate(&self) -> Result<()> {
        if self.program.name.is_empty() {
            bail!("program.name must not be empty");
        }
        if !(self.solvers.timeout_s > 0.0) {
            bail!("solvers.timeout_s must be positive");
        }
        if let Some(ref pattern) = self.solvers.airfoils {
            if !pattern.contains("{i}") {
                bail!("solvers.airfoils must contain an {{i}} placeholder");
            }
        }
        if !(self.sensitivity.step_pct > 0.0 && self.sensitivity.step_pct <= 10.0) {
            bail!("sensitivity.step_pct must be in (0, 10]");
        }

        let c = &self.constants;
        let positive = [
            ("target_range", c.target_range),
            ("rho_h2", c.rho_h2),
            ("tank_d0", c.tank_d0),
            ("gravity", c.gravity),
            ("energy", c.energy),
            ("pax_area", c.pax_area),
            ("takeoff_margin", c.takeoff_margin),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                bail!("constants.{} must be positive", name);
            }
        }
        let non_negative = [
            ("payload", c.payload),
            ("pax_mass", c.pax_mass),
            ("c1", c.c1),
            ("c2", c.c2),
            ("c3", c.c3),
            ("c4", c.c4),
            ("c5", c.c5),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                bail!("constants.{} must be non-negative", name);
            }
        }
        if !(0.0..=1.0).contains(&c.phi) {
            bail!("constants.phi must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&c.spar_chord_fraction) {
            bail!("constants.spar_chord_fraction must be in [0, 1]");
        }
        if !(c.turbine_efficiency > 0.0 && c.turbine_efficiency <= 1.0) {
            bail!("constants.turbine_efficiency must be in (0, 1]");
        }
        if !(c.fuel_cell_efficiency > 0.0 && c.fuel_cell_efficiency <= 1.0) {
            bail!("constants.fuel_cell_efficiency must be in (0, 1]");
        }

        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
