//! Wing geometry and the derived spar/planform quantities.
//!
//! The wing is described as an ordered list of sections from root to tip,
//! each with a leading-edge position, a chord and a unit-chord airfoil
//! polyline. Only the main lifting surface is considered.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Rounding slack allowed when the spanwise projection exceeds the spar length.
const COS_SLACK: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("wing needs at least two sections, found {0}")]
    TooFewSections(usize),
    #[error("section {index}: chord must be positive, got {chord}")]
    Chord { index: usize, chord: f64 },
    #[error("section {index}: leading-edge y {y} does not increase outboard")]
    NotMonotonic { index: usize, y: f64 },
    #[error("section {index}: airfoil needs points on both surfaces")]
    Airfoil { index: usize },
    #[error("reference chord must be positive, got {0}")]
    Cref(f64),
    #[error("tip must lie outboard of the root, half-span is {0}")]
    HalfSpan(f64),
    #[error("spar has zero length")]
    ZeroSpar,
    #[error("sweep undefined: half-span {half_span} exceeds spar length {length}")]
    Sweep { half_span: f64, length: f64 },
    #[error("non-positive spar thickness {0} at the root")]
    Thickness(f64),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{path}: malformed airfoil coordinates at line {line}")]
    AirfoilFile { path: PathBuf, line: usize },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WingSection {
    /// Leading-edge position (x, y, z)
    pub le: [f64; 3],
    pub chord: f64,
    /// Unit-chord (x, z) polyline: upper surface TE to LE, then lower surface LE to TE
    #[serde(default)]
    pub airfoil: Vec<[f64; 2]>,
    /// Selig-format airfoil file, used when `airfoil` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afile: Option<PathBuf>,
}

impl WingSection {
    pub fn y(&self) -> f64 {
        self.le[1]
    }

    /// Index of the leading-edge point: the count of decreasing-x steps.
    pub fn le_index(&self) -> usize {
        self.airfoil.windows(2).filter(|w| w[1][0] < w[0][0]).count()
    }

    /// Lower and upper surface z at chordwise station `x_spar`, in wing axes.
    pub fn spar_caps(&self, x_spar: f64) -> (f64, f64) {
        let frac = (x_spar - self.le[0]) / self.chord;
        let ile = self.le_index();

        let upper: Vec<[f64; 2]> = self.airfoil[..=ile].iter().rev().copied().collect();
        let lower = &self.airfoil[ile..];

        let z_upper = interp(frac, &upper);
        let z_lower = interp(frac, lower);
        (
            z_lower * self.chord + self.le[2],
            z_upper * self.chord + self.le[2],
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WingGeometry {
    /// Reference (mean aerodynamic) chord
    pub cref: f64,
    pub sections: Vec<WingSection>,
}

impl WingGeometry {
    /// Load a section table and pull in any external airfoil files.
    pub fn load(path: &Path) -> Result<Self, GeometryError> {
        let text = fs::read_to_string(path).map_err(|source| GeometryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut geom: WingGeometry = toml::from_str(&text).map_err(|source| GeometryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for section in &mut geom.sections {
            if section.airfoil.is_empty() {
                if let Some(afile) = &section.afile {
                    let afile = if afile.is_absolute() { afile.clone() } else { base.join(afile) };
                    section.airfoil = read_airfoil(&afile)?;
                    section.afile = Some(afile);
                }
            }
        }

        geom.validate()?;
        Ok(geom)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.sections.len() < 2 {
            return Err(GeometryError::TooFewSections(self.sections.len()));
        }
        if !(self.cref > 0.0) {
            return Err(GeometryError::Cref(self.cref));
        }
        for (index, s) in self.sections.iter().enumerate() {
            if !(s.chord > 0.0) {
                return Err(GeometryError::Chord { index, chord: s.chord });
            }
            if index > 0 && !(s.y() > self.sections[index - 1].y()) {
                return Err(GeometryError::NotMonotonic { index, y: s.y() });
            }
            let ile = s.le_index();
            if s.airfoil.len() < 3 || ile == 0 || ile + 1 >= s.airfoil.len() {
                return Err(GeometryError::Airfoil { index });
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &WingSection {
        &self.sections[0]
    }

    pub fn tip(&self) -> &WingSection {
        &self.sections[self.sections.len() - 1]
    }

    /// Spar chordwise station at every section, linear in y between root and tip.
    pub fn spar_stations(&self, chord_fraction: f64) -> Vec<f64> {
        let (root, tip) = (self.root(), self.tip());
        let x_root = root.le[0] + root.chord * chord_fraction;
        let x_tip = tip.le[0] + tip.chord * chord_fraction;
        let half_span = tip.y() - root.y();

        self.sections
            .iter()
            .map(|s| x_root + (x_tip - x_root) * (s.y() - root.y()) / half_span)
            .collect()
    }

    /// Derive span, sweep and root thickness of the main spar.
    pub fn spar(&self, chord_fraction: f64) -> Result<SparDescriptor, GeometryError> {
        let half_span = self.tip().y() - self.root().y();
        if !(half_span > 0.0) {
            return Err(GeometryError::HalfSpan(half_span));
        }
        let stations = self.spar_stations(chord_fraction);
        let depths: Vec<f64> = self
            .sections
            .iter()
            .zip(&stations)
            .map(|(s, &x)| {
                let (lower, upper) = s.spar_caps(x);
                upper - lower
            })
            .collect();

        let dx = stations[stations.len() - 1] - stations[0];
        let length = half_span.hypot(dx);
        if !(length > 0.0) {
            return Err(GeometryError::ZeroSpar);
        }

        let mut ratio = half_span / length;
        if ratio > 1.0 + COS_SLACK || !ratio.is_finite() {
            return Err(GeometryError::Sweep { half_span, length });
        }
        ratio = ratio.min(1.0);

        let thickness = depths[0];
        if !(thickness > 0.0) {
            return Err(GeometryError::Thickness(thickness));
        }

        Ok(SparDescriptor {
            span: 2.0 * half_span,
            sweep: ratio.acos(),
            thickness,
            length,
            depths,
        })
    }

    /// Planform area shares per section, counting both wing halves.
    pub fn section_areas(&self) -> Vec<f64> {
        let n = self.sections.len();
        (0..n)
            .map(|i| {
                let y0 = self.sections[i.saturating_sub(1)].y();
                let y1 = self.sections[(i + 1).min(n - 1)].y();
                let dy = (y1 - y0) / 2.0;
                2.0 * self.sections[i].chord * dy
            })
            .collect()
    }

    pub fn planform_area(&self) -> f64 {
        self.section_areas().iter().sum()
    }

    /// Reference span and chord as declared by the geometry.
    pub fn reference_dimensions(&self) -> (f64, f64) {
        (2.0 * self.tip().y(), self.cref)
    }
}

/// Spar span `b`, sweep `theta` (rad) and root thickness `t`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparDescriptor {
    pub span: f64,
    pub sweep: f64,
    pub thickness: f64,
    /// Root-to-tip spar length in the (y, x) plane
    pub length: f64,
    /// Spar depth at every section
    pub depths: Vec<f64>,
}

/// Linear interpolation over increasing `xs`, clamped at both ends.
pub fn interp(x: f64, points: &[[f64; 2]]) -> f64 {
    let first = points[0];
    let last = points[points.len() - 1];
    if x <= first[0] {
        return first[1];
    }
    if x >= last[0] {
        return last[1];
    }
    for w in points.windows(2) {
        let ([x0, z0], [x1, z1]) = (w[0], w[1]);
        if x <= x1 {
            if x1 == x0 {
                return z1;
            }
            return z0 + (z1 - z0) * (x - x0) / (x1 - x0);
        }
    }
    last[1]
}

/// Read a Selig-format airfoil: a name line followed by `x z` pairs.
pub fn read_airfoil(path: &Path) -> Result<Vec<[f64; 2]>, GeometryError> {
    let text = fs::read_to_string(path).map_err(|source| GeometryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate().skip(1) {
        let mut it = line.split_whitespace();
        match (it.next(), it.next()) {
            (None, _) => continue,
            (Some(x), Some(z)) => {
                let parsed = x.parse::<f64>().ok().zip(z.parse::<f64>().ok());
                match parsed {
                    Some((x, z)) => points.push([x, z]),
                    None => {
                        return Err(GeometryError::AirfoilFile {
                            path: path.to_path_buf(),
                            line: idx + 1,
                        })
                    }
                }
            }
            (Some(_), None) => {
                return Err(GeometryError::AirfoilFile {
                    path: path.to_path_buf(),
                    line: idx + 1,
                })
            }
        }
    }
    Ok(points)
}

/// Write `points` in Selig format for the boundary-layer solver.
pub fn write_airfoil(path: &Path, name: &str, points: &[[f64; 2]]) -> std::io::Result<()> {
    let mut out = String::with_capacity(32 * (points.len() + 1));
    out.push_str(name);
    out.push('\n');
    for [x, z] in points {
        out.push_str(&format!("{:.6} {:.6}\n", x, z));
    }
    fs::write(path, out)
}
