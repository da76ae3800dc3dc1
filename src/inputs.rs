//! Flight-condition and tank-layout input tables.

use crate::config::Constants;
use crate::mass::PropulsionSystem;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: cannot parse '{token}' as a number")]
    Number { line: usize, token: String },
    #[error("expected {expected} values, found {found}")]
    Count { expected: usize, found: usize },
    #[error("line {line}: expected {expected} columns, found {found}")]
    Columns { line: usize, expected: usize, found: usize },
    #[error("line {line}: {reason}")]
    Invalid { line: usize, reason: String },
}

/// Cruise conditions, fixed for a whole run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FlightConditions {
    pub propulsion: PropulsionSystem,
    pub mach: f64,
    /// Local speed of sound (m/s)
    pub sound_speed: f64,
    /// Freestream density (kg/m^3)
    pub density: f64,
    /// Kinematic viscosity (m^2/s)
    pub kinematic_viscosity: f64,
}

impl FlightConditions {
    pub fn load(path: &Path, constants: &Constants) -> Result<Self, InputError> {
        let text = read(path)?;
        Self::parse(&text, constants)
    }

    /// Parse five newline-separated values: propulsion selector, Mach number,
    /// sound speed, density and kinematic viscosity. `#` lines are comments.
    pub fn parse(text: &str, constants: &Constants) -> Result<Self, InputError> {
        let mut values = Vec::with_capacity(5);
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            values.push((idx + 1, number(line, idx + 1)?));
        }
        if values.len() != 5 {
            return Err(InputError::Count {
                expected: 5,
                found: values.len(),
            });
        }

        let (selector_line, selector) = values[0];
        if selector.fract() != 0.0 {
            return Err(InputError::Invalid {
                line: selector_line,
                reason: format!("propulsion selector must be an integer, got {}", selector),
            });
        }
        let propulsion = PropulsionSystem::from_selector(selector as i64, constants);

        for &(line, value) in &values[1..] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(InputError::Invalid {
                    line,
                    reason: format!("flight condition must be positive, got {}", value),
                });
            }
        }

        Ok(Self {
            propulsion,
            mach: values[1].1,
            sound_speed: values[2].1,
            density: values[3].1,
            kinematic_viscosity: values[4].1,
        })
    }

    /// Cruise true airspeed (m/s)
    pub fn cruise_speed(&self) -> f64 {
        self.mach * self.sound_speed
    }
}

/// One cylinder of the cabin/tank layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TankRow {
    /// Lateral (spanwise) position of the cylinder axis (m)
    pub y: f64,
    /// Longitudinal position; carried through, not used by the mass model
    pub x: f64,
    pub diameter: f64,
    pub start: f64,
    pub end: f64,
    pub fuel: bool,
}

impl TankRow {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

const TANK_COLUMNS: usize = 6;

pub fn load_tanks(path: &Path) -> Result<Vec<TankRow>, InputError> {
    let text = read(path)?;
    parse_tanks(&text)
}

/// Parse the whitespace-delimited layout table. The first line is a header;
/// columns are y, x, diameter, axial start, axial end, fuel flag (0 = cabin).
pub fn parse_tanks(text: &str) -> Result<Vec<TankRow>, InputError> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() != TANK_COLUMNS {
            return Err(InputError::Columns {
                line: line_no,
                expected: TANK_COLUMNS,
                found: tokens.len(),
            });
        }
        let mut v = [0.0; TANK_COLUMNS];
        for (slot, token) in v.iter_mut().zip(&tokens) {
            *slot = number(token, line_no)?;
        }
        let row = TankRow {
            y: v[0],
            x: v[1],
            diameter: v[2],
            start: v[3],
            end: v[4],
            fuel: v[5] != 0.0,
        };
        if row.diameter < 0.0 {
            return Err(InputError::Invalid {
                line: line_no,
                reason: format!("negative diameter {}", row.diameter),
            });
        }
        if row.length() < 0.0 {
            return Err(InputError::Invalid {
                line: line_no,
                reason: format!("axial end {} lies before start {}", row.end, row.start),
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

fn number(token: &str, line: usize) -> Result<f64, InputError> {
    token.trim().parse::<f64>().map_err(|_| InputError::Number {
        line,
        token: token.trim().to_string(),
    })
}

fn read(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONDITIONS: &str = "# propulsion type (1 = turbine)\n1\n# cruise mach\n0.78\n295\n0.38\n3.7e-5\n";

    #[test]
    fn parses_conditions_with_comments() {
        let fc = FlightConditions::parse(CONDITIONS, &Constants::default()).unwrap();
        assert!(matches!(fc.propulsion, PropulsionSystem::Turbine { .. }));
        assert_eq!(fc.mach, 0.78);
        assert_eq!(fc.kinematic_viscosity, 3.7e-5);
        assert!((fc.cruise_speed() - 230.1).abs() < 1e-9);
    }

    #[test]
    fn non_turbine_selector_is_fuel_cell() {
        let text = CONDITIONS.replace("\n1\n", "\n2\n");
        let fc = FlightConditions::parse(&text, &Constants::default()).unwrap();
        assert!(matches!(fc.propulsion, PropulsionSystem::FuelCell { .. }));
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        let err = FlightConditions::parse("1\n0.78\n295\n", &Constants::default()).unwrap_err();
        assert!(matches!(err, InputError::Count { expected: 5, found: 3 }));
    }

    #[test]
    fn garbage_value_reports_line() {
        let err = FlightConditions::parse("1\n0.78\nfast\n0.38\n3.7e-5\n", &Constants::default())
            .unwrap_err();
        assert!(matches!(err, InputError::Number { line: 3, .. }));
    }

    #[test]
    fn fractional_selector_is_rejected() {
        let err = FlightConditions::parse("1.5\n0.78\n295\n0.38\n3.7e-5\n", &Constants::default())
            .unwrap_err();
        assert!(matches!(err, InputError::Invalid { line: 1, .. }));
    }

    #[test]
    fn parses_tank_table() {
        let text = "y x d start end fuel\n0.0 0.0 4.0 2.0 30.0 0\n\n8.0 10.0 3.5 5.0 25.0 1\n";
        let rows = parse_tanks(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].fuel);
        assert!(rows[1].fuel);
        assert_eq!(rows[1].length(), 20.0);
    }

    #[test]
    fn short_tank_row_is_rejected() {
        let err = parse_tanks("header\n0.0 0.0 4.0 2.0 30.0\n").unwrap_err();
        assert!(matches!(err, InputError::Columns { line: 2, expected: 6, found: 5 }));
    }

    #[test]
    fn reversed_tank_is_rejected() {
        let err = parse_tanks("header\n0.0 0.0 4.0 30.0 2.0 1\n").unwrap_err();
        assert!(matches!(err, InputError::Invalid { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_tanks(Path::new("/nonexistent/cylinders.txt")).unwrap_err();
        assert!(matches!(err, InputError::Io { .. }));
    }
}
