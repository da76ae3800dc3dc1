//! Semi-empirical mass model: structure, cabin, hydrogen tanks and propulsion.

use crate::config::Constants;
use crate::inputs::TankRow;
use serde::Serialize;
use std::f64::consts::PI;

/// Propulsion architecture with its propulsive efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropulsionSystem {
    Turbine { efficiency: f64 },
    FuelCell { efficiency: f64 },
}

impl PropulsionSystem {
    /// Selector 1 picks the turbine; anything else the fuel-cell system.
    pub fn from_selector(selector: i64, constants: &Constants) -> Self {
        if selector == 1 {
            PropulsionSystem::Turbine {
                efficiency: constants.turbine_efficiency,
            }
        } else {
            PropulsionSystem::FuelCell {
                efficiency: constants.fuel_cell_efficiency,
            }
        }
    }

    pub fn efficiency(&self) -> f64 {
        match *self {
            PropulsionSystem::Turbine { efficiency } | PropulsionSystem::FuelCell { efficiency } => {
                efficiency
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropulsionSystem::Turbine { .. } => "turbine",
            PropulsionSystem::FuelCell { .. } => "fuel-cell",
        }
    }

    /// Installed propulsion mass for an approximate takeoff mass (kg).
    pub fn mass(&self, takeoff_mass: f64, constants: &Constants) -> f64 {
        let weight = takeoff_mass * constants.gravity;
        match self {
            // two engines, each sized for a tenth of the weight in thrust
            PropulsionSystem::Turbine { .. } => 2.0 * constants.c3 * (weight / 10.0).powf(0.89),
            PropulsionSystem::FuelCell { .. } => weight / 5.0 * constants.c6(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TankKind {
    Cabin,
    Fuel,
}

/// Mass contribution of a single cylinder in each flight phase.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TankMass {
    pub kind: TankKind,
    /// Bending moment arm fraction, 1 - 2|y|/b
    pub arm: f64,
    pub empty: f64,
    pub landing: f64,
    pub takeoff: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MassBreakdown {
    pub empty: f64,
    pub landing: f64,
    pub takeoff: f64,
    pub passengers: f64,
    pub efficiency: f64,
    pub structure: f64,
    /// Reported only; not part of the phase totals
    pub propulsion: f64,
    pub cabin_area: f64,
    pub tanks: Vec<TankMass>,
}

/// Empty tank and fuel mass for a hydrogen cylinder with hemispherical caps.
pub fn fuel_cylinder_masses(diameter: f64, length: f64, constants: &Constants) -> (f64, f64) {
    let d0 = constants.tank_d0;
    let eta = diameter.powi(2) / (diameter.powi(4) + d0.powi(4)).sqrt();
    let barrel = (length - diameter).max(0.0);
    let volume = 0.25 * PI * diameter.powi(2) * barrel + PI / 6.0 * diameter.powi(3);
    let fuel = constants.rho_h2 * volume;
    if fuel == 0.0 {
        return (0.0, 0.0);
    }
    ((1.0 / eta - 1.0) * fuel, fuel)
}

/// Mass breakdown for span `b`, sweep `theta`, spar thickness `t` and planform area `s`.
pub fn compute_masses(
    span: f64,
    sweep: f64,
    thickness: f64,
    planform_area: f64,
    propulsion: PropulsionSystem,
    tanks: &[TankRow],
    constants: &Constants,
) -> MassBreakdown {
    let spar_length = span / 2.0 / sweep.cos();

    let cabin_area: f64 = tanks
        .iter()
        .filter(|row| !row.fuel)
        .map(|row| row.diameter * row.length())
        .sum();
    let passengers = cabin_area / constants.pax_area;

    let tank_masses: Vec<TankMass> = tanks
        .iter()
        .map(|row| {
            let arm = 1.0 - 2.0 * row.y.abs() / span;
            if row.fuel {
                let (tank, fuel) = fuel_cylinder_masses(row.diameter, row.length(), constants);
                TankMass {
                    kind: TankKind::Fuel,
                    arm,
                    empty: tank,
                    landing: tank + constants.phi * fuel,
                    takeoff: tank + fuel,
                }
            } else {
                let pax = row.diameter * row.length() / constants.pax_area * constants.pax_mass;
                TankMass {
                    kind: TankKind::Cabin,
                    arm,
                    empty: pax,
                    landing: pax,
                    takeoff: pax,
                }
            }
        })
        .collect();

    let bending: f64 = tank_masses
        .iter()
        .map(|m| constants.c1 * spar_length.powi(2) / thickness * m.arm * m.takeoff)
        .sum();
    let structure = constants.c2 * planform_area + bending;

    let tank_takeoff: f64 = tank_masses.iter().map(|m| m.takeoff).sum();
    let approx_takeoff = constants.takeoff_margin * (tank_takeoff + constants.payload + structure);
    let propulsion_mass = propulsion.mass(approx_takeoff, constants);

    let base = structure + constants.payload;
    let empty = base + tank_masses.iter().map(|m| m.empty).sum::<f64>();
    let landing = base + tank_masses.iter().map(|m| m.landing).sum::<f64>();
    let takeoff = base + tank_takeoff;

    MassBreakdown {
        empty,
        landing,
        takeoff,
        passengers,
        efficiency: propulsion.efficiency(),
        structure,
        propulsion: propulsion_mass,
        cabin_area,
        tanks: tank_masses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cabin(y: f64, d: f64, start: f64, end: f64) -> TankRow {
        TankRow { y, x: 0.0, diameter: d, start, end, fuel: false }
    }

    fn fuel(y: f64, d: f64, start: f64, end: f64) -> TankRow {
        TankRow { y, x: 0.0, diameter: d, start, end, fuel: true }
    }

    fn turbine() -> PropulsionSystem {
        PropulsionSystem::from_selector(1, &Constants::default())
    }

    #[test]
    fn selector_maps_to_variant() {
        let c = Constants::default();
        assert_eq!(turbine(), PropulsionSystem::Turbine { efficiency: 0.40 });
        assert_eq!(
            PropulsionSystem::from_selector(2, &c),
            PropulsionSystem::FuelCell { efficiency: 0.45 }
        );
        assert_eq!(PropulsionSystem::from_selector(0, &c).name(), "fuel-cell");
    }

    #[test]
    fn propulsion_laws() {
        let c = Constants::default();
        let m = 300_000.0;
        let w = m * c.gravity;
        assert_relative_eq!(turbine().mass(m, &c), 2.0 * 0.2 * (w / 10.0).powf(0.89));
        let fc = PropulsionSystem::from_selector(2, &c);
        assert_relative_eq!(fc.mass(m, &c), w / 5.0 * 0.075, max_relative = 1e-12);
    }

    #[test]
    fn tank_efficiency_law() {
        let c = Constants::default();
        // d = D0 gives eta = 1/sqrt(2)
        let (tank, fuel) = fuel_cylinder_masses(3.0, 10.0, &c);
        let volume = 0.25 * PI * 9.0 * 7.0 + PI / 6.0 * 27.0;
        assert_relative_eq!(fuel, 71.0 * volume, max_relative = 1e-12);
        assert_relative_eq!(tank, (2.0f64.sqrt() - 1.0) * fuel, max_relative = 1e-12);
    }

    #[test]
    fn short_tank_is_a_sphere() {
        let c = Constants::default();
        let (_, fuel) = fuel_cylinder_masses(3.0, 0.5, &c);
        assert_relative_eq!(fuel, 71.0 * PI / 6.0 * 27.0, max_relative = 1e-12);
    }

    #[test]
    fn all_cabin_phases_are_equal() {
        let c = Constants::default();
        let tanks = [cabin(0.0, 4.0, 0.0, 30.0), cabin(5.0, 3.0, 2.0, 20.0)];
        let m = compute_masses(40.0, 0.1, 1.0, 300.0, turbine(), &tanks, &c);
        assert_eq!(m.empty, m.landing);
        assert_eq!(m.landing, m.takeoff);
        assert_relative_eq!(m.cabin_area, 120.0 + 54.0);
        assert_relative_eq!(m.passengers, 174.0 / 0.8);
    }

    #[test]
    fn fuel_burn_orders_phases() {
        let c = Constants::default();
        let layouts: Vec<Vec<TankRow>> = vec![
            vec![fuel(0.0, 3.0, 0.0, 20.0)],
            vec![cabin(0.0, 4.0, 0.0, 30.0), fuel(8.0, 2.5, 0.0, 15.0)],
            vec![fuel(2.0, 0.0, 0.0, 5.0), fuel(15.0, 4.0, 1.0, 2.0)],
            vec![fuel(25.0, 3.0, 0.0, 40.0), fuel(0.0, 6.0, 0.0, 6.0)],
        ];
        for tanks in &layouts {
            let m = compute_masses(40.0, 0.3, 0.8, 350.0, turbine(), tanks, &c);
            assert!(m.empty <= m.landing, "{:?}", tanks);
            assert!(m.landing <= m.takeoff, "{:?}", tanks);
        }
    }

    #[test]
    fn totals_are_additive() {
        let c = Constants::default();
        let tanks = [cabin(0.0, 4.0, 0.0, 30.0), fuel(8.0, 2.5, 0.0, 15.0)];
        let m = compute_masses(40.0, 0.3, 0.8, 350.0, turbine(), &tanks, &c);

        let base = m.structure + c.payload;
        assert_relative_eq!(m.empty, base + m.tanks[0].empty + m.tanks[1].empty, max_relative = 1e-12);
        assert_relative_eq!(m.takeoff, base + m.tanks[0].takeoff + m.tanks[1].takeoff, max_relative = 1e-12);
        assert_eq!(m.tanks[0].kind, TankKind::Cabin);
        assert_relative_eq!(m.tanks[1].arm, 1.0 - 16.0 / 40.0);
        assert_eq!(m.efficiency, 0.40);
    }

    #[test]
    fn structure_includes_bending_term() {
        let c = Constants::default();
        let tanks = [cabin(0.0, 4.0, 0.0, 10.0)];
        let m = compute_masses(40.0, 0.0, 2.0, 100.0, turbine(), &tanks, &c);
        let pax = 40.0 / 0.8 * 176.67;
        let expected = 12.0 * 100.0 + 0.003 * 400.0 / 2.0 * 1.0 * pax;
        assert_relative_eq!(m.structure, expected, max_relative = 1e-12);
    }

    #[test]
    fn thinner_spar_is_heavier() {
        let c = Constants::default();
        let tanks = [cabin(0.0, 4.0, 0.0, 30.0), fuel(8.0, 2.5, 0.0, 15.0)];
        let thick = compute_masses(40.0, 0.3, 1.0, 350.0, turbine(), &tanks, &c);
        let thin = compute_masses(40.0, 0.3, 0.5, 350.0, turbine(), &tanks, &c);
        assert!(thin.structure > thick.structure);
    }
}
