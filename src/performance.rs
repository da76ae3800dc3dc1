use crate::config::Constants;
use crate::inputs::FlightConditions;
use serde::Serialize;

/// Cruise performance and the time-weighted empty-mass objective.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Performance {
    pub cruise_speed: f64,
    pub dynamic_pressure: f64,
    pub reference_area: f64,
    pub reynolds: f64,
    pub flight_time: f64,
    pub objective: f64,
}

/// Freestream quantities for span `b` and reference chord `cref`.
pub fn cruise_point(
    conditions: &FlightConditions,
    span: f64,
    cref: f64,
    empty_mass: f64,
    constants: &Constants,
) -> Performance {
    let uinf = conditions.cruise_speed();
    let flight_time = constants.target_range / uinf;
    Performance {
        cruise_speed: uinf,
        dynamic_pressure: 0.5 * conditions.density * uinf * uinf,
        reference_area: span * cref,
        reynolds: uinf * cref / conditions.kinematic_viscosity,
        flight_time,
        objective: flight_time * empty_mass,
    }
}

/// Lift coefficient needed to hold the takeoff weight in level cruise.
pub fn required_cl(takeoff_mass: f64, perf: &Performance, constants: &Constants) -> f64 {
    takeoff_mass * constants.gravity / perf.dynamic_pressure / perf.reference_area
}

/// Breguet range for a fuel burn from `takeoff_mass` down to `landing_mass`.
pub fn compute_range(
    landing_mass: f64,
    takeoff_mass: f64,
    efficiency: f64,
    cl: f64,
    cd: f64,
    constants: &Constants,
) -> f64 {
    constants.energy * efficiency / constants.gravity * cl / cd * (takeoff_mass / landing_mass).ln()
}
