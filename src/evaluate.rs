//! One pass of the sizing pipeline for a given set of design variables.

use crate::aero::{drag_buildup, BoundaryLayer, DragBuildup, VortexLattice};
use crate::config::Constants;
use crate::geometry::{GeometryError, WingGeometry};
use crate::inputs::{FlightConditions, TankRow};
use crate::mass::{compute_masses, MassBreakdown};
use crate::performance::{compute_range, cruise_point, required_cl, Performance};
use crate::sensitivity::Sample;
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;

/// Span `b`, sweep `theta` (rad), spar thickness `t` and reference chord.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DesignVariables {
    pub span: f64,
    pub sweep: f64,
    pub thickness: f64,
    pub chord: f64,
}

impl DesignVariables {
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !(self.thickness > 0.0) {
            return Err(GeometryError::Thickness(self.thickness));
        }
        if !(self.chord > 0.0) {
            return Err(GeometryError::Cref(self.chord));
        }
        if !(self.span > 0.0) || !(0.0..FRAC_PI_2).contains(&self.sweep) {
            return Err(GeometryError::Sweep {
                half_span: self.span / 2.0,
                length: self.span / 2.0 / self.sweep.cos(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub design: DesignVariables,
    pub masses: MassBreakdown,
    pub performance: Performance,
    pub cl: f64,
    pub drag: DragBuildup,
    pub lift_to_drag: f64,
    pub range: f64,
}

impl Evaluation {
    pub fn objective(&self) -> f64 {
        self.performance.objective
    }

    pub fn sample(&self) -> Sample {
        Sample {
            objective: self.objective(),
            range: self.range,
            degraded: self.drag.is_degraded(),
        }
    }
}

/// Fixed inputs shared by every evaluation of a run.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    pub wing: &'a WingGeometry,
    pub tanks: &'a [TankRow],
    pub conditions: &'a FlightConditions,
    pub constants: &'a Constants,
    pub vlm: &'a dyn VortexLattice,
    pub bl: &'a dyn BoundaryLayer,
}

impl<'a> Evaluator<'a> {
    /// Design variables implied by the geometry itself.
    pub fn baseline(&self) -> Result<DesignVariables, GeometryError> {
        let spar = self.wing.spar(self.constants.spar_chord_fraction)?;
        Ok(DesignVariables {
            span: spar.span,
            sweep: spar.sweep,
            thickness: spar.thickness,
            chord: self.wing.cref,
        })
    }

    pub fn evaluate(&self, design: DesignVariables) -> Result<Evaluation, GeometryError> {
        design.validate()?;
        let c = self.constants;

        let masses = compute_masses(
            design.span,
            design.sweep,
            design.thickness,
            self.wing.planform_area(),
            self.conditions.propulsion,
            self.tanks,
            c,
        );

        let performance = cruise_point(self.conditions, design.span, design.chord, masses.empty, c);
        let cl = required_cl(masses.takeoff, &performance, c);
        let drag = drag_buildup(self.vlm, self.bl, self.wing, cl, performance.reynolds);
        let (lift_to_drag, range) = if drag.cd > 0.0 {
            (
                cl / drag.cd,
                compute_range(masses.landing, masses.takeoff, masses.efficiency, cl, drag.cd, c),
            )
        } else {
            eprintln!(
                "[bwbsize] WARNING: no usable drag (CD = {}), L/D and range set to zero",
                drag.cd
            );
            (0.0, 0.0)
        };

        Ok(Evaluation {
            design,
            lift_to_drag,
            masses,
            performance,
            cl,
            drag,
            range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aero::test_support::{FlatPlate, LinearVlm};
    use crate::geometry::test_support::two_section_wing;
    use crate::mass::PropulsionSystem;
    use approx::assert_relative_eq;

    fn conditions() -> FlightConditions {
        FlightConditions {
            propulsion: PropulsionSystem::Turbine { efficiency: 0.4 },
            mach: 0.78,
            sound_speed: 295.0,
            density: 0.38,
            kinematic_viscosity: 3.7e-5,
        }
    }

    fn tanks() -> Vec<TankRow> {
        vec![
            TankRow { y: 0.0, x: 0.0, diameter: 4.0, start: 0.0, end: 20.0, fuel: false },
            TankRow { y: 6.0, x: 10.0, diameter: 3.0, start: 0.0, end: 15.0, fuel: true },
        ]
    }

    #[test]
    fn baseline_comes_from_spar() {
        let wing = two_section_wing();
        let (t, fc, c) = (tanks(), conditions(), Constants::default());
        let vlm = LinearVlm { aspect_ratio: 5.0 };
        let ev = Evaluator { wing: &wing, tanks: &t, conditions: &fc, constants: &c, vlm: &vlm, bl: &FlatPlate };

        let dv = ev.baseline().unwrap();
        assert_relative_eq!(dv.span, 40.0);
        assert_relative_eq!(dv.chord, 7.5);
        assert_relative_eq!(dv.thickness, 0.96, epsilon = 1e-12);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let wing = two_section_wing();
        let (t, fc, c) = (tanks(), conditions(), Constants::default());
        let vlm = LinearVlm { aspect_ratio: 5.0 };
        let ev = Evaluator { wing: &wing, tanks: &t, conditions: &fc, constants: &c, vlm: &vlm, bl: &FlatPlate };

        let dv = ev.baseline().unwrap();
        let a = ev.evaluate(dv).unwrap();
        let b = ev.evaluate(dv).unwrap();
        assert_eq!(a.range, b.range);
        assert_eq!(a.objective(), b.objective());
        assert_relative_eq!(a.lift_to_drag, a.cl / a.drag.cd);
        assert_relative_eq!(a.objective(), a.performance.flight_time * a.masses.empty);
    }

    #[test]
    fn rejects_degenerate_design() {
        let wing = two_section_wing();
        let (t, fc, c) = (tanks(), conditions(), Constants::default());
        let vlm = LinearVlm { aspect_ratio: 5.0 };
        let ev = Evaluator { wing: &wing, tanks: &t, conditions: &fc, constants: &c, vlm: &vlm, bl: &FlatPlate };

        let mut dv = ev.baseline().unwrap();
        dv.sweep = FRAC_PI_2;
        assert!(matches!(ev.evaluate(dv), Err(GeometryError::Sweep { .. })));

        let mut dv = ev.baseline().unwrap();
        dv.thickness = 0.0;
        assert!(matches!(ev.evaluate(dv), Err(GeometryError::Thickness(_))));
    }
}
