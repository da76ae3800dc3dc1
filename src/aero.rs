//! Drag buildup: induced drag from a vortex-lattice trim, viscous drag from
//! per-section boundary-layer polars, blended by planform area.

use crate::geometry::{WingGeometry, WingSection};
use crate::solver::{FailureKind, SolverError};
use serde::Serialize;

/// Trimmed angle of attack (deg) and induced drag coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InducedDrag {
    pub alpha: f64,
    pub cdi: f64,
}

pub trait VortexLattice: Sync {
    /// Trim to `cl` and report the resulting angle of attack and induced drag.
    fn solve(&self, cl: f64) -> Result<InducedDrag, SolverError>;
}

pub trait BoundaryLayer: Sync {
    /// Viscous drag coefficient of one wing section at `alpha` (deg).
    fn section_drag(
        &self,
        index: usize,
        section: &WingSection,
        reynolds: f64,
        alpha: f64,
    ) -> Result<f64, SolverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Induced,
    Viscous,
}

/// A solve that failed and was replaced by zero drag.
#[derive(Debug, Clone, Serialize)]
pub struct Degraded {
    pub stage: Stage,
    pub kind: FailureKind,
    /// Failing section for viscous solves
    pub section: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DragBuildup {
    pub alpha: f64,
    pub cdi: f64,
    /// Per-section viscous drag coefficients
    pub sections: Vec<f64>,
    pub cdv: f64,
    pub cd: f64,
    pub degraded: Vec<Degraded>,
}

impl DragBuildup {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

fn report_failure(label: &str, err: &SolverError) {
    eprintln!("[bwbsize] {} calculation failed: {}", label, err);
    eprintln!("INPUT FILE");
    eprintln!("{}", err.script);
    eprintln!("OUTPUT FILE");
    eprintln!("{}", err.output);
}

/// Induced drag at `cl`; a failed solve yields zero angle and zero drag.
pub fn induced_drag(vlm: &dyn VortexLattice, cl: f64) -> (InducedDrag, Option<Degraded>) {
    match vlm.solve(cl) {
        Ok(sol) => (sol, None),
        Err(err) => {
            report_failure("AVL", &err);
            let flag = Degraded {
                stage: Stage::Induced,
                kind: err.failure.kind(),
                section: None,
                message: err.to_string(),
            };
            (InducedDrag { alpha: 0.0, cdi: 0.0 }, Some(flag))
        }
    }
}

/// Viscous drag per section. Any failure zeroes every section.
pub fn viscous_drag_array(
    bl: &dyn BoundaryLayer,
    wing: &WingGeometry,
    reynolds: f64,
    alpha: f64,
) -> (Vec<f64>, Option<Degraded>) {
    let mut coefficients = Vec::with_capacity(wing.sections.len());
    for (index, section) in wing.sections.iter().enumerate() {
        match bl.section_drag(index, section, reynolds, alpha) {
            Ok(cd) => coefficients.push(cd),
            Err(err) => {
                report_failure(&format!("XFOIL (section {})", index), &err);
                let flag = Degraded {
                    stage: Stage::Viscous,
                    kind: err.failure.kind(),
                    section: Some(index),
                    message: err.to_string(),
                };
                return (vec![0.0; wing.sections.len()], Some(flag));
            }
        }
    }
    (coefficients, None)
}

/// Area-weighted mean of the section coefficients.
pub fn blend_viscous(coefficients: &[f64], areas: &[f64]) -> f64 {
    let total: f64 = areas.iter().sum();
    let weighted: f64 = coefficients.iter().zip(areas).map(|(cd, s)| cd * s).sum();
    weighted / total
}

/// Full drag buildup for a target lift coefficient.
pub fn drag_buildup(
    vlm: &dyn VortexLattice,
    bl: &dyn BoundaryLayer,
    wing: &WingGeometry,
    cl: f64,
    reynolds: f64,
) -> DragBuildup {
    let mut degraded = Vec::new();

    let (induced, flag) = induced_drag(vlm, cl);
    degraded.extend(flag);

    let (sections, flag) = viscous_drag_array(bl, wing, reynolds, induced.alpha);
    degraded.extend(flag);

    let cdv = blend_viscous(&sections, &wing.section_areas());
    DragBuildup {
        alpha: induced.alpha,
        cdi: induced.cdi,
        sections,
        cdv,
        cd: cdv + induced.cdi,
        degraded,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::solver::SolverFailure;
    use std::f64::consts::PI;

    /// Elliptic-loading stand-in: alpha from a 2*pi lift slope, CDi = CL^2/(pi AR e).
    pub struct LinearVlm {
        pub aspect_ratio: f64,
    }

    impl VortexLattice for LinearVlm {
        fn solve(&self, cl: f64) -> Result<InducedDrag, SolverError> {
            Ok(InducedDrag {
                alpha: (cl / (2.0 * PI)).to_degrees(),
                cdi: cl * cl / (PI * self.aspect_ratio * 0.9),
            })
        }
    }

    /// Flat-plate skin friction with a mild angle-of-attack penalty.
    pub struct FlatPlate;

    impl BoundaryLayer for FlatPlate {
        fn section_drag(&self, _: usize, _: &WingSection, reynolds: f64, alpha: f64) -> Result<f64, SolverError> {
            Ok(2.0 * 0.074 / reynolds.powf(0.2) + 1e-4 * alpha * alpha)
        }
    }

    pub struct Diverging;

    impl BoundaryLayer for Diverging {
        fn section_drag(&self, _: usize, _: &WingSection, _: f64, _: f64) -> Result<f64, SolverError> {
            Err(SolverError {
                failure: SolverFailure::MalformedOutput("no CD in XFOIL output".to_string()),
                script: "oper\n".to_string(),
                output: "garbage".to_string(),
            })
        }
    }

    impl VortexLattice for Diverging {
        fn solve(&self, _: f64) -> Result<InducedDrag, SolverError> {
            Err(SolverError::new(SolverFailure::Diverged("Alpha = NaN".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::geometry::test_support::two_section_wing;
    use crate::solver::SolverFailure;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant(f64);

    impl BoundaryLayer for Constant {
        fn section_drag(&self, _: usize, _: &WingSection, _: f64, _: f64) -> Result<f64, SolverError> {
            Ok(self.0)
        }
    }

    /// Fails on the second section only.
    struct FailsSecond(AtomicUsize);

    impl BoundaryLayer for FailsSecond {
        fn section_drag(&self, index: usize, _: &WingSection, _: f64, _: f64) -> Result<f64, SolverError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if index == 1 {
                Err(SolverError::new(SolverFailure::Timeout {
                    program: "xfoil".to_string(),
                    seconds: 1.0,
                }))
            } else {
                Ok(0.006)
            }
        }
    }

    #[test]
    fn area_weighting() {
        assert_relative_eq!(blend_viscous(&[0.01, 0.02], &[3.0, 1.0]), 0.0125, max_relative = 1e-12);
        assert_relative_eq!(blend_viscous(&[0.0, 0.0], &[3.0, 1.0]), 0.0);
    }

    #[test]
    fn drag_is_additive() {
        let wing = two_section_wing();
        let vlm = LinearVlm { aspect_ratio: 8.0 };
        let d = drag_buildup(&vlm, &Constant(0.006), &wing, 0.4, 3e7);

        assert!(!d.is_degraded());
        assert_relative_eq!(d.cdv, 0.006, epsilon = 1e-15);
        assert_relative_eq!(d.cd, d.cdv + d.cdi);
        assert_relative_eq!(d.cdi, 0.16 / (std::f64::consts::PI * 8.0 * 0.9), max_relative = 1e-12);
        assert_eq!(d.sections.len(), 2);
    }

    #[test]
    fn viscous_polar_uses_trimmed_alpha() {
        let wing = two_section_wing();
        let vlm = LinearVlm { aspect_ratio: 8.0 };
        let d = drag_buildup(&vlm, &FlatPlate, &wing, 0.5, 3e7);
        let expected = 2.0 * 0.074 / 3e7f64.powf(0.2) + 1e-4 * d.alpha * d.alpha;
        assert_relative_eq!(d.sections[0], expected);
    }

    #[test]
    fn diverged_boundary_layer_leaves_induced_only() {
        let wing = two_section_wing();
        let vlm = LinearVlm { aspect_ratio: 8.0 };
        let d = drag_buildup(&vlm, &Diverging, &wing, 0.4, 3e7);

        assert_eq!(d.sections, vec![0.0, 0.0]);
        assert_eq!(d.cdv, 0.0);
        assert_eq!(d.cd, d.cdi);
        assert_eq!(d.degraded.len(), 1);
        assert_eq!(d.degraded[0].stage, Stage::Viscous);
        assert_eq!(d.degraded[0].kind, FailureKind::MalformedOutput);
    }

    #[test]
    fn one_failed_section_zeroes_all_and_stops() {
        let wing = two_section_wing();
        let bl = FailsSecond(AtomicUsize::new(0));
        let (cds, flag) = viscous_drag_array(&bl, &wing, 3e7, 2.0);
        assert_eq!(cds, vec![0.0, 0.0]);
        let flag = flag.unwrap();
        assert_eq!(flag.section, Some(1));
        assert_eq!(flag.kind, FailureKind::Timeout);
        assert_eq!(bl.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn diverged_vortex_lattice_zeroes_induced() {
        let wing = two_section_wing();
        let d = drag_buildup(&Diverging, &Constant(0.006), &wing, 0.4, 3e7);
        assert_eq!(d.alpha, 0.0);
        assert_eq!(d.cdi, 0.0);
        assert_eq!(d.degraded[0].stage, Stage::Induced);
        assert_eq!(d.degraded[0].kind, FailureKind::Diverged);
    }
}
