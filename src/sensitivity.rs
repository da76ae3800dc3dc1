//! One-at-a-time central-difference sensitivities of objective and range.

use crate::evaluate::DesignVariables;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignVariable {
    Span,
    Chord,
    SparThickness,
    Sweep,
}

impl DesignVariable {
    pub const ALL: [DesignVariable; 4] = [
        DesignVariable::Span,
        DesignVariable::Chord,
        DesignVariable::SparThickness,
        DesignVariable::Sweep,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DesignVariable::Span => "span",
            DesignVariable::Chord => "chord",
            DesignVariable::SparThickness => "spar_thickness",
            DesignVariable::Sweep => "sweep",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DesignVariable::Span => "span",
            DesignVariable::Chord => "mean aerodynamic chord",
            DesignVariable::SparThickness => "spar thickness",
            DesignVariable::Sweep => "sweep angle",
        }
    }

    pub fn get(&self, dv: &DesignVariables) -> f64 {
        match self {
            DesignVariable::Span => dv.span,
            DesignVariable::Chord => dv.chord,
            DesignVariable::SparThickness => dv.thickness,
            DesignVariable::Sweep => dv.sweep,
        }
    }

    /// Copy of `dv` with this variable multiplied by `factor`.
    pub fn scaled(&self, dv: DesignVariables, factor: f64) -> DesignVariables {
        let mut out = dv;
        match self {
            DesignVariable::Span => out.span *= factor,
            DesignVariable::Chord => out.chord *= factor,
            DesignVariable::SparThickness => out.thickness *= factor,
            DesignVariable::Sweep => out.sweep *= factor,
        }
        out
    }
}

/// The two outputs the driver differences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub objective: f64,
    pub range: f64,
    /// A solver failure was replaced by zero drag in this sample
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sensitivity {
    pub variable: DesignVariable,
    pub baseline: f64,
    /// Absolute perturbation applied on each side
    pub step: f64,
    pub minus: Sample,
    pub plus: Sample,
    /// Objective change per percent of the variable
    pub d_objective: f64,
    /// Range change per percent of the variable
    pub d_range: f64,
}

impl Sensitivity {
    pub fn degraded(&self) -> bool {
        self.minus.degraded || self.plus.degraded
    }
}

/// (f+ - f-) over the total percent span of the perturbation.
pub fn central_difference(minus: f64, plus: f64, step_pct: f64) -> f64 {
    (plus - minus) / (2.0 * step_pct)
}

/// Perturb each design variable by `step_pct` percent either side of `baseline`
/// and difference the results. With `parallel` the evaluations are spread
/// over the rayon pool; `eval` must then be safe to call concurrently.
pub fn sweep<F, E>(
    baseline: DesignVariables,
    step_pct: f64,
    parallel: bool,
    eval: F,
) -> Result<Vec<Sensitivity>, E>
where
    F: Fn(DesignVariables) -> Result<Sample, E> + Sync,
    E: Send,
{
    let frac = step_pct / 100.0;
    let jobs: Vec<(DesignVariable, f64)> = DesignVariable::ALL
        .iter()
        .flat_map(|&v| [(v, 1.0 - frac), (v, 1.0 + frac)])
        .collect();

    let run = |&(variable, factor): &(DesignVariable, f64)| eval(variable.scaled(baseline, factor));
    let samples: Vec<Sample> = if parallel {
        jobs.par_iter().map(run).collect::<Result<_, E>>()?
    } else {
        jobs.iter().map(run).collect::<Result<_, E>>()?
    };

    Ok(DesignVariable::ALL
        .iter()
        .zip(samples.chunks(2))
        .map(|(&variable, pair)| {
            let (minus, plus) = (pair[0], pair[1]);
            let baseline = variable.get(&baseline);
            Sensitivity {
                variable,
                baseline,
                step: baseline * frac,
                minus,
                plus,
                d_objective: central_difference(minus.objective, plus.objective, step_pct),
                d_range: central_difference(minus.range, plus.range, step_pct),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn baseline() -> DesignVariables {
        DesignVariables {
            span: 40.0,
            sweep: 0.5,
            thickness: 1.2,
            chord: 7.5,
        }
    }

    fn sample(objective: f64, range: f64) -> Sample {
        Sample { objective, range, degraded: false }
    }

    #[test]
    fn scaled_touches_one_variable() {
        let dv = DesignVariable::SparThickness.scaled(baseline(), 1.001);
        assert_relative_eq!(dv.thickness, 1.2012, max_relative = 1e-12);
        assert_eq!(dv.span, 40.0);
        assert_eq!(dv.sweep, 0.5);
        assert_eq!(dv.chord, 7.5);
    }

    #[test]
    fn ignored_variable_has_zero_sensitivity() {
        // objective depends only on span, range only on chord
        let result = sweep(baseline(), 0.1, false, |dv| Ok::<_, ()>(sample(3.0 * dv.span, dv.chord.powi(2))))
            .unwrap();

        let by = |v: DesignVariable| result.iter().find(|s| s.variable == v).unwrap();
        assert_relative_eq!(by(DesignVariable::Sweep).d_objective, 0.0);
        assert_relative_eq!(by(DesignVariable::SparThickness).d_range, 0.0);
        assert_relative_eq!(by(DesignVariable::Chord).d_objective, 0.0);
        assert_relative_eq!(by(DesignVariable::Span).d_range, 0.0);
    }

    #[test]
    fn linear_objective_gives_per_percent_slope() {
        let result = sweep(baseline(), 0.1, false, |dv| Ok::<_, ()>(sample(3.0 * dv.span, 0.0))).unwrap();
        let span = &result[0];
        assert_eq!(span.variable, DesignVariable::Span);
        // one percent of 40 m is 0.4 m, times a slope of 3
        assert_relative_eq!(span.d_objective, 1.2, max_relative = 1e-9);
        assert_relative_eq!(span.step, 0.04, max_relative = 1e-12);
        assert_relative_eq!(span.minus.objective, 3.0 * 40.0 * 0.999, max_relative = 1e-12);
    }

    #[test]
    fn quadratic_matches_derivative() {
        let result = sweep(baseline(), 0.1, false, |dv| Ok::<_, ()>(sample(0.0, dv.chord.powi(2)))).unwrap();
        let chord = result.iter().find(|s| s.variable == DesignVariable::Chord).unwrap();
        // d(c^2)/dc * c/100
        assert_relative_eq!(chord.d_range, 2.0 * 7.5 * 7.5 / 100.0, max_relative = 1e-6);
    }

    #[test]
    fn eight_evaluations_in_variable_order() {
        let count = AtomicUsize::new(0);
        let result = sweep(baseline(), 0.1, false, |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(sample(1.0, 1.0))
        })
        .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 8);
        let order: Vec<_> = result.iter().map(|s| s.variable).collect();
        assert_eq!(order, DesignVariable::ALL.to_vec());
    }

    #[test]
    fn parallel_matches_sequential() {
        let f = |dv: DesignVariables| Ok::<_, ()>(sample(dv.span * dv.chord / dv.thickness, dv.sweep.cos() * dv.span));
        let seq = sweep(baseline(), 0.1, false, f).unwrap();
        let par = sweep(baseline(), 0.1, true, f).unwrap();
        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.variable, b.variable);
            assert_eq!(a.d_objective, b.d_objective);
            assert_eq!(a.d_range, b.d_range);
        }
    }

    #[test]
    fn first_error_is_returned() {
        let result = sweep(baseline(), 0.1, false, |dv| {
            if dv.thickness != 1.2 {
                Err("thin spar")
            } else {
                Ok(sample(1.0, 1.0))
            }
        });
        assert_eq!(result.unwrap_err(), "thin spar");
    }

    #[test]
    fn degraded_samples_are_flagged() {
        let result = sweep(baseline(), 0.1, false, |dv| {
            Ok::<_, ()>(Sample { objective: 1.0, range: 1.0, degraded: dv.sweep > 0.5 })
        })
        .unwrap();
        assert!(result[3].degraded());
        assert!(!result[0].degraded());
    }
}
