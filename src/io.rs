use crate::evaluate::Evaluation;
use crate::sensitivity::Sensitivity;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct CsvWriter<W: Write> {
    w: W,
}

impl CsvWriter<BufWriter<File>> {
    /// Create the file, and its parent directory if needed.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let f = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self::new(BufWriter::new(f)))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    pub fn write_evaluation_header(&mut self) -> Result<()> {
        writeln!(
            self.w,
            "case,span,sweep_rad,spar_thickness,chord,empty_kg,landing_kg,takeoff_kg,passengers,structure_kg,propulsion_kg,cl,alpha_deg,cdi,cdv,cd,lift_to_drag,range_m,objective_kg_s,degraded"
        )?;
        Ok(())
    }

    pub fn write_evaluation(&mut self, case: &str, ev: &Evaluation) -> Result<()> {
        let d = &ev.design;
        let m = &ev.masses;
        writeln!(
            self.w,
            "{},{:.6},{:.6},{:.6},{:.6},{:.3},{:.3},{:.3},{:.1},{:.3},{:.3},{:.6},{:.4},{:.6e},{:.6e},{:.6e},{:.4},{:.1},{:.6e},{}",
            case,
            d.span,
            d.sweep,
            d.thickness,
            d.chord,
            m.empty,
            m.landing,
            m.takeoff,
            m.passengers,
            m.structure,
            m.propulsion,
            ev.cl,
            ev.drag.alpha,
            ev.drag.cdi,
            ev.drag.cdv,
            ev.drag.cd,
            ev.lift_to_drag,
            ev.range,
            ev.objective(),
            ev.drag.is_degraded()
        )?;
        Ok(())
    }

    pub fn write_sensitivity_header(&mut self) -> Result<()> {
        writeln!(
            self.w,
            "variable,baseline,step,objective_minus,objective_plus,range_minus,range_plus,d_objective_per_pct,d_range_per_pct,degraded"
        )?;
        Ok(())
    }

    pub fn write_sensitivity(&mut self, s: &Sensitivity) -> Result<()> {
        writeln!(
            self.w,
            "{},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{}",
            s.variable.name(),
            s.baseline,
            s.step,
            s.minus.objective,
            s.plus.objective,
            s.minus.range,
            s.plus.range,
            s.d_objective,
            s.d_range,
            s.degraded()
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.w
    }
}
