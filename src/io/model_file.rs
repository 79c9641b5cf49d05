//! Save and load fitted splines.
//!
//! A saved spline is a JSON document holding the knot vectors, degrees and
//! control points. The layout is an implementation detail: it is only
//! guaranteed to be readable by [`load`] from the same crate version.
//! Loading goes through the regular constructors, so a tampered document is
//! rejected with the same errors as bad arguments would be.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SplineError};
use crate::models::BSpline;

#[derive(Debug, Serialize, Deserialize)]
struct SplineSnapshot {
    degrees: Vec<usize>,
    knot_vectors: Vec<Vec<f64>>,
    coefficients: Vec<f64>,
    /// One row per input variable.
    knot_averages: Vec<Vec<f64>>,
}

impl From<&BSpline> for SplineSnapshot {
    fn from(spline: &BSpline) -> Self {
        Self {
            degrees: spline.basis_degrees(),
            knot_vectors: spline.knot_vectors(),
            coefficients: spline.coefficients().iter().copied().collect(),
            knot_averages: spline
                .knot_averages()
                .row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
        }
    }
}

impl SplineSnapshot {
    fn into_spline(self) -> Result<BSpline> {
        let mut spline =
            BSpline::with_coefficients(&self.coefficients, self.knot_vectors, &self.degrees)?;

        let n = self.coefficients.len();
        let mut control_points = DMatrix::zeros(self.knot_averages.len() + 1, n);
        for (r, row) in self.knot_averages.iter().chain([&self.coefficients]).enumerate() {
            if row.len() != n {
                return Err(SplineError::InconsistentControlPoints(format!(
                    "control point row {r} has {} entries, expected {n}",
                    row.len()
                )));
            }
            control_points.row_mut(r).copy_from_slice(row);
        }
        spline.set_control_points(&control_points)?;
        Ok(spline)
    }
}

pub fn save(spline: &BSpline) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&SplineSnapshot::from(spline))?)
}

pub fn load(bytes: &[u8]) -> Result<BSpline> {
    let snapshot: SplineSnapshot = serde_json::from_slice(bytes)?;
    snapshot.into_spline()
}

pub fn save_to_file(spline: &BSpline, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &SplineSnapshot::from(spline))?;
    writer.flush()?;
    debug!(path = %path.display(), "saved spline");
    Ok(())
}

pub fn load_from_file(path: &Path) -> Result<BSpline> {
    let reader = BufReader::new(File::open(path)?);
    let snapshot: SplineSnapshot = serde_json::from_reader(reader)?;
    let spline = snapshot.into_spline()?;
    debug!(path = %path.display(), %spline, "loaded spline");
    Ok(spline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{grid_samples, linspace};
    use crate::domain::Degree;
    use crate::error::ErrorKind;
    use crate::fit::BSplineBuilder;

    fn fitted() -> BSpline {
        let data = grid_samples(&[linspace(0.0, 1.0, 6), linspace(0.0, 2.0, 5)], |x| {
            x[0] * x[1] + x[1]
        })
        .unwrap();
        BSplineBuilder::new(&data)
            .degrees(vec![Degree::Quadratic, Degree::Linear])
            .build()
            .unwrap()
    }

    #[test]
    fn bytes_round_trip_preserves_model() {
        let spline = fitted();
        let loaded = load(&save(&spline).unwrap()).unwrap();
        assert_eq!(loaded.knot_vectors(), spline.knot_vectors());
        assert_eq!(loaded.basis_degrees(), spline.basis_degrees());
        assert_eq!(loaded.control_points(), spline.control_points());
        assert_eq!(loaded.eval(&[0.4, 1.3]).unwrap(), spline.eval(&[0.4, 1.3]).unwrap());
    }

    #[test]
    fn file_round_trip() {
        let spline = fitted();
        let path = std::env::temp_dir().join(format!("splinter-{}.json", std::process::id()));
        save_to_file(&spline, &path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, spline);
    }

    #[test]
    fn corrupt_input_is_rejected() {
        let err = load(b"{ not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);

        let bad = br#"{"degrees":[1],"knot_vectors":[[0,0,1,1]],"coefficients":[1,2,3],"knot_averages":[[0,1,2]]}"#;
        assert!(matches!(
            load(bad),
            Err(SplineError::InconsistentControlPoints(_))
        ));

        let missing = std::env::temp_dir().join("splinter-does-not-exist.json");
        assert_eq!(load_from_file(&missing).unwrap_err().kind(), ErrorKind::Persistence);
    }
}
