use std::f64::consts::PI;

use crate::error::Error;




/**
 * Source of pipe-path measurements. Implementations answer for a route
 * between two named stations; the demo `TableModel` below serves a single
 * fixed path and ignores the station names.
 *
 * Lengths and positions are in meters, internal diameters in millimeters
 * (the unit pipe books record them in).
 */
pub trait PipelineModel {
    fn path_length(&self, from: &str, to: &str) -> Result<f64, Error>;

    fn path_diameters(&self, from: &str, to: &str, positions: &[f64]) -> Result<Vec<f64>, Error>;
}




/**
 * An immutable uniform grid over a pipe path, with the flow area at each
 * cell center. `nx = floor(length / target_dx)` cell positions are laid
 * out evenly over `[0, length]` inclusive of both ends, so the realized
 * spacing is `length / (nx - 1)` and is generally coarser than the
 * requested one.
 */
#[derive(Debug, Clone)]
pub struct GeometryProfile {
    positions: Vec<f64>,
    areas: Vec<f64>,
    dx: f64,
    length: f64,
}




impl GeometryProfile {




    /**
     * Build a grid of the given length, sampling the flow area [m²] from a
     * closure at each cell-center position.
     */
    pub fn build<F>(length: f64, target_dx: f64, area_fn: F) -> Result<Self, Error>
    where
        F: Fn(f64) -> f64,
    {
        let positions = grid_positions(length, target_dx)?;
        let areas: Vec<f64> = positions.iter().map(|&x| area_fn(x)).collect();
        Self::from_parts(length, positions, areas)
    }




    /**
     * Build a grid by querying a pipeline model for the path length and the
     * internal diameters at each cell center. Diameters [mm] convert to flow
     * areas as `pi * (d / 1000)^2 / 4`.
     */
    pub fn from_model<M>(model: &M, from: &str, to: &str, target_dx: f64) -> Result<Self, Error>
    where
        M: PipelineModel + ?Sized,
    {
        let length = model.path_length(from, to)?;
        let positions = grid_positions(length, target_dx)?;
        let diameters = model.path_diameters(from, to, &positions)?;

        if diameters.len() != positions.len() {
            return Err(Error::Config(format!(
                "geometry: model returned {} diameters for {} positions",
                diameters.len(),
                positions.len()
            )));
        }
        let areas = diameters
            .iter()
            .map(|&d| {
                if d.is_finite() && d > 0.0 {
                    Ok(PI * (d / 1000.0).powi(2) / 4.0)
                } else {
                    Err(Error::Config(format!(
                        "geometry: bad internal diameter {} mm from model",
                        d
                    )))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_parts(length, positions, areas)
    }


    fn from_parts(length: f64, positions: Vec<f64>, areas: Vec<f64>) -> Result<Self, Error> {
        for (&x, &a) in positions.iter().zip(&areas) {
            if !a.is_finite() || a <= 0.0 {
                return Err(Error::Config(format!(
                    "geometry: flow area at x = {} m is {}, must be positive",
                    x, a
                )));
            }
        }
        let dx = positions[1] - positions[0];
        Ok(Self {
            positions,
            areas,
            dx,
            length,
        })
    }


    pub fn n_cells(&self) -> usize {
        self.positions.len()
    }


    pub fn positions(&self) -> &[f64] {
        &self.positions
    }


    pub fn areas(&self) -> &[f64] {
        &self.areas
    }


    pub fn dx(&self) -> f64 {
        self.dx
    }


    pub fn length(&self) -> f64 {
        self.length
    }




    /**
     * The flow area at a cell face. Face `i` sits between cells `i - 1` and
     * `i`; faces 0 and `n_cells` are the path ends and take the adjacent
     * cell's area, interior faces the mean of their neighbors'.
     */
    pub fn face_area(&self, face: usize) -> f64 {
        let n = self.areas.len();
        if face == 0 {
            self.areas[0]
        } else if face == n {
            self.areas[n - 1]
        } else if face < n {
            0.5 * (self.areas[face - 1] + self.areas[face])
        } else {
            panic!("face {} out of range on grid with {} cells", face, n);
        }
    }
}




fn grid_positions(length: f64, target_dx: f64) -> Result<Vec<f64>, Error> {
    if !length.is_finite() || length <= 0.0 {
        return Err(Error::Config(format!(
            "geometry: path length must be positive, got {} m",
            length
        )));
    }
    if !target_dx.is_finite() || target_dx <= 0.0 {
        return Err(Error::Config(format!(
            "geometry: target spacing must be positive, got {} m",
            target_dx
        )));
    }

    let nx = (length / target_dx).floor() as usize;

    if nx < 2 {
        return Err(Error::Config(format!(
            "geometry: length {} m at target spacing {} m yields {} cells, need at least 2",
            length, target_dx, nx
        )));
    }
    Ok((0..nx)
        .map(|i| length * i as f64 / (nx - 1) as f64)
        .collect())
}




/**
 * A pipeline model backed by a fixed diameter-versus-position table for a
 * single path. Diameters are interpolated linearly between table rows and
 * clamped beyond them.
 */
pub struct TableModel {
    length: f64,
    diameters: Vec<(f64, f64)>,
}




impl TableModel {

    /// `diameters` rows are `(position [m], internal diameter [mm])` and
    /// must be sorted by position.
    pub fn new(length: f64, diameters: Vec<(f64, f64)>) -> Self {
        Self { length, diameters }
    }

    fn diameter_at(&self, x: f64) -> f64 {
        let rows = &self.diameters;
        if x <= rows[0].0 {
            return rows[0].1;
        }
        if x >= rows[rows.len() - 1].0 {
            return rows[rows.len() - 1].1;
        }
        let k = rows.partition_point(|row| row.0 <= x);
        let (x0, d0) = rows[k - 1];
        let (x1, d1) = rows[k];
        d0 + (d1 - d0) * (x - x0) / (x1 - x0)
    }
}




impl PipelineModel for TableModel {

    fn path_length(&self, _from: &str, _to: &str) -> Result<f64, Error> {
        Ok(self.length)
    }

    fn path_diameters(&self, _from: &str, _to: &str, positions: &[f64]) -> Result<Vec<f64>, Error> {
        if self.diameters.is_empty() {
            return Err(Error::Config(
                "geometry: diameter table is empty".to_string(),
            ));
        }
        Ok(positions.iter().map(|&x| self.diameter_at(x)).collect())
    }
}
