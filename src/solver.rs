use std::sync::Arc;

use log::{debug, error, info, warn, Level};
use serde::{Deserialize, Serialize};

use crate::config::SolveConfig;
use crate::error::Error;
use crate::geometry::GeometryProfile;
use crate::output::ResultWriter;
use crate::scheme::FluxScheme;
use crate::series::{BoundaryCondition, FlowFieldSeries};




/// Largest face Courant number a sub-step is allowed to see.
pub const CFL_MAX: f64 = 0.9;




/**
 * A value copy of the tracked field at one instant.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub values: Vec<f64>,
}




/**
 * Where a solver is in its life. Construction performs initialization, so
 * an uninitialized solver cannot be observed; any phase can move to
 * `Failed` on an unrecoverable error, and a failed solver stays failed.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Stepping,
    Done,
    Failed,
}




/**
 * Counters reported by a completed solve.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SolveStats {
    pub case: String,
    pub macro_steps: usize,
    pub sub_steps: usize,
    pub snapshots: usize,
    pub segments: u64,
    pub end_time: f64,
}




/**
 * Finite-volume advection of one tracked property along one pipe path.
 *
 * The field advances over macro-windows spanned by the flow series' key
 * grid. Within a window the flow profile and the upstream boundary value
 * are held at their window-start samples, and the window is cut into
 * however many sub-steps keep every face Courant number under `CFL_MAX`.
 * Each sub-step evaluates a limited face flux at all `n + 1` faces and
 * applies the conservative update
 *
 * ```text
 * a[i] -= sub_dt * (F[i + 1] - F[i]) / (A[i] * dx)
 * ```
 *
 * The upstream ghost cell carries the boundary value; the downstream ghost
 * repeats the last cell, so outflow leaves without reflection. Geometry
 * and flow are shared and immutable; the boundary series and the result
 * writer belong to this solver alone.
 */
pub struct AdvectionSolver {
    geometry: Arc<GeometryProfile>,
    flow: Arc<FlowFieldSeries>,
    boundary: BoundaryCondition,
    config: SolveConfig,
    scheme: FluxScheme,
    writer: Option<ResultWriter>,
    boundaries: Vec<f64>,
    values: Vec<f64>,
    flux: Vec<f64>,
    time: f64,
    step_index: usize,
    sub_steps: usize,
    snapshots: usize,
    last_recorded: usize,
    segments: u64,
    phase: Phase,
}




impl AdvectionSolver {




    /**
     * Validate the case against the shared inputs and set the initial
     * field. All configuration problems surface here, before any stepping.
     */
    pub fn new(
        geometry: Arc<GeometryProfile>,
        flow: Arc<FlowFieldSeries>,
        boundary: BoundaryCondition,
        config: SolveConfig,
    ) -> Result<Self, Error> {
        let log_errors = config.level_enabled(Level::Error);

        match Self::build(geometry, flow, boundary, config) {
            Ok(solver) => Ok(solver),
            Err(e) => {
                if log_errors {
                    error!("{}", e);
                }
                Err(e)
            }
        }
    }


    fn build(
        geometry: Arc<GeometryProfile>,
        flow: Arc<FlowFieldSeries>,
        boundary: BoundaryCondition,
        config: SolveConfig,
    ) -> Result<Self, Error> {
        config.validate()?;

        let n = geometry.n_cells();
        let values = if let Some(v) = config.initial_uniform {
            vec![v; n]
        } else if let Some(profile) = &config.initial_profile {
            if profile.len() != n {
                return Err(Error::Config(format!(
                    "case '{}': initial profile has {} values for {} cells",
                    config.case_name,
                    profile.len(),
                    n
                )));
            }
            profile.clone()
        } else {
            return Err(Error::Config(format!(
                "case '{}': no initial condition",
                config.case_name
            )));
        };

        if config.start_time > flow.first_time() {
            return Err(Error::Config(format!(
                "case '{}': start time {} is after the first flow sample at {}",
                config.case_name,
                config.start_time,
                flow.first_time()
            )));
        }
        if config.start_time > boundary.first_time() {
            return Err(Error::Config(format!(
                "case '{}': start time {} is after the first boundary sample at {}",
                config.case_name,
                config.start_time,
                boundary.first_time()
            )));
        }
        if config.start_time < flow.first_time() || config.start_time < boundary.first_time() {
            if config.level_enabled(Level::Warn) {
                warn!(
                    "[{}] start {} precedes the first recorded sample, clamped sampling in effect",
                    config.case_name, config.start_time
                );
            }
        }

        let mut boundaries = vec![config.start_time];
        for k in 0..flow.len() {
            let t = flow.time(k);
            if t > config.start_time {
                boundaries.push(t);
            }
        }

        let mut writer = if config.write_output {
            Some(ResultWriter::new(
                config.output_dir.clone(),
                &config.case_name,
                config.segment_bytes,
            ))
        } else {
            None
        };
        let initial = Snapshot {
            time: config.start_time,
            values: values.clone(),
        };
        if let Some(w) = writer.as_mut() {
            w.append(initial)?;
        }

        let scheme = FluxScheme::new(config.method, config.limiter);
        let time = config.start_time;
        Ok(Self {
            geometry,
            flow,
            boundary,
            config,
            scheme,
            writer,
            boundaries,
            values,
            flux: vec![0.0; n + 1],
            time,
            step_index: 0,
            sub_steps: 0,
            snapshots: 1,
            last_recorded: 0,
            segments: 0,
            phase: Phase::Ready,
        })
    }


    pub fn case(&self) -> &str {
        &self.config.case_name
    }


    pub fn phase(&self) -> Phase {
        self.phase
    }


    pub fn time(&self) -> f64 {
        self.time
    }


    pub fn values(&self) -> &[f64] {
        &self.values
    }


    fn snapshot(&self) -> Snapshot {
        Snapshot {
            time: self.time,
            values: self.values.clone(),
        }
    }


    fn fail(&mut self, error: Error) -> Error {
        self.phase = Phase::Failed;
        self.writer = None;
        if self.config.level_enabled(Level::Error) {
            error!("{}", error);
        }
        error
    }




    /**
     * Advance one macro-window. Returns the post-step snapshot when this
     * step lands on the recording cadence, `None` when stepping silently
     * or when there is nothing left to do.
     */
    pub fn step(&mut self) -> Result<Option<Snapshot>, Error> {
        match self.phase {
            Phase::Done | Phase::Failed => return Ok(None),
            Phase::Ready | Phase::Stepping => {}
        }
        if self.step_index + 1 >= self.boundaries.len() {
            self.phase = Phase::Done;
            return Ok(None);
        }

        let t0 = self.boundaries[self.step_index];
        let t1 = self.boundaries[self.step_index + 1];
        let dt = t1 - t0;
        let key = self.flow.key_at_or_before(t0);
        let inflow = self.boundary.value_at(t0);

        let max_speed = match self.flow.max_speed(key, &self.geometry) {
            Ok(s) => s,
            Err(Error::Config(reason)) => {
                return Err(self.fail(Error::Numerical {
                    case: self.config.case_name.clone(),
                    time: t0,
                    detail: reason,
                }))
            }
            Err(other) => return Err(self.fail(other)),
        };
        let n_sub = ((max_speed * dt / (CFL_MAX * self.geometry.dx())).ceil() as usize).max(1);
        let sub_dt = dt / n_sub as f64;

        if self.config.level_enabled(Level::Debug) {
            debug!(
                "[{}] window {} [{}, {}] in {} sub-steps",
                self.config.case_name, self.step_index, t0, t1, n_sub
            );
        }
        for _ in 0..n_sub {
            if let Err(e) = self.sub_step(key, inflow, sub_dt) {
                return Err(self.fail(e));
            }
            self.sub_steps += 1;
        }
        self.time = t1;
        self.step_index += 1;
        self.phase = if self.step_index + 1 >= self.boundaries.len() {
            Phase::Done
        } else {
            Phase::Stepping
        };

        if self.step_index % self.config.record_every == 0 {
            self.last_recorded = self.step_index;
            let snapshot = self.snapshot();
            self.record(snapshot.clone())?;
            Ok(Some(snapshot))
        } else {
            Ok(None)
        }
    }


    fn sub_step(&mut self, key: usize, inflow: f64, sub_dt: f64) -> Result<(), Error> {
        let n = self.values.len();
        let dx = self.geometry.dx();
        {
            let geometry = self.geometry.as_ref();
            let flow = self.flow.as_ref();
            let scheme = self.scheme;
            let x = geometry.positions();
            let values = &self.values;
            let flux = &mut self.flux;

            for face in 0..=n {
                let xf = if face == 0 {
                    x[0]
                } else if face == n {
                    x[n - 1]
                } else {
                    0.5 * (x[face - 1] + x[face])
                };
                let q = flow.rate_at(key, xf);
                let nu = (q / geometry.face_area(face)).abs() * sub_dt / dx;

                let (far_upwind, upwind, downwind) = if q >= 0.0 {
                    (
                        stencil_value(values, inflow, face as isize - 2),
                        stencil_value(values, inflow, face as isize - 1),
                        stencil_value(values, inflow, face as isize),
                    )
                } else {
                    (
                        stencil_value(values, inflow, face as isize + 1),
                        stencil_value(values, inflow, face as isize),
                        stencil_value(values, inflow, face as isize - 1),
                    )
                };
                flux[face] = scheme.face_flux(q, nu, far_upwind, upwind, downwind);
            }
        }

        let areas = self.geometry.areas();
        for i in 0..n {
            self.values[i] -= sub_dt * (self.flux[i + 1] - self.flux[i]) / (areas[i] * dx);
        }
        self.time += sub_dt;

        if let Some(i) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(Error::Numerical {
                case: self.config.case_name.clone(),
                time: self.time,
                detail: format!("field value {} in cell {}", self.values[i], i),
            });
        }
        Ok(())
    }


    fn record(&mut self, snapshot: Snapshot) -> Result<(), Error> {
        self.snapshots += 1;
        let result = match self.writer.as_mut() {
            Some(w) => w.append(snapshot),
            None => Ok(()),
        };
        result.map_err(|e| self.fail(e))
    }




    /**
     * Flush the residual output segment and report the solve counters.
     * The final state is always recorded, whatever the cadence. A failed
     * solve cannot be finalized: its buffered output was discarded at the
     * point of failure, and nothing of the poisoned state reaches disk.
     */
    pub fn finalize(&mut self) -> Result<SolveStats, Error> {
        if self.phase == Phase::Failed {
            return Err(Error::Numerical {
                case: self.config.case_name.clone(),
                time: self.time,
                detail: "cannot finalize a failed solve".to_string(),
            });
        }
        self.phase = Phase::Done;
        if self.step_index > self.last_recorded {
            self.last_recorded = self.step_index;
            let snapshot = self.snapshot();
            self.record(snapshot)?;
        }
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(count) => self.segments = count,
                Err(e) => return Err(self.fail(e)),
            }
        }
        let stats = SolveStats {
            case: self.config.case_name.clone(),
            macro_steps: self.step_index,
            sub_steps: self.sub_steps,
            snapshots: self.snapshots,
            segments: self.segments,
            end_time: self.time,
        };
        if self.config.level_enabled(Level::Info) {
            info!(
                "[{}] done: {} macro-steps, {} sub-steps, {} snapshots, {} segments, t = {}",
                stats.case,
                stats.macro_steps,
                stats.sub_steps,
                stats.snapshots,
                stats.segments,
                stats.end_time
            );
        }
        Ok(stats)
    }




    /**
     * Drive the solve across every macro-window and finalize the output.
     */
    pub fn run(&mut self) -> Result<SolveStats, Error> {
        loop {
            match self.phase {
                Phase::Ready | Phase::Stepping => {
                    self.step()?;
                }
                Phase::Done => return self.finalize(),
                Phase::Failed => {
                    return Err(Error::Numerical {
                        case: self.config.case_name.clone(),
                        time: self.time,
                        detail: "solve has already failed".to_string(),
                    })
                }
            }
        }
    }
}




fn stencil_value(values: &[f64], inflow: f64, i: isize) -> f64 {
    if i < 0 {
        inflow
    } else if (i as usize) < values.len() {
        values[i as usize]
    } else {
        values[values.len() - 1]
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::output::load_case;
    use crate::scheme::Limiter;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn uniform_geometry(length: f64, target_dx: f64, area: f64) -> Arc<GeometryProfile> {
        Arc::new(GeometryProfile::build(length, target_dx, |_| area).unwrap())
    }

    fn steady_flow(rate: f64, keys: usize, dt: f64, length: f64) -> Arc<FlowFieldSeries> {
        let samples: Vec<_> = (0..keys).map(|k| (k as f64 * dt, rate)).collect();
        Arc::new(FlowFieldSeries::build(&samples, length).unwrap())
    }

    fn quiet(config: SolveConfig) -> SolveConfig {
        config.with_log_levels(vec![]).with_write_output(false)
    }

    #[test]
    fn zero_flow_is_exactly_stationary() {
        let geometry = uniform_geometry(1000.0, 100.0, 0.636);
        let flow = steady_flow(0.0, 4, 3600.0, 1000.0);
        let initial = vec![5.0, 3.0, 8.0, 1.0, 4.0, 9.0, 2.0, 7.0, 6.0, 0.5];
        let boundary = BoundaryCondition::build(&[(0.0, 42.0)]).unwrap();
        let config = quiet(SolveConfig::new("rho").with_profile_initial(initial.clone()));

        let mut solver = AdvectionSolver::new(geometry, flow, boundary, config).unwrap();
        let stats = solver.run().unwrap();

        assert_eq!(stats.macro_steps, 3);
        assert_eq!(solver.values(), initial.as_slice());
        assert_eq!(solver.phase(), Phase::Done);
    }

    #[test]
    fn zero_flow_is_stationary_even_for_extreme_magnitudes() {
        // cell differences overflow f64 here, but no flow means no flux
        let geometry = uniform_geometry(1000.0, 100.0, 1.0);
        let flow = steady_flow(0.0, 3, 600.0, 1000.0);
        let initial: Vec<f64> = (0..10)
            .map(|i| if i % 2 == 0 { 1e308 } else { -1e308 })
            .collect();
        let boundary = BoundaryCondition::build(&[(0.0, 0.0)]).unwrap();
        let config = quiet(SolveConfig::new("rho").with_profile_initial(initial.clone()));

        let mut solver = AdvectionSolver::new(geometry, flow, boundary, config).unwrap();
        solver.run().unwrap();

        assert_eq!(solver.values(), initial.as_slice());
        assert_eq!(solver.phase(), Phase::Done);
    }

    #[test]
    fn a_uniform_field_passes_through_unchanged() {
        let geometry = uniform_geometry(1000.0, 100.0, 0.5);
        let flow = steady_flow(0.3, 5, 600.0, 1000.0);
        let boundary = BoundaryCondition::build(&[(0.0, 999.0)]).unwrap();
        let config = quiet(SolveConfig::new("rho").with_uniform_initial(999.0));

        let mut solver = AdvectionSolver::new(geometry, flow, boundary, config).unwrap();
        solver.run().unwrap();

        for &v in solver.values() {
            assert_eq!(v, 999.0);
        }
    }

    #[test]
    fn a_front_advects_at_the_flow_speed_and_stays_monotone() {
        // unit area and 1 m³/s, so the front moves at exactly 1 m/s
        let geometry = uniform_geometry(1000.0, 10.0, 1.0);
        let flow = steady_flow(1.0, 4, 100.0, 1000.0);
        let initial: Vec<f64> = geometry
            .positions()
            .iter()
            .map(|&x| if x < 200.0 { 1.0 } else { 0.0 })
            .collect();
        let boundary = BoundaryCondition::build(&[(0.0, 1.0)]).unwrap();
        let config = quiet(SolveConfig::new("rho").with_profile_initial(initial.clone()));

        let mut solver =
            AdvectionSolver::new(geometry.clone(), flow, boundary, config).unwrap();
        solver.run().unwrap();

        let dx = geometry.dx();
        let x = geometry.positions();
        let values = solver.values();

        // monotone front, no overshoot on either plateau
        for w in values.windows(2) {
            assert!(w[1] <= w[0] + 1e-12);
        }
        for &v in values {
            assert!(v >= -1e-12 && v <= 1.0 + 1e-12);
        }

        // the half-height crossing sits within a few cells of x = 500
        let front = x
            .iter()
            .zip(values)
            .find(|(_, &v)| v < 0.5)
            .map(|(&x, _)| x)
            .unwrap();
        assert!(
            (front - 500.0).abs() <= 6.0 * dx,
            "front at {} after 300 s",
            front
        );

        // the transition zone stays a handful of cells wide
        let width = values.iter().filter(|&&v| v > 0.05 && v < 0.95).count();
        assert!(width <= 8, "front smeared over {} cells", width);

        // inflow added exactly 300 m³ of marked fluid, none left the far end
        let mass = |vals: &[f64]| -> f64 { vals.iter().map(|v| v * 1.0 * dx).sum() };
        assert!((mass(values) - mass(&initial) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn a_batch_change_at_the_inlet_marches_downstream() {
        // the boundary switches batches at t = 100 s; at 1 m/s the new
        // front has reached x = 200 m when the series runs out
        let geometry = uniform_geometry(1000.0, 10.0, 1.0);
        let flow = steady_flow(1.0, 4, 100.0, 1000.0);
        let boundary =
            BoundaryCondition::build(&[(0.0, 850.0), (100.0, 860.0)]).unwrap();
        let config = quiet(SolveConfig::new("rho").with_uniform_initial(850.0));

        let mut solver =
            AdvectionSolver::new(geometry.clone(), flow, boundary, config).unwrap();
        solver.run().unwrap();

        let values = solver.values();

        // monotone from the new batch at the inlet down to the old one
        for w in values.windows(2) {
            assert!(w[1] <= w[0] + 1e-12);
        }
        for &v in values {
            assert!(v >= 850.0 - 1e-9 && v <= 860.0 + 1e-9);
        }
        assert!(values[0] > 859.999, "inlet cell at {}", values[0]);

        // cells the front cannot have reached still hold the old batch
        assert_eq!(values[values.len() - 1], 850.0);
        let front = geometry
            .positions()
            .iter()
            .zip(values)
            .find(|(_, &v)| v < 855.0)
            .map(|(&x, _)| x)
            .unwrap();
        assert!(
            (front - 200.0).abs() <= 6.0 * geometry.dx(),
            "front at {} after 200 s in transit",
            front
        );
    }

    #[test]
    fn no_new_extrema_under_random_flows_and_profiles() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for trial in 0..6 {
            let limiter = match trial % 3 {
                0 => Limiter::GeneralizedMinmod { beta: 1.5 },
                1 => Limiter::Superbee,
                _ => Limiter::VanLeer,
            };
            let geometry = uniform_geometry(500.0, 10.0, 0.5);
            let samples: Vec<_> = (0..11)
                .map(|k| (k as f64 * 60.0, rng.gen_range(0.0..0.4)))
                .collect();
            let flow = Arc::new(FlowFieldSeries::build(&samples, 500.0).unwrap());
            let initial: Vec<f64> = (0..geometry.n_cells())
                .map(|_| rng.gen_range(0.0..10.0))
                .collect();
            // a fresh inflow value every window, on the same key grid
            let inflow: Vec<(f64, f64)> = (0..11)
                .map(|k| (k as f64 * 60.0, rng.gen_range(0.0..10.0)))
                .collect();
            let boundary = BoundaryCondition::build(&inflow).unwrap();

            let data = || initial.iter().chain(inflow.iter().map(|(_, v)| v));
            let lo = data().fold(f64::MAX, |acc, &v| acc.min(v));
            let hi = data().fold(f64::MIN, |acc, &v| acc.max(v));

            let config = quiet(
                SolveConfig::new("rho")
                    .with_profile_initial(initial)
                    .with_limiter(limiter),
            );
            let mut solver =
                AdvectionSolver::new(geometry, flow, boundary, config).unwrap();

            loop {
                solver.step().unwrap();
                let (min, max) = solver
                    .values()
                    .iter()
                    .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                assert!(
                    min >= lo - 1e-9 && max <= hi + 1e-9,
                    "extrema [{}, {}] escaped [{}, {}] in trial {}",
                    min,
                    max,
                    lo,
                    hi,
                    trial
                );
                if solver.phase() == Phase::Done {
                    break;
                }
            }
        }
    }

    #[test]
    fn overflow_to_non_finite_fails_the_solver_with_context() {
        let geometry = uniform_geometry(1000.0, 100.0, 1.0);
        let flow = steady_flow(5.0, 3, 600.0, 1000.0);
        let initial: Vec<f64> = (0..10)
            .map(|i| if i % 2 == 0 { 1e308 } else { -1e308 })
            .collect();
        let boundary = BoundaryCondition::build(&[(0.0, 0.0)]).unwrap();
        let config = quiet(SolveConfig::new("bad").with_profile_initial(initial));

        let mut solver = AdvectionSolver::new(geometry, flow, boundary, config).unwrap();
        let err = solver.run().unwrap_err();

        match err {
            Error::Numerical { case, .. } => assert_eq!(case, "bad"),
            other => panic!("expected a numerical failure, got {}", other),
        }
        assert_eq!(solver.phase(), Phase::Failed);

        // a failed solver refuses to keep stepping
        assert!(matches!(solver.step(), Ok(None)));
    }

    #[test]
    fn a_failed_solve_refuses_to_finalize_and_withholds_its_output() {
        let dir = TempDir::new().unwrap();
        let geometry = uniform_geometry(1000.0, 100.0, 1.0);
        let samples = [(0.0, 0.0), (600.0, 5.0), (1200.0, 5.0)];
        let flow = Arc::new(FlowFieldSeries::build(&samples, 1000.0).unwrap());
        let initial: Vec<f64> = (0..10)
            .map(|i| if i % 2 == 0 { 1e308 } else { -1e308 })
            .collect();
        let boundary = BoundaryCondition::build(&[(0.0, 0.0)]).unwrap();
        let config = SolveConfig::new("bad")
            .with_profile_initial(initial)
            .with_log_levels(vec![])
            .with_record_every(2)
            .with_output_dir(dir.path());

        let mut solver = AdvectionSolver::new(geometry, flow, boundary, config).unwrap();

        // the quiescent first window passes but falls between record
        // points, the second window overflows mid-step
        assert!(solver.step().unwrap().is_none());
        assert!(solver.step().is_err());
        assert_eq!(solver.phase(), Phase::Failed);

        // nothing of the poisoned state may reach disk
        match solver.finalize() {
            Err(Error::Numerical { case, .. }) => assert_eq!(case, "bad"),
            other => panic!("expected the failure to stick, got {:?}", other),
        }
        assert!(matches!(solver.run(), Err(Error::Numerical { .. })));
        assert!(load_case(dir.path(), "bad").unwrap().is_empty());
    }

    #[test]
    fn construction_rejects_mismatched_cases() {
        let geometry = uniform_geometry(1000.0, 100.0, 1.0);
        let flow = steady_flow(1.0, 3, 600.0, 1000.0);
        let boundary = || BoundaryCondition::build(&[(0.0, 1.0)]).unwrap();

        // profile length must match the grid
        let config = quiet(SolveConfig::new("rho").with_profile_initial(vec![1.0; 7]));
        assert!(
            AdvectionSolver::new(geometry.clone(), flow.clone(), boundary(), config).is_err()
        );

        // the start time may not postdate the series
        let config = quiet(
            SolveConfig::new("rho")
                .with_uniform_initial(1.0)
                .with_start_time(50.0),
        );
        assert!(
            AdvectionSolver::new(geometry.clone(), flow.clone(), boundary(), config).is_err()
        );

        // but it may predate them, with clamped sampling
        let config = quiet(
            SolveConfig::new("rho")
                .with_uniform_initial(1.0)
                .with_start_time(-100.0),
        );
        let mut solver =
            AdvectionSolver::new(geometry, flow, boundary(), config).unwrap();
        let stats = solver.run().unwrap();
        assert_eq!(stats.macro_steps, 3);
        assert_eq!(stats.end_time, 1200.0);
    }

    #[test]
    fn cadence_thins_snapshots_but_keeps_the_final_state() {
        let geometry = uniform_geometry(1000.0, 100.0, 1.0);
        let flow = steady_flow(0.5, 6, 600.0, 1000.0);
        let boundary = BoundaryCondition::build(&[(0.0, 2.0)]).unwrap();
        let config = quiet(
            SolveConfig::new("rho")
                .with_uniform_initial(2.0)
                .with_record_every(3),
        );

        let mut solver = AdvectionSolver::new(geometry, flow, boundary, config).unwrap();
        let mut returned = Vec::new();
        loop {
            if let Some(snapshot) = solver.step().unwrap() {
                returned.push(snapshot.time);
            }
            if solver.phase() == Phase::Done {
                break;
            }
        }
        let stats = solver.finalize().unwrap();

        // initial + step 3 + the final state recorded by finalize
        assert_eq!(returned, vec![1800.0]);
        assert_eq!(stats.macro_steps, 5);
        assert_eq!(stats.snapshots, 3);
    }
}
