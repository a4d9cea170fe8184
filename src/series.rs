use crate::error::Error;
use crate::geometry::GeometryProfile;




/**
 * One timestamped spatial flow profile: volumetric rate [m³/s] at a set of
 * path positions [m]. Rates between the profile points are interpolated
 * linearly and clamped beyond them.
 */
#[derive(Debug, Clone)]
struct FlowProfile {
    time: f64,
    positions: Vec<f64>,
    rates: Vec<f64>,
}




/**
 * A time-keyed sequence of spatial flow profiles driving the transport.
 * The key grid doubles as the solver's macro-timestep grid. Immutable once
 * built; share it between solvers behind an `Arc`.
 *
 * Negative rates are clamped to zero on construction. The scheme handles
 * signed flow, but meter readings below zero are sensor noise on a line
 * that cannot back-flow.
 */
#[derive(Debug, Clone)]
pub struct FlowFieldSeries {
    profiles: Vec<FlowProfile>,
}




impl FlowFieldSeries {




    /**
     * Build from scalar rate readings, one per timestamp. Each reading
     * becomes the two-point profile `{x: [0, length], q: [rate, rate]}`,
     * spatially uniform along the path.
     */
    pub fn build(samples: &[(f64, f64)], length: f64) -> Result<Self, Error> {
        let entries = samples
            .iter()
            .map(|&(t, q)| (t, vec![0.0, length], vec![q, q]))
            .collect();
        Self::from_profiles(entries)
    }




    /**
     * Build from explicit `(time, positions, rates)` profiles, for flow
     * fields that vary along the path.
     */
    pub fn from_profiles(entries: Vec<(f64, Vec<f64>, Vec<f64>)>) -> Result<Self, Error> {
        if entries.len() < 2 {
            return Err(Error::Config(format!(
                "flow series needs at least 2 timestamps to span a step, got {}",
                entries.len()
            )));
        }
        let mut profiles = Vec::with_capacity(entries.len());

        for (time, positions, rates) in entries {
            if !time.is_finite() {
                return Err(Error::Config(format!("flow series key {} is not finite", time)));
            }
            if positions.len() != rates.len() || positions.len() < 2 {
                return Err(Error::Config(format!(
                    "flow profile at t = {} has {} positions for {} rates, need matching pairs of at least 2",
                    time,
                    positions.len(),
                    rates.len()
                )));
            }
            for &x in &positions {
                if !x.is_finite() {
                    return Err(Error::Config(format!(
                        "flow profile at t = {} contains non-finite position {}", time, x
                    )));
                }
            }
            for w in positions.windows(2) {
                if !(w[1] >= w[0]) {
                    return Err(Error::Config(format!(
                        "flow profile at t = {} has decreasing positions", time
                    )));
                }
            }
            for &q in &rates {
                if !q.is_finite() {
                    return Err(Error::Config(format!(
                        "flow profile at t = {} contains non-finite rate {}", time, q
                    )));
                }
            }
            let rates = rates.into_iter().map(|q| q.max(0.0)).collect();
            profiles.push(FlowProfile { time, positions, rates });
        }
        for w in profiles.windows(2) {
            if !(w[1].time > w[0].time) {
                return Err(Error::Config(format!(
                    "flow series keys must be strictly increasing, got {} after {}",
                    w[1].time, w[0].time
                )));
            }
        }
        Ok(Self { profiles })
    }


    pub fn len(&self) -> usize {
        self.profiles.len()
    }


    pub fn time(&self, k: usize) -> f64 {
        self.profiles[k].time
    }


    pub fn first_time(&self) -> f64 {
        self.profiles[0].time
    }




    /**
     * The index of the last key at or before `t`, clamped to the first key
     * for times preceding the series.
     */
    pub fn key_at_or_before(&self, t: f64) -> usize {
        let i = self.profiles.partition_point(|p| p.time <= t);
        i.saturating_sub(1)
    }




    /**
     * The flow rate [m³/s] at key index `k` and position `x`, interpolated
     * linearly along the profile and clamped beyond its ends.
     */
    pub fn rate_at(&self, k: usize, x: f64) -> f64 {
        let p = &self.profiles[k];
        let xs = &p.positions;
        let qs = &p.rates;

        if x <= xs[0] {
            return qs[0];
        }
        if x >= xs[xs.len() - 1] {
            return qs[qs.len() - 1];
        }
        let i = xs.partition_point(|&xk| xk <= x);
        let (x0, x1) = (xs[i - 1], xs[i]);
        qs[i - 1] + (qs[i] - qs[i - 1]) * (x - x0) / (x1 - x0)
    }




    /**
     * The largest cell-center transport speed `|q| / A` [m/s] at key `k`,
     * which sets the CFL sub-step count for the window starting there.
     */
    pub fn max_speed(&self, k: usize, geometry: &GeometryProfile) -> Result<f64, Error> {
        let mut fastest = 0.0_f64;

        for (&x, &a) in geometry.positions().iter().zip(geometry.areas()) {
            if !(a > 0.0) {
                return Err(Error::Config(format!(
                    "flow area {} at x = {} m is not positive", a, x
                )));
            }
            fastest = fastest.max(self.rate_at(k, x).abs() / a);
        }
        Ok(fastest)
    }
}




/**
 * How a boundary series fills the space between its samples.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the last observed value forward until the next sample.
    Previous,
    /// Blend linearly between the bracketing samples.
    Linear,
}




/**
 * The property value flowing in at the upstream end, as a `(time, value)`
 * series. Sampling clamps at both ends of the recorded range; there is no
 * extrapolation. Non-finite values in the input are gaps and are dropped,
 * the interpolation mode covers the holes they leave.
 *
 * Each solver owns its boundary series outright.
 */
#[derive(Debug, Clone)]
pub struct BoundaryCondition {
    times: Vec<f64>,
    values: Vec<f64>,
    mode: Interpolation,
}




impl BoundaryCondition {


    pub fn build(samples: &[(f64, f64)]) -> Result<Self, Error> {
        Self::with_mode(samples, Interpolation::Previous)
    }


    pub fn with_mode(samples: &[(f64, f64)], mode: Interpolation) -> Result<Self, Error> {
        let mut times = Vec::new();
        let mut values = Vec::new();

        for &(t, v) in samples {
            if !t.is_finite() {
                return Err(Error::Config(format!("boundary series key {} is not finite", t)));
            }
            if v.is_finite() {
                times.push(t);
                values.push(v);
            }
        }
        if times.is_empty() {
            return Err(Error::Config(
                "boundary series has no finite samples".to_string(),
            ));
        }
        for w in times.windows(2) {
            if !(w[1] > w[0]) {
                return Err(Error::Config(format!(
                    "boundary series keys must be strictly increasing, got {} after {}",
                    w[1], w[0]
                )));
            }
        }
        Ok(Self { times, values, mode })
    }


    pub fn first_time(&self) -> f64 {
        self.times[0]
    }




    /**
     * The boundary value at time `t`. Before the first sample this is the
     * first value; after the last, the last.
     */
    pub fn value_at(&self, t: f64) -> f64 {
        let i = self.times.partition_point(|&tk| tk <= t);

        if i == 0 {
            return self.values[0];
        }
        if i == self.times.len() {
            return self.values[i - 1];
        }
        match self.mode {
            Interpolation::Previous => self.values[i - 1],
            Interpolation::Linear => {
                let (t0, t1) = (self.times[i - 1], self.times[i]);
                let (v0, v1) = (self.values[i - 1], self.values[i]);
                v0 + (v1 - v0) * (t - t0) / (t1 - t0)
            }
        }
    }
}
