use std::path::PathBuf;

use log::Level;

use crate::error::Error;
use crate::scheme::{Limiter, Method};

/// Everything one tracked-property case needs beyond the shared geometry
/// and flow field. A config is immutable once handed to a solver and is
/// validated in full before any stepping, so a malformed case fails fast
/// instead of dying mid-run.
///
/// Exactly one of `initial_uniform` and `initial_profile` must be set:
/// either every cell starts at one value, or an explicit per-cell profile
/// is supplied.
#[derive(Debug, Clone)]
pub struct SolveConfig {
    pub case_name: String,
    pub method: Method,
    pub limiter: Limiter,
    pub initial_uniform: Option<f64>,
    pub initial_profile: Option<Vec<f64>>,
    /// Simulation start [epoch s]; must not precede the first key of the
    /// flow or boundary series.
    pub start_time: f64,
    /// Log severities this case emits. Anything not listed is discarded at
    /// the call site, never buffered.
    pub log_levels: Vec<Level>,
    pub write_output: bool,
    /// Estimated-size threshold [bytes] at which a result segment is
    /// flushed to disk.
    pub segment_bytes: usize,
    /// Record a snapshot every this many macro-steps.
    pub record_every: usize,
    pub output_dir: PathBuf,
}

impl SolveConfig {
    pub fn new<S: Into<String>>(case_name: S) -> Self {
        Self {
            case_name: case_name.into(),
            method: Method::FluxLimiter,
            limiter: Limiter::GeneralizedMinmod { beta: 1.0 },
            initial_uniform: None,
            initial_profile: None,
            start_time: 0.0,
            log_levels: vec![Level::Error, Level::Warn],
            write_output: true,
            segment_bytes: 1_000_000_000,
            record_every: 1,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_limiter(mut self, limiter: Limiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_uniform_initial(mut self, value: f64) -> Self {
        self.initial_uniform = Some(value);
        self
    }

    pub fn with_profile_initial(mut self, values: Vec<f64>) -> Self {
        self.initial_profile = Some(values);
        self
    }

    pub fn with_start_time(mut self, t: f64) -> Self {
        self.start_time = t;
        self
    }

    pub fn with_log_levels(mut self, levels: Vec<Level>) -> Self {
        self.log_levels = levels;
        self
    }

    pub fn with_write_output(mut self, on: bool) -> Self {
        self.write_output = on;
        self
    }

    pub fn with_segment_bytes(mut self, bytes: usize) -> Self {
        self.segment_bytes = bytes;
        self
    }

    pub fn with_record_every(mut self, every: usize) -> Self {
        self.record_every = every;
        self
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Whether this case wants messages of the given severity.
    pub fn level_enabled(&self, level: Level) -> bool {
        self.log_levels.contains(&level)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.case_name.is_empty() {
            return Err(Error::Config("case name must not be empty".to_string()));
        }
        match (&self.initial_uniform, &self.initial_profile) {
            (None, None) => {
                return Err(Error::Config(format!(
                    "case '{}': no initial condition, set exactly one of a uniform value or a profile",
                    self.case_name
                )));
            }
            (Some(_), Some(_)) => {
                return Err(Error::Config(format!(
                    "case '{}': both a uniform value and a profile given, set exactly one",
                    self.case_name
                )));
            }
            (Some(v), None) => {
                if !v.is_finite() {
                    return Err(Error::Config(format!(
                        "case '{}': initial value {} is not finite",
                        self.case_name, v
                    )));
                }
            }
            (None, Some(profile)) => {
                if let Some(v) = profile.iter().find(|v| !v.is_finite()) {
                    return Err(Error::Config(format!(
                        "case '{}': initial profile contains non-finite value {}",
                        self.case_name, v
                    )));
                }
            }
        }
        if !self.start_time.is_finite() {
            return Err(Error::Config(format!(
                "case '{}': start time {} is not finite",
                self.case_name, self.start_time
            )));
        }
        if self.record_every == 0 {
            return Err(Error::Config(format!(
                "case '{}': recording cadence must be at least 1 macro-step",
                self.case_name
            )));
        }
        if self.segment_bytes == 0 {
            return Err(Error::Config(format!(
                "case '{}': segment size threshold must be positive",
                self.case_name
            )));
        }
        self.limiter.validate()
    }
}
