use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use log::{info, warn};

use crate::config::SolveConfig;
use crate::error::Error;
use crate::geometry::GeometryProfile;
use crate::series::{BoundaryCondition, FlowFieldSeries};
use crate::solver::{AdvectionSolver, SolveStats};

/// How one case ended.
#[derive(Debug)]
pub enum Outcome {
    Completed(SolveStats),
    Failed(Error),
    TimedOut { limit: Duration },
}

impl fmt::Display for Outcome {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Outcome::Completed(stats) => write!(
                fmt,
                "completed t = {} after {} macro-steps ({} sub-steps, {} segments)",
                stats.end_time, stats.macro_steps, stats.sub_steps, stats.segments
            ),
            Outcome::Failed(error) => write!(fmt, "failed: {}", error),
            Outcome::TimedOut { limit } => write!(fmt, "timed out after {:?}", limit),
        }
    }
}

/// The per-case result of a run, in the order the cases were submitted.
#[derive(Debug)]
pub struct CaseReport {
    pub case: String,
    pub outcome: Outcome,
}

impl CaseReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, Outcome::Completed(_))
    }
}

/// Runs a batch of tracked-property cases against one shared geometry and
/// flow field, each case on its own thread with its own solver, boundary
/// series, and output writer. The cases are few and long-running, so a
/// plain thread per case beats pooling them.
///
/// Failure isolation is the contract: a case that fails its solve, or
/// panics, is reported as `Failed` and never disturbs its siblings. With a
/// deadline set, cases still unfinished when it expires are reported
/// `TimedOut` and their threads abandoned to run out on their own.
pub struct SolverOrchestrator {
    geometry: Arc<GeometryProfile>,
    flow: Arc<FlowFieldSeries>,
    timeout: Option<Duration>,
}

impl SolverOrchestrator {
    pub fn new(geometry: Arc<GeometryProfile>, flow: Arc<FlowFieldSeries>) -> Self {
        Self {
            geometry,
            flow,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Run every case to completion, failure, or the deadline. The report
    /// vector lines up with the submitted case order.
    pub fn run_all(&self, cases: Vec<(SolveConfig, BoundaryCondition)>) -> Vec<CaseReport> {
        let (sender, receiver) = unbounded();
        let deadline = self.timeout.map(|limit| Instant::now() + limit);
        let mut names = Vec::with_capacity(cases.len());
        let mut handles = Vec::with_capacity(cases.len());

        for (slot, (config, boundary)) in cases.into_iter().enumerate() {
            names.push(config.case_name.clone());
            let geometry = self.geometry.clone();
            let flow = self.flow.clone();
            let sender = sender.clone();
            handles.push(thread::spawn(move || {
                let outcome = run_case(geometry, flow, boundary, config);
                sender.send((slot, outcome)).ok();
            }));
        }
        drop(sender);

        let mut outcomes: Vec<Option<Outcome>> = names.iter().map(|_| None).collect();
        let mut remaining = outcomes.len();
        while remaining > 0 {
            let received = match deadline {
                Some(at) => receiver.recv_deadline(at).ok(),
                None => receiver.recv().ok(),
            };
            match received {
                Some((slot, outcome)) => {
                    outcomes[slot] = Some(outcome);
                    remaining -= 1;
                }
                None => break,
            }
        }
        if remaining == 0 {
            for handle in handles {
                handle.join().ok();
            }
        }

        let limit = self.timeout.unwrap_or_default();
        let reports: Vec<CaseReport> = names
            .into_iter()
            .zip(outcomes)
            .map(|(case, outcome)| {
                let outcome = outcome.unwrap_or(Outcome::TimedOut { limit });
                if let Outcome::TimedOut { .. } = outcome {
                    warn!(
                        "{}",
                        Error::Timeout {
                            case: case.clone(),
                            limit
                        }
                    );
                }
                CaseReport { case, outcome }
            })
            .collect();

        let completed = reports.iter().filter(|r| r.is_completed()).count();
        info!(
            "ran {} cases: {} completed, {} other",
            reports.len(),
            completed,
            reports.len() - completed
        );
        reports
    }
}

fn run_case(
    geometry: Arc<GeometryProfile>,
    flow: Arc<FlowFieldSeries>,
    boundary: BoundaryCondition,
    config: SolveConfig,
) -> Outcome {
    let case = config.case_name.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        AdvectionSolver::new(geometry, flow, boundary, config)
            .and_then(|mut solver| solver.run())
    }));
    match result {
        Ok(Ok(stats)) => Outcome::Completed(stats),
        Ok(Err(error)) => Outcome::Failed(error),
        Err(payload) => Outcome::Failed(Error::Numerical {
            case,
            time: f64::NAN,
            detail: format!("solver panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
