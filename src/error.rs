use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/**
 * Error to represent the ways a batch-tracking run can fail.
 *
 * `Config` covers anything detected before stepping begins: bad geometry
 * or series input, contradictory solve settings, unknown method or
 * limiter names. `Numerical` is fatal to the solver that raised it and
 * carries the case name, the simulation time, and a description of the
 * offending value. `Io` wraps a segment-write failure. `Timeout` is
 * raised only at the orchestrator boundary, never inside a solver.
 */
#[derive(Debug)]
pub enum Error {
    Config(String),
    Numerical {
        case: String,
        time: f64,
        detail: String,
    },
    Io {
        case: String,
        path: PathBuf,
        source: io::Error,
    },
    Timeout {
        case: String,
        limit: Duration,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            Config(reason) => write!(fmt, "invalid configuration: {}", reason),
            Numerical { case, time, detail } => {
                write!(fmt, "[{}] numerical failure at t = {}: {}", case, time, detail)
            }
            Io { case, path, source } => {
                write!(fmt, "[{}] segment write to {} failed: {}", case, path.display(), source)
            }
            Timeout { case, limit } => {
                write!(fmt, "[{}] did not finish within {:?}", case, limit)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

