use std::collections::HashMap;

use log::debug;

use crate::error::Error;
use crate::series::{BoundaryCondition, FlowFieldSeries};

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// One historian reading: epoch seconds and an engineering-unit value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// Windowed time-series retrieval from a process-data store. This is the
/// seam to the plant historian; the solver never sees it, only the series
/// built from it.
pub trait Historian {
    /// Volumetric flow readings [m³/h] for a meter tag over `[from, to]`.
    fn flow_series(&self, tag: &str, from: f64, to: f64) -> Result<Vec<Sample>, Error>;

    /// Tracked-property readings for a quality tag over `[from, to]`.
    fn property_series(&self, tag: &str, from: f64, to: f64) -> Result<Vec<Sample>, Error>;
}

/// Pull a flow tag and shape it for the solver: m³/h becomes m³/s, and
/// each reading spans the whole path as a spatially uniform profile.
pub fn build_flow_series<H>(
    historian: &H,
    tag: &str,
    from: f64,
    to: f64,
    length: f64,
) -> Result<FlowFieldSeries, Error>
where
    H: Historian + ?Sized,
{
    let samples = historian.flow_series(tag, from, to)?;
    if samples.is_empty() {
        return Err(Error::Config(format!(
            "no flow samples for tag '{}' in [{}, {}]",
            tag, from, to
        )));
    }
    debug!("pulled {} flow samples for tag '{}'", samples.len(), tag);
    let converted: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| (s.time, s.value / SECONDS_PER_HOUR))
        .collect();
    FlowFieldSeries::build(&converted, length)
}

/// Pull a property tag as the upstream boundary series for one case.
pub fn build_boundary<H>(
    historian: &H,
    tag: &str,
    from: f64,
    to: f64,
) -> Result<BoundaryCondition, Error>
where
    H: Historian + ?Sized,
{
    let samples = historian.property_series(tag, from, to)?;
    if samples.is_empty() {
        return Err(Error::Config(format!(
            "no property samples for tag '{}' in [{}, {}]",
            tag, from, to
        )));
    }
    debug!("pulled {} property samples for tag '{}'", samples.len(), tag);
    let pairs: Vec<(f64, f64)> = samples.iter().map(|s| (s.time, s.value)).collect();
    BoundaryCondition::build(&pairs)
}

/// An in-memory historian for tests and the demo driver: tags are
/// preloaded wholesale and reads slice out the requested window.
#[derive(Debug, Default)]
pub struct MemoryHistorian {
    tags: HashMap<String, Vec<Sample>>,
}

impl MemoryHistorian {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<S: Into<String>>(mut self, tag: S, samples: Vec<(f64, f64)>) -> Self {
        let samples = samples
            .into_iter()
            .map(|(time, value)| Sample { time, value })
            .collect();
        self.tags.insert(tag.into(), samples);
        self
    }

    fn window(&self, tag: &str, from: f64, to: f64) -> Result<Vec<Sample>, Error> {
        let all = self
            .tags
            .get(tag)
            .ok_or_else(|| Error::Config(format!("historian has no tag '{}'", tag)))?;
        Ok(all
            .iter()
            .filter(|s| s.time >= from && s.time <= to)
            .copied()
            .collect())
    }
}

impl Historian for MemoryHistorian {
    fn flow_series(&self, tag: &str, from: f64, to: f64) -> Result<Vec<Sample>, Error> {
        self.window(tag, from, to)
    }

    fn property_series(&self, tag: &str, from: f64, to: f64) -> Result<Vec<Sample>, Error> {
        self.window(tag, from, to)
    }
}
