//! Batchline tracks batch interfaces in a liquids pipeline by advecting
//! scalar fluid properties (density, viscosity, reference temperature)
//! along a 1-D pipe path under a time-varying volumetric flow field. The
//! numerical core is a finite-volume scheme with flux-limiter (TVD)
//! reconstruction and CFL-driven sub-stepping, fed by historian telemetry
//! at the upstream boundary. One solver runs per tracked property; an
//! orchestrator runs the set concurrently with per-case failure isolation
//! and writes each trajectory out as size-bounded CBOR segments.

pub mod config;
pub mod error;
pub mod geometry;
pub mod historian;
pub mod orchestrator;
pub mod output;
pub mod scheme;
pub mod series;
pub mod solver;
