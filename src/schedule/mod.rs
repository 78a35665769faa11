//! Time-keyed gravity phases and telemetry capture.
//!
//! The scheduler is called once per solver step with the current simulation time. Its state
//! lives in an explicit [`SchedulerState`] owned by the caller.

pub use gravity::{
    DynamicsGravity, GravityPhase, GravitySchedule, ObservationWindow, SchedulerState, Telemetry,
    TelemetryProbe,
};
pub use telemetry::{TelemetryRecord, TelemetrySink};

mod gravity;
mod telemetry;
