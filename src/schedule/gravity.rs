use super::telemetry::{TelemetryRecord, TelemetrySink};
use crate::error::{Error, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Gravity control and velocity readback of the rigid-body engine.
pub trait DynamicsGravity {
    type Body: Copy;

    /// Gravity applied to the dynamic rigid bodies.
    fn set_gravity(&mut self, gravity: Vector3<f32>);
    fn linear_velocity(&self, body: Self::Body) -> Option<Vector3<f32>>;
}

/// Which gravity the rigid bodies currently feel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GravityPhase {
    /// Bodies are held in place: zero gravity in the rigid-body engine.
    Supported,
    /// Bodies fall under the nominal gravity.
    Released,
}

/// Open time interval `(start, end)` during which telemetry is captured.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub start: f32,
    pub end: f32,
}

impl ObservationWindow {
    pub fn contains(&self, t: f32) -> bool {
        t > self.start && t < self.end
    }
}

/// Maps the simulation time to the gravity of the rigid bodies and of the fluid.
///
/// The fluid always feels `nominal`. The rigid bodies feel no gravity before `release_time`
/// and `nominal` from then on.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GravitySchedule {
    pub nominal: Vector3<f32>,
    pub release_time: f32,
    pub observation: Option<ObservationWindow>,
    /// Width of the time buckets used to deduplicate telemetry samples.
    pub sample_step: f64,
}

/// Mutable state of the scheduler between two steps.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SchedulerState {
    last_bucket: Option<i64>,
    phase: Option<GravityPhase>,
    samples: usize,
}

impl SchedulerState {
    /// Phase applied at the last call, if any.
    pub fn phase(&self) -> Option<GravityPhase> {
        self.phase
    }

    /// Number of telemetry records emitted so far, including the ones whose write failed.
    /// Buckets where the tracked body could not be read emit nothing and are not counted.
    pub fn samples(&self) -> usize {
        self.samples
    }
}

/// What to sample during the observation window.
#[derive(Copy, Clone, Debug)]
pub struct TelemetryProbe<B> {
    pub body: B,
    /// Index of the body in the per-body force array.
    pub object_index: usize,
    /// Component of the linear velocity to record.
    pub axis: usize,
    pub record_force: bool,
}

/// Telemetry inputs of one scheduler call.
pub struct Telemetry<'a, B> {
    pub probe: &'a TelemetryProbe<B>,
    /// Net fluid force on each rigid body, by object index.
    pub forces: &'a [Vector3<f32>],
    pub sink: &'a mut TelemetrySink,
}

impl GravitySchedule {
    /// Bodies fall from the start, no telemetry.
    pub fn constant(nominal: Vector3<f32>) -> Self {
        Self {
            nominal,
            release_time: 0.0,
            observation: None,
            sample_step: 1.0e-4,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.nominal.iter().any(|e| !e.is_finite()) || !self.release_time.is_finite() {
            return Err(Error::InvalidParam(
                "gravity and release time must be finite".into(),
            ));
        }
        if !(self.sample_step.is_finite() && self.sample_step > 0.0) {
            return Err(Error::InvalidParam(format!(
                "telemetry sample step must be > 0, got {}",
                self.sample_step
            )));
        }
        if let Some(window) = &self.observation {
            if !(window.start.is_finite() && window.end.is_finite() && window.start < window.end)
            {
                return Err(Error::InvalidParam(format!(
                    "invalid observation window {window:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn phase_at(&self, t: f32) -> GravityPhase {
        if t < self.release_time {
            GravityPhase::Supported
        } else {
            GravityPhase::Released
        }
    }

    /// Gravity of the rigid-body engine at time `t`.
    pub fn dynamics_gravity(&self, t: f32) -> Vector3<f32> {
        match self.phase_at(t) {
            GravityPhase::Supported => Vector3::zeros(),
            GravityPhase::Released => self.nominal,
        }
    }

    /// Gravity of the fluid. It does not depend on the phase.
    pub fn fluid_gravity(&self) -> Vector3<f32> {
        self.nominal
    }

    fn bucket(&self, t: f32) -> i64 {
        (t as f64 / self.sample_step).ceil() as i64
    }

    /// Per-step callback.
    ///
    /// Sets the gravity of `dynamics` for the phase active at `t` and, inside the observation
    /// window, appends at most one telemetry record per time bucket. Returns the fluid
    /// gravity. Telemetry problems are logged and never interrupt the step.
    pub fn on_step<D: DynamicsGravity>(
        &self,
        state: &mut SchedulerState,
        t: f32,
        dynamics: &mut D,
        telemetry: Option<Telemetry<'_, D::Body>>,
    ) -> Vector3<f32> {
        let phase = self.phase_at(t);
        dynamics.set_gravity(self.dynamics_gravity(t));
        if state.phase != Some(phase) {
            log::info!("t = {t}: rigid bodies {phase:?}");
            state.phase = Some(phase);
        }

        let in_window = self.observation.is_some_and(|w| w.contains(t));
        if let (true, Some(telemetry)) = (in_window, telemetry) {
            let bucket = self.bucket(t);
            if state.last_bucket.map_or(true, |last| bucket > last)
                && self.sample(t, dynamics, telemetry)
            {
                state.samples += 1;
            }
            state.last_bucket = Some(bucket);
        }

        self.fluid_gravity()
    }

    /// Emits one record. Returns `false` if the tracked body could not be read.
    fn sample<D: DynamicsGravity>(
        &self,
        t: f32,
        dynamics: &D,
        telemetry: Telemetry<'_, D::Body>,
    ) -> bool {
        let probe = telemetry.probe;
        let Some(linvel) = dynamics.linear_velocity(probe.body) else {
            log::warn!("t = {t}: tracked body is gone, telemetry sample skipped");
            return false;
        };

        let force = probe.record_force.then(|| {
            telemetry
                .forces
                .get(probe.object_index)
                .copied()
                .unwrap_or_else(Vector3::zeros)
        });
        let record = TelemetryRecord {
            time: t,
            velocity: linvel[probe.axis.min(2)],
            force,
        };
        let _ = telemetry.sink.append(&record);
        true
    }
}
