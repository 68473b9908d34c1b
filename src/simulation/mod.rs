use std::fmt;
use nalgebra::{DVector, Vector3};
use crate::motion::Motion;

pub mod servo_chain;

/// Raised when the dynamics engine (or the driver's own finiteness checks)
/// detects a numerically diverged rollout.  The evaluation pipeline converts
/// this into a finite penalty value; it never aborts an optimization run.
#[derive(Clone, Debug)]
pub struct SimulationFault {
    pub time: f64,
    pub description: String
}
impl SimulationFault {
    pub fn new(time: f64, description: &str) -> Self {
        Self { time, description: description.to_string() }
    }
}
impl fmt::Display for SimulationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "simulation fault at t = {}: {}", self.time, self.description)
    }
}

/// Boundary contract for the external rigid-body dynamics engine.  The engine
/// owns the mechanism state; the toolbox drives it one fixed-size step at a
/// time and never touches it mid-step.
///
/// Actuation is velocity-mode: `set_commands` stages one velocity command per
/// degree of freedom, and the following `integrate_velocities` call realizes
/// it.  The actuation forces for a step must be computed from the state at
/// entry to `integrate_velocities` and stay readable through `forces` until
/// the next step, so that recorded torques describe the effort spent during
/// the step rather than after it.
pub trait DynamicsEngine {
    fn num_dofs(&self) -> usize;
    fn time_step(&self) -> f64;
    fn set_positions(&mut self, q: &DVector<f64>);
    fn set_velocities(&mut self, dq: &DVector<f64>);
    fn set_commands(&mut self, commands: &DVector<f64>);
    fn integrate_velocities(&mut self, dt: f64) -> Result<(), SimulationFault>;
    fn integrate_positions(&mut self, dt: f64) -> Result<(), SimulationFault>;
    /// Per-degree-of-freedom actuation torques of the most recent step.
    fn forces(&self) -> DVector<f64>;
    fn force_lower_limit(&self, dof: usize) -> f64;
    fn force_upper_limit(&self, dof: usize) -> f64;
    fn position_lower_limit(&self, dof: usize) -> f64;
    fn position_upper_limit(&self, dof: usize) -> f64;
    /// World position of the designated end-effector at the current state.
    fn end_effector_position(&self) -> Vector3<f64>;
}

/// Result of one forward rollout.
#[derive(Clone, Debug)]
pub struct RolloutOutcome {
    pub end_effector_position: Vector3<f64>,
    /// One torque vector per simulation step, present when recording was
    /// requested.
    pub torques: Option<Vec<DVector<f64>>>
}

/// Drives a dynamics engine from time zero to the motion's final time with
/// velocity commands sampled from the motion curve.
pub struct SimulationDriver;
impl SimulationDriver {
    /// Resets the engine to `initial_pose` with zero velocity and advances it
    /// in fixed steps of the engine's own step size.  Given an identical
    /// motion and engine configuration, two rollouts produce identical
    /// results; the whole loop is free of hidden state.
    pub fn rollout<E: DynamicsEngine>(engine: &mut E, motion: &Motion, initial_pose: &DVector<f64>, record_torques: bool) -> Result<RolloutOutcome, SimulationFault> {
        let num_dofs = engine.num_dofs();
        let dt = engine.time_step();
        if dt <= 0.0 {
            return Err(SimulationFault::new(0.0, &format!("engine reported a non-positive time step ({}).", dt)));
        }

        engine.set_positions(initial_pose);
        engine.set_velocities(&DVector::zeros(num_dofs));

        let final_time = motion.final_time();
        let mut torques: Option<Vec<DVector<f64>>> = if record_torques { Some(vec![]) } else { None };

        let mut time = 0.0;
        while time < final_time {
            let commands = motion.evaluate_velocity(time);
            engine.set_commands(&commands);

            engine.integrate_velocities(dt).map_err(|mut fault| { fault.time = time; fault })?;

            // torque observed at the state it was computed under, before the
            // position update advances it
            if let Some(trace) = &mut torques {
                let step_torques = engine.forces();
                if step_torques.iter().any(|v| !v.is_finite()) {
                    return Err(SimulationFault::new(time, "engine reported non-finite torques."));
                }
                trace.push(step_torques);
            }

            engine.integrate_positions(dt).map_err(|mut fault| { fault.time = time; fault })?;

            time += dt;
        }

        let end_effector_position = engine.end_effector_position();
        if end_effector_position.iter().any(|v| !v.is_finite()) {
            return Err(SimulationFault::new(final_time, "engine reported a non-finite end-effector position."));
        }

        Ok(RolloutOutcome {
            end_effector_position,
            torques
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::servo_chain::ServoChain;

    fn test_motion() -> Motion {
        let mut motion = Motion::new(3, 4, 0.5).unwrap();
        motion.set_control_point(0, 1, 0.4);
        motion.set_control_point(1, 2, -0.3);
        motion.set_control_point(2, 3, 0.2);
        motion
    }

    #[test]
    fn rollout_records_one_torque_vector_per_step() {
        let mut engine = ServoChain::new_uniform(3, 0.2, 0.01).unwrap();
        let motion = test_motion();
        let outcome = SimulationDriver::rollout(&mut engine, &motion, &DVector::zeros(3), true).unwrap();
        let torques = outcome.torques.unwrap();
        assert_eq!(torques.len(), 50);
        assert!(torques.iter().all(|tau| tau.len() == 3));
    }

    #[test]
    fn rollout_without_recording_returns_no_trace() {
        let mut engine = ServoChain::new_uniform(3, 0.2, 0.01).unwrap();
        let motion = test_motion();
        let outcome = SimulationDriver::rollout(&mut engine, &motion, &DVector::zeros(3), false).unwrap();
        assert!(outcome.torques.is_none());
    }

    #[test]
    fn rollout_is_deterministic() {
        let mut engine = ServoChain::new_uniform(3, 0.2, 0.01).unwrap();
        let motion = test_motion();
        let first = SimulationDriver::rollout(&mut engine, &motion, &DVector::zeros(3), true).unwrap();
        let second = SimulationDriver::rollout(&mut engine, &motion, &DVector::zeros(3), true).unwrap();

        assert_eq!(first.end_effector_position, second.end_effector_position);
        let first_torques = first.torques.unwrap();
        let second_torques = second.torques.unwrap();
        assert_eq!(first_torques.len(), second_torques.len());
        for (a, b) in first_torques.iter().zip(second_torques.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn rollout_starts_from_the_given_pose() {
        let mut engine = ServoChain::new_uniform(3, 0.2, 0.01).unwrap();
        let motion = Motion::new(3, 4, 0.5).unwrap();
        let initial_pose = DVector::from_vec(vec![0.3, -0.2, 0.1]);
        SimulationDriver::rollout(&mut engine, &motion, &initial_pose, false).unwrap();
        // zero curve: commands are zero everywhere, so the pose never moves
        assert!((engine.positions() - &initial_pose).norm() < 1e-12);
    }
}
