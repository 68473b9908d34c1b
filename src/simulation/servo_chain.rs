use std::f64::consts::PI;
use nalgebra::{DVector, Unit, UnitQuaternion, Vector3};
use crate::simulation::{DynamicsEngine, SimulationFault};
use crate::utils::utils_errors::MotionOptError;

/// One revolute joint of a [`ServoChain`]: a rotation axis expressed in the
/// parent frame followed by a rigid link offset to the next joint.
#[derive(Clone, Debug)]
pub struct ServoJoint {
    pub axis: Unit<Vector3<f64>>,
    pub link: Vector3<f64>,
    pub inertia: f64,
    pub damping: f64,
    pub position_limits: (f64, f64),
    pub force_limits: (f64, f64)
}
impl ServoJoint {
    pub fn new(axis: Unit<Vector3<f64>>, link: Vector3<f64>) -> Self {
        Self {
            axis,
            link,
            inertia: 0.5,
            damping: 0.05,
            position_limits: (-PI, PI),
            force_limits: (-50.0, 50.0)
        }
    }
}

/// A self-contained velocity-servo serial chain implementing
/// [`DynamicsEngine`].  Each joint tracks its velocity command exactly within
/// one step and reports the torque that tracking required, the way a
/// velocity-actuated joint in a full rigid-body engine reports its actuation
/// force.  It stands in for such an engine in tests and demos; it is not a
/// general-purpose dynamics engine.
#[derive(Clone, Debug)]
pub struct ServoChain {
    joints: Vec<ServoJoint>,
    q: DVector<f64>,
    dq: DVector<f64>,
    tau: DVector<f64>,
    commands: DVector<f64>,
    time_step: f64
}
impl ServoChain {
    pub fn new(joints: Vec<ServoJoint>, time_step: f64) -> Result<Self, MotionOptError> {
        if joints.is_empty() {
            return Err(MotionOptError::new_configuration_error("servo chain needs at least one joint.", file!(), line!()));
        }
        if time_step <= 0.0 {
            return Err(MotionOptError::new_configuration_error(&format!("servo chain time step must be positive (got {}).", time_step), file!(), line!()));
        }

        let num_dofs = joints.len();
        Ok(Self {
            joints,
            q: DVector::zeros(num_dofs),
            dq: DVector::zeros(num_dofs),
            tau: DVector::zeros(num_dofs),
            commands: DVector::zeros(num_dofs),
            time_step
        })
    }
    /// A chain of `num_dofs` equal-length links along the parent x axis with
    /// rotation axes alternating between z and y.
    pub fn new_uniform(num_dofs: usize, link_length: f64, time_step: f64) -> Result<Self, MotionOptError> {
        let mut joints = vec![];
        for i in 0..num_dofs {
            let axis = if i % 2 == 0 { Vector3::z_axis() } else { Vector3::y_axis() };
            joints.push(ServoJoint::new(axis, Vector3::new(link_length, 0.0, 0.0)));
        }
        Self::new(joints, time_step)
    }
    pub fn positions(&self) -> &DVector<f64> {
        &self.q
    }
    pub fn velocities(&self) -> &DVector<f64> {
        &self.dq
    }
    pub fn joints(&self) -> &Vec<ServoJoint> {
        &self.joints
    }
}
impl DynamicsEngine for ServoChain {
    fn num_dofs(&self) -> usize {
        self.joints.len()
    }
    fn time_step(&self) -> f64 {
        self.time_step
    }
    fn set_positions(&mut self, q: &DVector<f64>) {
        self.q.copy_from(q);
    }
    fn set_velocities(&mut self, dq: &DVector<f64>) {
        self.dq.copy_from(dq);
    }
    fn set_commands(&mut self, commands: &DVector<f64>) {
        self.commands.copy_from(commands);
    }
    fn integrate_velocities(&mut self, dt: f64) -> Result<(), SimulationFault> {
        for i in 0..self.joints.len() {
            let joint = &self.joints[i];
            let tau = joint.inertia * (self.commands[i] - self.dq[i]) / dt + joint.damping * self.commands[i];
            if !tau.is_finite() {
                return Err(SimulationFault::new(0.0, &format!("non-finite torque on joint {}.", i)));
            }
            self.tau[i] = tau;
            self.dq[i] = self.commands[i];
        }
        Ok(())
    }
    fn integrate_positions(&mut self, dt: f64) -> Result<(), SimulationFault> {
        for i in 0..self.joints.len() {
            let q = self.q[i] + self.dq[i] * dt;
            if !q.is_finite() {
                return Err(SimulationFault::new(0.0, &format!("non-finite position on joint {}.", i)));
            }
            self.q[i] = q;
        }
        Ok(())
    }
    fn forces(&self) -> DVector<f64> {
        self.tau.clone()
    }
    fn force_lower_limit(&self, dof: usize) -> f64 {
        self.joints[dof].force_limits.0
    }
    fn force_upper_limit(&self, dof: usize) -> f64 {
        self.joints[dof].force_limits.1
    }
    fn position_lower_limit(&self, dof: usize) -> f64 {
        self.joints[dof].position_limits.0
    }
    fn position_upper_limit(&self, dof: usize) -> f64 {
        self.joints[dof].position_limits.1
    }
    fn end_effector_position(&self) -> Vector3<f64> {
        let mut rotation = UnitQuaternion::identity();
        let mut position = Vector3::zeros();
        for (i, joint) in self.joints.iter().enumerate() {
            rotation = rotation * UnitQuaternion::from_axis_angle(&joint.axis, self.q[i]);
            position += rotation * joint.link;
        }
        position
    }
}
