use std::cell::Cell;
use nalgebra::{DVector, Vector3};
use serde::{Serialize, Deserialize};
use crate::motion::Motion;
use crate::optimization::{NonlinearOptimizer, NonlinearOptimizerType, OptimizerParameters, ScalarFunction};
use crate::simulation::{DynamicsEngine, SimulationDriver, SimulationFault};
use crate::utils::utils_console::{motionopt_print, PrintColor, PrintMode};
use crate::utils::utils_errors::MotionOptError;
use crate::utils::utils_nalgebra::NalgebraConversions;
use crate::utils::utils_sampling::SimpleSamplers;

/// The canonical mapping between the optimization variable vector and the
/// motion's free control points: `x[dof * num_free_control_points + j]` is the
/// `j`-th free control point of degree of freedom `dof`.  The mapping is pure
/// and bijective; it never touches an engine or a solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableLayout {
    num_dofs: usize,
    num_free_control_points: usize
}
impl VariableLayout {
    pub fn from_motion(motion: &Motion) -> Self {
        Self {
            num_dofs: motion.num_dofs(),
            num_free_control_points: motion.free_control_point_indices().len()
        }
    }
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }
    pub fn num_free_control_points(&self) -> usize {
        self.num_free_control_points
    }
    pub fn num_variables(&self) -> usize {
        self.num_dofs * self.num_free_control_points
    }
    #[inline]
    pub fn variable_index(&self, dof: usize, free_control_point_idx: usize) -> usize {
        dof * self.num_free_control_points + free_control_point_idx
    }
    /// Writes `x` into the motion's free control points.  Anchored control
    /// points are untouched.
    pub fn apply_variables(&self, x: &[f64], motion: &mut Motion) -> Result<(), MotionOptError> {
        if x.len() != self.num_variables() {
            return Err(MotionOptError::new_configuration_error(&format!("variable vector has length {} but the layout expects {}.", x.len(), self.num_variables()), file!(), line!()));
        }
        let free_indices = motion.free_control_point_indices();
        if free_indices.len() != self.num_free_control_points || motion.num_dofs() != self.num_dofs {
            return Err(MotionOptError::new_configuration_error("motion does not match the variable layout it was built from.", file!(), line!()));
        }

        for dof in 0..self.num_dofs {
            for (j, &control_point_idx) in free_indices.iter().enumerate() {
                motion.set_control_point(dof, control_point_idx, x[self.variable_index(dof, j)]);
            }
        }

        Ok(())
    }
    /// Reads the motion's free control points back into a variable vector;
    /// the inverse of [`apply_variables`](Self::apply_variables).
    pub fn flatten_variables(&self, motion: &Motion) -> Vec<f64> {
        let free_indices = motion.free_control_point_indices();
        let mut out_vec = vec![0.0; self.num_variables()];
        for dof in 0..self.num_dofs {
            for (j, &control_point_idx) in free_indices.iter().enumerate() {
                out_vec[self.variable_index(dof, j)] = motion.control_point(dof, control_point_idx);
            }
        }
        out_vec
    }
}

/// The outcome of evaluating one candidate variable vector: the achieved
/// end-effector position and, when requested, the recorded torque trace.
/// Transient; recomputed for every fresh candidate.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub x: Vec<f64>,
    pub end_effector_position: Vector3<f64>,
    pub torques: Option<Vec<DVector<f64>>>
}

/// Owns the dynamics engine and the motion curve for the duration of an
/// optimization session and maps candidate variable vectors to simulation
/// results.  A last-x cache (keyed by exact variable-vector equality) serves
/// the objective and constraint evaluators when the solver polls them at the
/// same candidate, so each fresh candidate costs one rollout.
pub struct EvaluationContext<E: DynamicsEngine> {
    engine: E,
    motion: Motion,
    initial_pose: DVector<f64>,
    rollouts: usize,
    cache_hits: usize,
    cache: Option<(Vec<f64>, Evaluation)>
}
impl<E: DynamicsEngine> EvaluationContext<E> {
    pub fn new(engine: E, motion: Motion, initial_pose: DVector<f64>) -> Self {
        Self {
            engine,
            motion,
            initial_pose,
            rollouts: 0,
            cache_hits: 0,
            cache: None
        }
    }
    pub fn layout(&self) -> VariableLayout {
        VariableLayout::from_motion(&self.motion)
    }
    pub fn motion(&self) -> &Motion {
        &self.motion
    }
    pub fn engine(&self) -> &E {
        &self.engine
    }
    pub fn initial_pose(&self) -> &DVector<f64> {
        &self.initial_pose
    }
    pub fn num_rollouts(&self) -> usize {
        self.rollouts
    }
    pub fn num_cache_hits(&self) -> usize {
        self.cache_hits
    }
    fn invalidate_cache(&mut self) {
        self.cache = None;
    }
    /// Applies `x` to the motion's free control points and rolls the engine
    /// forward from the initial pose.  A recorded result also serves later
    /// unrecorded queries at the same `x`.
    pub fn evaluate(&mut self, x: &[f64], record_torques: bool) -> Result<Evaluation, SimulationFault> {
        if let Some((cached_x, cached)) = &self.cache {
            if cached_x.as_slice() == x && (!record_torques || cached.torques.is_some()) {
                self.cache_hits += 1;
                return Ok(cached.clone());
            }
        }

        let layout = self.layout();
        layout.apply_variables(x, &mut self.motion)
            .map_err(|e| SimulationFault::new(0.0, &format!("could not apply variables: {}", e)))?;

        self.rollouts += 1;
        let outcome = SimulationDriver::rollout(&mut self.engine, &self.motion, &self.initial_pose, record_torques)?;

        let evaluation = Evaluation {
            x: x.to_vec(),
            end_effector_position: outcome.end_effector_position,
            torques: outcome.torques
        };
        self.cache = Some((x.to_vec(), evaluation.clone()));

        Ok(evaluation)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Minimized integrated actuation effort: the sum over recorded steps and
/// degrees of freedom of `time_step * |torque|`.  L1 in time and in torque;
/// sustained effort costs more than instantaneous peaks.  A simulation fault
/// yields the configured penalty instead of propagating into the solver.
pub struct EffortObjective {
    failure_penalty: f64,
    calls: Cell<usize>
}
impl EffortObjective {
    pub fn new(failure_penalty: f64) -> Self {
        Self { failure_penalty, calls: Cell::new(0) }
    }
    pub fn num_calls(&self) -> usize {
        self.calls.get()
    }
}
impl<E: DynamicsEngine> ScalarFunction<EvaluationContext<E>> for EffortObjective {
    fn eval(&self, x: &[f64], ctx: &mut EvaluationContext<E>) -> f64 {
        self.calls.set(self.calls.get() + 1);

        return match ctx.evaluate(x, true) {
            Err(_) => { self.failure_penalty }
            Ok(evaluation) => {
                let time_step = ctx.engine.time_step();
                let mut eval = 0.0;
                if let Some(torques) = &evaluation.torques {
                    for torque in torques {
                        for i in 0..torque.len() {
                            eval += time_step * torque[i].abs();
                        }
                    }
                }
                eval
            }
        }
    }
}

/// Equality constraint residual: Euclidean distance between the achieved and
/// the target end-effector position, driven toward zero.
pub struct TargetPositionConstraint {
    target_position: Vector3<f64>,
    failure_penalty: f64,
    calls: Cell<usize>
}
impl TargetPositionConstraint {
    pub fn new(target_position: Vector3<f64>, failure_penalty: f64) -> Self {
        Self { target_position, failure_penalty, calls: Cell::new(0) }
    }
    pub fn num_calls(&self) -> usize {
        self.calls.get()
    }
}
impl<E: DynamicsEngine> ScalarFunction<EvaluationContext<E>> for TargetPositionConstraint {
    fn eval(&self, x: &[f64], ctx: &mut EvaluationContext<E>) -> f64 {
        self.calls.set(self.calls.get() + 1);

        return match ctx.evaluate(x, false) {
            Err(_) => { self.failure_penalty }
            Ok(evaluation) => {
                (evaluation.end_effector_position - self.target_position).norm()
            }
        }
    }
}

/// Inequality constraint residual: cumulative torque-limit overshoot,
/// `time_step * (torque - upper_limit)` summed over every violating sample
/// (symmetrically for the lower limit).  Proportional to cumulative, not
/// peak, overshoot; zero when every sample is within limits.
pub struct TorqueLimitConstraint {
    failure_penalty: f64,
    calls: Cell<usize>
}
impl TorqueLimitConstraint {
    pub fn new(failure_penalty: f64) -> Self {
        Self { failure_penalty, calls: Cell::new(0) }
    }
    pub fn num_calls(&self) -> usize {
        self.calls.get()
    }
}
impl<E: DynamicsEngine> ScalarFunction<EvaluationContext<E>> for TorqueLimitConstraint {
    fn eval(&self, x: &[f64], ctx: &mut EvaluationContext<E>) -> f64 {
        self.calls.set(self.calls.get() + 1);

        return match ctx.evaluate(x, true) {
            Err(_) => { self.failure_penalty }
            Ok(evaluation) => {
                let time_step = ctx.engine.time_step();
                let mut eval = 0.0;
                if let Some(torques) = &evaluation.torques {
                    for torque in torques {
                        for i in 0..torque.len() {
                            let upper = ctx.engine.force_upper_limit(i);
                            let lower = ctx.engine.force_lower_limit(i);
                            if torque[i] > upper { eval += time_step * (torque[i] - upper); }
                            if torque[i] < lower { eval += time_step * (lower - torque[i]); }
                        }
                    }
                }
                eval
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionOptimizerParams {
    /// Free control points per degree of freedom; the anchored first control
    /// point comes on top of these.
    pub num_free_control_points: usize,
    pub final_time: f64,
    /// Evaluation budget handed to the solver backend.
    pub max_evaluations: usize,
    /// Enables the torque-limit inequality constraint.  Off by default; every
    /// constraint evaluation costs a recorded rollout.
    pub torque_limit_constraint: bool,
    /// Finite value reported to the solver when a rollout faults.
    pub simulation_failure_penalty: f64,
    /// Weight for constraint residuals folded into the objective on backends
    /// without native constraint support, and for ranking restart results.
    pub eq_penalty_weight: f64,
    /// Extra solves from uniform in-bounds initial guesses; the best result
    /// by penalized merit wins.
    pub num_random_restarts: usize,
    pub solver: NonlinearOptimizerType,
    pub verbose: bool
}
impl Default for MotionOptimizerParams {
    fn default() -> Self {
        Self {
            num_free_control_points: 4,
            final_time: 3.0,
            max_evaluations: 1000,
            torque_limit_constraint: false,
            simulation_failure_penalty: 1.0e8,
            eq_penalty_weight: 1.0,
            num_random_restarts: 0,
            solver: NonlinearOptimizerType::default(),
            verbose: true
        }
    }
}
impl MotionOptimizerParams {
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("error")
    }
    pub fn load_from_json_string(json_str: &str) -> Result<Self, MotionOptError> {
        serde_json::from_str(json_str)
            .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not load MotionOptimizerParams from json string: {}", e), file!(), line!()))
    }
}

/// Result of one [`MotionOptimizer::optimize`] run.  Non-convergence within
/// the evaluation budget is not an error; the best variable vector the
/// backend found is reported here and written into the motion curve.
#[derive(Clone, Debug)]
pub struct OptimizationSummary {
    pub x: DVector<f64>,
    pub cost: f64,
    pub end_effector_position: Vector3<f64>,
    pub target_residual: f64,
    pub initial_target_residual: f64,
    pub num_rollouts: usize,
    pub num_cache_hits: usize
}

/// Searches for the minimum-effort joint motion that brings the engine's
/// end-effector to a target position.  Owns the engine and the motion curve
/// through an [`EvaluationContext`]; after [`optimize`](Self::optimize)
/// returns, the curve holds the optimized control points and
/// [`get_commands`](Self::get_commands) can drive a playback loop.
pub struct MotionOptimizer<E: DynamicsEngine> {
    context: EvaluationContext<E>,
    target_position: Vector3<f64>,
    params: MotionOptimizerParams
}
impl<E: DynamicsEngine + 'static> MotionOptimizer<E> {
    pub fn new(engine: E, params: MotionOptimizerParams) -> Result<Self, MotionOptError> {
        let num_dofs = engine.num_dofs();
        if num_dofs == 0 {
            return Err(MotionOptError::new_configuration_error("engine reports zero degrees of freedom.", file!(), line!()));
        }
        if engine.time_step() <= 0.0 {
            return Err(MotionOptError::new_configuration_error(&format!("engine reports a non-positive time step ({}).", engine.time_step()), file!(), line!()));
        }
        if params.num_free_control_points == 0 {
            return Err(MotionOptError::new_configuration_error("at least one free control point per degree of freedom is required.", file!(), line!()));
        }

        // the first control point is anchored, so it is not a free variable
        let motion = Motion::new(num_dofs, params.num_free_control_points + 1, params.final_time)?;
        let initial_pose = DVector::zeros(num_dofs);

        Ok(Self {
            context: EvaluationContext::new(engine, motion, initial_pose),
            target_position: Vector3::zeros(),
            params
        })
    }
    pub fn set_initial_pose(&mut self, pose: DVector<f64>) -> Result<(), MotionOptError> {
        if pose.len() != self.context.engine.num_dofs() {
            return Err(MotionOptError::new_configuration_error(&format!("initial pose has {} entries but the engine has {} degrees of freedom.", pose.len(), self.context.engine.num_dofs()), file!(), line!()));
        }
        // re-anchor the trajectory at the new initial configuration
        for dof in 0..pose.len() {
            self.context.motion.set_control_point(dof, 0, pose[dof]);
        }
        self.context.initial_pose = pose;
        self.context.invalidate_cache();
        Ok(())
    }
    pub fn initial_pose(&self) -> &DVector<f64> {
        &self.context.initial_pose
    }
    pub fn set_target_position_of_end_effector(&mut self, target_position: Vector3<f64>) {
        self.target_position = target_position;
    }
    pub fn target_position_of_end_effector(&self) -> &Vector3<f64> {
        &self.target_position
    }
    pub fn set_final_time(&mut self, final_time: f64) -> Result<(), MotionOptError> {
        self.context.motion.set_final_time(final_time)?;
        self.context.invalidate_cache();
        Ok(())
    }
    pub fn final_time(&self) -> f64 {
        self.context.motion.final_time()
    }
    pub fn motion(&self) -> &Motion {
        &self.context.motion
    }
    pub fn engine(&self) -> &E {
        &self.context.engine
    }
    pub fn engine_mut(&mut self) -> &mut E {
        self.context.invalidate_cache();
        &mut self.context.engine
    }
    pub fn params(&self) -> &MotionOptimizerParams {
        &self.params
    }
    pub fn num_free_control_points(&self) -> usize {
        self.params.num_free_control_points
    }
    /// Resets the engine to the initial pose with zero velocity.
    pub fn set_to_initial_pose(&mut self) {
        let initial_pose = self.context.initial_pose.clone();
        let num_dofs = self.context.engine.num_dofs();
        self.context.engine.set_positions(&initial_pose);
        self.context.engine.set_velocities(&DVector::zeros(num_dofs));
    }
    /// Per-degree-of-freedom velocity command at time `t`, for a controller
    /// or playback loop to sample.
    pub fn get_commands(&self, t: f64) -> DVector<f64> {
        self.context.motion.evaluate_velocity(t)
    }
    pub fn set_commands_to_engine(&mut self, t: f64) {
        let commands = self.get_commands(t);
        self.context.engine.set_commands(&commands);
    }
    /// Evaluates one candidate variable vector through the full pipeline.  A
    /// fault is a distinguishable result here; the evaluators convert it to a
    /// penalty before it reaches a solver.
    pub fn evaluate(&mut self, x: &[f64], record_torques: bool) -> Result<Evaluation, SimulationFault> {
        self.context.evaluate(x, record_torques)
    }
    /// Per-variable bounds: each free control point of a degree of freedom is
    /// bounded by that degree of freedom's position limits.
    pub fn variable_bounds(&self) -> Vec<(f64, f64)> {
        let layout = self.context.layout();
        let mut bounds = vec![(0.0, 0.0); layout.num_variables()];
        for dof in 0..layout.num_dofs() {
            let lower = self.context.engine.position_lower_limit(dof);
            let upper = self.context.engine.position_upper_limit(dof);
            for j in 0..layout.num_free_control_points() {
                bounds[layout.variable_index(dof, j)] = (lower, upper);
            }
        }
        bounds
    }
    /// Midpoint of each bound pair.
    pub fn initial_guess(&self) -> Vec<f64> {
        self.variable_bounds().iter().map(|b| 0.5 * (b.0 + b.1)).collect()
    }
    /// Runs the full pipeline: assembles bounds, initial guess, objective and
    /// constraints, delegates to the solver backend, and writes the optimal
    /// variable vector back into the motion curve for playback.
    pub fn optimize(&mut self) -> Result<OptimizationSummary, MotionOptError> {
        let bounds = self.variable_bounds();
        let x0 = self.initial_guess();

        let initial_target_residual = self.target_residual_of(&x0);

        let mut guesses = vec![x0];
        for _ in 0..self.params.num_random_restarts {
            guesses.push(SimpleSamplers::uniform_samples(&bounds));
        }

        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut best_merit = f64::INFINITY;
        for guess in &guesses {
            let (x, cost) = self.solve_once(guess, &bounds)?;
            let residual = self.target_residual_of(&x);
            let merit = cost + self.params.eq_penalty_weight * residual;
            if merit < best_merit {
                best_merit = merit;
                best = Some((x, cost));
            }
        }

        let (best_x, best_cost) = best
            .ok_or_else(|| MotionOptError::new_generic_error_str("optimization produced no candidate solution.", file!(), line!()))?;

        // write the optimal variables back through the pipeline (no torque
        // recording) so the motion curve is ready for playback
        let (end_effector_position, target_residual) = match self.context.evaluate(&best_x, false) {
            Ok(evaluation) => {
                let achieved = evaluation.end_effector_position;
                (achieved, (achieved - self.target_position).norm())
            }
            Err(fault) => {
                motionopt_print(&format!("warning: optimal trajectory faulted during write-back ({}).", fault), PrintMode::Println, PrintColor::Yellow, false);
                (Vector3::zeros(), self.params.simulation_failure_penalty)
            }
        };

        let summary = OptimizationSummary {
            x: NalgebraConversions::vec_to_dvector(&best_x),
            cost: best_cost,
            end_effector_position,
            target_residual,
            initial_target_residual,
            num_rollouts: self.context.num_rollouts(),
            num_cache_hits: self.context.num_cache_hits()
        };

        if self.params.verbose {
            motionopt_print(&format!("cost        : {:.6}", summary.cost), PrintMode::Println, PrintColor::Cyan, true);
            motionopt_print(&format!("reach error : {:.6} (initial guess: {:.6})", summary.target_residual, summary.initial_target_residual), PrintMode::Println, PrintColor::Cyan, false);
            motionopt_print(&format!("rollouts    : {} ({} cache hits)", summary.num_rollouts, summary.num_cache_hits), PrintMode::Println, PrintColor::Cyan, false);
            motionopt_print("control points:", PrintMode::Println, PrintColor::None, false);
            motionopt_print(&self.context.motion.control_points_string(), PrintMode::Print, PrintColor::None, false);
        }

        Ok(summary)
    }
    fn target_residual_of(&mut self, x: &[f64]) -> f64 {
        match self.context.evaluate(x, false) {
            Ok(evaluation) => { (evaluation.end_effector_position - self.target_position).norm() }
            Err(_) => { self.params.simulation_failure_penalty }
        }
    }
    fn solve_once(&mut self, initial: &[f64], bounds: &[(f64, f64)]) -> Result<(Vec<f64>, f64), MotionOptError> {
        let layout = self.context.layout();

        let mut n: NonlinearOptimizer<EvaluationContext<E>> = NonlinearOptimizer::new(layout.num_variables(), self.params.solver.clone());
        n.add_cost_term(EffortObjective::new(self.params.simulation_failure_penalty), None);
        n.add_equality_constraint(TargetPositionConstraint::new(self.target_position, self.params.simulation_failure_penalty));
        if self.params.torque_limit_constraint {
            n.add_less_than_zero_inequality_constraint(TorqueLimitConstraint::new(self.params.simulation_failure_penalty));
        }
        n.set_bounds(bounds.to_vec());

        let mut optimizer_parameters = OptimizerParameters::default();
        optimizer_parameters.max_evaluations = self.params.max_evaluations;
        optimizer_parameters.eq_penalty_weight = self.params.eq_penalty_weight;

        let result = n.optimize(&NalgebraConversions::vec_to_dvector(initial), &mut self.context, &optimizer_parameters)?;

        Ok((NalgebraConversions::dvector_to_vec(result.x_min()), result.cost()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::servo_chain::{ServoChain, ServoJoint};
    use nalgebra::Unit;

    fn test_context(num_dofs: usize, num_free_cps: usize) -> EvaluationContext<ServoChain> {
        let engine = ServoChain::new_uniform(num_dofs, 0.2, 0.01).unwrap();
        let motion = Motion::new(num_dofs, num_free_cps + 1, 0.5).unwrap();
        EvaluationContext::new(engine, motion, DVector::zeros(num_dofs))
    }

    #[test]
    fn variable_layout_is_bijective() {
        let mut motion = Motion::new(3, 5, 1.0).unwrap();
        let layout = VariableLayout::from_motion(&motion);
        assert_eq!(layout.num_variables(), 12);

        let x: Vec<f64> = (0..12).map(|i| 0.1 * i as f64 - 0.4).collect();
        layout.apply_variables(&x, &mut motion).unwrap();
        assert_eq!(layout.flatten_variables(&motion), x);

        // anchored control points are untouched
        for dof in 0..3 {
            assert_eq!(motion.control_point(dof, 0), 0.0);
        }
    }

    #[test]
    fn variable_layout_rejects_wrong_lengths() {
        let mut motion = Motion::new(3, 5, 1.0).unwrap();
        let layout = VariableLayout::from_motion(&motion);
        assert!(layout.apply_variables(&[0.0; 5], &mut motion).is_err());
    }

    #[test]
    fn evaluation_caches_repeated_candidates() {
        let mut ctx = test_context(2, 3);
        let x = vec![0.1; 6];

        ctx.evaluate(&x, false).unwrap();
        assert_eq!(ctx.num_rollouts(), 1);

        ctx.evaluate(&x, false).unwrap();
        assert_eq!(ctx.num_rollouts(), 1);
        assert_eq!(ctx.num_cache_hits(), 1);

        // a recorded request cannot be served by an unrecorded result
        let evaluation = ctx.evaluate(&x, true).unwrap();
        assert!(evaluation.torques.is_some());
        assert_eq!(ctx.num_rollouts(), 2);

        // but a recorded result serves later unrecorded requests
        ctx.evaluate(&x, false).unwrap();
        assert_eq!(ctx.num_rollouts(), 2);
        assert_eq!(ctx.num_cache_hits(), 2);
    }

    #[test]
    fn in_bounds_candidates_never_raise_configuration_errors() {
        let mut ctx = test_context(3, 2);
        for &scale in &[-1.0, -0.3, 0.0, 0.4, 1.0] {
            let x = vec![scale * std::f64::consts::PI; 6];
            assert!(ctx.evaluate(&x, true).is_ok());
        }
    }

    #[test]
    fn effort_objective_is_zero_at_rest_and_positive_in_motion() {
        let mut ctx = test_context(2, 3);
        let objective = EffortObjective::new(1.0e8);

        let at_rest = objective.eval(&vec![0.0; 6], &mut ctx);
        assert_eq!(at_rest, 0.0);

        let moving = objective.eval(&vec![0.5; 6], &mut ctx);
        assert!(moving > 0.0);
        assert_eq!(objective.num_calls(), 2);
    }

    #[test]
    fn target_constraint_measures_distance_from_target() {
        let mut ctx = test_context(3, 2);
        // zero motion leaves the straight chain at (0.6, 0, 0)
        let constraint = TargetPositionConstraint::new(Vector3::new(0.6, 0.0, 0.0), 1.0e8);
        let residual = constraint.eval(&vec![0.0; 6], &mut ctx);
        assert!(residual < 1e-9);

        let constraint = TargetPositionConstraint::new(Vector3::new(0.0, 0.0, 0.0), 1.0e8);
        let residual = constraint.eval(&vec![0.0; 6], &mut ctx);
        assert!((residual - 0.6).abs() < 1e-9);
    }

    #[test]
    fn torque_limit_residual_sign_behavior() {
        let mut tight_joints = vec![];
        let mut loose_joints = vec![];
        for _ in 0..2 {
            let mut joint = ServoJoint::new(Unit::new_normalize(Vector3::z()), Vector3::new(0.2, 0.0, 0.0));
            joint.force_limits = (-1e-3, 1e-3);
            tight_joints.push(joint.clone());
            joint.force_limits = (-1e6, 1e6);
            loose_joints.push(joint);
        }

        let motion = Motion::new(2, 4, 0.5).unwrap();
        let x = vec![0.5; 6];

        let mut tight_ctx = EvaluationContext::new(ServoChain::new(tight_joints, 0.01).unwrap(), motion.clone(), DVector::zeros(2));
        let constraint = TorqueLimitConstraint::new(1.0e8);
        assert!(constraint.eval(&x, &mut tight_ctx) > 0.0);

        let mut loose_ctx = EvaluationContext::new(ServoChain::new(loose_joints, 0.01).unwrap(), motion, DVector::zeros(2));
        assert_eq!(constraint.eval(&x, &mut loose_ctx), 0.0);
    }

    #[test]
    fn simulation_faults_become_penalties() {
        struct FaultyEngine;
        impl DynamicsEngine for FaultyEngine {
            fn num_dofs(&self) -> usize { 2 }
            fn time_step(&self) -> f64 { 0.01 }
            fn set_positions(&mut self, _q: &DVector<f64>) {}
            fn set_velocities(&mut self, _dq: &DVector<f64>) {}
            fn set_commands(&mut self, _commands: &DVector<f64>) {}
            fn integrate_velocities(&mut self, _dt: f64) -> Result<(), SimulationFault> {
                Err(SimulationFault::new(0.0, "integrator diverged."))
            }
            fn integrate_positions(&mut self, _dt: f64) -> Result<(), SimulationFault> { Ok(()) }
            fn forces(&self) -> DVector<f64> { DVector::zeros(2) }
            fn force_lower_limit(&self, _dof: usize) -> f64 { -1.0 }
            fn force_upper_limit(&self, _dof: usize) -> f64 { 1.0 }
            fn position_lower_limit(&self, _dof: usize) -> f64 { -1.0 }
            fn position_upper_limit(&self, _dof: usize) -> f64 { 1.0 }
            fn end_effector_position(&self) -> Vector3<f64> { Vector3::zeros() }
        }

        let motion = Motion::new(2, 4, 0.5).unwrap();
        let mut ctx = EvaluationContext::new(FaultyEngine, motion, DVector::zeros(2));

        let objective = EffortObjective::new(1.0e8);
        assert_eq!(objective.eval(&vec![0.1; 6], &mut ctx), 1.0e8);

        let constraint = TargetPositionConstraint::new(Vector3::zeros(), 1.0e8);
        assert_eq!(constraint.eval(&vec![0.1; 6], &mut ctx), 1.0e8);
    }

    #[test]
    fn params_json_round_trip() {
        let mut params = MotionOptimizerParams::default();
        params.num_free_control_points = 3;
        params.final_time = 1.0;
        params.torque_limit_constraint = true;

        let loaded = MotionOptimizerParams::load_from_json_string(&params.to_json_string()).unwrap();
        assert_eq!(loaded.num_free_control_points, 3);
        assert_eq!(loaded.final_time, 1.0);
        assert!(loaded.torque_limit_constraint);
    }

    #[test]
    fn optimizer_setup_validations() {
        let engine = ServoChain::new_uniform(3, 0.2, 0.01).unwrap();
        let mut params = MotionOptimizerParams::default();
        params.num_free_control_points = 0;
        assert!(MotionOptimizer::new(engine, params).is_err());

        let engine = ServoChain::new_uniform(3, 0.2, 0.01).unwrap();
        let mut optimizer = MotionOptimizer::new(engine, MotionOptimizerParams::default()).unwrap();
        assert!(optimizer.set_initial_pose(DVector::zeros(5)).is_err());
        assert!(optimizer.set_final_time(-1.0).is_err());
        assert!(optimizer.set_final_time(2.0).is_ok());
    }

    #[test]
    fn initial_pose_anchors_the_curve() {
        let engine = ServoChain::new_uniform(2, 0.2, 0.01).unwrap();
        let mut optimizer = MotionOptimizer::new(engine, MotionOptimizerParams::default()).unwrap();
        let pose = DVector::from_vec(vec![0.3, -0.7]);
        optimizer.set_initial_pose(pose.clone()).unwrap();

        let start = optimizer.motion().evaluate_position(0.0);
        assert!((start - pose).norm() < 1e-12);
    }

    #[test]
    fn commands_sample_the_curve_velocity() {
        let engine = ServoChain::new_uniform(2, 0.2, 0.01).unwrap();
        let mut params = MotionOptimizerParams::default();
        params.final_time = 1.0;
        let optimizer = MotionOptimizer::new(engine, params).unwrap();
        let commands = optimizer.get_commands(0.5);
        assert_eq!(commands.len(), 2);
        // zero control points: the curve is flat and commands vanish
        assert!(commands.norm() < 1e-12);
    }
}
