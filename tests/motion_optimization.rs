use nalgebra::{DVector, Vector3};
use motionopt::motion_optimization::{MotionOptimizer, MotionOptimizerParams};
use motionopt::simulation::servo_chain::ServoChain;

fn scenario_params() -> MotionOptimizerParams {
    let mut params = MotionOptimizerParams::default();
    params.num_free_control_points = 3;
    params.final_time = 1.0;
    params.max_evaluations = 50;
    params.verbose = false;
    params
}

#[test]
fn optimize_reduces_the_target_residual() {
    let engine = ServoChain::new_uniform(6, 0.2, 0.01).unwrap();
    let mut optimizer = MotionOptimizer::new(engine, scenario_params()).unwrap();
    optimizer.set_target_position_of_end_effector(Vector3::new(0.5, -0.1, 0.1));

    let summary = optimizer.optimize().unwrap();

    assert_eq!(summary.x.len(), 18);
    assert!(summary.initial_target_residual > 0.1);
    assert!(
        summary.target_residual < summary.initial_target_residual,
        "residual {} did not improve on the initial guess residual {}",
        summary.target_residual,
        summary.initial_target_residual
    );
}

#[test]
fn optimized_variables_respect_the_position_bounds() {
    let engine = ServoChain::new_uniform(6, 0.2, 0.01).unwrap();
    let mut optimizer = MotionOptimizer::new(engine, scenario_params()).unwrap();
    optimizer.set_target_position_of_end_effector(Vector3::new(0.5, -0.1, 0.1));

    let bounds = optimizer.variable_bounds();
    let summary = optimizer.optimize().unwrap();

    for (value, (lower, upper)) in summary.x.iter().zip(bounds.iter()) {
        assert!(lower - 1e-9 <= *value && *value <= upper + 1e-9);
    }
}

#[test]
fn optimize_leaves_the_curve_ready_for_playback() {
    let engine = ServoChain::new_uniform(6, 0.2, 0.01).unwrap();
    let mut optimizer = MotionOptimizer::new(engine, scenario_params()).unwrap();
    let initial_pose = DVector::from_vec(vec![0.1, -0.1, 0.2, 0.0, 0.1, -0.2]);
    optimizer.set_initial_pose(initial_pose.clone()).unwrap();
    optimizer.set_target_position_of_end_effector(Vector3::new(0.5, -0.1, 0.1));

    let summary = optimizer.optimize().unwrap();

    // the curve holds the optimized control points and still starts at the
    // initial configuration
    let start = optimizer.motion().evaluate_position(0.0);
    assert!((start - &initial_pose).norm() < 1e-9);

    let flattened = {
        let motion = optimizer.motion();
        let layout = motionopt::motion_optimization::VariableLayout::from_motion(motion);
        layout.flatten_variables(motion)
    };
    for (a, b) in flattened.iter().zip(summary.x.iter()) {
        assert!((a - b).abs() < 1e-12);
    }

    // playback commands are finite across the horizon
    let mut t = 0.0;
    while t < optimizer.final_time() {
        let commands = optimizer.get_commands(t);
        assert!(commands.iter().all(|v| v.is_finite()));
        t += 0.05;
    }

    // and the engine can be driven back to the initial pose
    optimizer.set_to_initial_pose();
    assert!((optimizer.engine().positions() - &initial_pose).norm() < 1e-12);
}

#[test]
fn evaluation_is_reproducible_across_identical_runs() {
    let build = || {
        let engine = ServoChain::new_uniform(6, 0.2, 0.01).unwrap();
        MotionOptimizer::new(engine, scenario_params()).unwrap()
    };

    let x: Vec<f64> = (0..18).map(|i| 0.05 * (i as f64) - 0.4).collect();

    let mut first = build();
    let mut second = build();
    let a = first.evaluate(&x, true).unwrap();
    let b = second.evaluate(&x, true).unwrap();

    assert_eq!(a.end_effector_position, b.end_effector_position);
    let a_torques = a.torques.unwrap();
    let b_torques = b.torques.unwrap();
    assert_eq!(a_torques, b_torques);
}

#[test]
fn tight_torque_limits_flag_the_scenario_motion() {
    use motionopt::simulation::servo_chain::ServoJoint;
    use nalgebra::{Unit, Vector3 as V3};

    let mut joints = vec![];
    for i in 0..4 {
        let axis = if i % 2 == 0 { Unit::new_normalize(V3::z()) } else { Unit::new_normalize(V3::y()) };
        let mut joint = ServoJoint::new(axis, V3::new(0.2, 0.0, 0.0));
        joint.force_limits = (-0.05, 0.05);
        joints.push(joint);
    }
    let engine = ServoChain::new(joints, 0.01).unwrap();

    let mut params = scenario_params();
    params.torque_limit_constraint = true;
    let mut optimizer = MotionOptimizer::new(engine, params).unwrap();
    optimizer.set_target_position_of_end_effector(Vector3::new(0.3, 0.2, 0.0));

    // a clearly moving candidate violates the deliberately tight limits
    let x = vec![0.6; 12];
    let evaluation = optimizer.evaluate(&x, true).unwrap();
    let torques = evaluation.torques.unwrap();
    let over_limit = torques.iter().any(|tau| tau.iter().any(|v| v.abs() > 0.05));
    assert!(over_limit);
}
