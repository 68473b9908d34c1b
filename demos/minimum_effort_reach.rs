extern crate motionopt;

use nalgebra::Vector3;
use motionopt::motion_optimization::{MotionOptimizer, MotionOptimizerParams};
use motionopt::simulation::servo_chain::ServoChain;

fn main() {
    // A 6-dof velocity-servo chain stands in for a full rigid-body dynamics
    // engine here.  Any engine implementing `DynamicsEngine` plugs in the
    // same way.
    let engine = ServoChain::new_uniform(6, 0.2, 0.01).expect("error");

    // Three free control points per joint over a one second motion.  The
    // first control point of every joint is anchored at the initial pose and
    // is not an optimization variable, so the search space is 18-dimensional.
    let mut params = MotionOptimizerParams::default();
    params.num_free_control_points = 3;
    params.final_time = 1.0;
    params.max_evaluations = 200;

    let mut optimizer = MotionOptimizer::new(engine, params).expect("error");

    // Ask for the end-effector to reach this point at the end of the motion.
    // The optimizer minimizes integrated actuation effort subject to reaching
    // it; joint position limits bound every control point.
    optimizer.set_target_position_of_end_effector(Vector3::new(0.5, -0.1, 0.1));

    let summary = optimizer.optimize().expect("error");

    println!("\nachieved end-effector position: {:?}", summary.end_effector_position);

    // After optimize() the motion curve holds the optimized control points;
    // a controller samples velocity commands from it for playback.
    println!("\nplayback commands:");
    for step in 0..=10 {
        let t = 0.1 * step as f64;
        let commands = optimizer.get_commands(t);
        println!("  t = {:.1}: {:?}", t, commands.as_slice());
    }
}
