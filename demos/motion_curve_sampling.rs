extern crate motionopt;

use motionopt::motion::Motion;

fn main() {
    // A 2-dof motion with five control points per joint over two seconds.
    let mut motion = Motion::new(2, 5, 2.0).expect("error");

    // Shape the curve by hand.  Control point 0 stays at the initial
    // configuration; the curve interpolates the first and last control points
    // exactly because the knot vector is end-clamped.
    motion.set_control_point(0, 1, 0.8);
    motion.set_control_point(0, 2, 1.2);
    motion.set_control_point(0, 3, 0.4);
    motion.set_control_point(0, 4, 1.0);
    motion.set_control_point(1, 2, -0.6);
    motion.set_control_point(1, 4, -1.0);

    println!("control points:");
    print!("{}", motion.control_points_string());

    println!("samples:");
    for step in 0..=8 {
        let t = 0.25 * step as f64;
        println!(
            "  t = {:.2}: q = ({:+.3}, {:+.3})  dq = ({:+.3}, {:+.3})",
            t,
            motion.position(0, t),
            motion.position(1, t),
            motion.velocity(0, t),
            motion.velocity(1, t)
        );
    }

    // Rescaling the horizon only rebuilds the knot vector; the control point
    // values survive unchanged.
    motion.set_final_time(4.0).expect("error");
    println!("\nafter stretching the horizon to 4 s, the endpoint still interpolates:");
    println!("  q(4.0) = ({:+.3}, {:+.3})", motion.position(0, 4.0), motion.position(1, 4.0));

    motion.write_plot_data("/tmp/motionopt_plot_", 0.001).expect("error");
    println!("\nwrote /tmp/motionopt_plot_0 and /tmp/motionopt_plot_1 (t q dq ddq rows).");
}
