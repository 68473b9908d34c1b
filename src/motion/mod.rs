use std::fs::File;
use std::io::Write;
use nalgebra::DVector;
use serde::{Serialize, Deserialize};
use crate::utils::utils_errors::MotionOptError;
use crate::utils::utils_splines::ClampedBSpline;

/// Role of one control point column in the optimization.  The first control
/// point of every degree of freedom is anchored at the mechanism's initial
/// configuration and is never a free variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlPointKind {
    Anchored,
    Free
}

/// A smooth joint-space trajectory for a mechanism with a fixed number of
/// degrees of freedom.  One clamped B-spline channel per degree of freedom,
/// all channels sharing a uniform knot vector over `[0, final_time]`.  The
/// degree-of-freedom count is fixed at construction and cannot change.
#[derive(Clone, Debug)]
pub struct Motion {
    spline: ClampedBSpline,
    control_point_kinds: Vec<ControlPointKind>,
    num_dofs: usize,
    final_time: f64
}
impl Motion {
    /// `num_control_points` counts all control points per degree of freedom,
    /// including the anchored first one.  All control points start at zero.
    pub fn new(num_dofs: usize, num_control_points: usize, final_time: f64) -> Result<Self, MotionOptError> {
        if num_dofs == 0 {
            return Err(MotionOptError::new_configuration_error("cannot create a motion for a mechanism with zero degrees of freedom.", file!(), line!()));
        }
        if num_control_points < 2 {
            return Err(MotionOptError::new_configuration_error(&format!("motion needs at least 2 control points per degree of freedom (got {}).", num_control_points), file!(), line!()));
        }
        if final_time <= 0.0 {
            return Err(MotionOptError::new_configuration_error(&format!("final time must be positive (got {}).", final_time), file!(), line!()));
        }

        let degree = usize::min(3, num_control_points - 1);
        let control_points = vec![DVector::zeros(num_dofs); num_control_points];
        let spline = ClampedBSpline::new(control_points, degree, 0.0, final_time)?;

        let mut control_point_kinds = vec![ControlPointKind::Free; num_control_points];
        control_point_kinds[0] = ControlPointKind::Anchored;

        Ok(Self {
            spline,
            control_point_kinds,
            num_dofs,
            final_time
        })
    }
    /// Re-derives the knot vector over `[0, final_time]`; control point values
    /// are preserved.  Fails for a non-positive final time.
    pub fn set_final_time(&mut self, final_time: f64) -> Result<(), MotionOptError> {
        if final_time <= 0.0 {
            return Err(MotionOptError::new_configuration_error(&format!("final time must be positive (got {}).", final_time), file!(), line!()));
        }
        self.final_time = final_time;
        self.spline.set_uniform_knots(0.0, final_time)
    }
    pub fn final_time(&self) -> f64 {
        self.final_time
    }
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }
    pub fn num_control_points(&self) -> usize {
        self.spline.control_points().len()
    }
    pub fn control_point_kind(&self, idx: usize) -> ControlPointKind {
        self.control_point_kinds[idx]
    }
    /// Indices of the control points that are free optimization variables.
    pub fn free_control_point_indices(&self) -> Vec<usize> {
        self.control_point_kinds.iter().enumerate()
            .filter(|(_, kind)| **kind == ControlPointKind::Free)
            .map(|(idx, _)| idx)
            .collect()
    }
    /// Direct access; indices out of range panic, callers are responsible.
    pub fn set_control_point(&mut self, dof: usize, idx: usize, value: f64) {
        self.spline.set_control_point_value(idx, dof, value);
    }
    pub fn control_point(&self, dof: usize, idx: usize) -> f64 {
        self.spline.control_points()[idx][dof]
    }
    /// One value per degree of freedom at time `t`.  `t` outside
    /// `[0, final_time]` is not an error; the clamped basis support has ended
    /// there, so samples decay toward zero.
    pub fn evaluate_position(&self, t: f64) -> DVector<f64> {
        self.spline.interpolate(t)
    }
    pub fn evaluate_velocity(&self, t: f64) -> DVector<f64> {
        self.spline.derivative(t, 1)
    }
    pub fn evaluate_acceleration(&self, t: f64) -> DVector<f64> {
        self.spline.derivative(t, 2)
    }
    pub fn position(&self, dof: usize, t: f64) -> f64 {
        self.evaluate_position(t)[dof]
    }
    pub fn velocity(&self, dof: usize, t: f64) -> f64 {
        self.evaluate_velocity(t)[dof]
    }
    pub fn acceleration(&self, dof: usize, t: f64) -> f64 {
        self.evaluate_acceleration(t)[dof]
    }
    /// Control point grid rendered one row per degree of freedom.
    pub fn control_points_string(&self) -> String {
        let mut out = String::new();
        for dof in 0..self.num_dofs {
            for idx in 0..self.num_control_points() {
                out += &format!("{:>10.4} ", self.control_point(dof, idx));
            }
            out += "\n";
        }
        out
    }
    /// Writes sampled `t position velocity acceleration` rows, one file per
    /// degree of freedom at `<path_prefix><dof>`.
    pub fn write_plot_data(&self, path_prefix: &str, sample_dt: f64) -> Result<(), MotionOptError> {
        if sample_dt <= 0.0 {
            return Err(MotionOptError::new_configuration_error(&format!("sample step must be positive (got {}).", sample_dt), file!(), line!()));
        }

        let num_frames = (self.final_time / sample_dt) as usize;

        for dof in 0..self.num_dofs {
            let path = format!("{}{}", path_prefix, dof);
            let mut file = File::create(&path)
                .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not create plot file {}: {}", path, e), file!(), line!()))?;
            for frame in 0..num_frames {
                let t = sample_dt * frame as f64;
                writeln!(file, "{} {} {} {}", t, self.position(dof, t), self.velocity(dof, t), self.acceleration(dof, t))
                    .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not write plot file {}: {}", path, e), file!(), line!()))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_bad_configurations() {
        assert!(Motion::new(0, 4, 1.0).is_err());
        assert!(Motion::new(3, 1, 1.0).is_err());
        assert!(Motion::new(3, 4, 0.0).is_err());
        assert!(Motion::new(3, 4, -2.0).is_err());
    }

    #[test]
    fn first_control_point_is_anchored() {
        let motion = Motion::new(2, 4, 1.0).unwrap();
        assert_eq!(motion.control_point_kind(0), ControlPointKind::Anchored);
        for idx in 1..4 {
            assert_eq!(motion.control_point_kind(idx), ControlPointKind::Free);
        }
        assert_eq!(motion.free_control_point_indices(), vec![1, 2, 3]);
    }

    #[test]
    fn control_point_round_trip() {
        let mut motion = Motion::new(3, 5, 2.0).unwrap();
        motion.set_control_point(1, 3, 0.75);
        assert_eq!(motion.control_point(1, 3), 0.75);
        motion.set_final_time(4.0).unwrap();
        assert_eq!(motion.control_point(1, 3), 0.75);
    }

    #[test]
    fn curve_interpolates_boundary_control_points() {
        let mut motion = Motion::new(2, 4, 1.5).unwrap();
        motion.set_control_point(0, 0, -0.4);
        motion.set_control_point(1, 0, 0.9);
        motion.set_control_point(0, 3, 1.1);
        motion.set_control_point(1, 3, -2.0);
        motion.set_control_point(0, 1, 5.0);

        let start = motion.evaluate_position(0.0);
        let end = motion.evaluate_position(1.5);
        for dof in 0..2 {
            assert!((start[dof] - motion.control_point(dof, 0)).abs() < 1e-12);
            assert!((end[dof] - motion.control_point(dof, 3)).abs() < 1e-12);
        }
    }

    #[test]
    fn set_final_time_twice_only_changes_knots() {
        let mut motion = Motion::new(2, 5, 1.0).unwrap();
        motion.set_control_point(0, 2, 0.3);
        motion.set_control_point(1, 4, -0.8);

        motion.set_final_time(2.0).unwrap();
        motion.set_final_time(0.5).unwrap();

        assert_eq!(motion.control_point(0, 2), 0.3);
        assert_eq!(motion.control_point(1, 4), -0.8);
        assert_eq!(motion.final_time(), 0.5);

        // the curve still interpolates the endpoints after the rebuilds
        let end = motion.evaluate_position(0.5);
        assert!((end[1] - motion.control_point(1, 4)).abs() < 1e-12);
    }

    #[test]
    fn velocity_is_zero_for_constant_curve() {
        let mut motion = Motion::new(2, 4, 1.0).unwrap();
        for dof in 0..2 {
            for idx in 0..4 {
                motion.set_control_point(dof, idx, 0.6);
            }
        }
        for &t in &[0.0, 0.25, 0.5, 0.99] {
            assert!(motion.evaluate_velocity(t).norm() < 1e-12);
            assert!((motion.evaluate_position(t)[0] - 0.6).abs() < 1e-12);
        }
    }
}
