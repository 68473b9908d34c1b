use nalgebra::DVector;
use crate::utils::utils_errors::MotionOptError;

/// A B-spline curve over an end-clamped, uniformly spaced knot vector.  The
/// boundary knots carry multiplicity `degree + 1`, so the curve passes through
/// the first and last control points exactly.  Each control point is a vector;
/// one curve therefore carries one scalar channel per dimension.
#[derive(Clone, Debug)]
pub struct ClampedBSpline {
    control_points: Vec<DVector<f64>>,
    knot_vector: Vec<f64>,
    degree: usize
}
impl ClampedBSpline {
    pub fn new(control_points: Vec<DVector<f64>>, degree: usize, start_time: f64, end_time: f64) -> Result<Self, MotionOptError> {
        if control_points.is_empty() {
            return Err(MotionOptError::new_configuration_error("cannot create a spline with no control points.", file!(), line!()));
        }
        if degree == 0 || control_points.len() < degree + 1 {
            return Err(MotionOptError::new_configuration_error(&format!("spline of degree {} needs at least {} control points (got {}).", degree, degree + 1, control_points.len()), file!(), line!()));
        }

        let mut out_self = Self {
            control_points,
            knot_vector: vec![],
            degree
        };
        out_self.set_uniform_knots(start_time, end_time)?;

        Ok(out_self)
    }
    /// Rebuilds the knot vector as uniform over `[start_time, end_time]` with
    /// end-clamped multiplicity.  Control point values are untouched.
    pub fn set_uniform_knots(&mut self, start_time: f64, end_time: f64) -> Result<(), MotionOptError> {
        if end_time <= start_time {
            return Err(MotionOptError::new_configuration_error(&format!("spline knot range [{}, {}] is empty.", start_time, end_time), file!(), line!()));
        }

        let n = self.control_points.len();
        let p = self.degree;
        let num_interior = n - p - 1;
        let spacing = (end_time - start_time) / (num_interior as f64 + 1.0);

        let mut knot_vector = Vec::with_capacity(n + p + 1);
        for _ in 0..p+1 { knot_vector.push(start_time); }
        for i in 0..num_interior { knot_vector.push(start_time + spacing * (i as f64 + 1.0)); }
        for _ in 0..p+1 { knot_vector.push(end_time); }

        self.knot_vector = knot_vector;

        Ok(())
    }
    /// Cox-de Boor recurrence for the basis function of control point `i` at
    /// order `k` (`k == degree + 1` for the full basis).  Zero-width spans from
    /// the clamped boundary knots contribute zero.
    #[inline]
    pub fn cox_de_boor_recurrence(&self, i: usize, k: usize, t: f64) -> f64 {
        assert!(k > 0);
        if k == 1 {
            let t0 = self.knot_vector[i];
            let t1 = self.knot_vector[i + 1];
            if t0 <= t && t < t1 { return 1.0; }
            // the last nonempty span is closed on the right so that the curve
            // is defined at the end of the knot range
            if t == t1 && t1 == *self.knot_vector.last().unwrap() && t0 < t1 { return 1.0; }
            return 0.0;
        }

        let d0 = self.knot_vector[i+k-1] - self.knot_vector[i];
        let d1 = self.knot_vector[i+k] - self.knot_vector[i+1];

        let c0 = if d0 > 0.0 { (t - self.knot_vector[i]) / d0 * self.cox_de_boor_recurrence(i, k-1, t) } else { 0.0 };
        let c1 = if d1 > 0.0 { (self.knot_vector[i+k] - t) / d1 * self.cox_de_boor_recurrence(i+1, k-1, t) } else { 0.0 };

        return c0 + c1;
    }
    /// Derivative of the basis function of control point `i` at order `k`,
    /// differentiated `order` times.
    #[inline]
    pub fn cox_de_boor_derivative(&self, i: usize, k: usize, order: usize, t: f64) -> f64 {
        if order == 0 { return self.cox_de_boor_recurrence(i, k, t); }
        if k <= 1 { return 0.0; }

        let p = (k - 1) as f64;
        let d0 = self.knot_vector[i+k-1] - self.knot_vector[i];
        let d1 = self.knot_vector[i+k] - self.knot_vector[i+1];

        let c0 = if d0 > 0.0 { p / d0 * self.cox_de_boor_derivative(i, k-1, order-1, t) } else { 0.0 };
        let c1 = if d1 > 0.0 { p / d1 * self.cox_de_boor_derivative(i+1, k-1, order-1, t) } else { 0.0 };

        return c0 - c1;
    }
    /// Curve value at `t`.  Outside the knot range the basis support has
    /// ended, so samples decay to zero rather than erroring.
    #[inline]
    pub fn interpolate(&self, t: f64) -> DVector<f64> {
        let mut out_sum = DVector::zeros(self.control_points[0].len());
        for (control_point_idx, control_point) in self.control_points.iter().enumerate() {
            let basis = self.cox_de_boor_recurrence(control_point_idx, self.degree + 1, t);
            if basis != 0.0 { out_sum += control_point * basis; }
        }
        out_sum
    }
    /// `order`-th time derivative of the curve at `t`.
    #[inline]
    pub fn derivative(&self, t: f64, order: usize) -> DVector<f64> {
        let mut out_sum = DVector::zeros(self.control_points[0].len());
        for (control_point_idx, control_point) in self.control_points.iter().enumerate() {
            let basis = self.cox_de_boor_derivative(control_point_idx, self.degree + 1, order, t);
            if basis != 0.0 { out_sum += control_point * basis; }
        }
        out_sum
    }
    #[inline]
    pub fn update_control_point(&mut self, idx: usize, control_point: DVector<f64>) {
        self.control_points[idx] = control_point;
    }
    #[inline]
    pub fn set_control_point_value(&mut self, idx: usize, dim: usize, value: f64) {
        self.control_points[idx][dim] = value;
    }
    #[inline]
    pub fn control_points(&self) -> &Vec<DVector<f64>> {
        &self.control_points
    }
    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }
    #[inline]
    pub fn knot(&self, idx: usize) -> f64 {
        self.knot_vector[idx]
    }
    #[inline]
    pub fn num_knots(&self) -> usize {
        self.knot_vector.len()
    }
}
