pub struct FiniteDifferenceUtils;
impl FiniteDifferenceUtils {
    /// Central-difference gradient of a scalar function at `x`.  Costs two
    /// function evaluations per dimension.
    pub fn central_difference_gradient<F: FnMut(&[f64]) -> f64>(mut f: F, x: &[f64], step: f64) -> Vec<f64> {
        assert!(step > 0.0);

        let mut out_vec = vec![0.0; x.len()];
        let mut perturbed = x.to_vec();

        for i in 0..x.len() {
            perturbed[i] = x[i] + step;
            let upper = f(&perturbed);
            perturbed[i] = x[i] - step;
            let lower = f(&perturbed);
            perturbed[i] = x[i];

            out_vec[i] = (upper - lower) / (2.0 * step);
        }

        out_vec
    }
}
