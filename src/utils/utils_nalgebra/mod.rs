use nalgebra::DVector;

pub struct NalgebraConversions;
impl NalgebraConversions {
    pub fn dvector_to_vec(v: &DVector<f64>) -> Vec<f64> {
        v.as_slice().to_vec()
    }
    pub fn vec_to_dvector(v: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(v)
    }
}
