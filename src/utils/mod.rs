pub mod utils_console;
pub mod utils_errors;
pub mod utils_math;
pub mod utils_nalgebra;
pub mod utils_sampling;
pub mod utils_splines;
