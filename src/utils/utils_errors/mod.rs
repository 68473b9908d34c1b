use std::fmt;

/// A common error type returned by functions throughout the toolbox.
#[derive(Clone, Debug)]
pub enum MotionOptError {
    GenericError(String),
    ConfigurationError(String),
    IdxOutOfBoundError(String)
}
impl MotionOptError {
    pub fn new_generic_error_str(s: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: {} -- File: {}, Line: {}", s, file, line);
        return Self::GenericError(s);
    }
    pub fn new_configuration_error(s: &str, file: &str, line: u32) -> Self {
        let s = format!("CONFIGURATION ERROR: {} -- File: {}, Line: {}", s, file, line);
        return Self::ConfigurationError(s);
    }
    pub fn new_idx_out_of_bound_error(given_idx: usize, length_of_array: usize, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Index {:?} is too large for the array of length {:?} -- File: {}, Line: {}", given_idx, length_of_array, file, line);
        return Self::IdxOutOfBoundError(s)
    }
}
impl fmt::Display for MotionOptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionOptError::GenericError(s) => { write!(f, "{}", s) }
            MotionOptError::ConfigurationError(s) => { write!(f, "{}", s) }
            MotionOptError::IdxOutOfBoundError(s) => { write!(f, "{}", s) }
        }
    }
}
