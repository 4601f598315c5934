pub mod bias_math;
pub mod freq_math;
pub mod load_math;
