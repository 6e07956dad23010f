pub mod sample_type;
pub mod temperature;
