pub mod persistence;
pub mod transformer;
