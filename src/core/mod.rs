pub mod aspect;
pub mod types;
