//! Priority levels and alert generation.

pub mod alerts;
pub mod priority;
