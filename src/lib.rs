//! AXIS: drawing balloon inspection toolkit
//!
//! Features are numbered regions ("balloons") on an engineering drawing, each
//! with a measurement method and a tolerance band. Results are recorded per
//! work order and summarised as process capability across work orders.

pub mod cli;
pub mod core;
pub mod entities;
