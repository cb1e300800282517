pub mod active;
pub mod config;
pub mod context;
mod error;
pub mod gate;
pub mod hostname;
pub mod log;
pub mod model;
pub mod modules;
pub mod output;
pub mod passive;
pub mod predictor;
pub mod probe;
pub mod scan;
pub mod tracking;

pub use error::{Error, Result};
