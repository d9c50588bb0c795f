//! Service configuration

mod settings;

pub use settings::*;
