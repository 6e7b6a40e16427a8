pub mod registry_config;
pub mod validation;

pub use registry_config::*;
pub use validation::*;
