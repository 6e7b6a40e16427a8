pub mod core;

pub use self::core::RegistryError;
