//! # typed-services-testing
//!
//! Test support for code built on `typed-services-core`: a fresh owner per
//! test, mock registration that bypasses override validation, and logging
//! setup for test runs.
//!
//! ```rust
//! use typed_services_core::service;
//! use typed_services_testing::prelude::*;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! #[derive(Default)]
//! struct SystemClock;
//! impl Clock for SystemClock {
//!     fn now(&self) -> u64 { 1_700_000_000 }
//! }
//!
//! #[derive(Default)]
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 { 0 }
//! }
//!
//! service!(SystemClock => dyn Clock);
//! service!(FixedClock => dyn Clock);
//!
//! let owner = TestOwner::new();
//! register_mock::<SystemClock, FixedClock, _>(owner.owner())?;
//! assert_eq!(owner.inject::<SystemClock>()?.now(), 0);
//! # Ok::<(), typed_services_testing::TestError>(())
//! ```

pub mod fixtures;
pub mod logging;
pub mod mock;

pub use fixtures::TestOwner;
pub use logging::init_test_logging;
pub use mock::register_mock;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{init_test_logging, register_mock, TestError, TestOwner, TestResult};
    pub use typed_services_core::{Inject, InterfaceRegistry, RegistryError, Service, ServiceOwner};
}

#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Registry error: {0}")]
    Registry(#[from] typed_services_core::RegistryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TestResult<T> = Result<T, TestError>;
