pub mod traits;

pub use traits::Service;
