pub mod debug;
pub mod identity;
pub mod inject;
pub mod interfaces;
pub mod owner;
pub mod store;

pub use debug::{BindingSnapshot, OwnerSnapshot};
pub use identity::{class_display_name, process_nonce, LookupKey, ServiceClass, LOOKUP_NAMESPACE};
pub use inject::Inject;
pub use interfaces::InterfaceRegistry;
pub use owner::{Binding, BindingOrigin, OverrideMode, ServiceOwner};
pub use store::{ServiceContainer, ServiceFactory, ServiceInstance, SingletonContainer};
