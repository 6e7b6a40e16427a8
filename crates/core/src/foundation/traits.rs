use crate::container::identity::ServiceClass;
use std::sync::Arc;

/// A class that can be injected, bound by default, or used as an override
///
/// Rust has no class inheritance, so a service hierarchy is declared
/// explicitly: every service names its immediate parent (if any), and every
/// class in one hierarchy converts into the same consumer-facing [`View`].
/// The view is usually a trait object shared by the contract and all of its
/// implementations, which is what lets an override stand in for its base.
///
/// ```rust
/// use std::sync::Arc;
/// use typed_services_core::{Service, ServiceClass};
///
/// trait Shape: Send + Sync {
///     fn area(&self) -> f64;
/// }
///
/// #[derive(Default)]
/// struct UnitSquare;
/// impl Shape for UnitSquare {
///     fn area(&self) -> f64 { 1.0 }
/// }
///
/// impl Service for UnitSquare {
///     type View = dyn Shape;
///     fn into_view(self: Arc<Self>) -> Arc<dyn Shape> { self }
/// }
///
/// assert_eq!(ServiceClass::of::<UnitSquare>().display_name(), "UnitSquare");
/// ```
///
/// [`View`]: Service::View
pub trait Service: Default + Send + Sync + Sized + 'static {
    /// What consumers receive when they resolve this class or any override of it
    type View: ?Sized + Send + Sync + 'static;

    /// Declared display name. When absent the last path segment of the
    /// type name is used.
    const NAME: Option<&'static str> = None;

    /// Immediate ancestor in the service hierarchy
    fn parent() -> Option<ServiceClass> {
        None
    }

    /// Convert a constructed instance into the hierarchy's view
    fn into_view(self: Arc<Self>) -> Arc<Self::View>;
}

/// Implement [`Service`] for a type with an optional parent
///
/// ```rust
/// use typed_services_core::service;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// #[derive(Default)]
/// struct Plain;
/// impl Greeter for Plain {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// #[derive(Default)]
/// struct Loud;
/// impl Greeter for Loud {
///     fn greet(&self) -> String { "HELLO".into() }
/// }
///
/// service!(Plain => dyn Greeter);
/// service!(Loud: Plain => dyn Greeter);
/// ```
#[macro_export]
macro_rules! service {
    ($ty:ty : $parent:ty => $view:ty) => {
        impl $crate::Service for $ty {
            type View = $view;

            fn parent() -> ::std::option::Option<$crate::ServiceClass> {
                ::std::option::Option::Some($crate::ServiceClass::of::<$parent>())
            }

            fn into_view(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<Self::View> {
                self
            }
        }
    };
    ($ty:ty => $view:ty) => {
        impl $crate::Service for $ty {
            type View = $view;

            fn into_view(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<Self::View> {
                self
            }
        }
    };
}
