//! Class identity and lookup keys
//!
//! A [`ServiceClass`] is the runtime descriptor of a [`Service`] type: its
//! `TypeId`, names and statically declared parent. A [`LookupKey`] is the
//! string the underlying container stores a binding under. Keys are built
//! from a fixed namespace, the class's display name and a per-process nonce,
//! so they stay out of the way of anything else registered in the same
//! container.
//!
//! The nonce is random, not secret. It keeps independently authored keys
//! from colliding by accident; it does not stop anyone from computing a key
//! on purpose.

use crate::foundation::traits::Service;
use serde::{Serialize, Serializer};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use uuid::Uuid;

/// Namespace prefix of every lookup key
pub const LOOKUP_NAMESPACE: &str = "service:typed-services";

static PROCESS_NONCE: OnceLock<String> = OnceLock::new();

/// The per-process nonce, generated on first use
pub fn process_nonce() -> &'static str {
    PROCESS_NONCE.get_or_init(generate_nonce)
}

fn generate_nonce() -> String {
    // Low 64 bits of a v4 UUID: 62 random bits after the variant marker.
    let bits = Uuid::new_v4().as_u128() as u64;
    to_base36(bits)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::with_capacity(13);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// A type name with every path reduced to its last segment. Generic
/// arguments are kept so each instantiation reads differently:
/// `app::Repository<app::User>` becomes `Repository<User>`.
fn short_type_name(type_name: &str) -> String {
    let mut short = String::with_capacity(type_name.len());
    let mut segment_start = 0;

    for (index, c) in type_name.char_indices() {
        if matches!(c, '<' | '>' | ',' | '(' | ')' | '[' | ']' | '&' | ';' | ' ') {
            short.push_str(last_path_segment(&type_name[segment_start..index]));
            short.push(c);
            segment_start = index + c.len_utf8();
        }
    }
    short.push_str(last_path_segment(&type_name[segment_start..]));

    short.trim().to_string()
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Runtime descriptor of a service class
#[derive(Clone, Copy)]
pub struct ServiceClass {
    type_id: TypeId,
    type_name: &'static str,
    declared_name: Option<&'static str>,
    parent: fn() -> Option<ServiceClass>,
}

impl ServiceClass {
    /// Descriptor for a service type
    pub fn of<T: Service>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            declared_name: T::NAME,
            parent: T::parent,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Human-readable class name
    pub fn display_name(&self) -> String {
        class_display_name(self)
    }

    /// Immediate ancestor, if the class declares one
    pub fn parent(&self) -> Option<ServiceClass> {
        (self.parent)()
    }

    /// Ancestors from the immediate parent upwards; the class itself is not included
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
            seen: vec![self.type_id],
        }
    }

    /// Whether `base` appears in this class's ancestor chain
    pub fn is_strict_descendant_of(&self, base: &ServiceClass) -> bool {
        self != base && self.ancestors().any(|ancestor| ancestor == *base)
    }

    /// The key this class's binding is stored under
    pub fn lookup_key(&self) -> LookupKey {
        LookupKey::for_class(self)
    }
}

impl PartialEq for ServiceClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceClass {}

impl Hash for ServiceClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClass")
            .field("type_name", &self.type_name)
            .field("parent", &self.parent().map(|parent| parent.type_name))
            .finish()
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl Serialize for ServiceClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_name())
    }
}

/// Iterator over a class's declared ancestors
///
/// Declared parents can form a cycle by mistake; iteration stops at the
/// first class seen twice.
pub struct Ancestors {
    next: Option<ServiceClass>,
    seen: Vec<TypeId>,
}

impl Iterator for Ancestors {
    type Item = ServiceClass;

    fn next(&mut self) -> Option<ServiceClass> {
        let current = self.next.take()?;
        if self.seen.contains(&current.type_id) {
            tracing::warn!(
                class = current.type_name,
                "Cycle in declared service parents"
            );
            return None;
        }
        self.seen.push(current.type_id);
        self.next = current.parent();
        Some(current)
    }
}

/// The declared name of a class, or its type name without module paths.
/// Empty when neither yields anything.
pub fn class_display_name(class: &ServiceClass) -> String {
    match class.declared_name {
        Some(name) => name.to_string(),
        None => short_type_name(class.type_name),
    }
}

/// Key under which a binding is stored in the underlying container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LookupKey(String);

impl LookupKey {
    /// A raw key, for entries the container holds outside the registry
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn for_class(class: &ServiceClass) -> Self {
        Self(format!(
            "{}_{}_{}",
            LOOKUP_NAMESPACE,
            class_display_name(class),
            process_nonce()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LookupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    trait Shape: Send + Sync {}

    #[derive(Default)]
    struct Polygon;
    impl Shape for Polygon {}

    #[derive(Default)]
    struct Triangle;
    impl Shape for Triangle {}

    #[derive(Default)]
    struct RightTriangle;
    impl Shape for RightTriangle {}

    crate::service!(Polygon => dyn Shape);
    crate::service!(Triangle: Polygon => dyn Shape);
    crate::service!(RightTriangle: Triangle => dyn Shape);

    #[derive(Default)]
    struct Renamed;

    impl Service for Renamed {
        type View = Renamed;
        const NAME: Option<&'static str> = Some("CustomName");

        fn into_view(self: Arc<Self>) -> Arc<Self> {
            self
        }
    }

    mod elsewhere {
        #[derive(Default)]
        pub struct Polygon;
        crate::service!(Polygon => Polygon);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ServiceClass::of::<Triangle>().display_name(), "Triangle");
        assert_eq!(ServiceClass::of::<Renamed>().display_name(), "CustomName");
        assert_eq!(short_type_name("a::b::Wrapper<c::Inner>"), "Wrapper<Inner>");
        assert_eq!(
            short_type_name("a::Pair<b::Left, (c::D, [e::F; 2])>"),
            "Pair<Left, (D, [F; 2])>"
        );
        assert_eq!(short_type_name(""), "");
    }

    struct Repository<E> {
        _entity: std::marker::PhantomData<E>,
    }

    impl<E> Default for Repository<E> {
        fn default() -> Self {
            Self {
                _entity: std::marker::PhantomData,
            }
        }
    }

    struct User;
    struct Order;

    impl<E: Send + Sync + 'static> Service for Repository<E> {
        type View = Repository<E>;

        fn into_view(self: Arc<Self>) -> Arc<Self> {
            self
        }
    }

    #[test]
    fn test_generic_instantiations_get_distinct_keys() {
        let users = ServiceClass::of::<Repository<User>>();
        let orders = ServiceClass::of::<Repository<Order>>();

        assert_eq!(users.display_name(), "Repository<User>");
        assert_eq!(orders.display_name(), "Repository<Order>");
        assert_ne!(users.lookup_key(), orders.lookup_key());
    }

    #[test]
    fn test_lookup_key_is_stable() {
        let class = ServiceClass::of::<Triangle>();
        assert_eq!(class.lookup_key(), class.lookup_key());
        assert_eq!(
            class.lookup_key().as_str(),
            format!("{}_Triangle_{}", LOOKUP_NAMESPACE, process_nonce())
        );
    }

    #[test]
    fn test_distinct_names_give_distinct_keys() {
        assert_ne!(
            ServiceClass::of::<Triangle>().lookup_key(),
            ServiceClass::of::<Polygon>().lookup_key()
        );
    }

    #[test]
    fn test_same_name_is_same_key_but_different_class() {
        let ours = ServiceClass::of::<Polygon>();
        let theirs = ServiceClass::of::<elsewhere::Polygon>();
        assert_ne!(ours, theirs);
        assert_eq!(ours.lookup_key(), theirs.lookup_key());
    }

    #[test]
    fn test_nonce_is_compact_alphanumeric() {
        let nonce = process_nonce();
        assert!(!nonce.is_empty());
        assert!(nonce.len() <= 13);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(nonce, process_nonce());
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_ancestor_walk() {
        let right = ServiceClass::of::<RightTriangle>();
        let chain: Vec<String> = right.ancestors().map(|c| c.display_name()).collect();
        assert_eq!(chain, vec!["Triangle", "Polygon"]);

        let polygon = ServiceClass::of::<Polygon>();
        assert!(right.is_strict_descendant_of(&polygon));
        assert!(!polygon.is_strict_descendant_of(&right));
        assert!(!polygon.is_strict_descendant_of(&polygon));
    }

    #[derive(Default)]
    struct Ouroboros;

    impl Service for Ouroboros {
        type View = Ouroboros;

        fn parent() -> Option<ServiceClass> {
            Some(ServiceClass::of::<Ouroboros>())
        }

        fn into_view(self: Arc<Self>) -> Arc<Self> {
            self
        }
    }

    #[test]
    fn test_ancestor_cycle_terminates() {
        let class = ServiceClass::of::<Ouroboros>();
        assert_eq!(class.ancestors().count(), 0);
        assert!(!class.is_strict_descendant_of(&class));
    }
}
