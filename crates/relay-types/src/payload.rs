//! # Payload Types
//!
//! Type-erased payloads and the discriminators used by channel allow-lists.
//!
//! A channel declares the closed set of payload shapes it accepts as a set of
//! [`PayloadType`] values. Matching is exact type identity: a `u32` never
//! satisfies an allow-list that names `u64`, and a newtype never satisfies the
//! type it wraps.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Discriminator for one concrete payload type.
///
/// Equality and hashing use only the [`TypeId`]; the name is carried for
/// diagnostics and error messages.
#[derive(Clone, Copy)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    /// Discriminator for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name, as reported by `std::any::type_name`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The underlying type id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

impl Hash for PayloadType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PayloadType").field(&self.name).finish()
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A shared, immutable, type-erased payload value.
///
/// Cloning is cheap: all clones point at the same value.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    kind: PayloadType,
}

impl Payload {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            kind: PayloadType::of::<T>(),
        }
    }

    /// The concrete type of the wrapped value.
    #[must_use]
    pub fn kind(&self) -> PayloadType {
        self.kind
    }

    /// Returns true if the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.kind == PayloadType::of::<T>()
    }

    /// Borrow the wrapped value as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("kind", &self.kind.name)
            .finish_non_exhaustive()
    }
}

/// Build an allow-list from a list of types.
///
/// ```rust
/// use relay_types::{payload_types, PayloadType};
///
/// let allowed = payload_types![u64, String];
/// assert!(allowed.contains(&PayloadType::of::<String>()));
/// ```
#[macro_export]
macro_rules! payload_types {
    ($($ty:ty),* $(,)?) => {
        vec![$($crate::PayloadType::of::<$ty>()),*]
    };
}
