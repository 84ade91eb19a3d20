//! Token types identifying bindings in the container.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

/// Erased identity under which a provider is registered.
///
/// A binding is reachable through one primary key plus any number of alias
/// keys. Keys compare by identity only: the `TypeId` for type tokens, and the
/// `TypeId` plus registered name for callable tokens. The type name carried
/// alongside is diagnostic and never takes part in equality or hashing.
///
/// # Examples
///
/// ```rust
/// use depin::Key;
/// use std::any::TypeId;
///
/// let a = Key::Type(TypeId::of::<u32>(), "u32");
/// let b = Key::Type(TypeId::of::<u32>(), "some other label");
/// assert_eq!(a, b);
///
/// let f = Key::Named(TypeId::of::<u32>(), "u32", "get_port");
/// assert_ne!(a, f);
/// assert_eq!(f.service_name(), Some("get_port"));
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Type token: a nominal type such as a struct bound through a class-like constructor.
    Type(TypeId, &'static str),
    /// Callable token: a provider function identified by its registered name
    /// and the type it produces.
    Named(TypeId, &'static str, &'static str),
}

impl Key {
    /// Key of the type token for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Key of the callable token `name` producing `T`.
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Key::Named(TypeId::of::<T>(), std::any::type_name::<T>(), name)
    }

    /// The produced type's name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Named(_, name, _) => name,
        }
    }

    /// The callable name for callable tokens, `None` for type tokens.
    pub fn service_name(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) => None,
            Key::Named(_, _, name) => Some(name),
        }
    }

    /// Short label used in error messages and resolution paths: the callable
    /// name when there is one, otherwise the type name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Named(_, _, name) => name,
        }
    }

    /// `TypeId` of the value the token resolves to.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Type(id, _) | Key::Named(id, _, _) => *id,
        }
    }
}

// Identity only; the diagnostic strings are ignored.
impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Named(a, _, name_a), Key::Named(b, _, name_b)) => a == b && name_a == name_b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Named(id, _, name) => {
                1u8.hash(state);
                id.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Type(_, name) => write!(f, "{}", name),
            Key::Named(_, ty, name) => write!(f, "{} -> {}", name, ty),
        }
    }
}

/// Typed handle over a [`Key`].
///
/// `Token<T>` is what callers pass to `get`/`get_async`; the `T` parameter
/// lets the container hand back an `Arc<T>` without the caller downcasting.
///
/// ```rust
/// use depin::{Token, Key};
///
/// struct Config;
/// let by_type = Token::<Config>::of();
/// let by_name = Token::<String>::named("get_greeting");
///
/// assert_eq!(*by_type.key(), Key::of::<Config>());
/// assert_eq!(by_name.key().service_name(), Some("get_greeting"));
/// ```
pub struct Token<T: ?Sized> {
    key: Key,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> Token<T> {
    /// Type token for `T`. `T` may be a trait object, see
    /// [`Container::bind_trait`](crate::Container::bind_trait).
    #[inline]
    pub fn of() -> Self {
        Self::from_key(Key::of::<T>())
    }

    /// Callable token `name` producing `T`.
    #[inline]
    pub fn named(name: &'static str) -> Self {
        Self::from_key(Key::named::<T>(name))
    }

    #[inline]
    pub(crate) fn from_key(key: Key) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Token<T> {
    /// The erased key.
    #[inline]
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl<T: ?Sized> Clone for Token<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Token<T> {}

impl<T: ?Sized> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T: ?Sized> Eq for Token<T> {}

impl<T: ?Sized> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.key).finish()
    }
}

impl<T: ?Sized> From<Token<T>> for Key {
    fn from(token: Token<T>) -> Self {
        token.key
    }
}

// Helper for creating type keys
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::of::<T>()
}
