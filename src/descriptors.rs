//! Binding descriptors for introspection and diagnostics.

use crate::dependency::Param;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::source::Shape;

/// Snapshot of one active binding.
///
/// Descriptors are derived from the declared parameter lists, so the whole
/// dependency graph can be inspected without constructing anything.
///
/// # Examples
///
/// ```rust
/// use depin::{Container, Lifetime, Param, Shape, Source};
///
/// struct Database;
/// struct Repository;
///
/// let container = Container::new();
/// container.bind(Lifetime::Singleton, Source::class::<Database>(vec![], |_| Ok(Database))).unwrap();
/// container
///     .bind(
///         Lifetime::Request,
///         Source::class::<Repository>(vec![Param::typed::<Database>("db")], |_| Ok(Repository)),
///     )
///     .unwrap();
///
/// let descriptors = container.descriptors();
/// let repo = descriptors
///     .iter()
///     .find(|d| d.type_name().contains("Repository"))
///     .unwrap();
/// assert_eq!(repo.lifetime, Lifetime::Request);
/// assert_eq!(repo.shape, Shape::Class);
/// assert_eq!(repo.dependencies(), vec![depin::Key::of::<Database>()]);
/// ```
#[derive(Debug, Clone)]
pub struct BindingDescriptor {
    /// Token the binding was registered under.
    pub key: Key,
    /// Every other token currently pointing at the same binding.
    pub aliases: Vec<Key>,
    /// Lifetime policy.
    pub lifetime: Lifetime,
    /// Provider shape.
    pub shape: Shape,
    /// Whether the binding resolves only through the asynchronous path.
    pub is_async: bool,
    /// Implementation name: the class type name or the callable's registered name.
    pub impl_name: &'static str,
    /// Declared parameters, in declaration order.
    pub params: Vec<Param>,
}

impl BindingDescriptor {
    /// The callable name for callable tokens, `None` for type tokens.
    pub fn service_name(&self) -> Option<&'static str> {
        self.key.service_name()
    }

    /// The produced type's name.
    pub fn type_name(&self) -> &'static str {
        self.key.type_name()
    }

    /// Whether `key` reaches this binding.
    pub fn answers_to(&self, key: &Key) -> bool {
        self.key == *key || self.aliases.contains(key)
    }

    /// Tokens the parameters name explicitly or by declared type, skipping
    /// variadic parameters. Declared types are listed whether bound or not.
    pub fn dependencies(&self) -> Vec<Key> {
        self.params
            .iter()
            .filter(|p| p.kind() == crate::dependency::ParamKind::Named)
            .filter_map(|p| p.marker().map(|m| *m.key()).or_else(|| p.declared().copied()))
            .collect()
    }
}
