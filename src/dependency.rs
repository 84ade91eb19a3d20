//! Statically declared dependency descriptors and resolved arguments.
//!
//! Each [`Source`](crate::Source) carries a list of [`Param`]s describing
//! what its body needs. The list is produced once when the source is built
//! and is the only thing the resolver consults, so the dependency graph can
//! be inspected without running any provider.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{Key, Token};
use crate::registration::AnyArc;
use crate::scope::ScopeStore;

/// Dependency marker naming the exact token that supplies a parameter.
///
/// A marker takes precedence over the parameter's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inject(Key);

impl Inject {
    /// Marker for the token `token`.
    pub fn token<T: ?Sized>(token: &Token<T>) -> Self {
        Inject(*token.key())
    }

    /// Marker for the type token of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Inject(Key::of::<T>())
    }

    /// The wrapped token.
    pub fn key(&self) -> &Key {
        &self.0
    }
}

/// Whether a parameter takes part in resolution at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Ordinary named parameter.
    Named,
    /// Variadic parameter; never resolved and never required.
    Rest,
}

/// Declared dependency of a provider.
///
/// # Examples
///
/// ```rust
/// use depin::{Inject, Param, Token};
///
/// struct Db;
/// let get_config = Token::<String>::named("get_config");
///
/// let params = vec![
///     Param::typed::<Db>("db"),
///     Param::inject("config", &get_config),
///     Param::typed::<u32>("retries").with_default(),
/// ];
/// assert_eq!(params[1].marker(), Some(&Inject::token(&get_config)));
/// assert!(params[2].has_default());
/// ```
#[derive(Debug, Clone)]
pub struct Param {
    name: &'static str,
    kind: ParamKind,
    declared: Option<Key>,
    marker: Option<Inject>,
    has_default: bool,
}

impl Param {
    /// Parameter with declared type `T`; supplied from `T`'s binding when one exists.
    pub fn typed<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Named,
            declared: Some(Key::of::<T>()),
            marker: None,
            has_default: false,
        }
    }

    /// Parameter with no declared type, supplied by the given marker token.
    pub fn inject<T: ?Sized>(name: &'static str, token: &Token<T>) -> Self {
        Self {
            name,
            kind: ParamKind::Named,
            declared: None,
            marker: Some(Inject::token(token)),
            has_default: false,
        }
    }

    /// Parameter with neither a declared type nor a marker. Only useful together
    /// with [`with_default`](Self::with_default).
    pub fn untyped(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Named,
            declared: None,
            marker: None,
            has_default: false,
        }
    }

    /// Variadic parameter; skipped by the resolver.
    pub fn rest(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Rest,
            declared: None,
            marker: None,
            has_default: true,
        }
    }

    /// Attaches a marker, overriding the declared type as the supplying token.
    pub fn with_marker(mut self, marker: Inject) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Declares that the provider body supplies its own default for this parameter.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn declared(&self) -> Option<&Key> {
        self.declared.as_ref()
    }

    pub fn marker(&self) -> Option<&Inject> {
        self.marker.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    /// Label for the parameter's type in diagnostics.
    pub(crate) fn type_label(&self) -> &'static str {
        match (&self.marker, &self.declared) {
            (Some(marker), _) => marker.key().display_name(),
            (None, Some(declared)) => declared.type_name(),
            (None, None) => "<untyped>",
        }
    }
}

/// Parameter values resolved for one provider invocation.
///
/// Parameters that were left unset (a literal default applies) are simply
/// absent; the provider body supplies its default through
/// [`get_or`](Self::get_or) or [`optional`](Self::optional).
#[derive(Clone)]
pub struct Arguments {
    owner: &'static str,
    values: HashMap<&'static str, AnyArc>,
    scope: Option<ScopeStore>,
}

impl Arguments {
    pub(crate) fn new(owner: &'static str, scope: Option<ScopeStore>) -> Self {
        Self {
            owner,
            values: HashMap::new(),
            scope,
        }
    }

    pub(crate) fn insert(&mut self, name: &'static str, value: AnyArc) {
        self.values.insert(name, value);
    }

    /// Name of the provider these arguments were resolved for.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Resolved value of `name` as `T`.
    ///
    /// Fails with [`DiError::MissingBinding`] when the parameter was left to its
    /// default and with [`DiError::TypeMismatch`] when the supplying token
    /// produced a different type.
    pub fn get<T: Any + Send + Sync>(&self, name: &'static str) -> DiResult<Arc<T>> {
        self.optional::<T>(name)?.ok_or(DiError::MissingBinding {
            token: std::any::type_name::<T>(),
            parameter: Some(name),
            owner: Some(self.owner),
        })
    }

    /// Resolved value of `name`, or `None` when the parameter was left unset.
    pub fn optional<T: Any + Send + Sync>(&self, name: &'static str) -> DiResult<Option<Arc<T>>> {
        match self.values.get(name) {
            Some(value) => value
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
            None => Ok(None),
        }
    }

    /// Resolved value of `name` supplied by a trait-object token.
    ///
    /// ```rust
    /// use depin::{Container, Lifetime, Param, Source, Token};
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".into() }
    /// }
    ///
    /// let container = Container::new();
    /// let greeter = Token::<dyn Greeter>::of();
    /// container
    ///     .bind_trait(Lifetime::Singleton, &greeter, Source::class::<English>(vec![], |_| Ok(English)), |e| e as Arc<dyn Greeter>)
    ///     .unwrap();
    /// let banner = container
    ///     .bind(
    ///         Lifetime::Transient,
    ///         Source::factory("banner", vec![Param::inject("greeter", &greeter)], |args| {
    ///             Ok(args.get_trait::<dyn Greeter>("greeter")?.greet().to_uppercase())
    ///         }),
    ///     )
    ///     .unwrap();
    ///
    /// assert_eq!(*container.get(&banner).unwrap(), "HELLO");
    /// ```
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<T>> {
        match self.values.get(name) {
            Some(value) => value
                .clone()
                .downcast::<Arc<T>>()
                .map(|stored| (*stored).clone())
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
            None => Err(DiError::MissingBinding {
                token: std::any::type_name::<T>(),
                parameter: Some(name),
                owner: Some(self.owner),
            }),
        }
    }

    /// Resolved value of `name` cloned out, or `default` when it was left unset.
    pub fn get_or<T: Any + Send + Sync + Clone>(&self, name: &'static str, default: T) -> DiResult<T> {
        Ok(self
            .optional::<T>(name)?
            .map(|value| (*value).clone())
            .unwrap_or(default))
    }

    /// Untyped access to a resolved value.
    pub fn raw(&self, name: &str) -> Option<&AnyArc> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Request scope the resolution ran in, if any.
    pub fn scope(&self) -> Option<&ScopeStore> {
        self.scope.as_ref()
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Arguments")
            .field("owner", &self.owner)
            .field("resolved", &names)
            .finish()
    }
}

/// Explicitly supplied parameter values for an [`Injected`](crate::Injected)
/// call. Overrides always win over container resolution.
#[derive(Default, Clone)]
pub struct Overrides {
    values: HashMap<&'static str, AnyArc>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies `value` for parameter `name`.
    pub fn set<T: Any + Send + Sync>(mut self, name: &'static str, value: T) -> Self {
        self.values.insert(name, Arc::new(value));
        self
    }

    /// Supplies an already shared value for parameter `name`.
    pub fn set_arc<T: Any + Send + Sync>(mut self, name: &'static str, value: Arc<T>) -> Self {
        self.values.insert(name, value);
        self
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<AnyArc> {
        self.values.remove(name)
    }

    pub(crate) fn into_values(self) -> impl Iterator<Item = (&'static str, AnyArc)> {
        self.values.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
