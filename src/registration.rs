//! Binding records and the token registry.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::dependency::{Param, ParamKind};
use crate::descriptors::BindingDescriptor;
use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::resolver::Resolution;
use crate::scope::BoxFuture;
use crate::source::Shape;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type SyncStrategy = Arc<dyn Fn(&Resolution) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type AsyncStrategy = Arc<dyn Fn(Resolution) -> BoxFuture<DiResult<AnyArc>> + Send + Sync>;

/// The single closure materialized for a binding at bind time.
#[derive(Clone)]
pub(crate) enum Strategy {
    Sync(SyncStrategy),
    Async(AsyncStrategy),
}

/// Immutable record created by one `bind` call.
pub(crate) struct Binding {
    /// Registration id; shared by every token the call registered.
    pub(crate) id: u64,
    pub(crate) primary: Key,
    pub(crate) lifetime: Lifetime,
    pub(crate) shape: Shape,
    pub(crate) is_async: bool,
    pub(crate) impl_name: &'static str,
    pub(crate) params: Arc<[Param]>,
    pub(crate) strategy: Strategy,
}

/// Token table. Several keys may point at one binding.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<Key, Arc<Binding>>,
}

impl Registry {
    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<Arc<Binding>> {
        self.entries.get(key).cloned()
    }

    #[inline]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores `binding` under `keys`.
    ///
    /// Rebinding a registration's primary key moves every alias of that
    /// registration to the new binding. Any other key listed here is
    /// overwritten on its own; registrations that merely shared an alias
    /// keep their remaining keys.
    pub(crate) fn insert(&mut self, binding: Arc<Binding>, keys: &[Key]) {
        let rebound = self
            .entries
            .get(&binding.primary)
            .filter(|old| old.primary == binding.primary)
            .map(|old| old.id);
        if let Some(id) = rebound {
            for entry in self.entries.values_mut() {
                if entry.id == id {
                    *entry = binding.clone();
                }
            }
        }
        for key in keys {
            self.entries.insert(*key, binding.clone());
        }
    }

    /// Key that supplies `param` right now: the marker's token, else the
    /// declared type when it is bound.
    pub(crate) fn supplier(&self, param: &Param) -> Option<Key> {
        if param.kind() == ParamKind::Rest {
            return None;
        }
        match (param.marker(), param.declared()) {
            (Some(marker), _) => Some(*marker.key()),
            (None, Some(declared)) if self.contains_key(declared) => Some(*declared),
            _ => None,
        }
    }

    /// Whether any parameter is currently supplied by an asynchronous binding.
    pub(crate) fn needs_async(&self, params: &[Param]) -> bool {
        params.iter().any(|param| {
            self.supplier(param)
                .and_then(|key| self.entries.get(&key))
                .map(|binding| binding.is_async)
                .unwrap_or(false)
        })
    }

    /// Distinct bindings in registration order.
    pub(crate) fn bindings(&self) -> Vec<Arc<Binding>> {
        let mut seen = HashSet::new();
        let mut bindings: Vec<_> = self
            .entries
            .values()
            .filter(|binding| seen.insert(binding.id))
            .cloned()
            .collect();
        bindings.sort_by_key(|binding| binding.id);
        bindings
    }

    pub(crate) fn descriptor(&self, binding: &Binding) -> BindingDescriptor {
        let mut aliases: Vec<Key> = self
            .entries
            .iter()
            .filter(|(key, other)| other.id == binding.id && **key != binding.primary)
            .map(|(key, _)| *key)
            .collect();
        aliases.sort_by_key(|key| key.display_name());
        BindingDescriptor {
            key: binding.primary,
            aliases,
            lifetime: binding.lifetime,
            shape: binding.shape,
            is_async: binding.is_async,
            impl_name: binding.impl_name,
            params: binding.params.to_vec(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
