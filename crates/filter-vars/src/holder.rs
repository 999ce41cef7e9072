use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use thiserror::Error;

use crate::{
    lazy::{ComputationKind, LazyDescriptor, Param},
    value::Value,
};

#[derive(Error, Debug, PartialEq)]
pub enum HolderError {
    #[error("Name \"{0}\" has no slot")]
    NameNotSet(String),
}

/// A variable slot: a deferred descriptor or a resolved value. A name with no
/// slot at all is unset.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Lazy(LazyDescriptor),
    Resolved(Value),
}

impl Slot {
    pub fn is_lazy(&self) -> bool {
        matches!(self, Slot::Lazy(_))
    }
}

/// Per-evaluation container mapping case-insensitive variable names to slots.
#[derive(Debug, Clone, Default)]
pub struct VariableHolder {
    vars: FxHashMap<SmolStr, Slot>,
    resolving: FxHashSet<SmolStr>,
}

impl PartialEq for VariableHolder {
    fn eq(&self, other: &Self) -> bool {
        self.vars == other.vars
    }
}

#[inline(always)]
fn canonical(name: &str) -> SmolStr {
    SmolStr::new(name.to_lowercase())
}

impl VariableHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a holder holding a copy of every slot of `holders`.
    pub fn new_from<'a>(holders: impl IntoIterator<Item = &'a VariableHolder>) -> Self {
        let mut holder = Self::new();
        holder.merge_from(holders);
        holder
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) {
        self.vars
            .insert(canonical(name), Slot::Resolved(value.into()));
    }

    pub fn set_lazy<K, I>(&mut self, name: &str, kind: ComputationKind, params: I)
    where
        K: Into<SmolStr>,
        I: IntoIterator<Item = (K, Param)>,
    {
        self.set_lazy_descriptor(name, LazyDescriptor::new(kind, params));
    }

    pub fn set_lazy_descriptor(&mut self, name: &str, descriptor: LazyDescriptor) {
        self.vars.insert(canonical(name), Slot::Lazy(descriptor));
    }

    pub fn set_slot(&mut self, name: &str, slot: Slot) {
        self.vars.insert(canonical(name), slot);
    }

    pub fn get(&self, name: &str) -> Result<&Slot, HolderError> {
        self.vars
            .get(canonical(name).as_str())
            .ok_or_else(|| HolderError::NameNotSet(name.to_lowercase()))
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.vars.contains_key(canonical(name).as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<Slot> {
        self.vars.remove(canonical(name).as_str())
    }

    /// Copies every slot of `holders` into `self`; on conflicts the last holder
    /// wins.
    pub fn merge_from<'a>(&mut self, holders: impl IntoIterator<Item = &'a VariableHolder>) {
        for holder in holders {
            self.vars
                .extend(holder.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    /// Canonical names of every slot, sorted.
    pub fn names(&self) -> Vec<SmolStr> {
        let mut names = self.vars.keys().cloned().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Slot)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Marks `name` as being computed. Returns `false` if it already was.
    pub(crate) fn start_resolving(&mut self, name: &str) -> bool {
        self.resolving.insert(canonical(name))
    }

    pub(crate) fn finish_resolving(&mut self, name: &str) {
        self.resolving.remove(canonical(name).as_str());
    }
}
