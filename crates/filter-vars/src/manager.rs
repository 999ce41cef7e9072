use std::collections::BTreeMap;

use crate::{
    computer::{LazyVariableComputer, VariableComputer},
    error::Error,
    holder::{HolderError, Slot, VariableHolder},
    keywords,
    value::Value,
};

/// Behavior of [`VariablesManager::get_var`] for a name with no slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Fail with [`Error::UnsetVariable`].
    #[default]
    Strict,
    /// Return [`Value::UNDEFINED`].
    Lax,
    /// Return [`Value::NULL`]. Kept so that historical comparisons against
    /// absent data keep matching.
    BackCompat,
}

/// Which still-deferred variables a dump should force.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComputeSelection {
    #[default]
    Nothing,
    Names(Vec<String>),
    All,
}

impl ComputeSelection {
    fn wants(&self, name: &str) -> bool {
        match self {
            ComputeSelection::Nothing => false,
            ComputeSelection::Names(names) => {
                let name = name.to_lowercase();
                names.iter().any(|n| n.to_lowercase() == name)
            }
            ComputeSelection::All => true,
        }
    }
}

/// Memoizing access to a [`VariableHolder`].
///
/// The manager owns the computer and borrows a holder per call, so one manager
/// serves any number of evaluation passes. Call [`begin_pass`](Self::begin_pass)
/// before each one. Every deferred slot it computes is replaced by its value in
/// the holder, so a variable is computed at most once per holder.
#[derive(Debug)]
pub struct VariablesManager<C: VariableComputer = LazyVariableComputer> {
    computer: C,
}

impl<C: VariableComputer> VariablesManager<C> {
    pub fn new(computer: C) -> Self {
        Self { computer }
    }

    pub fn computer(&self) -> &C {
        &self.computer
    }

    /// Starts a new evaluation pass, dropping per-pass computer state such as
    /// memoized parses.
    pub fn begin_pass(&self) {
        self.computer.begin_pass();
    }

    /// Returns the value of `name`, computing and memoizing it if deferred.
    ///
    /// Dependencies read by the computation are resolved in
    /// [`RetrievalMode::Strict`] regardless of `mode`. A dependency chain that
    /// leads back to a variable still being computed fails with
    /// [`Error::CyclicDependency`].
    pub fn get_var(
        &self,
        holder: &mut VariableHolder,
        name: &str,
        mode: RetrievalMode,
    ) -> Result<Value, Error> {
        let descriptor = match holder.get(name) {
            Ok(Slot::Resolved(value)) => return Ok(value.clone()),
            Ok(Slot::Lazy(descriptor)) => descriptor.clone(),
            Err(HolderError::NameNotSet(name)) => {
                return match mode {
                    RetrievalMode::Strict => Err(Error::UnsetVariable(name)),
                    RetrievalMode::Lax => Ok(Value::UNDEFINED),
                    RetrievalMode::BackCompat => Ok(Value::NULL),
                };
            }
        };

        if !holder.start_resolving(name) {
            return Err(Error::CyclicDependency(name.to_lowercase()));
        }

        tracing::debug!("Computing variable {} ({})", name, descriptor.kind);
        let result = {
            let mut resolve = |dep: &str| self.get_var(holder, dep, RetrievalMode::Strict);
            self.computer.compute(&descriptor, &mut resolve)
        };
        holder.finish_resolving(name);

        let value = result?;
        holder.set_value(name, value.clone());
        Ok(value)
    }

    /// Moves every slot stored under a deprecated name to its current name.
    pub fn translate_deprecated_names(&self, holder: &mut VariableHolder) {
        for name in holder.names() {
            let Some(new_name) = keywords::deprecated_replacement(&name) else {
                continue;
            };
            if let Some(slot) = holder.remove(&name) {
                tracing::trace!("Translating deprecated variable {} to {}", name, new_name);
                holder.set_slot(new_name, slot);
            }
        }
    }

    /// Dumps variables in native form.
    ///
    /// Unless `include_user_vars` is set, only builtin names (active, deprecated
    /// or disabled) are dumped. Deferred variables are included only when
    /// `compute` selects them, in which case they are computed and memoized.
    pub fn dump_all_vars(
        &self,
        holder: &mut VariableHolder,
        compute: &ComputeSelection,
        include_user_vars: bool,
    ) -> Result<BTreeMap<String, serde_json::Value>, Error> {
        let mut dump = BTreeMap::new();

        for name in holder.names() {
            if !include_user_vars && !keywords::is_known(&name) {
                continue;
            }
            let resolved = !holder.get(&name)?.is_lazy();
            if resolved || compute.wants(&name) {
                let value = self.get_var(holder, &name, RetrievalMode::Strict)?;
                dump.insert(name.to_string(), value.to_native());
            }
        }

        Ok(dump)
    }

    /// Computes every deferred variable whose kind touches the database, so the
    /// holder can be stored and evaluated later without database access.
    pub fn compute_db_vars(&self, holder: &mut VariableHolder) -> Result<(), Error> {
        let names = holder
            .iter()
            .filter_map(|(name, slot)| match slot {
                Slot::Lazy(descriptor) if descriptor.kind.touches_database() => Some(name.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();

        for name in names {
            self.get_var(holder, &name, RetrievalMode::Strict)?;
        }

        Ok(())
    }

    /// Computes everything and returns it in native form.
    pub fn export_all_vars(
        &self,
        holder: &mut VariableHolder,
    ) -> Result<BTreeMap<String, serde_json::Value>, Error> {
        holder
            .names()
            .into_iter()
            .map(|name| {
                let value = self.get_var(holder, &name, RetrievalMode::Strict)?;
                Ok((name.to_string(), value.to_native()))
            })
            .collect()
    }

    /// String forms of the variables that are already resolved. Never computes.
    pub fn export_non_lazy_vars(&self, holder: &VariableHolder) -> BTreeMap<String, String> {
        holder
            .iter()
            .filter_map(|(name, slot)| match slot {
                Slot::Resolved(value) => Some((name.to_string(), value.string().into_owned())),
                Slot::Lazy(_) => None,
            })
            .collect()
    }
}
