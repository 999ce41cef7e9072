//! Property-based tests for holder and manager invariants.
use std::cell::Cell;

use filter_vars::{
    ComputationKind, Error, LazyDescriptor, Param, Resolver, RetrievalMode, Value,
    VariableComputer, VariableHolder, VariablesManager,
};
use proptest::prelude::*;

/// Returns the length of `length-var`, counting calls.
#[derive(Debug, Default)]
struct LengthComputer {
    calls: Cell<usize>,
}

impl VariableComputer for LengthComputer {
    fn compute(
        &self,
        descriptor: &LazyDescriptor,
        resolve: &mut Resolver<'_>,
    ) -> Result<Value, Error> {
        self.calls.set(self.calls.get() + 1);
        let value = resolve(descriptor.var_param("length-var")?)?;
        Ok(value.string().chars().count().into())
    }
}

mod strategies {
    use super::*;

    pub fn name() -> impl Strategy<Value = String> {
        "[a-zA-Z_][a-zA-Z0-9_]{0,15}"
    }

    pub fn value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::Int),
            any::<bool>().prop_map(Value::Bool),
            "[a-zA-Z0-9 ]{0,20}".prop_map(Value::String),
            Just(Value::NULL),
        ]
    }
}

fn flip_case(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Names are case-insensitive on every access
    #[test]
    fn names_are_case_insensitive(name in strategies::name(), value in strategies::value()) {
        let mut holder = VariableHolder::new();
        holder.set_value(&name, value.clone());

        let manager = VariablesManager::new(LengthComputer::default());
        let flipped = flip_case(&name);
        prop_assert!(holder.is_set(&flipped));
        prop_assert_eq!(manager.get_var(&mut holder, &flipped, RetrievalMode::Strict), Ok(value));
        prop_assert_eq!(holder.len(), 1);
    }

    /// A deferred variable is computed once however often it is read
    #[test]
    fn lazy_vars_compute_once(text in "[a-z ]{0,40}", reads in 1usize..8) {
        let mut holder = VariableHolder::new();
        holder.set_value("x", text.as_str());
        holder.set_lazy("n", ComputationKind::Length, [("length-var", Param::var("x"))]);

        let manager = VariablesManager::new(LengthComputer::default());
        for _ in 0..reads {
            prop_assert_eq!(
                manager.get_var(&mut holder, "n", RetrievalMode::Lax),
                Ok(Value::from(text.chars().count()))
            );
        }
        prop_assert_eq!(manager.computer().calls.get(), 1);
    }

    /// Merging keeps the last holder's slot on conflicts
    #[test]
    fn merge_last_write_wins(
        name in strategies::name(),
        first in strategies::value(),
        second in strategies::value(),
    ) {
        let mut a = VariableHolder::new();
        a.set_value(&name, first);
        let mut b = VariableHolder::new();
        b.set_value(&flip_case(&name), second.clone());

        let mut merged = VariableHolder::new_from([&a, &b]);
        let manager = VariablesManager::new(LengthComputer::default());
        prop_assert_eq!(merged.len(), 1);
        prop_assert_eq!(manager.get_var(&mut merged, &name, RetrievalMode::Strict), Ok(second));
    }
}
