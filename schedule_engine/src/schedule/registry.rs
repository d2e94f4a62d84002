//! Free-variable bookkeeping for composite programs.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Bindings, Parameter};

/// Location inside a composite program that references a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterSite {
    /// The child at this index in the child list.
    Child(usize),
    /// The alignment policy of a deferred program.
    Alignment,
}

/// Maps every free variable to the sites referencing it.
///
/// Substitution only needs to visit the sites returned by
/// [`ParameterTable::sites_for`], leaving the rest of the tree untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterTable {
    table: BTreeMap<Parameter, BTreeSet<ParameterSite>>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `site` references each of `parameters`.
    pub fn register(&mut self, site: ParameterSite, parameters: impl IntoIterator<Item = Parameter>) {
        for parameter in parameters {
            self.table.entry(parameter).or_default().insert(site);
        }
    }

    /// Forget every reference held by `site`.
    pub fn unregister(&mut self, site: ParameterSite) {
        self.table.retain(|_, sites| {
            sites.remove(&site);
            !sites.is_empty()
        });
    }

    /// Replace the references held by `site` with `parameters`.
    ///
    /// Called after a substitution so that parameters bound to other
    /// parameters stay tracked under their new identity.
    pub fn reregister(&mut self, site: ParameterSite, parameters: impl IntoIterator<Item = Parameter>) {
        self.unregister(site);
        self.register(site, parameters);
    }

    /// Sites referencing any parameter bound in `bindings`.
    pub fn sites_for(&self, bindings: &Bindings) -> BTreeSet<ParameterSite> {
        bindings
            .parameters()
            .filter_map(|p| self.table.get(p))
            .flatten()
            .copied()
            .collect()
    }

    /// All tracked parameters, ordered by identity.
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> + '_ {
        self.table.keys()
    }

    /// Tracked parameters with the given display name.
    pub fn get_parameters(&self, name: &str) -> Vec<Parameter> {
        self.table
            .keys()
            .filter(|p| p.name() == name)
            .cloned()
            .collect()
    }

    pub fn is_parameterized(&self) -> bool {
        !self.table.is_empty()
    }
}
