//! Ordered collections of variable descriptors.
use std::fmt::Display;

use indexmap::IndexMap;

use crate::error::{ConfigurationError, SchemaError};

use super::VariableDescriptor;

/// The variables of one provider, in output column order.
///
/// The registry also carries a saving order, which is the order columns are
/// written in by the exporters. It defaults to the declaration order.
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    name: String,
    variables: IndexMap<String, VariableDescriptor>,
    saving_order: Option<Vec<String>>,
}

impl VariableRegistry {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), variables: IndexMap::new(), saving_order: None }
    }

    /// Build a registry from a list of descriptors, failing on duplicate names.
    pub fn from_descriptors<S, I>(name: S, descriptors: I) -> Result<Self, ConfigurationError>
    where
        S: Into<String>,
        I: IntoIterator<Item = VariableDescriptor>,
    {
        let mut me = Self::new(name);
        for d in descriptors {
            me.add(d)?;
        }
        Ok(me)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a descriptor at the end of the registry.
    pub fn add(&mut self, descriptor: VariableDescriptor) -> Result<(), ConfigurationError> {
        if self.variables.contains_key(descriptor.name()) {
            return Err(ConfigurationError::duplicate_variable(self.name.clone(), descriptor.name().to_string()));
        }
        self.variables.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    /// Builder form of [`VariableRegistry::add`].
    pub fn with(mut self, descriptor: VariableDescriptor) -> Result<Self, ConfigurationError> {
        self.add(descriptor)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&VariableDescriptor> {
        self.variables.get(name)
    }

    /// Like [`VariableRegistry::get`], but a missing variable is an error.
    pub fn require(&self, name: &str) -> Result<&VariableDescriptor, ConfigurationError> {
        self.variables.get(name)
            .ok_or_else(|| ConfigurationError::UnknownVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.get_index_of(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> indexmap::map::Values<'_, String, VariableDescriptor> {
        self.variables.values()
    }

    /// The distinct keys of "drop when all missing" groups, in order of first appearance.
    pub fn drop_groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = vec![];
        for g in self.iter().filter_map(|d| d.drop_group()) {
            if !groups.contains(&g) {
                groups.push(g);
            }
        }
        groups
    }

    /// Set the order in which the exporters write columns.
    ///
    /// Every name must be a variable of this registry; variables not listed are not written.
    pub fn set_saving_order<S: AsRef<str>>(&mut self, order: &[S]) -> Result<(), ConfigurationError> {
        let mut names = Vec::with_capacity(order.len());
        for n in order {
            let n = n.as_ref();
            self.require(n)?;
            names.push(n.to_string());
        }
        self.saving_order = Some(names);
        Ok(())
    }

    pub fn saving_order(&self) -> Vec<&VariableDescriptor> {
        match &self.saving_order {
            Some(order) => order.iter().filter_map(|n| self.variables.get(n)).collect(),
            None => self.iter().collect(),
        }
    }

    /// Describe every difference between the schemas of two registries.
    ///
    /// An empty list means the registries are compatible: same variable names, with
    /// the same types and units. Declaration order does not matter.
    pub fn incompatibilities(&self, other: &VariableRegistry) -> Vec<String> {
        let mut problems = vec![];
        for d in self.iter() {
            match other.get(d.name()) {
                None => problems.push(format!("'{}' is only in registry '{}'", d.name(), self.name)),
                Some(o) if o.unit() != d.unit() => problems.push(format!(
                    "'{}' has unit '{}' in '{}' but '{}' in '{}'", d.name(), d.unit(), self.name, o.unit(), other.name
                )),
                Some(o) if o.value_type() != d.value_type() => problems.push(format!(
                    "'{}' has type {} in '{}' but {} in '{}'", d.name(), d.value_type(), self.name, o.value_type(), other.name
                )),
                Some(_) => (),
            }
        }
        for d in other.iter() {
            if !self.contains(d.name()) {
                problems.push(format!("'{}' is only in registry '{}'", d.name(), other.name));
            }
        }
        problems
    }

    pub fn is_compatible(&self, other: &VariableRegistry) -> bool {
        self.incompatibilities(other).is_empty()
    }

    /// Fail with a [`SchemaError`] listing the differences if the registries are not compatible.
    pub fn check_compatible(&self, other: &VariableRegistry) -> Result<(), SchemaError> {
        let problems = self.incompatibilities(other);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::IncompatibleVariables(problems.join("; ")))
        }
    }
}

impl Display for VariableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Registry '{}':", self.name)?;
        for d in self.iter() {
            writeln!(f, "  {d}")?;
        }
        Ok(())
    }
}
