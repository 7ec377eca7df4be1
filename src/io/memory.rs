use crate::io::product::{missing_variable, ProductReader, Variable};
use crate::types::EmissionsResult;
use std::collections::HashMap;

/// Product held entirely in memory.
///
/// Used for scans decoded elsewhere and for synthetic scans.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProduct {
    name: String,
    variables: HashMap<String, Variable>,
    attributes: HashMap<String, String>,
}

impl InMemoryProduct {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, name: &str, variable: Variable) -> Self {
        self.variables.insert(name.to_string(), variable);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

impl ProductReader for InMemoryProduct {
    fn read_variable(&self, name: &str) -> EmissionsResult<Variable> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| missing_variable(name, &self.name))
    }

    fn attribute(&self, key: &str) -> EmissionsResult<Option<String>> {
        Ok(self.attributes.get(key).cloned())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
