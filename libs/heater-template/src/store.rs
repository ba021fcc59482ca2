//! Literal variable store
//!
//! One store per `heater_pc` section, populated from the `variable_<name>`
//! options. The scripting surface only writes names that already exist, so
//! the declared set is fixed once construction succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::ConfigError;
use crate::literal::Literal;

/// Option prefix that declares a template variable
pub const VARIABLE_PREFIX: &str = "variable_";

/// Store shared by the scripting primitives of one section
pub type SharedVariableStore = Arc<Mutex<VariableStore>>;

/// Named literal variables of one section
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    section: String,
    variables: BTreeMap<String, Literal>,
}

impl VariableStore {
    /// Empty store for a section
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Build a store from the raw options of a section
    ///
    /// Every option named `variable_<name>` is parsed as a literal and
    /// declared under `<name>`; other options are ignored. The first invalid
    /// literal aborts construction.
    pub fn from_options<'a, I>(section: impl Into<String>, options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut store = Self::new(section);
        for (option, text) in options {
            if let Some(name) = option.strip_prefix(VARIABLE_PREFIX) {
                store.declare(name, text)?;
            }
        }
        debug!(
            "Section '{}' declared {} variable(s)",
            store.section,
            store.variables.len()
        );
        Ok(store)
    }

    /// Parse and declare a single variable
    pub fn declare(&mut self, name: &str, text: &str) -> Result<(), ConfigError> {
        let option = format!("{}{}", VARIABLE_PREFIX, name);
        let value = Literal::parse(text)
            .map_err(|e| ConfigError::invalid_literal(&self.section, option, e.to_string()))?;
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn get(&self, name: &str) -> Option<&Literal> {
        self.variables.get(name)
    }

    /// Store a value under `name`, returning the previous one
    ///
    /// No validation; callers enforce the declared-name rule.
    pub fn set(&mut self, name: &str, value: Literal) -> Option<Literal> {
        self.variables.insert(name.to_string(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Declared names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Current values as a compact JSON object
    pub fn snapshot(&self) -> String {
        Literal::Map(self.variables.clone()).to_string()
    }

    /// Wrap for sharing with the scripting primitives
    pub fn into_shared(self) -> SharedVariableStore {
        Arc::new(Mutex::new(self))
    }
}
