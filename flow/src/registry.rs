//! Lookup of steps by id.

use arcstr::ArcStr;
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::step::Step;

/// Creates a fresh instance of a step.
pub type StepConstructor = fn() -> Box<dyn Step>;

/// Collects step registrations. Duplicate ids are rejected.
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    constructors: IndexMap<ArcStr, StepConstructor>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `constructor` under `id`.
    pub fn register(&mut self, id: impl Into<ArcStr>, constructor: StepConstructor) -> Result<&mut Self> {
        let id = id.into();
        if self.constructors.contains_key(&id) {
            return Err(Error::DuplicateStep(id));
        }
        self.constructors.insert(id, constructor);
        Ok(self)
    }

    /// Registers `constructor` under the id of the step it creates.
    pub fn register_step(&mut self, constructor: StepConstructor) -> Result<&mut Self> {
        let id = ArcStr::from(constructor().id());
        self.register(id, constructor)
    }

    /// Freezes the registrations.
    pub fn build(self) -> Registry {
        Registry {
            constructors: self.constructors,
        }
    }
}

/// An immutable table of step constructors.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    constructors: IndexMap<ArcStr, StepConstructor>,
}

impl Registry {
    /// Instantiates the step registered under `id`.
    pub fn create(&self, id: &str) -> Result<Box<dyn Step>> {
        self.constructors
            .get(id)
            .map(|constructor| constructor())
            .ok_or_else(|| Error::UnknownStep(id.into()))
    }

    /// Returns `true` if a step is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(ArcStr::as_str)
    }

    /// The number of registered steps.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}
