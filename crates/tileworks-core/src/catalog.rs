use crate::fixed::Fixed64;
use crate::id::ResourceType;
use std::collections::HashMap;

/// A resource definition in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDef {
    pub name: String,
    /// Storage volume taken by one unit of this resource.
    pub volume_per_unit: Fixed64,
}

/// Builder for constructing an immutable [`ResourceCatalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    resources: Vec<ResourceDef>,
    name_to_id: HashMap<String, ResourceType>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Returns its id. Ids start at 1.
    pub fn register(
        &mut self,
        name: &str,
        volume_per_unit: Fixed64,
    ) -> Result<ResourceType, CatalogError> {
        if self.name_to_id.contains_key(name) {
            return Err(CatalogError::DuplicateName(name.to_string()));
        }
        if volume_per_unit < Fixed64::ZERO {
            return Err(CatalogError::NegativeVolume(name.to_string()));
        }
        let id = ResourceType(self.resources.len() as u32 + 1);
        self.resources.push(ResourceDef {
            name: name.to_string(),
            volume_per_unit,
        });
        self.name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Lookup a resource id by name.
    pub fn id(&self, name: &str) -> Option<ResourceType> {
        self.name_to_id.get(name).copied()
    }

    pub fn build(self) -> ResourceCatalog {
        ResourceCatalog {
            resources: self.resources,
            name_to_id: self.name_to_id,
        }
    }
}

/// Immutable set of resource kinds known to a session. Frozen after build.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    resources: Vec<ResourceDef>,
    name_to_id: HashMap<String, ResourceType>,
}

impl ResourceCatalog {
    pub fn get(&self, id: ResourceType) -> Option<&ResourceDef> {
        if id.is_none() {
            return None;
        }
        self.resources.get(id.0 as usize - 1)
    }

    pub fn id(&self, name: &str) -> Option<ResourceType> {
        self.name_to_id.get(name).copied()
    }

    /// Like [`id`](Self::id) but reports the missing name.
    pub fn require(&self, name: &str) -> Result<ResourceType, CatalogError> {
        self.id(name)
            .ok_or_else(|| CatalogError::UnknownResource(name.to_string()))
    }

    pub fn name(&self, id: ResourceType) -> &str {
        self.get(id).map(|r| r.name.as_str()).unwrap_or("none")
    }

    pub fn volume_per_unit(&self, id: ResourceType) -> Option<Fixed64> {
        self.get(id).map(|r| r.volume_per_unit)
    }

    pub fn contains(&self, id: ResourceType) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// All registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceType> + '_ {
        (1..=self.resources.len() as u32).map(ResourceType)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate resource name: {0}")]
    DuplicateName(String),
    #[error("resource '{0}' has a negative volume per unit")]
    NegativeVolume(String),
    #[error("unknown resource: {0}")]
    UnknownResource(String),
}
