//! Material identifiers and the palette a plan may draw from.

use std::borrow::Borrow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::PaletteError;

/// The namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// A normalized, namespaced material id such as `minecraft:oak_planks`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(String);

impl MaterialId {
    /// Trim and lower-case `input`, then require the `namespace:` prefix.
    pub fn parse(input: &str, namespace: &str) -> Result<Self, PaletteError> {
        let id = input.trim().to_lowercase();
        let prefix = format!("{}:", namespace.to_lowercase());
        let Some(name) = id.strip_prefix(&prefix) else {
            return Err(PaletteError::MissingNamespace {
                namespace: namespace.to_string(),
                input: input.to_string(),
            });
        };
        if name.is_empty() {
            return Err(PaletteError::EmptyName(input.to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the namespace (`oak_planks`).
    pub fn name(&self) -> &str {
        bare_name(&self.0)
    }
}

impl std::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MaterialId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Strip a `namespace:` prefix if there is one.
pub fn bare_name(id: &str) -> &str {
    id.split_once(':').map_or(id, |(_, name)| name)
}

/// Whether a material read back from the world is the one requested.
///
/// The dispatcher may report either the namespaced id or the bare name.
pub fn material_matches(expected: &str, found: &str) -> bool {
    found == expected || found == bare_name(expected)
}

/// The set of materials a plan is allowed to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    materials: BTreeSet<MaterialId>,
}

impl Palette {
    /// Normalize every input; any input without the namespace rejects the
    /// whole palette. Duplicates collapse.
    pub fn new<I, S>(inputs: I, namespace: &str) -> Result<Self, PaletteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let materials = inputs
            .into_iter()
            .map(|s| MaterialId::parse(s.as_ref(), namespace))
            .collect::<Result<BTreeSet<_>, _>>()?;
        if materials.is_empty() {
            return Err(PaletteError::Empty);
        }
        Ok(Self { materials })
    }

    pub fn contains(&self, material: &str) -> bool {
        self.materials.contains(material)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialId> {
        self.materials.iter()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Comma-separated list, as shown to the planner.
    pub fn joined(&self) -> String {
        self.materials
            .iter()
            .map(MaterialId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
