//! Installed function entries
//!
//! An installed function is a definition reduced to the one version that
//! was selected for it, plus whether the user pinned that version.

use crate::catalog::{FunctionDefinition, FunctionRef, FunctionVersion};
use crate::error::{KaffineError, Result};

/// A function in the installed set
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledFunction {
    /// Always holds exactly one version
    definition: FunctionDefinition,
    pinned: bool,
}

impl InstalledFunction {
    /// Select `version` of `definition`
    pub fn new(definition: &FunctionDefinition, version: FunctionVersion, pinned: bool) -> Self {
        Self {
            definition: FunctionDefinition {
                versions: vec![version],
                ..definition.clone()
            },
            pinned,
        }
    }

    /// The definition, carrying only the selected version
    pub fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    /// The selected version
    pub fn version(&self) -> &FunctionVersion {
        &self.definition.versions[0]
    }

    /// Whether the version was chosen explicitly (exempt from updates)
    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn group_name(&self) -> String {
        self.definition.group_name()
    }

    /// Reference written to the config: `group/kind@version` when pinned,
    /// `group/kind` otherwise
    pub fn reference(&self) -> FunctionRef {
        FunctionRef {
            group: Some(self.definition.group.clone()),
            name: self.definition.names.kind.clone(),
            version: self.pinned.then(|| self.version().name.clone()),
        }
    }

    /// `group/kind:version`
    pub fn short_name(&self) -> String {
        self.definition.short_name()
    }

    /// Per-function file contents
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(&self.definition).map_err(|source| KaffineError::Serialize {
            what: format!("function '{}'", self.group_name()),
            source,
        })
    }
}
