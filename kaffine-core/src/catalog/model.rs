//! KRM function catalog documents
//!
//! A catalog lists function definitions; each definition carries one or
//! more versions, and each version exactly one runtime (a container image
//! or a set of per-platform executables).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{KaffineError, Result};

/// API version written into newly created catalogs
pub const CATALOG_API_VERSION: &str = "config.kubernetes.io/v1alpha1";

/// Kind written into newly created catalogs
pub const CATALOG_KIND: &str = "KRMFunctionCatalog";

/// A function catalog document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCatalog {
    /// API version
    pub api_version: String,

    /// Kind (KRMFunctionCatalog)
    pub kind: String,

    /// Optional catalog metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogMetadata>,

    /// Function definitions
    pub spec: CatalogSpec,
}

/// Catalog metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMetadata {
    /// Catalog name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the catalog was created (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSpec {
    #[serde(default)]
    pub krm_functions: Vec<FunctionDefinition>,
}

/// A function definition, identified by `group/kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub group: String,
    pub description: String,
    pub publisher: String,
    pub names: FunctionNames,
    pub versions: Vec<FunctionVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNames {
    pub kind: String,
}

/// One version of a function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionVersion {
    /// Version label (e.g. "v1.0.1")
    pub name: String,

    #[serde(default)]
    pub idempotent: bool,

    #[serde(default)]
    pub usage: String,

    #[serde(default)]
    pub examples: Vec<String>,

    #[serde(default)]
    pub license: String,

    pub runtime: Runtime,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<String>,
}

/// How a function version is executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuntimeDocument", into = "RuntimeDocument")]
pub enum Runtime {
    Container(ContainerRuntime),
    Exec(ExecRuntime),
}

/// On-disk shape of a runtime: exactly one of the two keys must be set
#[derive(Serialize, Deserialize)]
struct RuntimeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    container: Option<ContainerRuntime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    exec: Option<ExecRuntime>,
}

impl TryFrom<RuntimeDocument> for Runtime {
    type Error = String;

    fn try_from(doc: RuntimeDocument) -> std::result::Result<Self, Self::Error> {
        match (doc.container, doc.exec) {
            (Some(container), None) => Ok(Runtime::Container(container)),
            (None, Some(exec)) => Ok(Runtime::Exec(exec)),
            (Some(_), Some(_)) => Err("runtime must not set both 'container' and 'exec'".into()),
            (None, None) => Err("runtime must set one of 'container' or 'exec'".into()),
        }
    }
}

impl From<Runtime> for RuntimeDocument {
    fn from(runtime: Runtime) -> Self {
        match runtime {
            Runtime::Container(container) => RuntimeDocument {
                container: Some(container),
                exec: None,
            },
            Runtime::Exec(exec) => RuntimeDocument {
                container: None,
                exec: Some(exec),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntime {
    /// Image reference
    pub image: String,

    /// Image digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub require_network: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub require_storage_mount: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecRuntime {
    pub platforms: Vec<Platform>,
}

/// A binary for one OS/architecture pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub bin: String,
    pub os: String,
    pub arch: String,
    pub uri: String,
    pub sha256: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runtime::Container(container) => write!(f, "container {}", container.image),
            Runtime::Exec(exec) => {
                let platforms: Vec<String> = exec
                    .platforms
                    .iter()
                    .map(|p| format!("{}/{}", p.os, p.arch))
                    .collect();
                write!(f, "exec [{}]", platforms.join(", "))
            }
        }
    }
}

impl FunctionCatalog {
    /// Create an empty catalog stamped with the current time
    pub fn new(name: &str) -> Self {
        Self {
            api_version: CATALOG_API_VERSION.to_string(),
            kind: CATALOG_KIND.to_string(),
            metadata: Some(CatalogMetadata {
                name: Some(name.to_string()),
                creation_timestamp: Some(chrono::Utc::now().to_rfc3339()),
            }),
            spec: CatalogSpec::default(),
        }
    }

    /// Parse and validate a catalog document
    ///
    /// `source_name` only appears in error messages.
    pub fn from_slice(bytes: &[u8], source_name: &str) -> Result<Self> {
        let catalog: FunctionCatalog =
            serde_yaml_ng::from_slice(bytes).map_err(|e| KaffineError::Parse {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a catalog from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        Self::from_slice(content.as_bytes(), "catalog")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|source| KaffineError::Serialize {
            what: "function catalog".to_string(),
            source,
        })
    }

    /// Check the structural rules serde cannot express
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for function in &self.spec.krm_functions {
            function.validate()?;

            if !seen.insert(function.group_name()) {
                return Err(KaffineError::InvalidCatalog {
                    reason: format!("function '{}' is defined twice", function.group_name()),
                });
            }
        }

        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.name.as_deref())
    }

    pub fn functions(&self) -> &[FunctionDefinition] {
        &self.spec.krm_functions
    }

    /// Group names of every function in the catalog
    pub fn group_names(&self) -> Vec<String> {
        self.spec
            .krm_functions
            .iter()
            .map(FunctionDefinition::group_name)
            .collect()
    }
}

impl FunctionDefinition {
    /// The `group/kind` key used for search, install and collision checks
    pub fn group_name(&self) -> String {
        format!("{}/{}", self.group, self.names.kind)
    }

    pub fn kind(&self) -> &str {
        &self.names.kind
    }

    /// Highest version by lexicographic comparison of the labels
    ///
    /// This is not semver ordering: "v1.10.0" sorts below "v1.9.0".
    pub fn highest_version(&self) -> Option<&FunctionVersion> {
        self.versions.iter().max_by(|a, b| a.name.cmp(&b.name))
    }

    /// Find a version by exact label
    pub fn version(&self, label: &str) -> Option<&FunctionVersion> {
        self.versions.iter().find(|v| v.name == label)
    }

    /// `group/kind:version` using the highest version
    pub fn short_name(&self) -> String {
        match self.highest_version() {
            Some(version) => format!("{}:{}", self.group_name(), version.name),
            None => self.group_name(),
        }
    }

    /// First line of the description
    pub fn short_description(&self) -> &str {
        self.description
            .lines()
            .next()
            .unwrap_or(&self.description)
            .trim()
    }

    fn validate(&self) -> Result<()> {
        if self.group.trim().is_empty() {
            return Err(KaffineError::InvalidCatalog {
                reason: format!("function '{}' has an empty group", self.names.kind),
            });
        }

        if self.names.kind.trim().is_empty() {
            return Err(KaffineError::InvalidCatalog {
                reason: format!("function in group '{}' has an empty kind", self.group),
            });
        }

        // Group and kind become directory and file names on install
        if self
            .group
            .split('/')
            .any(|segment| {
                segment.is_empty() || segment == "." || segment == ".." || segment.contains('@')
            })
        {
            return Err(KaffineError::InvalidCatalog {
                reason: format!("function group '{}' is not a valid path", self.group),
            });
        }

        if self.names.kind.contains(['/', '\\', '@']) || self.names.kind == ".." {
            return Err(KaffineError::InvalidCatalog {
                reason: format!("function kind '{}' is not a valid name", self.names.kind),
            });
        }

        if self.versions.is_empty() {
            return Err(KaffineError::InvalidCatalog {
                reason: format!("function '{}' has no versions", self.group_name()),
            });
        }

        let mut labels = HashSet::new();
        for version in &self.versions {
            if version.name.trim().is_empty() {
                return Err(KaffineError::InvalidCatalog {
                    reason: format!("function '{}' has an unnamed version", self.group_name()),
                });
            }
            // Labels round-trip through `group/kind@version` references
            if version.name.contains('@') || version.name.trim() != version.name {
                return Err(KaffineError::InvalidCatalog {
                    reason: format!(
                        "function '{}' has version '{}', which is not a valid label",
                        self.group_name(),
                        version.name
                    ),
                });
            }
            if !labels.insert(version.name.as_str()) {
                return Err(KaffineError::InvalidCatalog {
                    reason: format!(
                        "function '{}' lists version '{}' twice",
                        self.group_name(),
                        version.name
                    ),
                });
            }
        }

        Ok(())
    }
}
