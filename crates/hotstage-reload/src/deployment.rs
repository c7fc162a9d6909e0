//! Artifact-to-process mapping loaded from the deployment manifest.
//!
//! The manifest lists server roles and the configuration databases each role
//! loads:
//!
//! ```xml
//! <root>
//!   <server name="GameSvr">
//!     <excel name="CommonExcel"/>
//!   </server>
//! </root>
//! ```
//!
//! A [`RoleTable`] maps each role to the address pattern of its processes.
//! [`DeploymentMap`] inverts the manifest into artifact name -> patterns.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::address::{AddressField, AddressPattern};
use crate::error::{ReloadError, Result};

/// Role that is never reloaded.
pub const MONITOR_ROLE: &str = "MonitorSvr";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "server", default)]
    servers: Vec<ManifestServer>,
}

#[derive(Debug, Deserialize)]
struct ManifestServer {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "excel", default)]
    artifacts: Vec<ManifestArtifact>,
}

#[derive(Debug, Deserialize)]
struct ManifestArtifact {
    #[serde(rename = "@name")]
    name: String,
}

/// Role name -> process address pattern.
#[derive(Debug, Clone)]
pub struct RoleTable {
    roles: HashMap<String, AddressPattern>,
}

impl RoleTable {
    /// The stock deployment: `Common` covers every process, each other role
    /// is a process class in the third field.
    pub fn builtin() -> Self {
        let mut roles = HashMap::new();
        roles.insert("Common".to_string(), AddressPattern::all());
        for (role, class) in [
            ("GameSvr", "13"),
            ("MatchSvr", "17"),
            ("PvpAgentSvr", "16"),
            ("ChatSvr", "20"),
            ("ViewSvr", "34"),
            ("TeamSvr", "19"),
            ("ActivitySvr", "39"),
            ("WeeklyFubenSvr", "40"),
        ] {
            roles.insert(role.to_string(), process_class(class));
        }
        Self { roles }
    }

    /// A table with no roles.
    pub fn empty() -> Self {
        Self {
            roles: HashMap::new(),
        }
    }

    /// Add or replace roles from `(role, pattern text)` pairs.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (role, pattern) in overrides {
            self.roles.insert(role.clone(), pattern.parse()?);
        }
        Ok(self)
    }

    /// Pattern for a role.
    pub fn get(&self, role: &str) -> Option<&AddressPattern> {
        self.roles.get(role)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn process_class(class: &str) -> AddressPattern {
    AddressPattern::new([
        AddressField::Any,
        AddressField::Any,
        AddressField::Literal(class.to_string()),
        AddressField::Any,
    ])
}

/// Artifact name -> patterns of every role that loads it.
#[derive(Debug, Clone, Default)]
pub struct DeploymentMap {
    artifacts: HashMap<String, Vec<AddressPattern>>,
}

impl DeploymentMap {
    /// A map with no artifacts.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from manifest text.
    ///
    /// Artifact names are title-cased. Roles listed in `skip_roles` are
    /// ignored, as are roles missing from `roles` (with a warning).
    pub fn from_manifest(xml: &str, roles: &RoleTable, skip_roles: &[String]) -> Result<Self> {
        let manifest: Manifest =
            quick_xml::de::from_str(xml).map_err(|e| ReloadError::Manifest(e.to_string()))?;

        let mut artifacts: HashMap<String, Vec<AddressPattern>> = HashMap::new();
        for server in manifest.servers {
            if skip_roles.iter().any(|r| *r == server.name) {
                debug!(role = %server.name, "Skipping non-reloadable role");
                continue;
            }
            let Some(pattern) = roles.get(&server.name) else {
                warn!(role = %server.name, "Role has no address pattern, skipping");
                continue;
            };
            for artifact in server.artifacts {
                artifacts
                    .entry(title_case(&artifact.name))
                    .or_default()
                    .push(pattern.clone());
            }
        }

        Ok(Self { artifacts })
    }

    /// Load the manifest at `path`.
    ///
    /// A missing or malformed manifest is logged and yields an empty map, so
    /// a reload proceeds with no selective targets rather than failing.
    pub async fn load(path: &Path, roles: &RoleTable, skip_roles: &[String]) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read deployment manifest");
                return Self::empty();
            }
        };

        match Self::from_manifest(&content, roles, skip_roles) {
            Ok(map) => {
                debug!(path = %path.display(), artifacts = map.len(), "Loaded deployment manifest");
                map
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse deployment manifest");
                Self::empty()
            }
        }
    }

    /// Patterns of the roles that load `artifact`.
    pub fn patterns(&self, artifact: &str) -> &[AddressPattern] {
        self.artifacts
            .get(artifact)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, artifact: &str) -> bool {
        self.artifacts.contains_key(artifact)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Uppercase the first letter of every word.
///
/// A word starts after any character that is not a letter, digit or `_`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_boundary = true;
    for c in s.chars() {
        if at_boundary {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_boundary = !(c.is_alphanumeric() || c == '_');
    }
    out
}
