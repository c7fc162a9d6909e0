//! Per-directory record of configuration files staged during a session.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of configuration artifact an uploaded file represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCategory {
    /// Client-side database export (`ClientConfig/**/*.db`).
    ClientDb,
    /// Client-side XML (`ClientConfig/**/*.xml`).
    ClientXml,
    /// Anything under `ServerConfig`.
    Server,
}

impl ConfigCategory {
    /// All categories, in wire-code order.
    pub const ALL: [ConfigCategory; 3] = [
        ConfigCategory::ClientDb,
        ConfigCategory::ClientXml,
        ConfigCategory::Server,
    ];

    /// Short wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigCategory::ClientDb => "db",
            ConfigCategory::ClientXml => "xml",
            ConfigCategory::Server => "svr",
        }
    }
}

impl fmt::Display for ConfigCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for ConfigCategory {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ConfigCategory::ClientDb),
            1 => Ok(ConfigCategory::ClientXml),
            2 => Ok(ConfigCategory::Server),
            other => Err(Error::InvalidCategory(other.to_string())),
        }
    }
}

impl FromStr for ConfigCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db" | "client_db" | "0" => Ok(ConfigCategory::ClientDb),
            "xml" | "client_xml" | "1" => Ok(ConfigCategory::ClientXml),
            "svr" | "server" | "2" => Ok(ConfigCategory::Server),
            _ => Err(Error::InvalidCategory(s.to_string())),
        }
    }
}

/// Files written into one directory during one session, grouped by category,
/// plus the backup directory chosen for files overwritten there.
///
/// The three sets are independent: the store never cross-checks them.
/// Mutation is only possible through
/// [`ExpiringSessionStore`](crate::ExpiringSessionStore), under its lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEntrySet {
    backup_dir: Option<String>,
    db_files: HashSet<String>,
    xml_files: HashSet<String>,
    server_files: HashSet<String>,
}

impl ConfigEntrySet {
    /// Create an empty entry set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backup directory name, if one was chosen.
    pub fn backup_dir(&self) -> Option<&str> {
        self.backup_dir.as_deref()
    }

    /// Files recorded under a category.
    pub fn files(&self, category: ConfigCategory) -> &HashSet<String> {
        match category {
            ConfigCategory::ClientDb => &self.db_files,
            ConfigCategory::ClientXml => &self.xml_files,
            ConfigCategory::Server => &self.server_files,
        }
    }

    /// Client database files.
    pub fn db_files(&self) -> &HashSet<String> {
        &self.db_files
    }

    /// Client XML files.
    pub fn xml_files(&self) -> &HashSet<String> {
        &self.xml_files
    }

    /// Server configuration files.
    pub fn server_files(&self) -> &HashSet<String> {
        &self.server_files
    }

    /// True if no file of any category is recorded.
    pub fn is_empty(&self) -> bool {
        self.db_files.is_empty() && self.xml_files.is_empty() && self.server_files.is_empty()
    }

    /// Server or XML changes can't be attributed to individual roles.
    pub fn requires_full_reload(&self) -> bool {
        !self.server_files.is_empty() || !self.xml_files.is_empty()
    }

    /// Set the backup directory once. Returns false if already set.
    pub(crate) fn set_backup_dir(&mut self, name: &str) -> bool {
        if self.backup_dir.is_some() {
            return false;
        }
        self.backup_dir = Some(name.to_string());
        true
    }

    pub(crate) fn insert(&mut self, category: ConfigCategory, path: &str) -> bool {
        self.files_mut(category).insert(path.to_string())
    }

    pub(crate) fn remove(&mut self, category: ConfigCategory, path: &str) -> bool {
        self.files_mut(category).remove(path)
    }

    fn files_mut(&mut self, category: ConfigCategory) -> &mut HashSet<String> {
        match category {
            ConfigCategory::ClientDb => &mut self.db_files,
            ConfigCategory::ClientXml => &mut self.xml_files,
            ConfigCategory::Server => &mut self.server_files,
        }
    }
}
