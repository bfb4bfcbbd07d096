//! maven-metadata.xml documents and the staged-into-published merge

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// file name of a package metadata document
pub const METADATA_FILE: &str = "maven-metadata.xml";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// per-directory index of a published package
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "metadata", rename_all = "camelCase")]
pub struct PackageMetadata {
    #[serde(rename = "@modelVersion", default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<Versioning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Plugins>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub versions: Versions,
    /// opaque timestamp, carried verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    #[serde(rename = "version", default)]
    pub version: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_copy: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugins {
    #[serde(rename = "plugin", default)]
    pub plugin: Vec<Plugin>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub prefix: String,
    pub artifact_id: String,
}

impl PackageMetadata {
    /// parse a document; `path` is only used for error context
    pub fn parse(xml: &str, path: &Path) -> Result<Self> {
        quick_xml::de::from_str(xml).map_err(|e| Error::CorruptMetadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// read and parse a document from disk
    pub fn read(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path).with_path(path)?;
        Self::parse(&xml, path)
    }

    /// serialize with an xml declaration and two-space indent
    pub fn to_xml(&self, path: &Path) -> Result<String> {
        let mut body = String::new();
        let mut ser = quick_xml::se::Serializer::new(&mut body);
        ser.indent(' ', 2);
        self.serialize(ser).map_err(|e| Error::MetadataWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut xml = String::with_capacity(XML_DECLARATION.len() + body.len() + 1);
        xml.push_str(XML_DECLARATION);
        xml.push_str(&body);
        xml.push('\n');
        Ok(xml)
    }

    /// serialize and write to disk, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<()> {
        let xml = self.to_xml(path)?;
        std::fs::write(path, xml).with_path(path)
    }

    /// known versions, empty when there is no versioning block
    pub fn versions(&self) -> &[String] {
        self.versioning
            .as_ref()
            .map(|v| v.versions.version.as_slice())
            .unwrap_or(&[])
    }

    /// merge a staged document into this (published) one
    ///
    /// versions are unioned, keeping the published order and appending new
    /// staged versions. `latest`, `release`, `lastUpdated` and `snapshot` are
    /// taken from the staged document wherever it has them. coordinates are
    /// only filled in when missing. returns true if anything changed.
    pub fn merge(&mut self, staged: &PackageMetadata) -> bool {
        let mut changed = false;

        changed |= fill_missing(&mut self.model_version, &staged.model_version);
        changed |= fill_missing(&mut self.group_id, &staged.group_id);
        changed |= fill_missing(&mut self.artifact_id, &staged.artifact_id);
        changed |= fill_missing(&mut self.version, &staged.version);

        if let Some(staged_plugins) = &staged.plugins {
            let plugins = self.plugins.get_or_insert_with(Plugins::default);
            for plugin in &staged_plugins.plugin {
                if !plugins.plugin.iter().any(|p| p.prefix == plugin.prefix) {
                    plugins.plugin.push(plugin.clone());
                    changed = true;
                }
            }
        }

        if let Some(staged_versioning) = &staged.versioning {
            changed |= self.versioning.is_none();
            let versioning = self.versioning.get_or_insert_with(Versioning::default);

            let known = &mut versioning.versions.version;
            for version in &staged_versioning.versions.version {
                if !known.contains(version) {
                    known.push(version.clone());
                    changed = true;
                }
            }

            changed |= override_with(&mut versioning.latest, &staged_versioning.latest);
            changed |= override_with(&mut versioning.release, &staged_versioning.release);
            changed |= override_with(&mut versioning.last_updated, &staged_versioning.last_updated);
            changed |= override_with(&mut versioning.snapshot, &staged_versioning.snapshot);
        }

        changed
    }
}

fn fill_missing(slot: &mut Option<String>, staged: &Option<String>) -> bool {
    if slot.is_none() && staged.is_some() {
        *slot = staged.clone();
        return true;
    }
    false
}

fn override_with<T: Clone + PartialEq>(slot: &mut Option<T>, staged: &Option<T>) -> bool {
    match staged {
        Some(value) if slot.as_ref() != Some(value) => {
            *slot = Some(value.clone());
            true
        }
        _ => false,
    }
}
