//! Startup configuration: documentation sources and the fetch allowlist.
//!
//! Sources are read from YAML and JSON files and from `name:location` CLI
//! entries, in that order. The resulting [`DocsConfig`] is built once and
//! never mutated afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use itertools::Itertools;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

use crate::allowlist::DomainAllowlist;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one documentation source is required (use --yaml, --json or --urls)")]
    NoSources,

    #[error("duplicate documentation source name: {0}")]
    DuplicateName(String),

    #[error("malformed documentation source entry: {0}")]
    MalformedEntry(String),

    #[error("malformed allowed domain: {0:?}")]
    MalformedDomain(String),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Remote,
    Local,
}

/// A named documentation index, either a remote URL or a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocSource {
    pub name: String,
    pub location: String,
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DocSource {
    pub fn is_remote(&self) -> bool {
        self.kind == SourceKind::Remote
    }
}

/// A source as it appears in a config file or on the command line, before
/// names are defaulted and locations normalized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "doc_file", alias = "location", alias = "url")]
    pub llms_txt: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SourceEntry {
    pub fn new(name: Option<&str>, location: &str) -> Self {
        Self {
            name: name.map(str::to_string),
            llms_txt: location.to_string(),
            description: None,
        }
    }
}

/// Config file contents: a list of entries, or a `name -> location` map
/// whose key order is kept.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SourceFile(pub Vec<SourceEntry>);

impl<'de> Deserialize<'de> for SourceFile {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SourceFileVisitor;

        impl<'de> Visitor<'de> for SourceFileVisitor {
            type Value = SourceFile;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of doc sources or a map of name to location")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(entry) = seq.next_element::<SourceEntry>()? {
                    entries.push(entry);
                }
                Ok(SourceFile(entries))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, location)) = map.next_entry::<String, String>()? {
                    entries.push(SourceEntry::new(Some(&name), &location));
                }
                Ok(SourceFile(entries))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(SourceFile::default())
            }
        }

        deserializer.deserialize_any(SourceFileVisitor)
    }
}

impl SourceFile {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&read_config(path)?)
    }

    pub fn load_yaml(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&read_config(path)?)
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses `--urls` entries. `https://…` is a bare URL, `name:location`
/// carries a name, anything else is a bare location.
pub fn parse_url_entries<S: AsRef<str>>(entries: &[S]) -> Vec<SourceEntry> {
    entries
        .iter()
        .map(|entry| entry.as_ref().trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if has_http_scheme(entry) {
                return SourceEntry::new(None, entry);
            }
            match entry.split_once(':') {
                Some((name, location)) => SourceEntry::new(Some(name), location),
                None => SourceEntry::new(None, entry),
            }
        })
        .collect()
}

/// Collects source entries from every configured input: YAML file, then
/// JSON file, then `--urls` entries.
pub fn collect_sources<S: AsRef<str>>(
    yaml: Option<&Path>,
    json: Option<&Path>,
    urls: &[S],
) -> Result<Vec<SourceEntry>, ConfigError> {
    let mut entries = Vec::new();
    if let Some(path) = yaml {
        entries.extend(SourceFile::load_yaml(path)?.0);
    }
    if let Some(path) = json {
        entries.extend(SourceFile::load_json(path)?.0);
    }
    entries.extend(parse_url_entries(urls));
    Ok(entries)
}

/// HTTP behaviour shared by all fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            follow_redirects: false,
        }
    }
}

/// Immutable configuration handed to request handlers.
#[derive(Debug, Clone)]
pub struct DocsConfig {
    sources: Vec<DocSource>,
    allowlist: DomainAllowlist,
    local_files: BTreeSet<PathBuf>,
    settings: FetchSettings,
}

impl DocsConfig {
    /// Validates `entries` and derives the allowlist. Remote sources
    /// contribute their host; local sources contribute only their own path.
    pub fn build<S: AsRef<str>>(
        entries: Vec<SourceEntry>,
        allowed_domains: &[S],
        settings: FetchSettings,
    ) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut sources = Vec::with_capacity(entries.len());
        let mut allowlist = DomainAllowlist::new();
        let mut local_files = BTreeSet::new();

        for entry in entries {
            let location = entry.llms_txt.trim();
            if location.is_empty() {
                return Err(ConfigError::MalformedEntry(format!(
                    "source {:?} has an empty location",
                    entry.name.unwrap_or_default()
                )));
            }

            let source = match remote_url(location) {
                Some(url) => {
                    if !allowlist.allow_origin_of(&url) {
                        return Err(ConfigError::MalformedEntry(location.to_string()));
                    }
                    let name = entry
                        .name
                        .unwrap_or_else(|| url.host_str().unwrap_or(location).to_string());
                    DocSource {
                        name,
                        location: location.to_string(),
                        kind: SourceKind::Remote,
                        description: entry.description,
                    }
                }
                None => {
                    let path = normalize_local_path(location)
                        .map_err(|_| ConfigError::MalformedEntry(location.to_string()))?;
                    let path_str = path.display().to_string();
                    local_files.insert(path);
                    DocSource {
                        name: entry.name.unwrap_or_else(|| path_str.clone()),
                        location: path_str,
                        kind: SourceKind::Local,
                        description: entry.description,
                    }
                }
            };

            let name = source.name.trim();
            if name.is_empty() {
                return Err(ConfigError::MalformedEntry(format!(
                    "source {:?} has an empty name",
                    source.location
                )));
            }
            sources.push(DocSource {
                name: name.to_string(),
                ..source
            });
        }

        if let Some(name) = sources.iter().map(|s| &s.name).duplicates().next() {
            return Err(ConfigError::DuplicateName(name.clone()));
        }

        for domain in allowed_domains {
            allowlist
                .allow_entry(domain.as_ref())
                .map_err(ConfigError::MalformedDomain)?;
        }

        tracing::debug!(
            sources = sources.len(),
            allowed = %allowlist,
            local_files = local_files.len(),
            "Configuration loaded"
        );

        Ok(Self {
            sources,
            allowlist,
            local_files,
            settings,
        })
    }

    pub fn sources(&self) -> &[DocSource] {
        &self.sources
    }

    pub fn source_by_name(&self, name: &str) -> Option<&DocSource> {
        self.sources.iter().find(|source| source.name == name)
    }

    pub fn allowlist(&self) -> &DomainAllowlist {
        &self.allowlist
    }

    pub fn is_local_file_allowed(&self, path: &Path) -> bool {
        self.local_files.contains(path)
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }
}

/// Whether `location` starts with an `http:` or `https:` scheme, in any case.
pub fn has_http_scheme(location: &str) -> bool {
    ["http:", "https:"].iter().any(|scheme| {
        location
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Returns the parsed URL if `location` is an `http(s)` URL with a host.
pub fn remote_url(location: &str) -> Option<Url> {
    if !has_http_scheme(location) {
        return None;
    }
    Url::parse(location)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

/// Expands `~`, accepts `file://` URLs, makes the path absolute and
/// resolves `.` and `..` without touching the filesystem.
pub fn normalize_local_path(location: &str) -> io::Result<PathBuf> {
    let raw = if location.starts_with("file://") {
        Url::parse(location)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid file URL"))?
    } else if let Some(rest) = location.strip_prefix('~') {
        let home = std::env::var_os("HOME")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "HOME is not set"))?;
        PathBuf::from(home).join(rest.trim_start_matches(['/', '\\']))
    } else {
        PathBuf::from(location)
    };

    let absolute = if raw.is_absolute() {
        raw
    } else {
        std::env::current_dir()?.join(raw)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
