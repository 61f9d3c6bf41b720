//! Domain allowlist used to gate every remote fetch.
//!
//! Hosts are compared exactly (case-insensitive). An entry for `example.com`
//! does not admit `docs.example.com`; scheme and port are ignored.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use url::Url;

/// Marker that disables the host check for remote URLs.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainAllowlist {
    hosts: BTreeSet<String>,
    allow_all: bool,
}

impl DomainAllowlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the host of `url` to the allowlist. Returns `false` if the URL
    /// carries no host.
    pub fn allow_origin_of(&mut self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => {
                self.hosts.insert(normalize_host(host));
                true
            }
            None => false,
        }
    }

    /// Adds a user supplied entry: `*`, a bare host, or a URL/origin.
    pub fn allow_entry(&mut self, entry: &str) -> Result<(), String> {
        let entry = entry.trim();
        if entry == WILDCARD {
            self.allow_all = true;
            return Ok(());
        }
        match parse_entry_host(entry) {
            Some(host) => {
                self.hosts.insert(host);
                Ok(())
            }
            None => Err(entry.to_string()),
        }
    }

    pub fn allows_all(&self) -> bool {
        self.allow_all
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.hosts.contains(&normalize_host(host))
    }

    /// Checks whether a fetch of `url` is permitted. On rejection the
    /// offending host (or the whole URL when it has none) is returned.
    pub fn check(&self, url: &Url) -> Result<(), String> {
        let host = url.host_str().map(normalize_host);
        if self.allow_all {
            return Ok(());
        }
        match host {
            Some(host) if self.hosts.contains(&host) => Ok(()),
            Some(host) => Err(host),
            None => Err(url.to_string()),
        }
    }

    pub fn permits(&self, url: &Url) -> bool {
        self.check(url).is_ok()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }
}

impl fmt::Display for DomainAllowlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allow_all {
            return f.write_str(WILDCARD);
        }
        write!(f, "{}", self.hosts.iter().join(", "))
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn parse_entry_host(entry: &str) -> Option<String> {
    if entry.is_empty() {
        return None;
    }
    if entry.contains("://") {
        let url = Url::parse(entry).ok()?;
        return url.host_str().map(normalize_host);
    }
    // bare host, possibly with a port or path tacked on
    let host = entry.split(['/', '?', '#']).next()?;
    let url = Url::parse(&format!("http://{host}/")).ok()?;
    url.host_str().map(normalize_host)
}
