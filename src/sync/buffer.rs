//! # Sync Buffer
//!
//! Desired property values for one pass, grouped by kind, then by the
//! configuration that produced them, then by GitHub property name. Iteration
//! order is deterministic (`BTreeMap` throughout) so passes are reproducible.

use super::fingerprint::{fingerprint, Fingerprint};
use crate::crd::GithubActionSecretsSync;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKind {
    Secret,
    Variable,
}

impl PropertyKind {
    /// Processing order within a repository
    pub const ALL: [PropertyKind; 2] = [PropertyKind::Secret, PropertyKind::Variable];

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyKind::Secret => "secret",
            PropertyKind::Variable => "variable",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            PropertyKind::Secret => "secrets",
            PropertyKind::Variable => "variables",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the configuration resource a value came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceIdentity {
    pub namespace: Option<String>,
    pub name: String,
}

impl SourceIdentity {
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    pub fn of(config: &GithubActionSecretsSync) -> Self {
        Self::new(config.namespace(), config.name_any())
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Raw property bytes plus their fingerprint. Bytes are zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct PropertyValue {
    raw: Zeroizing<Vec<u8>>,
    fingerprint: Fingerprint,
}

impl PropertyValue {
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        let raw = Zeroizing::new(raw.into());
        let fingerprint = fingerprint(&raw);
        Self { raw, fingerprint }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Value as text, required for variables
    pub fn as_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.raw)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyValue")
            .field("len", &self.raw.len())
            .field("fingerprint", &format_args!("{:08x}", self.fingerprint))
            .finish()
    }
}

type SourceBucket = BTreeMap<SourceIdentity, BTreeMap<String, PropertyValue>>;

#[derive(Debug, Clone, Default)]
pub struct SyncBuffer {
    buckets: BTreeMap<PropertyKind, SourceBucket>,
}

impl SyncBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any earlier value under the same key.
    pub fn insert(
        &mut self,
        kind: PropertyKind,
        source: SourceIdentity,
        name: impl Into<String>,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        self.buckets
            .entry(kind)
            .or_default()
            .entry(source)
            .or_default()
            .insert(name.into(), value)
    }

    pub fn get(&self, kind: PropertyKind, source: &SourceIdentity, name: &str) -> Option<&PropertyValue> {
        self.buckets.get(&kind)?.get(source)?.get(name)
    }

    /// All properties of one kind, ordered by source then name.
    pub fn properties(
        &self,
        kind: PropertyKind,
    ) -> impl Iterator<Item = (&SourceIdentity, &str, &PropertyValue)> + '_ {
        self.buckets.get(&kind).into_iter().flat_map(|sources| {
            sources.iter().flat_map(|(source, properties)| {
                properties
                    .iter()
                    .map(move |(name, value)| (source, name.as_str(), value))
            })
        })
    }

    pub fn len(&self, kind: PropertyKind) -> usize {
        self.buckets
            .get(&kind)
            .map_or(0, |sources| sources.values().map(BTreeMap::len).sum())
    }

    pub fn is_empty(&self) -> bool {
        PropertyKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }

    /// Move every entry of `other` into this buffer.
    pub fn merge(&mut self, other: SyncBuffer) {
        for (kind, sources) in other.buckets {
            let bucket = self.buckets.entry(kind).or_default();
            for (source, properties) in sources {
                bucket.entry(source).or_default().extend(properties);
            }
        }
    }
}
