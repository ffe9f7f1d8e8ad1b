// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! In-memory index of package records.

A [MetadataIndex] partitions [PackageRecord] by [RepositoryKey] and then by
package name. Keys and names iterate in insertion order.
*/

use {
    crate::{
        control::ControlParagraphReader,
        error::{DebianError, Result},
        package_record::PackageRecord,
        repository::sources_list::RepositoryKey,
    },
    indexmap::IndexMap,
    std::{
        fmt::Display,
        io::{BufRead, Write},
        str::FromStr,
    },
};

/// A possibly partial [RepositoryKey].
///
/// [None] fields match any value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeyPattern {
    pub base_url: String,
    pub distribution: Option<String>,
    pub component: Option<String>,
}

impl KeyPattern {
    /// Whether a key is matched by this pattern.
    pub fn matches(&self, key: &RepositoryKey) -> bool {
        self.base_url == key.base_url()
            && self
                .distribution
                .as_deref()
                .map_or(true, |d| d == key.distribution())
            && self
                .component
                .as_deref()
                .map_or(true, |c| c == key.component())
    }
}

impl From<&RepositoryKey> for KeyPattern {
    fn from(key: &RepositoryKey) -> Self {
        Self {
            base_url: key.base_url().to_string(),
            distribution: Some(key.distribution().to_string()),
            component: Some(key.component().to_string()),
        }
    }
}

impl FromStr for KeyPattern {
    type Err = DebianError;

    /// Parse `base_url [distribution [component]]`.
    fn from_str(s: &str) -> Result<Self> {
        let words = s.split_whitespace().collect::<Vec<_>>();

        match words.as_slice() {
            [base_url] => Ok(Self {
                base_url: base_url.to_string(),
                distribution: None,
                component: None,
            }),
            [base_url, distribution] => Ok(Self {
                base_url: base_url.to_string(),
                distribution: Some(distribution.to_string()),
                component: None,
            }),
            [base_url, distribution, component] => Ok(Self {
                base_url: base_url.to_string(),
                distribution: Some(distribution.to_string()),
                component: Some(component.to_string()),
            }),
            _ => Err(DebianError::InvalidKeyFilter(s.to_string())),
        }
    }
}

impl Display for KeyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base_url)?;
        if let Some(d) = &self.distribution {
            write!(f, " {}", d)?;
        }
        if let Some(c) = &self.component {
            write!(f, " {}", c)?;
        }

        Ok(())
    }
}

/// Restricts which repository keys a query considers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyFilter {
    /// Every known key.
    AllKeys,
    /// Every key having the given base URL.
    ByBaseUrl(String),
    /// Keys matching a pattern.
    ByKey(KeyPattern),
    /// Keys matching any of the patterns.
    ByKeyList(Vec<KeyPattern>),
}

impl Default for KeyFilter {
    fn default() -> Self {
        Self::AllKeys
    }
}

impl KeyFilter {
    /// Whether a key passes this filter.
    pub fn matches(&self, key: &RepositoryKey) -> bool {
        match self {
            Self::AllKeys => true,
            Self::ByBaseUrl(base_url) => key.base_url() == base_url,
            Self::ByKey(pattern) => pattern.matches(key),
            Self::ByKeyList(patterns) => patterns.iter().any(|p| p.matches(key)),
        }
    }
}

impl FromStr for KeyFilter {
    type Err = DebianError;

    /// Parse a single `base_url [distribution [component]]` filter.
    fn from_str(s: &str) -> Result<Self> {
        let pattern = KeyPattern::from_str(s)?;

        Ok(match (&pattern.distribution, &pattern.component) {
            (None, None) => Self::ByBaseUrl(pattern.base_url),
            _ => Self::ByKey(pattern),
        })
    }
}

/// Package records grouped by repository key and package name.
#[derive(Clone, Debug, Default)]
pub struct MetadataIndex {
    repositories: IndexMap<RepositoryKey, IndexMap<String, Vec<PackageRecord>>>,
}

impl MetadataIndex {
    /// Load records from an index document.
    ///
    /// Paragraphs are bound to `base_url` and appended under `key`. If an
    /// `architectures` allow-list is given, records failing it are dropped. Returns
    /// the number of records inserted.
    ///
    /// The document is fully parsed before the index is modified: on error nothing
    /// is inserted.
    pub fn load<R: BufRead>(
        &mut self,
        reader: R,
        base_url: &str,
        key: &RepositoryKey,
        architectures: Option<&[String]>,
    ) -> Result<usize> {
        let mut staged = vec![];

        for paragraph in ControlParagraphReader::new(reader) {
            let record = PackageRecord::new(paragraph?, base_url);

            let name = record.package()?.to_string();
            if record.is_source() {
                record.files()?;
            }

            if architectures.map_or(true, |allowed| record.is_architecture_allowed(allowed)) {
                staged.push((name, record));
            }
        }

        let count = staged.len();
        let packages = self.repositories.entry(key.clone()).or_default();

        for (name, record) in staged {
            packages.entry(name).or_default().push(record);
        }

        Ok(count)
    }

    /// Known repository keys, in load order.
    pub fn keys(&self) -> impl Iterator<Item = &RepositoryKey> {
        self.repositories.keys()
    }

    /// Whether a key has been loaded.
    pub fn contains_key(&self, key: &RepositoryKey) -> bool {
        self.repositories.contains_key(key)
    }

    /// Names of packages under a key.
    pub fn packages(&self, key: &RepositoryKey) -> impl Iterator<Item = &str> {
        self.repositories
            .get(key)
            .into_iter()
            .flat_map(|packages| packages.keys().map(|k| k.as_str()))
    }

    /// Records for a package name under a key.
    pub fn records(&self, key: &RepositoryKey, name: &str) -> &[PackageRecord] {
        self.repositories
            .get(key)
            .and_then(|packages| packages.get(name))
            .map(|records| records.as_slice())
            .unwrap_or_default()
    }

    /// Iterate over every record along with its key.
    pub fn iter_records(&self) -> impl Iterator<Item = (&RepositoryKey, &PackageRecord)> {
        self.repositories.iter().flat_map(|(key, packages)| {
            packages
                .values()
                .flat_map(move |records| records.iter().map(move |r| (key, r)))
        })
    }

    /// Whether the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.repositories
            .values()
            .flat_map(|packages| packages.values())
            .map(|records| records.len())
            .sum()
    }

    /// Remove all keys and records.
    pub fn clear(&mut self) {
        self.repositories.clear();
    }

    /// Resolve a filter to the concrete keys it selects, in index order.
    pub fn resolve_keys(&self, filter: &KeyFilter) -> Vec<RepositoryKey> {
        self.repositories
            .keys()
            .filter(|key| filter.matches(key))
            .cloned()
            .collect()
    }

    /// Serialize every record as control paragraphs.
    ///
    /// Each paragraph is followed by a blank line.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (_, record) in self.iter_records() {
            record.paragraph().write(writer)?;
            writer.write_all(b"\n")?;
        }

        Ok(())
    }
}
