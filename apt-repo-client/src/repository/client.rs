// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Querying APT repository metadata.

[RepositoryClient] turns repository lines into fetched and indexed
`Packages` / `Sources` metadata and answers version queries against it.

```no_run
use apt_repo_client::repository::{
    client::{ClientConfig, RepositoryClient},
    IndexKind, KeyFilter,
};

# fn main() -> apt_repo_client::error::Result<()> {
let mut client = RepositoryClient::new(ClientConfig {
    architectures: vec!["amd64".into()],
    ..Default::default()
})?;

client.load_repos(
    Some(&["deb http://deb.debian.org/debian bullseye main"]),
    true,
    true,
)?;

if let Some((key, version)) = client.best_version("zstd", &KeyFilter::AllKeys, IndexKind::Binary) {
    println!("zstd {} from {}", version, key);
}
# Ok(())
# }
```
*/

use {
    crate::{
        error::{DebianError, Result},
        package_record::PackageRecord,
        package_version::{DpkgVersionComparator, VersionComparator},
        repository::{
            fetch::IndexFetcher,
            index::{KeyFilter, MetadataIndex},
            sources_list::{clean_lines, parse_line, IndexKind, RepositoryKey},
        },
    },
    indexmap::{IndexMap, IndexSet},
    log::{debug, info, warn},
    once_cell::unsync::OnceCell,
    serde::Deserialize,
    std::{cmp::Ordering, time::Instant},
};

/// Binary records keyed by the `(name, version)` of their source package.
pub type SourceBinariesMap = IndexMap<(String, String), Vec<PackageRecord>>;

/// Records keyed by their package id.
pub type PackageIdMap = IndexMap<String, Vec<PackageRecord>>;

fn default_architectures() -> Vec<String> {
    vec!["all".to_string()]
}

fn default_ignore_errors() -> bool {
    true
}

/// Configuration for a [RepositoryClient].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ClientConfig {
    /// Architectures to fetch binary indices for and to keep records of.
    ///
    /// `all` keeps records of every architecture.
    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,

    /// Whether absent index documents are skipped by loads the client triggers itself.
    #[serde(default = "default_ignore_errors")]
    pub ignore_errors: bool,

    /// Initial repository lines.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            architectures: default_architectures(),
            ignore_errors: default_ignore_errors(),
            sources: vec![],
        }
    }
}

/// Summary of a [RepositoryClient::load_repos] operation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadReport {
    /// Index documents retrieved and loaded.
    pub fetched: usize,
    /// Index documents that didn't exist.
    pub skipped: usize,
    /// Records inserted into the indices.
    pub records: usize,
}

/// Client to APT repository metadata.
pub struct RepositoryClient {
    config: ClientConfig,
    fetcher: IndexFetcher,
    comparator: Box<dyn VersionComparator>,
    lines: Vec<String>,
    sources: MetadataIndex,
    binaries: MetadataIndex,
    source_to_binaries: OnceCell<SourceBinariesMap>,
    pkgid_map: OnceCell<PackageIdMap>,
}

impl RepositoryClient {
    /// Construct an instance fetching via the default transports.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_fetcher(config, IndexFetcher::new_default()?))
    }

    /// Construct an instance using a given [IndexFetcher].
    ///
    /// Repository lines from `config` are recorded but not loaded.
    pub fn with_fetcher(config: ClientConfig, fetcher: IndexFetcher) -> Self {
        let lines = clean_lines(config.sources.iter().map(|s| s.as_str()));

        Self {
            config,
            fetcher,
            comparator: Box::new(DpkgVersionComparator::default()),
            lines,
            sources: MetadataIndex::default(),
            binaries: MetadataIndex::default(),
            source_to_binaries: OnceCell::new(),
            pkgid_map: OnceCell::new(),
        }
    }

    /// Use a different [VersionComparator] for version queries.
    pub fn with_comparator(mut self, comparator: impl VersionComparator + 'static) -> Self {
        self.comparator = Box::new(comparator);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The recorded repository lines, cleaned and deduplicated.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Record repository lines.
    ///
    /// Lines may contain embedded newlines. Comments, blank lines and lines already
    /// recorded are dropped. Previously recorded lines are discarded if `clear` is set.
    pub fn set_sources<I, S>(&mut self, lines: I, clear: bool)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lines = self.candidate_lines(lines, clear);
    }

    fn candidate_lines<I, S>(&self, lines: I, clear: bool) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates = if clear { vec![] } else { self.lines.clone() };
        candidates.extend(lines.into_iter().map(|line| line.as_ref().to_string()));

        clean_lines(candidates)
    }

    /// The index holding records of a given kind.
    pub fn index(&self, kind: IndexKind) -> &MetadataIndex {
        match kind {
            IndexKind::Binary => &self.binaries,
            IndexKind::Source => &self.sources,
        }
    }

    /// The `Sources` index.
    pub fn sources(&self) -> &MetadataIndex {
        &self.sources
    }

    /// The `Packages` index.
    pub fn binaries(&self) -> &MetadataIndex {
        &self.binaries
    }

    fn clear_derived(&mut self) {
        self.source_to_binaries = OnceCell::new();
        self.pkgid_map = OnceCell::new();
    }

    /// Fetch and index metadata of the recorded repository lines.
    ///
    /// If `clear` is set, existing indices are discarded first. If `lines` is given,
    /// they are recorded first (replacing recorded lines if `clear` is set).
    ///
    /// All lines are parsed before anything is changed or fetched. An invalid line
    /// fails the operation leaving recorded lines and indices untouched.
    /// `ignore_errors` tolerates absent index documents only.
    pub fn load_repos(
        &mut self,
        lines: Option<&[&str]>,
        ignore_errors: bool,
        clear: bool,
    ) -> Result<LoadReport> {
        let start = Instant::now();

        let candidates = match lines {
            Some(lines) => self.candidate_lines(lines, clear),
            None => self.lines.clone(),
        };

        let parsed = candidates
            .iter()
            .map(|line| parse_line(line, &self.config.architectures))
            .collect::<Result<Vec<_>>>()?;

        self.lines = candidates;
        if clear {
            self.sources.clear();
            self.binaries.clear();
        }
        self.clear_derived();

        let mut report = LoadReport::default();

        for line in parsed {
            for target in line.targets {
                let reader = match self.fetcher.fetch(&target.url, ignore_errors)? {
                    Some(reader) => reader,
                    None => {
                        report.skipped += 1;
                        continue;
                    }
                };

                debug!("loading {} into {} index", reader.url, target.kind);

                // The allow-list only applies to binary records.
                let (index, architectures) = match target.kind {
                    IndexKind::Binary => {
                        (&mut self.binaries, Some(self.config.architectures.as_slice()))
                    }
                    IndexKind::Source => (&mut self.sources, None),
                };

                let count = index.load(reader, &line.base_url, &target.key, architectures)?;

                debug!("{} records from {}", count, target.key);
                report.fetched += 1;
                report.records += count;
            }
        }

        info!(
            "loaded {} records from {} index documents ({} absent) in {:.3}s",
            report.records,
            report.fetched,
            report.skipped,
            start.elapsed().as_secs_f64()
        );

        Ok(report)
    }

    /// Alias of [Self::load_repos].
    #[inline]
    pub fn update(
        &mut self,
        lines: Option<&[&str]>,
        ignore_errors: bool,
        clear: bool,
    ) -> Result<LoadReport> {
        self.load_repos(lines, ignore_errors, clear)
    }

    /// Keys of loaded `Sources` indices.
    pub fn source_repos(&self) -> Vec<&RepositoryKey> {
        self.sources.keys().collect()
    }

    /// Keys of loaded `Packages` indices.
    pub fn binary_repos(&self) -> Vec<&RepositoryKey> {
        self.binaries.keys().collect()
    }

    /// Find the greatest version of a package.
    ///
    /// Earlier records win over later records with an equal version. Records whose
    /// version can't be parsed are ignored.
    pub fn best_version(
        &self,
        package: &str,
        filter: &KeyFilter,
        kind: IndexKind,
    ) -> Option<(RepositoryKey, String)> {
        let index = self.index(kind);
        let mut best: Option<(RepositoryKey, &str)> = None;

        for key in index.resolve_keys(filter) {
            for record in index.records(&key, package) {
                let version = match record.version() {
                    Ok(version) => version,
                    Err(e) => {
                        warn!("skipping {} record in {}: {}", package, key, e);
                        continue;
                    }
                };

                if let Err(e) = self.comparator.validate(version) {
                    warn!("skipping {} {} in {}: {}", package, version, key, e);
                    continue;
                }

                let replace = match &best {
                    Some((_, current)) => matches!(
                        self.comparator.compare(version, current),
                        Ok(Ordering::Greater)
                    ),
                    None => true,
                };

                if replace {
                    best = Some((key.clone(), version));
                }
            }
        }

        best.map(|(key, version)| (key, version.to_string()))
    }

    /// Find every record of a package having a version equal to `version`.
    ///
    /// An unparseable `version` yields no records.
    pub fn exact_version(
        &self,
        package: &str,
        version: &str,
        filter: &KeyFilter,
        kind: IndexKind,
    ) -> Vec<&PackageRecord> {
        if let Err(e) = self.comparator.validate(version) {
            warn!("invalid version requested for {}: {}: {}", package, version, e);
            return vec![];
        }

        let index = self.index(kind);

        index
            .resolve_keys(filter)
            .iter()
            .flat_map(|key| index.records(key, package))
            .filter(|record| match record.version() {
                Ok(v) => matches!(self.comparator.compare(v, version), Ok(Ordering::Equal)),
                Err(_) => false,
            })
            .collect()
    }

    /// Find records of a package by version, defaulting to its best version.
    pub fn packages_by_name_version(
        &self,
        package: &str,
        version: Option<&str>,
        filter: &KeyFilter,
        kind: IndexKind,
    ) -> Vec<&PackageRecord> {
        match version {
            Some(version) => self.exact_version(package, version, filter, kind),
            None => match self.best_version(package, filter, kind) {
                Some((_, version)) => self.exact_version(package, &version, filter, kind),
                None => vec![],
            },
        }
    }

    /// Distinct `(key, version)` pairs of a package, in index order.
    pub fn available_versions(
        &self,
        package: &str,
        filter: &KeyFilter,
        kind: IndexKind,
    ) -> Vec<(RepositoryKey, String)> {
        let index = self.index(kind);
        let mut res = IndexSet::new();

        for key in index.resolve_keys(filter) {
            for record in index.records(&key, package) {
                if let Ok(version) = record.version() {
                    res.insert((key.clone(), version.to_string()));
                }
            }
        }

        res.into_iter().collect()
    }

    /// Distinct package names, in index order.
    pub fn available_packages(&self, filter: &KeyFilter, kind: IndexKind) -> Vec<&str> {
        let index = self.index(kind);

        index
            .resolve_keys(filter)
            .iter()
            .flat_map(|key| index.packages(key).collect::<Vec<_>>())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Binary records grouped by the source package they were built from.
    ///
    /// The map is computed once. If no binary metadata is loaded, the recorded
    /// repository lines are loaded first.
    pub fn source_to_binaries_map(&mut self) -> Result<&SourceBinariesMap> {
        if self.source_to_binaries.get().is_none() && self.binaries.is_empty() {
            self.load_repos(None, self.config.ignore_errors, true)?;
        }

        let binaries = &self.binaries;

        self.source_to_binaries
            .get_or_try_init(|| -> Result<SourceBinariesMap> {
                let mut map = SourceBinariesMap::new();

                for (_, record) in binaries.iter_records() {
                    let (name, version) = record.source_name_version()?;

                    map.entry((name.to_string(), version.to_string()))
                        .or_default()
                        .push(record.clone());
                }

                Ok(map)
            })
    }

    /// Binary records built from a given source package version.
    pub fn binaries_for_source(&mut self, name: &str, version: &str) -> Result<&[PackageRecord]> {
        Ok(self
            .source_to_binaries_map()?
            .get(&(name.to_string(), version.to_string()))
            .map(|records| records.as_slice())
            .unwrap_or_default())
    }

    /// Records of both indices keyed by their package id.
    ///
    /// Source records come before binary records. The map is computed once. If no
    /// metadata is loaded, the recorded repository lines are loaded first.
    pub fn pkgid_map(&mut self) -> Result<&PackageIdMap> {
        if self.pkgid_map.get().is_none() && self.sources.is_empty() && self.binaries.is_empty()
        {
            self.load_repos(None, self.config.ignore_errors, true)?;
        }

        let sources = &self.sources;
        let binaries = &self.binaries;

        self.pkgid_map.get_or_try_init(|| -> Result<PackageIdMap> {
            let mut map = PackageIdMap::new();

            for (_, record) in sources.iter_records().chain(binaries.iter_records()) {
                map.entry(record.package_id()?.to_string())
                    .or_default()
                    .push(record.clone());
            }

            Ok(map)
        })
    }

    /// Resolve the records a package id refers to.
    pub fn records_for_package_id(&mut self, id: &str) -> Result<&[PackageRecord]> {
        Ok(self
            .pkgid_map()?
            .get(id)
            .map(|records| records.as_slice())
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for RepositoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryClient")
            .field("config", &self.config)
            .field("lines", &self.lines)
            .field("sources", &self.sources.len())
            .field("binaries", &self.binaries.len())
            .finish()
    }
}

impl TryFrom<ClientConfig> for RepositoryClient {
    type Error = DebianError;

    fn try_from(config: ClientConfig) -> Result<Self> {
        Self::new(config)
    }
}
