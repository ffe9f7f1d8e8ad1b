// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `sources.list` style repository lines.

A repository line has the form

```text
deb|deb-src <base_url> <distribution> <component> [<component> ...]
deb|deb-src <base_url> <flat_path>/
```

The first form describes a *pool* repository with indices under
`dists/<distribution>/<component>/`. The second form describes a *flat*
repository whose index lives directly in `<flat_path>`.

See <https://wiki.debian.org/DebianRepository/Format>.
*/

use {
    crate::error::{DebianError, Result},
    indexmap::IndexSet,
    once_cell::sync::Lazy,
    regex::Regex,
    std::{fmt::Display, str::FromStr},
};

static RE_REPOSITORY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<kind>\S+)\s+(?P<base_url>\S+)\s+(?P<dist>\S+)(?:\s+(?P<components>.+))?$")
        .expect("repository line regex should compile")
});

static RE_URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<prefix>[A-Za-z][A-Za-z0-9+.-]*:(?://[^/]*)?)(?P<path>.*)$")
        .expect("URL prefix regex should compile")
});

/// The flavor of index a repository line refers to.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum IndexKind {
    /// Binary packages (`deb` lines, `Packages` indices).
    Binary,
    /// Source packages (`deb-src` lines, `Sources` indices).
    Source,
}

impl IndexKind {
    /// The `sources.list` type token for this kind.
    pub fn line_type(&self) -> &'static str {
        match self {
            Self::Binary => "deb",
            Self::Source => "deb-src",
        }
    }

    /// Filename of index documents of this kind.
    pub fn index_filename(&self) -> &'static str {
        match self {
            Self::Binary => "Packages",
            Self::Source => "Sources",
        }
    }
}

impl FromStr for IndexKind {
    type Err = DebianError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deb" => Ok(Self::Binary),
            "deb-src" => Ok(Self::Source),
            _ => Err(DebianError::UnknownRepositoryType(s.to_string())),
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.line_type())
    }
}

/// Identity of a partition of repository metadata.
///
/// `component` is empty for flat repositories.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RepositoryKey {
    base_url: String,
    distribution: String,
    component: String,
}

impl RepositoryKey {
    pub fn new(
        base_url: impl ToString,
        distribution: impl ToString,
        component: impl ToString,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            distribution: distribution.to_string(),
            component: component.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn distribution(&self) -> &str {
        &self.distribution
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Whether this key refers to a flat repository.
    pub fn is_flat(&self) -> bool {
        self.component.is_empty()
    }
}

impl Display for RepositoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.base_url, self.distribution)?;

        if !self.component.is_empty() {
            write!(f, " {}", self.component)?;
        }

        Ok(())
    }
}

/// A single index document to retrieve.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchTarget {
    /// Which index the document populates.
    pub kind: IndexKind,
    /// The repository partition the document's records belong to.
    pub key: RepositoryKey,
    /// URL of the uncompressed index document.
    pub url: String,
}

/// A parsed repository line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourcesLine {
    pub kind: IndexKind,
    pub base_url: String,
    pub targets: Vec<FetchTarget>,
}

/// Strip comments and normalize whitespace in a repository line.
///
/// Returns [None] if nothing remains.
pub fn clean_line(line: &str) -> Option<String> {
    let line = line.split('#').next().unwrap_or_default();
    let words = line.split_whitespace().collect::<Vec<_>>();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Clean a sequence of repository lines, dropping blanks and duplicates.
///
/// The first occurrence of a line determines its position.
pub fn clean_lines<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut res = IndexSet::new();

    for line in lines {
        res.extend(line.as_ref().lines().filter_map(clean_line));
    }

    res.into_iter().collect()
}

/// Normalize a POSIX path the way `os.path.normpath` does.
///
/// Redundant separators and `.` segments are removed and `..` segments consume
/// their parent. `..` at the root of an absolute path is dropped.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = vec![];

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push(segment);
                }
            }
            _ => parts.push(segment),
        }
    }

    let joined = parts.join("/");

    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join a relative path onto a base URL, normalizing the path portion.
///
/// The `scheme://authority` prefix of `base` is preserved verbatim.
pub fn join_url(base: &str, path: &str) -> String {
    let (prefix, base_path) = match RE_URL_PREFIX.captures(base) {
        Some(caps) => (
            caps.name("prefix").map(|m| m.as_str()).unwrap_or_default(),
            caps.name("path").map(|m| m.as_str()).unwrap_or_default(),
        ),
        None => ("", base),
    };

    let joined = if base_path.is_empty() && !prefix.is_empty() {
        format!("/{}", path)
    } else {
        format!("{}/{}", base_path, path)
    };

    format!("{}{}", prefix, normalize_path(&joined))
}

/// Rewrite the `copy:` scheme to `file:`.
fn rewrite_copy_scheme(url: &str) -> String {
    match url.strip_prefix("copy:") {
        Some(rest) => format!("file:{}", rest),
        None => url.to_string(),
    }
}

/// Parse a cleaned repository line into fetch targets.
///
/// `architectures` determines the `binary-<arch>` indices of pool form `deb` lines.
pub fn parse_line(line: &str, architectures: &[String]) -> Result<SourcesLine> {
    let caps = RE_REPOSITORY_LINE
        .captures(line.trim())
        .ok_or_else(|| DebianError::ConfigParse(line.to_string()))?;

    let kind = IndexKind::from_str(&caps["kind"])?;
    let base_url = rewrite_copy_scheme(&caps["base_url"]);
    let dist = &caps["dist"];
    let components = caps
        .name("components")
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>())
        .unwrap_or_default();

    let targets = if components.is_empty() {
        if !dist.ends_with('/') {
            return Err(DebianError::ConfigParse(line.to_string()));
        }

        // Flat paths are always relative to the base URL.
        let path = normalize_path(&format!("./{}/{}", dist, kind.index_filename()));

        vec![FetchTarget {
            kind,
            key: RepositoryKey::new(&base_url, dist, ""),
            url: join_url(&base_url, &path),
        }]
    } else {
        let mut targets = vec![];

        for component in components {
            let key = RepositoryKey::new(&base_url, dist, component);

            match kind {
                IndexKind::Binary => {
                    for arch in architectures {
                        targets.push(FetchTarget {
                            kind,
                            key: key.clone(),
                            url: join_url(
                                &base_url,
                                &format!("dists/{}/{}/binary-{}/Packages", dist, component, arch),
                            ),
                        });
                    }
                }
                IndexKind::Source => {
                    targets.push(FetchTarget {
                        kind,
                        key,
                        url: join_url(
                            &base_url,
                            &format!("dists/{}/{}/source/Sources", dist, component),
                        ),
                    });
                }
            }
        }

        targets
    };

    Ok(SourcesLine {
        kind,
        base_url,
        targets,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn arches(values: &[&str]) -> Vec<String> {
        values.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn pool_binary_targets() -> Result<()> {
        let line = parse_line(
            "deb http://deb.debian.org/debian bullseye main contrib non-free",
            &arches(&["amd64", "all"]),
        )?;

        assert_eq!(line.kind, IndexKind::Binary);
        assert_eq!(line.targets.len(), 6);
        assert_eq!(
            line.targets[0],
            FetchTarget {
                kind: IndexKind::Binary,
                key: RepositoryKey::new("http://deb.debian.org/debian", "bullseye", "main"),
                url: "http://deb.debian.org/debian/dists/bullseye/main/binary-amd64/Packages"
                    .into(),
            }
        );
        assert_eq!(
            line.targets[5].url,
            "http://deb.debian.org/debian/dists/bullseye/non-free/binary-all/Packages"
        );
        assert_eq!(line.targets[5].key.component(), "non-free");

        Ok(())
    }

    #[test]
    fn pool_source_targets() -> Result<()> {
        let line = parse_line(
            "deb-src http://deb.debian.org/debian/ bullseye main contrib",
            &arches(&["amd64", "i386"]),
        )?;

        assert_eq!(line.kind, IndexKind::Source);
        assert_eq!(
            line.targets
                .iter()
                .map(|t| t.url.as_str())
                .collect::<Vec<_>>(),
            vec![
                "http://deb.debian.org/debian/dists/bullseye/main/source/Sources",
                "http://deb.debian.org/debian/dists/bullseye/contrib/source/Sources",
            ]
        );
        assert_eq!(line.targets[1].key.base_url(), "http://deb.debian.org/debian/");

        Ok(())
    }

    #[test]
    fn flat_targets() -> Result<()> {
        let line = parse_line("deb http://example.com/repo ./", &arches(&["amd64"]))?;
        assert_eq!(line.targets.len(), 1);
        assert_eq!(line.targets[0].url, "http://example.com/repo/Packages");
        assert_eq!(
            line.targets[0].key,
            RepositoryKey::new("http://example.com/repo", "./", "")
        );
        assert!(line.targets[0].key.is_flat());

        let line = parse_line("deb-src http://example.com/repo sub//dir/", &[])?;
        assert_eq!(line.targets.len(), 1);
        assert_eq!(line.targets[0].url, "http://example.com/repo/sub/dir/Sources");
        assert_eq!(line.targets[0].key.component(), "");

        Ok(())
    }

    #[test]
    fn copy_scheme() -> Result<()> {
        let line = parse_line("deb copy:/srv/mirror/ ./", &[])?;
        assert_eq!(line.base_url, "file:/srv/mirror/");
        assert_eq!(line.targets[0].url, "file:/srv/mirror/Packages");

        Ok(())
    }

    #[test]
    fn invalid_lines() {
        assert!(matches!(
            parse_line("deb http://example.com/repo bullseye", &[]),
            Err(DebianError::ConfigParse(_))
        ));
        assert!(matches!(
            parse_line("deb http://example.com/repo", &[]),
            Err(DebianError::ConfigParse(_))
        ));
        assert!(matches!(
            parse_line("rpm http://example.com/repo ./", &[]),
            Err(DebianError::UnknownRepositoryType(_))
        ));
    }

    #[test]
    fn line_cleaning() {
        assert_eq!(clean_line("  # only a comment"), None);
        assert_eq!(clean_line(""), None);
        assert_eq!(
            clean_line("deb  http://a/  sid   main # trailing").as_deref(),
            Some("deb http://a/ sid main")
        );

        let lines = clean_lines([
            "deb http://a/ sid main",
            "deb   http://a/ sid main   # again",
            "\n# nothing\ndeb-src http://a/ sid main",
        ]);
        assert_eq!(lines, vec!["deb http://a/ sid main", "deb-src http://a/ sid main"]);

        let owned = vec!["deb http://a/ sid contrib".to_string(), lines[0].clone()];
        assert_eq!(
            clean_lines(lines.iter().chain(owned.iter())),
            vec![
                "deb http://a/ sid main",
                "deb-src http://a/ sid main",
                "deb http://a/ sid contrib"
            ]
        );
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("./a//b/./c"), "a/b/c");
        assert_eq!(normalize_path("/a/b/../../.."), "/");
        assert_eq!(normalize_path("../a/.."), "..");
        assert_eq!(normalize_path("./"), ".");

        assert_eq!(join_url("http://host", "Packages"), "http://host/Packages");
        assert_eq!(
            join_url("http://host/debian/", "../ubuntu/./dists"),
            "http://host/ubuntu/dists"
        );
        assert_eq!(join_url("file:///srv/repo", "Sources"), "file:///srv/repo/Sources");
        assert_eq!(join_url("/srv/repo/", "a//b"), "/srv/repo/a/b");
    }
}
