// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package records from repository indices.

A [PackageRecord] is a paragraph from a `Packages` or `Sources` index bound to
the base URL of the repository it came from. Derived values (file lists, URLs,
originating source package, package id) are computed on first access and
cached on the record.
*/

use {
    crate::{
        control::ControlParagraph,
        error::{DebianError, Result},
        repository::sources_list::join_url,
    },
    once_cell::{sync::Lazy, unsync::OnceCell},
    regex::Regex,
    std::{
        hash::{Hash, Hasher},
        ops::Deref,
        str::FromStr,
    },
};

/// Architecture values that match every architecture.
const WILDCARD_ARCHITECTURES: &[&str; 2] = &["all", "any"];

static RE_FILES_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<md5>[0-9a-f]{32})[ \t]+(?P<size>\d+)",
        r"(?:[ \t]+(?P<section>[-/a-zA-Z0-9]+)[ \t]+(?P<priority>[-a-zA-Z0-9]+))?",
        r"[ \t]+(?P<name>[0-9a-zA-Z][-+:.,=~0-9a-zA-Z_]+)$",
    ))
    .expect("Files line regex should compile")
});

static RE_SOURCE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<name>[0-9a-zA-Z][-+:.,=~0-9a-zA-Z_]+)(?:\s+\((?P<version>(?:[0-9]+:)?[a-zA-Z0-9.+~-]+)\))?",
    )
    .expect("Source field regex should compile")
});

/// A file belonging to a package.
///
/// Source packages describe their files in the `Files` field. Binary packages
/// have a single file described by `Filename`, `MD5sum` and `Size`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileEntry {
    /// Hex MD5 digest of the file.
    pub md5: String,
    /// Size of the file in bytes.
    pub size: u64,
    /// Archive section, if stated.
    pub section: Option<String>,
    /// Priority, if stated.
    pub priority: Option<String>,
    /// Filename (binaries: repository relative path).
    pub filename: String,
}

impl FileEntry {
    /// Parse a line of a `Files` field.
    ///
    /// The form is `<md5> <size> [<section> <priority>] <filename>`.
    pub fn parse_files_line(line: &str) -> Result<Self> {
        let caps = RE_FILES_LINE
            .captures(line)
            .ok_or_else(|| DebianError::StanzaParse(line.to_string()))?;

        let size = u64::from_str(&caps["size"])
            .map_err(|_| DebianError::StanzaParse(line.to_string()))?;

        Ok(Self {
            md5: caps["md5"].to_string(),
            size,
            section: caps.name("section").map(|m| m.as_str().to_string()),
            priority: caps.name("priority").map(|m| m.as_str().to_string()),
            filename: caps["name"].to_string(),
        })
    }
}

/// A package paragraph from a repository index.
///
/// Field access goes through [Deref] to the inner [ControlParagraph].
///
/// Equality and hashing only consider the `Package` and `Version` fields.
#[derive(Clone, Debug)]
pub struct PackageRecord {
    paragraph: ControlParagraph<'static>,
    base_url: String,
    files: OnceCell<Vec<FileEntry>>,
    urls: OnceCell<Vec<String>>,
    source_name_version: OnceCell<(String, String)>,
    package_id: OnceCell<String>,
}

impl Deref for PackageRecord {
    type Target = ControlParagraph<'static>;

    fn deref(&self) -> &Self::Target {
        &self.paragraph
    }
}

impl PartialEq for PackageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.field_str("Package") == other.field_str("Package")
            && self.field_str("Version") == other.field_str("Version")
    }
}

impl Eq for PackageRecord {}

impl Hash for PackageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field_str("Package").hash(state);
        self.field_str("Version").hash(state);
    }
}

impl PackageRecord {
    /// Construct an instance from a paragraph and the base URL of its repository.
    pub fn new(paragraph: ControlParagraph<'static>, base_url: impl ToString) -> Self {
        Self {
            paragraph,
            base_url: base_url.to_string(),
            files: OnceCell::new(),
            urls: OnceCell::new(),
            source_name_version: OnceCell::new(),
            package_id: OnceCell::new(),
        }
    }

    /// The inner control paragraph.
    pub fn paragraph(&self) -> &ControlParagraph<'static> {
        &self.paragraph
    }

    /// Base URL of the repository this record came from.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rebind the record to a different repository base URL.
    ///
    /// Cached URLs are discarded.
    pub fn set_base_url(&mut self, base_url: impl ToString) {
        self.base_url = base_url.to_string();
        self.urls = OnceCell::new();
    }

    /// The `Package` field.
    pub fn package(&self) -> Result<&str> {
        self.required_field_str("Package")
    }

    /// The `Version` field as its original string.
    pub fn version(&self) -> Result<&str> {
        self.required_field_str("Version")
    }

    /// The `Source` field.
    pub fn source(&self) -> Option<&str> {
        self.field_str("Source")
    }

    /// Words of the `Architecture` field.
    pub fn architectures(&self) -> impl Iterator<Item = &str> {
        self.iter_field_words("Architecture").into_iter().flatten()
    }

    /// Whether this record describes a source package.
    ///
    /// Only source paragraphs carry a `Files` field.
    pub fn is_source(&self) -> bool {
        self.has_field("Files")
    }

    /// Whether this record passes an architecture allow-list.
    ///
    /// Records without an `Architecture` field, records for `all`/`any` and records
    /// sharing an architecture with `allowed` pass. An allow-list containing `all`
    /// passes everything.
    pub fn is_architecture_allowed(&self, allowed: &[String]) -> bool {
        if allowed.iter().any(|a| a == "all") || !self.has_field("Architecture") {
            return true;
        }

        self.architectures().any(|arch| {
            WILDCARD_ARCHITECTURES.contains(&arch) || allowed.iter().any(|a| a == arch)
        })
    }

    /// Files belonging to this package.
    pub fn files(&self) -> Result<&[FileEntry]> {
        self.files
            .get_or_try_init(|| -> Result<Vec<FileEntry>> {
                if let Some(lines) = self.iter_field_lines("Files") {
                    lines
                        .filter(|line| !line.is_empty())
                        .map(FileEntry::parse_files_line)
                        .collect::<Result<Vec<_>>>()
                } else if let Some(filename) = self.field_str("Filename") {
                    let size = self.required_field_str("Size")?;

                    Ok(vec![FileEntry {
                        md5: self.required_field_str("MD5sum")?.to_string(),
                        size: u64::from_str(size).map_err(|_| {
                            DebianError::ControlParseError(format!("invalid Size field: {}", size))
                        })?,
                        section: None,
                        priority: None,
                        filename: filename.to_string(),
                    }])
                } else {
                    Ok(vec![])
                }
            })
            .map(|files| files.as_slice())
    }

    /// Absolute URLs of files belonging to this package.
    pub fn urls(&self) -> Result<&[String]> {
        self.urls
            .get_or_try_init(|| -> Result<Vec<String>> {
                if let Some(filename) = self.field_str("Filename") {
                    Ok(vec![join_url(&self.base_url, filename)])
                } else if self.is_source() {
                    let directory = self.required_field_str("Directory")?;

                    Ok(self
                        .files()?
                        .iter()
                        .map(|entry| {
                            join_url(&self.base_url, &format!("{}/{}", directory, entry.filename))
                        })
                        .collect())
                } else {
                    Ok(vec![])
                }
            })
            .map(|urls| urls.as_slice())
    }

    /// The `(name, version)` of the source package this record originates from.
    ///
    /// Source records resolve to themselves. Binary records use their `Source` field,
    /// falling back to their own name and version.
    pub fn source_name_version(&self) -> Result<(&str, &str)> {
        let (name, version) = self
            .source_name_version
            .get_or_try_init(|| -> Result<(String, String)> {
                let package = self.package()?;
                let version = self.version()?;

                let source = match self.source() {
                    Some(source) if !self.is_source() => source,
                    _ => return Ok((package.to_string(), version.to_string())),
                };

                let caps = RE_SOURCE_FIELD.captures(source).ok_or_else(|| {
                    DebianError::ControlParseError(format!("invalid Source field: {}", source))
                })?;

                // Binary NMUs carry a version diverging from their source's.
                let version = caps.name("version").map_or(version, |m| m.as_str());

                Ok((caps["name"].to_string(), version.to_string()))
            })?;

        Ok((name, version))
    }

    /// A content identifier for this package.
    ///
    /// Binary packages use their `MD5sum`. Source packages use the MD5 of their
    /// `.dsc` file.
    pub fn package_id(&self) -> Result<&str> {
        self.package_id
            .get_or_try_init(|| -> Result<String> {
                let id = if self.is_source() {
                    self.files()?
                        .iter()
                        .find(|entry| entry.filename.ends_with(".dsc"))
                        .map(|entry| entry.md5.clone())
                } else {
                    self.field_str("MD5sum").map(|s| s.to_string())
                };

                id.ok_or_else(|| DebianError::PackageIdUnavailable {
                    package: self.field_str("Package").unwrap_or_default().to_string(),
                    version: self.field_str("Version").unwrap_or_default().to_string(),
                })
            })
            .map(|id| id.as_str())
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::control::ControlParagraphReader, indoc::indoc, std::io::Cursor};

    const BASE_URL: &str = "http://deb.debian.org/debian";

    fn record(data: &str) -> Result<PackageRecord> {
        let paragraph = ControlParagraphReader::new(Cursor::new(data.as_bytes()))
            .next()
            .expect("test data should have a paragraph")?;

        Ok(PackageRecord::new(paragraph, BASE_URL))
    }

    const SOURCE: &str = indoc! {"
        Package: libzstd
        Binary: libzstd-dev, libzstd1, zstd
        Version: 1.4.8+dfsg-3
        Architecture: any
        Directory: pool/main/libz/libzstd
        Files:
         0f0fb1ab8d4b3a96a4ca3e9d0a4f8b31 2274 libzstd_1.4.8+dfsg-3.dsc
         943bed8b8d98a50c8d8a101b12693bb4 1331996 libzstd_1.4.8+dfsg.orig.tar.xz
         4d2692830e1f481ce769e2dd24cbc9db 12184 libzstd_1.4.8+dfsg-3.debian.tar.xz
    "};

    const BINARY: &str = indoc! {"
        Package: zstd
        Source: libzstd (1.4.8+dfsg-3)
        Version: 1.4.8+dfsg-3+b1
        Architecture: amd64
        Filename: pool/main/libz/libzstd/zstd_1.4.8+dfsg-3+b1_amd64.deb
        Size: 422604
        MD5sum: 2d3a4e5b1c8a9f0e7d6c5b4a39281706
    "};

    #[test]
    fn files_line_grammar() -> Result<()> {
        assert_eq!(
            FileEntry::parse_files_line(
                "d41d8cd98f00b204e9800998ecf8427e 1024 net optional foo_1.0.dsc"
            )?,
            FileEntry {
                md5: "d41d8cd98f00b204e9800998ecf8427e".into(),
                size: 1024,
                section: Some("net".into()),
                priority: Some("optional".into()),
                filename: "foo_1.0.dsc".into(),
            }
        );

        let entry = FileEntry::parse_files_line("d41d8cd98f00b204e9800998ecf8427e 10 foo.tar.gz")?;
        assert_eq!(entry.section, None);
        assert_eq!(entry.filename, "foo.tar.gz");

        assert!(matches!(
            FileEntry::parse_files_line("d41d8cd98f00b204e9800998ecf8427e foo_1.0.dsc"),
            Err(DebianError::StanzaParse(_))
        ));
        assert!(matches!(
            FileEntry::parse_files_line("d41d8cd9 1024 foo_1.0.dsc"),
            Err(DebianError::StanzaParse(_))
        ));

        Ok(())
    }

    #[test]
    fn source_record() -> Result<()> {
        let r = record(SOURCE)?;

        assert!(r.is_source());
        assert_eq!(r.files()?.len(), 3);
        assert_eq!(
            r.urls()?[0],
            "http://deb.debian.org/debian/pool/main/libz/libzstd/libzstd_1.4.8+dfsg-3.dsc"
        );
        assert_eq!(r.source_name_version()?, ("libzstd", "1.4.8+dfsg-3"));
        assert_eq!(r.package_id()?, "0f0fb1ab8d4b3a96a4ca3e9d0a4f8b31");

        Ok(())
    }

    #[test]
    fn binary_record() -> Result<()> {
        let r = record(BINARY)?;

        assert!(!r.is_source());
        assert_eq!(
            r.files()?,
            &[FileEntry {
                md5: "2d3a4e5b1c8a9f0e7d6c5b4a39281706".into(),
                size: 422604,
                section: None,
                priority: None,
                filename: "pool/main/libz/libzstd/zstd_1.4.8+dfsg-3+b1_amd64.deb".into(),
            }]
        );
        assert_eq!(
            r.urls()?,
            &["http://deb.debian.org/debian/pool/main/libz/libzstd/zstd_1.4.8+dfsg-3+b1_amd64.deb"
                .to_string()]
        );
        assert_eq!(r.package_id()?, "2d3a4e5b1c8a9f0e7d6c5b4a39281706");

        Ok(())
    }

    #[test]
    fn source_name_version_resolution() -> Result<()> {
        let r = record("Package: zstd\nSource: foo (1.2-3)\nVersion: 1.2-3+b1\n")?;
        assert_eq!(r.source_name_version()?, ("foo", "1.2-3"));

        let r = record("Package: foo\nVersion: 1.2-3\n")?;
        assert_eq!(r.source_name_version()?, ("foo", "1.2-3"));

        let r = record("Package: foo-utils\nSource: foo\nVersion: 1.2-3\n")?;
        assert_eq!(r.source_name_version()?, ("foo", "1.2-3"));

        let r = record("Package: foo\nSource: foo (1:2.0-1)\nVersion: 1:2.0-1+b2\n")?;
        assert_eq!(r.source_name_version()?, ("foo", "1:2.0-1"));

        Ok(())
    }

    #[test]
    fn malformed_files_field() -> Result<()> {
        let r = record(indoc! {"
            Package: broken
            Version: 1.0
            Directory: pool/b/broken
            Files:
             not-an-md5 12 broken_1.0.dsc
        "})?;

        assert!(matches!(r.files(), Err(DebianError::StanzaParse(_))));
        assert!(r.package_id().is_err());

        Ok(())
    }

    #[test]
    fn package_id_unavailable() -> Result<()> {
        let r = record("Package: foo\nVersion: 1.0\n")?;
        assert!(matches!(
            r.package_id(),
            Err(DebianError::PackageIdUnavailable { .. })
        ));
        assert!(r.files()?.is_empty());
        assert!(r.urls()?.is_empty());

        Ok(())
    }

    #[test]
    fn architecture_filter() -> Result<()> {
        let mips = record("Package: foo\nVersion: 1.0\nArchitecture: mips\n")?;
        assert!(!mips.is_architecture_allowed(&["amd64".into()]));
        assert!(mips.is_architecture_allowed(&["all".into()]));
        assert!(mips.is_architecture_allowed(&["amd64".into(), "mips".into()]));

        let all = record("Package: foo\nVersion: 1.0\nArchitecture: all\n")?;
        assert!(all.is_architecture_allowed(&["amd64".into()]));

        let none = record("Package: foo\nVersion: 1.0\n")?;
        assert!(none.is_architecture_allowed(&["amd64".into()]));

        Ok(())
    }

    #[test]
    fn identity() -> Result<()> {
        let a = record("Package: foo\nVersion: 1.0\nArchitecture: amd64\n")?;
        let b = record("Package: foo\nVersion: 1.0\nArchitecture: i386\n")?;
        let c = record("Package: foo\nVersion: 1.1\n")?;

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set = [a, b, c].into_iter().collect::<std::collections::HashSet<_>>();
        assert_eq!(set.len(), 2);

        Ok(())
    }

    #[test]
    fn rebinding_base_url() -> Result<()> {
        let mut r = record(BINARY)?;
        assert!(r.urls()?[0].starts_with(BASE_URL));

        r.set_base_url("file:/srv/mirror");
        assert_eq!(
            r.urls()?[0],
            "file:/srv/mirror/pool/main/libz/libzstd/zstd_1.4.8+dfsg-3+b1_amd64.deb"
        );

        Ok(())
    }
}
