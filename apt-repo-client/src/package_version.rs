// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian package version string handling.

The repository engine never interprets version strings itself. It goes through
a [VersionComparator], which yields a total order over version strings or a
[VersionError] for strings it can't parse. [DpkgVersionComparator] is the
default implementation and is backed by [PackageVersion].
*/

use {
    std::{
        cmp::Ordering,
        fmt::{Display, Formatter},
        num::ParseIntError,
        str::FromStr,
    },
    thiserror::Error,
};

#[derive(Clone, Debug, Error)]
pub enum VersionError {
    #[error("error parsing string to integer: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("version string is empty")]
    Empty,

    #[error("the epoch component has non-digit characters: {0}")]
    EpochNonNumeric(String),

    #[error("upstream_version component is empty: {0}")]
    UpstreamVersionEmpty(String),

    #[error("upstream_version component has illegal character: {0}")]
    UpstreamVersionIllegalChar(String),

    #[error("debian_revision component has illegal character: {0}")]
    DebianRevisionIllegalChar(String),
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// A Debian package version.
///
/// The format is `[epoch:]upstream_version[-debian_revision]`. Semantics are defined at
/// <https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageVersion {
    epoch: Option<u32>,
    upstream_version: String,
    debian_revision: Option<String>,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        // Epoch is everything before the first colon. upstream_version and
        // debian_revision are separated by the last hyphen.
        let (epoch, remainder) = match s.split_once(':') {
            Some((epoch, remainder)) => (Some(epoch), remainder),
            None => (None, s),
        };

        let (upstream, debian) = match remainder.rsplit_once('-') {
            Some((upstream, debian)) => (upstream, Some(debian)),
            None => (remainder, None),
        };

        let epoch = if let Some(epoch) = epoch {
            if epoch.is_empty() || !epoch.chars().all(|c| c.is_ascii_digit()) {
                return Err(VersionError::EpochNonNumeric(s.to_string()));
            }

            Some(u32::from_str(epoch)?)
        } else {
            None
        };

        if upstream.is_empty() {
            return Err(VersionError::UpstreamVersionEmpty(s.to_string()));
        }

        // Alphanumerics and `. + ~` are allowed. Hyphens only when a revision follows.
        // Colons are tolerated when an epoch is present.
        if !upstream.chars().all(|c| match c {
            c if c.is_ascii_alphanumeric() => true,
            '.' | '+' | '~' => true,
            '-' => debian.is_some(),
            ':' => epoch.is_some(),
            _ => false,
        }) {
            return Err(VersionError::UpstreamVersionIllegalChar(s.to_string()));
        }

        let debian_revision = if let Some(debian) = debian {
            if debian.is_empty()
                || !debian
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '~'))
            {
                return Err(VersionError::DebianRevisionIllegalChar(s.to_string()));
            }

            Some(debian.to_string())
        } else {
            None
        };

        Ok(Self {
            epoch,
            upstream_version: upstream.to_string(),
            debian_revision,
        })
    }

    /// The `epoch` component, if explicitly present.
    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// The `epoch` component, defaulting to `0`.
    pub fn epoch_assumed(&self) -> u32 {
        self.epoch.unwrap_or(0)
    }

    /// The `upstream_version` component.
    pub fn upstream_version(&self) -> &str {
        &self.upstream_version
    }

    /// The `debian_revision` component.
    pub fn debian_revision(&self) -> Option<&str> {
        self.debian_revision.as_deref()
    }
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }

        f.write_str(&self.upstream_version)?;

        if let Some(revision) = &self.debian_revision {
            write!(f, "-{}", revision)?;
        }

        Ok(())
    }
}

/// Sort weight of a character within a non-digit run.
///
/// Tilde sorts before everything, even the end of the run. Letters sort before
/// non-letters.
fn char_order(c: Option<char>) -> i32 {
    match c {
        None => 0,
        Some('~') => -1,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(c) => c as i32 + 256,
    }
}

fn lexical_compare(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars();
    let mut b_chars = b.chars();

    loop {
        let (a_char, b_char) = (a_chars.next(), b_chars.next());

        if a_char.is_none() && b_char.is_none() {
            return Ordering::Equal;
        }

        match char_order(a_char).cmp(&char_order(b_char)) {
            Ordering::Equal => {}
            res => return res,
        }
    }
}

/// Compare two runs of digits numerically without overflowing.
fn numeric_compare(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');

    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn split_leading(s: &str, digits: bool) -> (&str, &str) {
    let pos = s
        .find(|c: char| c.is_ascii_digit() != digits)
        .unwrap_or(s.len());

    s.split_at(pos)
}

/// Compare a version component string using Debian rules.
///
/// Alternates between comparing leading non-digit runs lexically and leading digit runs
/// numerically until a difference is found or both inputs are exhausted.
fn compare_component(a: &str, b: &str) -> Ordering {
    let mut a_remaining = a;
    let mut b_remaining = b;

    while !a_remaining.is_empty() || !b_remaining.is_empty() {
        let (a_text, a_rest) = split_leading(a_remaining, false);
        let (b_text, b_rest) = split_leading(b_remaining, false);

        match lexical_compare(a_text, b_text) {
            Ordering::Equal => {}
            res => return res,
        }

        let (a_digits, a_rest) = split_leading(a_rest, true);
        let (b_digits, b_rest) = split_leading(b_rest, true);

        match numeric_compare(a_digits, b_digits) {
            Ordering::Equal => {}
            res => return res,
        }

        a_remaining = a_rest;
        b_remaining = b_rest;
    }

    Ordering::Equal
}

impl PartialOrd<Self> for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // The absence of a debian revision is equivalent to `0`.
        self.epoch_assumed()
            .cmp(&other.epoch_assumed())
            .then_with(|| compare_component(&self.upstream_version, &other.upstream_version))
            .then_with(|| {
                compare_component(
                    self.debian_revision.as_deref().unwrap_or("0"),
                    other.debian_revision.as_deref().unwrap_or("0"),
                )
            })
    }
}

/// Something that can order version strings.
///
/// Implementations must provide a total order over the strings they accept and fail
/// with [VersionError] on strings they don't.
pub trait VersionComparator {
    /// Validate a version string.
    fn validate(&self, version: &str) -> Result<()>;

    /// Compare two version strings.
    fn compare(&self, a: &str, b: &str) -> Result<Ordering>;
}

/// [VersionComparator] implementing Debian version ordering via [PackageVersion].
#[derive(Clone, Copy, Debug, Default)]
pub struct DpkgVersionComparator;

impl VersionComparator for DpkgVersionComparator {
    fn validate(&self, version: &str) -> Result<()> {
        PackageVersion::parse(version).map(|_| ())
    }

    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        Ok(PackageVersion::parse(a)?.cmp(&PackageVersion::parse(b)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse() -> Result<()> {
        assert_eq!(
            PackageVersion::parse("1:4.7.0+dfsg1-2")?,
            PackageVersion {
                epoch: Some(1),
                upstream_version: "4.7.0+dfsg1".into(),
                debian_revision: Some("2".into()),
            }
        );
        assert_eq!(
            PackageVersion::parse("0.18.0+dfsg-2+b1")?,
            PackageVersion {
                epoch: None,
                upstream_version: "0.18.0+dfsg".into(),
                debian_revision: Some("2+b1".into())
            }
        );
        assert_eq!(
            PackageVersion::parse("1.2-3-4")?.upstream_version(),
            "1.2-3"
        );

        Ok(())
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(PackageVersion::parse(""), Err(VersionError::Empty)));
        assert!(matches!(
            PackageVersion::parse("a:1.0"),
            Err(VersionError::EpochNonNumeric(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0 beta"),
            Err(VersionError::UpstreamVersionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0-"),
            Err(VersionError::DebianRevisionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1:-2"),
            Err(VersionError::UpstreamVersionEmpty(_))
        ));
    }

    #[test]
    fn format() -> Result<()> {
        for s in ["1:4.7.0+dfsg1-2", "3.3.2.final~github", "0.18.0+dfsg-2+b1"] {
            assert_eq!(PackageVersion::parse(s)?.to_string(), s);
        }

        Ok(())
    }

    #[test]
    fn test_lexical_compare() {
        assert_eq!(lexical_compare("~~", "~~a"), Ordering::Less);
        assert_eq!(lexical_compare("~~a", "~"), Ordering::Less);
        assert_eq!(lexical_compare("~", ""), Ordering::Less);
        assert_eq!(lexical_compare("", "a"), Ordering::Less);
        assert_eq!(lexical_compare("a", "+"), Ordering::Less);
        assert_eq!(lexical_compare("ab", "ba"), Ordering::Less);
    }

    #[test]
    fn test_compare_component() {
        assert_eq!(
            compare_component("1.0~beta1~svn1245", "1.0~beta1"),
            Ordering::Less
        );
        assert_eq!(compare_component("1.0~beta1", "1.0"), Ordering::Less);
        assert_eq!(compare_component("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_component("1.01", "1.1"), Ordering::Equal);
        assert_eq!(
            compare_component("99999999999999999999999", "1"),
            Ordering::Greater
        );
    }

    #[test]
    fn compare_versions() -> Result<()> {
        let cmp = DpkgVersionComparator;

        assert_eq!(cmp.compare("1:0.1", "9.9")?, Ordering::Greater);
        assert_eq!(cmp.compare("1.2-3", "1.2-3+b1")?, Ordering::Less);
        assert_eq!(cmp.compare("1.0", "1.0-0")?, Ordering::Equal);
        assert_eq!(cmp.compare("2.0~rc1", "2.0")?, Ordering::Less);
        assert!(cmp.compare("1.0", "not a version").is_err());

        Ok(())
    }
}
