// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {crate::package_version::VersionError, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum DebianError {
    #[error("URL error: {0:?}")]
    Url(#[from] url::ParseError),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("unable to parse repository line: {0}")]
    ConfigParse(String),

    #[error("unknown repository type: {0}")]
    UnknownRepositoryType(String),

    #[error("invalid repository filter: {0}")]
    InvalidKeyFilter(String),

    #[error("index document not found: {url}")]
    FetchNotFound { url: String },

    #[error("error fetching {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("control file parse error: {0}")]
    ControlParseError(String),

    #[error("required field missing in control paragraph: {0}")]
    ControlRequiredFieldMissing(String),

    #[error("couldn't parse file entry \"{0}\" in Files field")]
    StanzaParse(String),

    #[error("unable to derive package id for {package} {version}")]
    PackageIdUnavailable { package: String, version: String },
}

impl DebianError {
    /// Whether this error signals an absent index document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FetchNotFound { .. })
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, DebianError>;
