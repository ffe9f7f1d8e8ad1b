// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! APT repository metadata.

This crate indexes the metadata of Debian-style package repositories (the
`Packages` and `Sources` indices consumed by `apt`) and answers queries like
*what is the best available version of package X* or *which binary packages
were built from source package Y* across any number of configured
repositories.

It is not a package manager: there is no dependency resolution and nothing is
installed. Signatures on repository metadata are not verified.

# A Tour of Functionality

Repositories are described by lines in the format of apt's `sources.list`. The
[repository::sources_list] module parses these lines into
[repository::RepositoryKey] partitions and the URLs of the index documents
belonging to them.

Index documents are retrieved by [repository::IndexFetcher], which prefers
gzip compressed documents and falls back to plain ones. Transports implement
[repository::IndexTransport]: HTTP lives in [repository::http] and local
directories in [repository::filesystem].

Index documents are sequences of *control paragraphs*. Low-level control file
primitives are defined in the [control] module. [control::ControlParagraphReader]
implements a streaming reader of paragraphs. Each paragraph of an index becomes
a [package_record::PackageRecord], which derives file lists, URLs, the
originating source package and a package id from the raw fields.

[repository::MetadataIndex] groups records by repository key and package name.
[repository::RepositoryClient] owns a binary and a source index and implements
the queries. Which repository keys a query considers is controlled by
[repository::KeyFilter].

The [package_version] module implements Debian package version string parsing
and comparison. [package_version::PackageVersion] is the main type used for this.

# Crate Features

The optional and enabled-by-default `http` feature enables fetching repository
metadata via HTTP.
*/

pub mod control;
pub mod error;
pub mod io;
pub mod package_record;
pub mod package_version;
pub mod repository;
