// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! APT repository access.

An APT repository publishes `Packages` indices (binary packages) and `Sources`
indices (source packages), either under `dists/<distribution>/<component>/`
or directly in a single *flat* directory. See
<https://wiki.debian.org/DebianRepository/Format> for the canonical definition.

[sources_list] turns `sources.list` style lines into index URLs. [fetch]
retrieves index documents over the transports in [http] and [filesystem].
[index] holds parsed records and [client] ties everything together.
*/

pub mod client;
pub mod fetch;
pub mod filesystem;
#[cfg(feature = "http")]
pub mod http;
pub mod index;
pub mod sources_list;

pub use {
    client::{ClientConfig, LoadReport, RepositoryClient},
    fetch::{IndexFetcher, IndexTransport},
    index::{KeyFilter, KeyPattern, MetadataIndex},
    sources_list::{IndexKind, RepositoryKey},
};
