// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    apt_repo_client::{
        error::DebianError,
        repository::{ClientConfig, IndexKind, KeyFilter, KeyPattern, RepositoryClient},
    },
    clap::{Arg, ArgMatches, Command},
    log::LevelFilter,
    std::{io::Write, str::FromStr},
    thiserror::Error,
};

const ABOUT: &str = "\
Query APT repository metadata

Repositories are described by lines in the format of apt's sources.list:

   deb http://deb.debian.org/debian bullseye main contrib
   deb-src http://deb.debian.org/debian bullseye main
   deb file:/srv/flat-repo ./

The first two forms describe repositories with a `dists/<distribution>`
layout and one or more components. The last form describes a flat
repository whose `Packages` or `Sources` file lives directly in the given
directory. Comments start with `#`.

http://, https:// and file: URLs are supported. `copy:` is an alias of
`file:`.

Lines can be given via --repo-line, read from files with --sources-list or
defined in the `sources` key of a YAML config file (--config).
";

const CONFIG_ABOUT: &str = "\
Path to a YAML file defining client configuration

The following keys are recognized:

architectures (optional) (list[string])
   Architectures to fetch `Packages` indices for. Records of other
   architectures are ignored. `all` (the default) keeps everything.

ignore-errors (optional) (bool)
   Whether to skip repositories whose index documents don't exist.
   Defaults to true.

sources (optional) (list[string])
   Repository lines.
";

const FILTER_ABOUT: &str = "\
Only consider repositories matching a filter

A filter has the form `<base_url> [<distribution> [<component>]]`. Missing
parts match anything. Can be specified multiple times.
";

#[derive(Debug, Error)]
pub enum ArtError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Debian(#[from] DebianError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),

    #[error("no repositories defined; use --repo-line, --sources-list or --config")]
    NoRepositories,

    #[error("package not found: {0}")]
    PackageNotFound(String),
}

pub type Result<T> = std::result::Result<T, ArtError>;

fn add_query_args(command: Command<'static>) -> Command<'static> {
    command
        .arg(
            Arg::new("source")
                .long("source")
                .help("Query source packages instead of binary packages"),
        )
        .arg(
            Arg::new("filter")
                .long("filter")
                .takes_value(true)
                .multiple_occurrences(true)
                .help("Only consider repositories matching a filter")
                .long_help(FILTER_ABOUT),
        )
}

fn app() -> Command<'static> {
    let app = Command::new("APT Repository Tool")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Query APT repository metadata")
        .long_about(ABOUT)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .takes_value(true)
                .global(true)
                .allow_invalid_utf8(true)
                .help("Path to a YAML file defining client configuration")
                .long_help(CONFIG_ABOUT),
        )
        .arg(
            Arg::new("sources-list")
                .long("sources-list")
                .takes_value(true)
                .multiple_occurrences(true)
                .global(true)
                .allow_invalid_utf8(true)
                .help("Path to a sources.list file defining repositories"),
        )
        .arg(
            Arg::new("repo-line")
                .long("repo-line")
                .takes_value(true)
                .multiple_occurrences(true)
                .global(true)
                .help("A repository line (e.g. `deb http://deb.debian.org/debian sid main`)"),
        )
        .arg(
            Arg::new("arch")
                .long("arch")
                .takes_value(true)
                .multiple_occurrences(true)
                .use_value_delimiter(true)
                .global(true)
                .help("Architectures to consider (comma delimited)"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .global(true)
                .help("Fail if a repository index doesn't exist"),
        );

    let app = app.subcommand(add_query_args(
        Command::new("best-version")
            .about("Print the greatest available version of a package")
            .arg(Arg::new("package").required(true).help("Name of package")),
    ));

    let app = app.subcommand(add_query_args(
        Command::new("exact-version")
            .about("Print every record of a package having a given version")
            .arg(Arg::new("package").required(true).help("Name of package"))
            .arg(
                Arg::new("package-version")
                    .value_name("VERSION")
                    .required(true)
                    .help("Version to find"),
            ),
    ));

    let app = app.subcommand(add_query_args(
        Command::new("versions")
            .about("Print available versions of a package")
            .arg(Arg::new("package").required(true).help("Name of package")),
    ));

    let app = app.subcommand(add_query_args(
        Command::new("packages").about("Print names of available packages"),
    ));

    let app = app.subcommand(
        Command::new("source-binaries")
            .about("Print binary packages built from a source package")
            .arg(Arg::new("name").required(true).help("Name of source package"))
            .arg(
                Arg::new("source-version")
                    .value_name("VERSION")
                    .required(true)
                    .help("Version of source package"),
            ),
    );

    let app = app.subcommand(
        Command::new("package-ids").about("Print the package id of every known package"),
    );

    let app = app.subcommand(
        Command::new("dump")
            .about("Print all indexed records as control paragraphs")
            .arg(
                Arg::new("source")
                    .long("source")
                    .help("Print source packages instead of binary packages"),
            ),
    );

    app.subcommand(
        Command::new("repos").about("Print repositories having metadata, as repository lines"),
    )
}

fn init_logging(matches: &ArgMatches) {
    let occurrences = matches.subcommand().map_or(0, |(_, args)| args.occurrences_of("verbose"));

    let log_level = match matches.occurrences_of("verbose").max(occurrences) {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

pub fn run_cli() -> Result<()> {
    let mut app = app();
    let matches = app.clone().get_matches();

    init_logging(&matches);

    match matches.subcommand() {
        Some(("best-version", args)) => command_best_version(args),
        Some(("exact-version", args)) => command_exact_version(args),
        Some(("versions", args)) => command_versions(args),
        Some(("packages", args)) => command_packages(args),
        Some(("source-binaries", args)) => command_source_binaries(args),
        Some(("package-ids", args)) => command_package_ids(args),
        Some(("dump", args)) => command_dump(args),
        Some(("repos", args)) => command_repos(args),
        Some((command, _)) => Err(ArtError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

/// Resolve client configuration from arguments.
fn client_config(args: &ArgMatches) -> Result<ClientConfig> {
    let mut config = match args.value_of_os("config") {
        Some(path) => serde_yaml::from_reader(std::fs::File::open(path)?)?,
        None => ClientConfig::default(),
    };

    if let Some(arches) = args.values_of("arch") {
        config.architectures = arches.map(|s| s.to_string()).collect();
    }

    if args.is_present("strict") {
        config.ignore_errors = false;
    }

    if let Some(paths) = args.values_of_os("sources-list") {
        for path in paths {
            config.sources.push(std::fs::read_to_string(path)?);
        }
    }

    if let Some(lines) = args.values_of("repo-line") {
        config.sources.extend(lines.map(|s| s.to_string()));
    }

    Ok(config)
}

/// Construct a client and load metadata of all configured repositories.
fn load_client(args: &ArgMatches) -> Result<RepositoryClient> {
    let mut client = RepositoryClient::new(client_config(args)?)?;

    if client.lines().is_empty() {
        return Err(ArtError::NoRepositories);
    }

    let ignore_errors = client.config().ignore_errors;
    client.load_repos(None, ignore_errors, true)?;

    Ok(client)
}

fn key_filter(args: &ArgMatches) -> Result<KeyFilter> {
    let values = args
        .values_of("filter")
        .map(|values| values.collect::<Vec<_>>())
        .unwrap_or_default();

    Ok(match values.as_slice() {
        [] => KeyFilter::AllKeys,
        [value] => KeyFilter::from_str(value)?,
        values => KeyFilter::ByKeyList(
            values
                .iter()
                .map(|value| KeyPattern::from_str(value))
                .collect::<std::result::Result<Vec<_>, _>>()?,
        ),
    })
}

fn index_kind(args: &ArgMatches) -> IndexKind {
    if args.is_present("source") {
        IndexKind::Source
    } else {
        IndexKind::Binary
    }
}

fn command_best_version(args: &ArgMatches) -> Result<()> {
    let package = args.value_of("package").expect("package argument is required");
    let client = load_client(args)?;

    match client.best_version(package, &key_filter(args)?, index_kind(args)) {
        Some((key, version)) => {
            println!("{}\t{}", version, key);
            Ok(())
        }
        None => Err(ArtError::PackageNotFound(package.to_string())),
    }
}

fn command_exact_version(args: &ArgMatches) -> Result<()> {
    let package = args.value_of("package").expect("package argument is required");
    let version = args
        .value_of("package-version")
        .expect("version argument is required");
    let client = load_client(args)?;

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();

    for record in client.exact_version(package, version, &key_filter(args)?, index_kind(args)) {
        record.paragraph().write(&mut writer)?;
        writeln!(writer)?;
    }

    Ok(())
}

fn command_versions(args: &ArgMatches) -> Result<()> {
    let package = args.value_of("package").expect("package argument is required");
    let client = load_client(args)?;

    for (key, version) in client.available_versions(package, &key_filter(args)?, index_kind(args))
    {
        println!("{}\t{}", version, key);
    }

    Ok(())
}

fn command_packages(args: &ArgMatches) -> Result<()> {
    let client = load_client(args)?;

    for name in client.available_packages(&key_filter(args)?, index_kind(args)) {
        println!("{}", name);
    }

    Ok(())
}

fn command_source_binaries(args: &ArgMatches) -> Result<()> {
    let name = args.value_of("name").expect("name argument is required");
    let version = args
        .value_of("source-version")
        .expect("version argument is required");
    let mut client = load_client(args)?;

    for record in client.binaries_for_source(name, version)? {
        println!("{} {}", record.package()?, record.version()?);
    }

    Ok(())
}

fn command_package_ids(args: &ArgMatches) -> Result<()> {
    let mut client = load_client(args)?;

    for (id, records) in client.pkgid_map()? {
        for record in records {
            println!("{}\t{} {}", id, record.package()?, record.version()?);
        }
    }

    Ok(())
}

fn command_dump(args: &ArgMatches) -> Result<()> {
    let client = load_client(args)?;

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    client.index(index_kind(args)).write(&mut writer)?;

    Ok(())
}

fn command_repos(args: &ArgMatches) -> Result<()> {
    let client = load_client(args)?;

    for key in client.source_repos() {
        println!("{} {}", IndexKind::Source, key);
    }
    for key in client.binary_repos() {
        println!("{} {}", IndexKind::Binary, key);
    }

    Ok(())
}
