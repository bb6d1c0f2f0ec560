//! FHIR Package Installer - CLI entry point
//!
//! Thin command-line front over [`fpi_installer::FhirPackageInstaller`].
//! Command output goes to stdout, progress logging to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use fpi_installer::{DownloadOptions, FhirPackageInstaller, InstallerConfig, LocalInstallOptions};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fpi",
    version,
    about = "Download, install and inspect FHIR implementation guide packages",
    propagate_version = true
)]
struct Cli {
    /// Package registry to resolve and download from.
    #[arg(short = 'r', long, global = true)]
    registry_url: Option<String>,

    /// Package cache directory (defaults to ~/.fhir/packages).
    #[arg(short = 'c', long, global = true)]
    cache_path: Option<PathBuf>,

    /// Skip hl7.fhir.*.examples packages when walking dependencies.
    #[arg(short = 's', long, global = true)]
    skip_examples: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install a package and its dependencies into the cache.
    #[command(visible_alias = "i")]
    Install {
        /// Package reference, e.g. hl7.fhir.r4.core@4.0.1 or de.basisprofil.r4.
        reference: String,
    },
    /// Download a package archive without touching the cache.
    #[command(visible_alias = "dl")]
    Download {
        reference: String,
        /// Where to place the download (defaults to the current directory).
        #[arg(short, long)]
        dest: Option<PathBuf>,
        /// Replace the target if it already exists.
        #[arg(short, long)]
        overwrite: bool,
        /// Unpack the archive into a directory instead of keeping the .tgz.
        #[arg(short, long)]
        extract: bool,
    },
    /// Install a package from a local tarball or directory.
    #[command(visible_alias = "il")]
    InstallLocal {
        /// Path to a .tgz file or an unpacked package directory.
        source: PathBuf,
        /// Identity to install under, e.g. my.package@0.1.0.
        #[arg(short = 'i', long = "id")]
        package_id: Option<String>,
        /// Replace an already installed copy of the same version.
        #[arg(short = 'o', long = "override")]
        override_existing: bool,
        /// Also install the dependencies listed in the package manifest.
        #[arg(short = 'd', long)]
        install_dependencies: bool,
    },
    /// Print the manifest of a package.
    #[command(visible_alias = "gm")]
    GetManifest { reference: String },
    /// Print the resource file index of a package.
    #[command(visible_alias = "gi")]
    GetIndex { reference: String },
    /// Print the declared dependencies of a package.
    #[command(visible_alias = "gd")]
    GetDependencies { reference: String },
    /// Resolve a reference to an exact name and version.
    #[command(visible_alias = "tpo")]
    ToPackageObject { reference: String },
    /// Check whether a package is present in the cache.
    #[command(visible_alias = "is")]
    IsInstalled { reference: String },
    /// Print the cache directory path.
    #[command(visible_alias = "gc")]
    GetCache,
    /// Print the cache entry path of an installed package.
    #[command(visible_alias = "gp")]
    GetPackagePath { reference: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let installer = FhirPackageInstaller::new(config_from(&cli))?;

    match cli.command {
        Command::Install { reference } => {
            installer.install(&reference).await?;
        }
        Command::Download {
            reference,
            dest,
            overwrite,
            extract,
        } => {
            let options = DownloadOptions {
                destination: dest,
                overwrite,
                extract,
            };
            installer.download_package(&reference, &options).await?;
        }
        Command::InstallLocal {
            source,
            package_id,
            override_existing,
            install_dependencies,
        } => {
            let options = LocalInstallOptions {
                package_id,
                override_existing,
                install_dependencies,
            };
            installer.install_local_package(&source, &options).await?;
        }
        Command::GetManifest { reference } => {
            print_json(&installer.manifest(&reference).await?)?;
        }
        Command::GetIndex { reference } => {
            print_json(&installer.package_index(&reference).await?)?;
        }
        Command::GetDependencies { reference } => {
            let package = installer.resolve_reference(&reference).await?;
            print_json(&installer.dependencies(&package).await?)?;
        }
        Command::ToPackageObject { reference } => {
            print_json(&installer.resolve_reference(&reference).await?)?;
        }
        Command::IsInstalled { reference } => {
            if installer.is_installed(&reference)? {
                println!("Package {reference} is already installed.");
            } else {
                println!("Package {reference} is not installed.");
            }
        }
        Command::GetCache => {
            println!("{}", installer.cache_path().display());
        }
        Command::GetPackagePath { reference } => {
            println!("{}", installer.package_dir_path(&reference)?.display());
        }
    }

    Ok(())
}

fn config_from(cli: &Cli) -> InstallerConfig {
    let mut config = InstallerConfig::default();
    if let Some(url) = &cli.registry_url {
        config.registry_url = url.clone();
    }
    if let Some(path) = &cli.cache_path {
        config.cache_path = path.clone();
    }
    config.skip_examples = cli.skip_examples;
    config
}

/// Logging goes to stderr so piping command output stays clean.
fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn download_and_install_local_flags_parse() {
    for args in [
        ["fpi", "dl", "my.pkg@1.0.0", "-d", "out"],
        ["fpi", "dl", "my.pkg@1.0.0", "--dest", "out"],
    ] {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Download { dest, .. } => assert_eq!(dest, Some(PathBuf::from("out"))),
            _ => panic!("expected a download command"),
        }
    }

    let cli = Cli::try_parse_from(["fpi", "il", "pkg.tgz", "-o", "-d"]).unwrap();
    match cli.command {
        Command::InstallLocal {
            override_existing,
            install_dependencies,
            ..
        } => {
            assert!(override_existing);
            assert!(install_dependencies);
        }
        _ => panic!("expected an install-local command"),
    }
}
