//! Install flows against a mock registry: dependency chains, idempotency,
//! cycle handling and the examples skip list.

mod test_support;

use fpi_installer::Error;
use test_support::{Harness, MockRegistry};

#[tokio::test]
async fn installs_pinned_package_with_dependency_chain() {
    let registry = MockRegistry::new()
        .with_package("us.core.ig", "1.0.0", &[("hl7.fhir.r4.core", "4.0.1")])
        .with_package("hl7.fhir.r4.core", "4.0.1", &[]);
    let h = Harness::new(registry);

    h.installer.install("us.core.ig@1.0.0").await.unwrap();

    for (name, version) in [("us.core.ig", "1.0.0"), ("hl7.fhir.r4.core", "4.0.1")] {
        let entry = h.entry_path(name, version);
        assert!(entry.is_dir(), "missing entry for {name}");
        assert!(entry.join("package/package.json").is_file());
        assert!(entry.join("package/.fpi.index.json").is_file());
    }

    assert_eq!(h.registry.download_count(), 2);
    // Both references were version-pinned, so latest was never consulted.
    assert_eq!(h.registry.latest_count(), 0);
}

#[tokio::test]
async fn install_resolves_latest_for_unpinned_reference() {
    let registry = MockRegistry::new()
        .with_latest("il.core.fhir.r4", "0.17.5")
        .with_package("il.core.fhir.r4", "0.17.5", &[]);
    let h = Harness::new(registry);

    h.installer.install("il.core.fhir.r4").await.unwrap();

    assert!(h.entry_path("il.core.fhir.r4", "0.17.5").is_dir());
    assert_eq!(h.registry.latest_count(), 1);
    assert_eq!(h.registry.download_count(), 1);
}

#[tokio::test]
async fn reinstall_downloads_nothing_and_repairs_missing_index() {
    let registry = MockRegistry::new()
        .with_package("us.core.ig", "1.0.0", &[("hl7.fhir.r4.core", "4.0.1")])
        .with_package("hl7.fhir.r4.core", "4.0.1", &[]);
    let h = Harness::new(registry);

    h.installer.install("us.core.ig@1.0.0").await.unwrap();
    assert_eq!(h.registry.download_count(), 2);

    // Lose the dependency's index, then install again.
    let dep_index = h
        .entry_path("hl7.fhir.r4.core", "4.0.1")
        .join("package/.fpi.index.json");
    std::fs::remove_file(&dep_index).unwrap();

    h.installer.install("us.core.ig@1.0.0").await.unwrap();

    assert_eq!(h.registry.download_count(), 2, "no re-download expected");
    assert!(dep_index.is_file(), "index should be regenerated");
}

#[tokio::test]
async fn circular_dependencies_terminate() {
    let registry = MockRegistry::new()
        .with_package("pkg.alpha", "1.0.0", &[("pkg.beta", "1.0.0")])
        .with_package("pkg.beta", "1.0.0", &[("pkg.alpha", "1.0.0")]);
    let h = Harness::new(registry);

    h.installer.install("pkg.alpha@1.0.0").await.unwrap();

    assert!(h.entry_path("pkg.alpha", "1.0.0").is_dir());
    assert!(h.entry_path("pkg.beta", "1.0.0").is_dir());
    assert_eq!(h.registry.download_count(), 2);
}

#[tokio::test]
async fn skip_examples_prunes_example_dependencies() {
    let registry = MockRegistry::new()
        .with_package(
            "my.ig",
            "2.0.0",
            &[
                ("hl7.fhir.r4.examples", "4.0.1"),
                ("hl7.fhir.r4.core", "4.0.1"),
            ],
        )
        .with_package("hl7.fhir.r4.examples", "4.0.1", &[])
        .with_package("hl7.fhir.r4.core", "4.0.1", &[]);
    let h = Harness::with_config_tweak(registry, |config| config.skip_examples = true);

    h.installer.install("my.ig@2.0.0").await.unwrap();

    assert!(h.entry_path("my.ig", "2.0.0").is_dir());
    assert!(h.entry_path("hl7.fhir.r4.core", "4.0.1").is_dir());
    assert!(!h.entry_path("hl7.fhir.r4.examples", "4.0.1").exists());
    assert_eq!(h.registry.download_count(), 2);
}

#[tokio::test]
async fn example_dependencies_install_when_skip_is_off() {
    let registry = MockRegistry::new()
        .with_package("my.ig", "2.0.0", &[("hl7.fhir.r4.examples", "4.0.1")])
        .with_package("hl7.fhir.r4.examples", "4.0.1", &[]);
    let h = Harness::new(registry);

    h.installer.install("my.ig@2.0.0").await.unwrap();

    assert!(h.entry_path("hl7.fhir.r4.examples", "4.0.1").is_dir());
}

#[tokio::test]
async fn unknown_package_surfaces_registry_error() {
    let h = Harness::new(MockRegistry::new());

    let err = h.installer.install("no.such.pkg@1.0.0").await.unwrap_err();
    assert!(matches!(err, Error::Registry(_)));
    assert!(!h.entry_path("no.such.pkg", "1.0.0").exists());
}

#[tokio::test]
async fn failed_dependency_leaves_completed_installs_in_place() {
    // Dependencies are walked in name order, so de.basisprofil.r4 is fully
    // cached before unpublished.extras fails.
    let registry = MockRegistry::new()
        .with_package(
            "my.ig",
            "2.0.0",
            &[
                ("de.basisprofil.r4", "1.5.0"),
                ("unpublished.extras", "0.1.0"),
            ],
        )
        .with_package("de.basisprofil.r4", "1.5.0", &[]);
    let h = Harness::new(registry);

    let err = h.installer.install("my.ig@2.0.0").await.unwrap_err();
    assert!(matches!(err, Error::Registry(_)));

    // No rollback: entries cached before the failure stay usable.
    for (name, version) in [("my.ig", "2.0.0"), ("de.basisprofil.r4", "1.5.0")] {
        let entry = h.entry_path(name, version);
        assert!(entry.is_dir(), "missing entry for {name}");
        assert!(entry.join("package/package.json").is_file());
    }
    assert!(!h.entry_path("unpublished.extras", "0.1.0").exists());
}

#[tokio::test]
async fn malformed_reference_fails_before_any_network_traffic() {
    let h = Harness::new(MockRegistry::new());

    let err = h.installer.install("invalid name@1.0.0").await.unwrap_err();
    assert!(matches!(err, Error::InvalidReference(_)));
    assert_eq!(h.registry.call_count(), 0);
}

#[tokio::test]
async fn archive_without_manifest_leaves_no_cache_entry() {
    // An archive carrying a resource file but no package/package.json.
    let broken = {
        use flate2::{write::GzEncoder, Compression};
        use std::io::Cursor;
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let data = br#"{"resourceType":"Basic"}"#;
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "package/loose.json", Cursor::new(data.to_vec()))
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    };

    let registry = MockRegistry::new().with_tarball("broken.pkg", "1.0.0", broken);
    let h = Harness::new(registry);

    let err = h.installer.install("broken.pkg@1.0.0").await.unwrap_err();
    assert!(matches!(err, Error::Package(_)));
    assert!(!h.entry_path("broken.pkg", "1.0.0").exists());
    // The failure was reported through the injected logger too.
    assert!(!h.logger.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn is_installed_reads_only_the_cache() {
    let registry = MockRegistry::new().with_package("us.core.ig", "1.0.0", &[]);
    let h = Harness::new(registry);

    assert!(!h.installer.is_installed("us.core.ig@1.0.0").unwrap());
    assert!(!h.installer.is_installed("us.core.ig").unwrap());

    h.installer.install("us.core.ig@1.0.0").await.unwrap();
    let calls_after_install = h.registry.call_count();

    assert!(h.installer.is_installed("us.core.ig@1.0.0").unwrap());
    assert!(h.installer.is_installed("us.core.ig").unwrap());
    assert!(!h.installer.is_installed("us.core.ig@9.9.9").unwrap());
    assert_eq!(h.registry.call_count(), calls_after_install);
}

#[tokio::test]
async fn package_dir_path_picks_highest_installed_version() {
    let registry = MockRegistry::new()
        .with_package("us.core.ig", "1.0.0", &[])
        .with_package("us.core.ig", "1.2.0", &[]);
    let h = Harness::new(registry);

    h.installer.install("us.core.ig@1.0.0").await.unwrap();
    h.installer.install("us.core.ig@1.2.0").await.unwrap();
    let calls_after_install = h.registry.call_count();

    let path = h.installer.package_dir_path("us.core.ig").unwrap();
    assert!(path.ends_with("us.core.ig#1.2.0"));

    let pinned = h.installer.package_dir_path("us.core.ig@1.0.0").unwrap();
    assert!(pinned.ends_with("us.core.ig#1.0.0"));

    let err = h.installer.package_dir_path("absent.pkg").unwrap_err();
    assert!(matches!(err, Error::NotInstalled(_)));
    assert_eq!(h.registry.call_count(), calls_after_install);
}
