use crate::common::*;
use ipa_resign::{ResignError, Resigner};
use std::fs;

fn single_app(ws: &Workspace, name: &str) -> std::path::PathBuf {
    let ipa = ws.ipa(name);
    write_ipa(
        &ipa,
        &[BundleSpec {
            path: "App.app",
            id: "com.acme.app",
            embedded_profile: true,
        }],
        &[],
    );
    ipa
}

/// Nothing but the input archive is left in its folder.
fn assert_no_output(ws: &Workspace, input: &str) {
    let names: Vec<String> = fs::read_dir(ws.dir.path().join("ipa"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec![input.to_string()]);
}

#[test]
fn test_uncovered_extension_fails_without_signing() {
    let ws = Workspace::new();
    let ipa = ws.ipa("app.ipa");
    write_ipa(
        &ipa,
        &[
            BundleSpec {
                path: "App.app",
                id: "com.acme.app",
                embedded_profile: true,
            },
            BundleSpec {
                path: "App.app/PlugIns/Widget.appex",
                id: "com.acme.app.widget",
                embedded_profile: true,
            },
        ],
        &[],
    );
    write_profile(
        &ws.profiles(),
        &ProfileSpec {
            file: "app",
            app_id: "T1.com.acme.app",
            debug: false,
            devices: false,
            certificate: DISTRIBUTION_DER,
        },
    );

    let keychain = FakeKeychain::new(&[(DISTRIBUTION, "T1")]);
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "appstore", None, &ws.profiles());

    let err = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap_err();

    match err {
        ResignError::NoValidProvisioningProfiles {
            team_id,
            bundle_ids,
        } => {
            assert_eq!(team_id, "T1");
            assert!(bundle_ids.contains(&"com.acme.app.widget".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(signer.calls.borrow().is_empty());
    assert!(sink.published.borrow().is_empty());
    assert_no_output(&ws, "app.ipa");
}

#[test]
fn test_team_conflict_fails_before_extraction() {
    let ws = Workspace::new();
    let ipa = single_app(&ws, "app.ipa");
    let original = fs::read(&ipa).unwrap();

    let keychain = FakeKeychain::new(&[("iPhone Distribution: Other Corp (ABC123)", "ABC123")]);
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "appstore", Some("XYZ999"), &ws.profiles());

    let err = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap_err();

    match err {
        ResignError::TeamConflict { requested, found } => {
            assert_eq!(requested, "XYZ999");
            assert_eq!(found, vec!["ABC123".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(signer.calls.borrow().is_empty());
    assert_eq!(fs::read(&ipa).unwrap(), original);
    assert_no_output(&ws, "app.ipa");
}

#[test]
fn test_no_certificate_for_channel() {
    let ws = Workspace::new();
    let ipa = single_app(&ws, "app.ipa");

    let keychain = FakeKeychain::new(&[(DEVELOPER, "T1")]);
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "inhouse", None, &ws.profiles());

    let err = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap_err();

    assert!(matches!(err, ResignError::NoCertificatesFound(_)), "{err}");
    assert_no_output(&ws, "app.ipa");
}

#[test]
fn test_failed_verification_leaves_no_output() {
    let ws = Workspace::new();
    let ipa = single_app(&ws, "app.ipa");
    write_profile(
        &ws.profiles(),
        &ProfileSpec {
            file: "dev",
            app_id: "T1.com.acme.app",
            debug: true,
            devices: true,
            certificate: DEVELOPER_DER,
        },
    );

    let keychain = FakeKeychain::new(&[(DEVELOPER, "T1")]);
    let signer = RecordingSigner {
        verify_diagnostics: "a sealed resource is missing or invalid".to_string(),
        ..RecordingSigner::default()
    };
    let sink = RecordingSink::default();
    let config = config(&ipa, "development", None, &ws.profiles());

    let err = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap_err();

    match err {
        ResignError::ResignVerificationFailed { path, diagnostics } => {
            assert!(path.ends_with("Payload/App.app"));
            assert!(diagnostics.contains("sealed resource"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(signer.calls.borrow().len(), 1);
    assert!(sink.published.borrow().is_empty());
    assert_no_output(&ws, "app.ipa");
}

#[test]
fn test_archive_without_payload_is_rejected() {
    let ws = Workspace::new();
    let ipa = ws.ipa("broken.ipa");
    let mut zip = zip::ZipWriter::new(fs::File::create(&ipa).unwrap());
    zip.start_file("README", zip::write::SimpleFileOptions::default())
        .unwrap();
    std::io::Write::write_all(&mut zip, b"not an app").unwrap();
    zip.finish().unwrap();

    let keychain = FakeKeychain::new(&[(DEVELOPER, "T1")]);
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "development", None, &ws.profiles());

    let err = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap_err();

    assert!(matches!(err, ResignError::InvalidIpa(_)), "{err}");
    assert_no_output(&ws, "broken.ipa");
}
