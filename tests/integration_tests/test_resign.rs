use crate::common::*;
use ipa_resign::{Channel, Resigner, RESIGNED_IPA_PATH_KEY};
use std::fs;

#[test]
fn test_development_single_app() {
    let ws = Workspace::new();
    let ipa = ws.ipa("app.ipa");
    write_ipa(
        &ipa,
        &[BundleSpec {
            path: "App.app",
            id: "com.acme.app",
            embedded_profile: true,
        }],
        &[],
    );
    let original = fs::read(&ipa).unwrap();

    let installed = write_profile(
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
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "development", None, &ws.profiles());

    let outcome = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap();

    let expected = ipa.with_file_name("app-development-resigned.ipa");
    assert_eq!(outcome.output_path, expected);
    assert_eq!(outcome.channel, Channel::Development);
    assert_eq!(outcome.team_id, "T1");
    assert_eq!(outcome.identity, DEVELOPER);
    assert_eq!(outcome.signed, 1);
    assert_eq!(outcome.profiles.get("com.acme.app"), Some(&installed));
    assert!(expected.is_file());

    let calls = signer.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].identity, DEVELOPER);
    let entitlements = calls[0].entitlements.as_ref().unwrap();
    assert_eq!(
        entitlements.get("get-task-allow").and_then(|v| v.as_boolean()),
        Some(true)
    );
    assert_eq!(
        entitlements
            .get("application-identifier")
            .and_then(|v| v.as_string()),
        Some("T1.com.acme.app")
    );

    assert_eq!(
        *sink.published.borrow(),
        vec![(
            RESIGNED_IPA_PATH_KEY.to_string(),
            expected.to_string_lossy().to_string()
        )]
    );

    assert_eq!(
        archive_file(&expected, "Payload/App.app/embedded.mobileprovision"),
        fs::read(&installed).unwrap()
    );
    assert_eq!(fs::read(&ipa).unwrap(), original);
}

#[test]
fn test_old_signatures_are_stripped() {
    let ws = Workspace::new();
    let ipa = ws.ipa("app.ipa");
    write_ipa(
        &ipa,
        &[BundleSpec {
            path: "App.app",
            id: "com.acme.app",
            embedded_profile: false,
        }],
        &[],
    );
    assert!(archive_entries(&ipa)
        .iter()
        .any(|e| e.contains("_CodeSignature")));

    write_profile(
        &ws.profiles(),
        &ProfileSpec {
            file: "dev",
            app_id: "T1.com.acme.app",
            debug: true,
            devices: false,
            certificate: DEVELOPER_DER,
        },
    );

    let keychain = FakeKeychain::new(&[(DEVELOPER, "T1")]);
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "development", Some("T1"), &ws.profiles());

    let outcome = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap();

    let entries = archive_entries(&outcome.output_path);
    assert!(entries.iter().all(|e| !e.contains("_CodeSignature")));
    assert!(entries.contains(&"Payload/App.app/Info.plist".to_string()));
    assert!(entries.contains(&"Payload/App.app/embedded.mobileprovision".to_string()));
}

#[test]
fn test_inhouse_nested_bundles_sign_deepest_first() {
    let ws = Workspace::new();
    let ipa = ws.ipa("Nested.ipa");
    write_ipa(
        &ipa,
        &[
            BundleSpec {
                path: "App.app",
                id: "com.acme.app",
                embedded_profile: true,
            },
            BundleSpec {
                path: "App.app/PlugIns/Share.appex",
                id: "com.acme.app.share",
                embedded_profile: true,
            },
            BundleSpec {
                path: "App.app/Frameworks/Kit.framework",
                id: "com.acme.kit",
                embedded_profile: false,
            },
        ],
        &["App.app/Frameworks/libfoo.dylib"],
    );

    let app_profile = write_profile(
        &ws.profiles(),
        &ProfileSpec {
            file: "a-app",
            app_id: "T1.com.acme.app",
            debug: false,
            devices: true,
            certificate: DISTRIBUTION_DER,
        },
    );
    let share_profile = write_profile(
        &ws.profiles(),
        &ProfileSpec {
            file: "b-share",
            app_id: "T1.com.acme.app.share",
            debug: false,
            devices: true,
            certificate: DISTRIBUTION_DER,
        },
    );

    let keychain = FakeKeychain::new(&[(DISTRIBUTION, "T1")]);
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "inhouse", None, &ws.profiles());

    let outcome = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap();

    assert_eq!(
        outcome.output_path,
        ipa.with_file_name("Nested-inhouse-resigned.ipa")
    );
    assert_eq!(outcome.signed, 4);
    assert_eq!(outcome.profiles.len(), 2);
    assert_eq!(outcome.profiles.get("com.acme.app"), Some(&app_profile));
    assert_eq!(outcome.profiles.get("com.acme.app.share"), Some(&share_profile));

    let names = signer.signed_names();
    assert_eq!(names.len(), 4);
    assert_eq!(names.last().map(String::as_str), Some("App.app"));
    assert!(names[..3].contains(&"Share.appex".to_string()));
    assert!(names[..3].contains(&"Kit.framework".to_string()));
    assert!(names[..3].contains(&"libfoo.dylib".to_string()));

    // only bundles carrying a profile are signed with entitlements
    for call in signer.calls.borrow().iter() {
        let name = call.path.file_name().unwrap().to_string_lossy().to_string();
        let expects_entitlements = name == "App.app" || name == "Share.appex";
        assert_eq!(call.entitlements.is_some(), expects_entitlements, "{}", name);
    }

    let verified = signer.verified.borrow();
    assert_eq!(verified.len(), 1);
    assert!(verified[0].ends_with("Payload/App.app"));

    assert_eq!(
        archive_file(
            &outcome.output_path,
            "Payload/App.app/PlugIns/Share.appex/embedded.mobileprovision"
        ),
        fs::read(&share_profile).unwrap()
    );
}

#[test]
fn test_appstore_skips_development_profile() {
    let ws = Workspace::new();
    let ipa = ws.ipa("app.ipa");
    write_ipa(
        &ipa,
        &[BundleSpec {
            path: "App.app",
            id: "com.acme.app",
            embedded_profile: true,
        }],
        &[],
    );

    write_profile(
        &ws.profiles(),
        &ProfileSpec {
            file: "a-debug",
            app_id: "T1.com.acme.app",
            debug: true,
            devices: true,
            certificate: DISTRIBUTION_DER,
        },
    );
    let store = write_profile(
        &ws.profiles(),
        &ProfileSpec {
            file: "b-store",
            app_id: "T1.com.acme.app",
            debug: false,
            devices: false,
            certificate: DISTRIBUTION_DER,
        },
    );

    let keychain = FakeKeychain::new(&[(DISTRIBUTION, "T1"), (DEVELOPER, "T1")]);
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "appstore", None, &ws.profiles());

    let outcome = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap();

    assert_eq!(outcome.identity, DISTRIBUTION);
    assert_eq!(outcome.profiles.get("com.acme.app"), Some(&store));
    assert_eq!(
        outcome.output_path,
        ipa.with_file_name("app-appstore-resigned.ipa")
    );
}

#[test]
fn test_swift_runtime_is_staged() {
    let ws = Workspace::new();
    let ipa = ws.ipa("swifty.ipa");
    write_ipa(
        &ipa,
        &[BundleSpec {
            path: "App.app",
            id: "com.acme.app",
            embedded_profile: true,
        }],
        &["App.app/Frameworks/libswiftCore.dylib"],
    );
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
    let signer = RecordingSigner::default();
    let sink = RecordingSink::default();
    let config = config(&ipa, "development", None, &ws.profiles());

    let outcome = Resigner::new(&config, toolchain(&keychain, &signer, &sink))
        .run()
        .unwrap();

    assert_eq!(outcome.signed, 2);
    assert_eq!(signer.signed_names(), vec!["libswiftCore.dylib", "App.app"]);
    assert_eq!(
        archive_file(
            &outcome.output_path,
            "SwiftSupport/iphoneos/libswiftCore.dylib"
        ),
        b"mach-o".to_vec()
    );
}
