use crate::bundle::{profile_bundle_ids, scan, signing_order, SignableBundle};
use crate::config::{Channel, ResignConfig};
use crate::error::{Result, ResignError};
use crate::identity::{list_identities, Keychain, SigningIdentity};
use crate::ipa::{create_ipa, extract_ipa};
use crate::profile::{list_installed_profiles, ProfileDecoder};
use crate::publish::{ResultSink, RESIGNED_IPA_PATH_KEY};
use crate::resolve::{resolve, Resolution, ResolveRequest};
use crate::sign::{remove_signature, write_entitlements, CodeSigner};
use crate::swift::stage_swift_support;
use log::{debug, info, warn};
use plist::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The external collaborators of a run.
#[derive(Clone, Copy)]
pub struct Toolchain<'a> {
    pub keychain: &'a dyn Keychain,
    pub decoder: &'a dyn ProfileDecoder,
    pub signer: &'a dyn CodeSigner,
    pub sink: &'a dyn ResultSink,
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ResignOutcome {
    pub output_path: PathBuf,
    pub channel: Channel,
    pub team_id: String,
    pub identity: String,
    /// Bundle identifier to the installed profile embedded for it.
    pub profiles: BTreeMap<String, PathBuf>,
    pub signed: usize,
}

pub struct Resigner<'a> {
    config: &'a ResignConfig,
    tools: Toolchain<'a>,
}

impl<'a> Resigner<'a> {
    pub fn new(config: &'a ResignConfig, tools: Toolchain<'a>) -> Self {
        Self { config, tools }
    }

    /// Enumerate, scan, resolve, re-sign, verify and repackage.
    ///
    /// The input archive is never modified and the output archive only
    /// appears once every bundle is signed and verified. The extracted
    /// working copy is removed on every exit path.
    pub fn run(&self) -> Result<ResignOutcome> {
        let config = self.config;

        let identity_set =
            list_identities(self.tools.keychain, config.channel, config.team_id.as_deref())?;
        debug!("certificates: {:?}", identity_set.identities);
        if let Some(requested) = &config.team_id {
            if *requested != identity_set.team_id {
                return Err(ResignError::TeamConflict {
                    requested: requested.clone(),
                    found: vec![identity_set.team_id],
                });
            }
        }
        let team_id = identity_set.team_id.clone();
        let app_id_prefix = config
            .app_id_prefix
            .clone()
            .unwrap_or_else(|| team_id.clone());

        let profiles = list_installed_profiles(self.tools.decoder, &config.profiles_dir)?;
        debug!("{} installed profile(s)", profiles.len());

        let workdir = TempDir::new()?;
        info!("[*] extracting...");
        let app = extract_ipa(&config.ipa_path, workdir.path())?;
        info!(
            "[*] resigning `{}` with team id `{}`",
            app.file_name().unwrap_or_default().to_string_lossy(),
            team_id
        );

        let bundles = scan(workdir.path())?;
        let bundle_ids = profile_bundle_ids(&bundles);
        debug!("bundle ids needing profiles: {:?}", bundle_ids);

        let resolution = resolve(&ResolveRequest {
            channel: config.channel,
            team_id: &team_id,
            app_id_prefix: &app_id_prefix,
            identities: &identity_set.identities,
            profiles: &profiles,
            bundle_ids: &bundle_ids,
        })?;
        if let Some(note) = certificate_choice(&identity_set.identities, &resolution.identity) {
            warn!("{}", note);
        }
        info!("[*] signing with `{}`", resolution.identity.name);
        for (bundle_id, profile) in &resolution.profiles {
            info!("[*] {} -> {} ({})", bundle_id, profile.name, profile.path.display());
        }

        let signed = apply(
            workdir.path(),
            &resolution,
            &bundles,
            &self.tools,
            config.swift_libraries.as_deref(),
        )?;

        let output_path = config.output_path();
        info!("[*] generating...");
        create_ipa(workdir.path(), &output_path, config.compression_level)?;
        info!("\x1b[32mResigned ipa is available at: {}\x1b[0m", output_path.display());

        self.tools
            .sink
            .publish(RESIGNED_IPA_PATH_KEY, &output_path.to_string_lossy())?;

        Ok(ResignOutcome {
            output_path,
            channel: config.channel,
            team_id,
            identity: resolution.identity.name.clone(),
            profiles: resolution
                .profiles
                .iter()
                .map(|(id, profile)| (id.clone(), profile.path.clone()))
                .collect(),
            signed,
        })
    }
}

/// Re-signs the extracted archive at `extracted_root` with a resolution.
///
/// Strips old signatures, embeds the resolved profiles, stages Swift
/// support, signs deepest bundles first and verifies every top-level app.
/// Returns the number of signed items.
pub fn apply(
    extracted_root: &Path,
    resolution: &Resolution,
    bundles: &[SignableBundle],
    tools: &Toolchain<'_>,
    swift_toolchain: Option<&Path>,
) -> Result<usize> {
    let mut stripped = 0;
    for bundle in bundles {
        if remove_signature(&bundle.path)? {
            stripped += 1;
        }
    }
    debug!("removed {} existing signature(s)", stripped);

    for bundle in bundles.iter().filter(|b| b.needs_profile()) {
        let profile = resolution
            .profiles
            .get(&bundle.bundle_identifier)
            .ok_or_else(|| ResignError::NoValidProvisioningProfiles {
                team_id: resolution.identity.team_id.clone(),
                bundle_ids: vec![bundle.bundle_identifier.clone()],
            })?;
        fs::copy(&profile.path, bundle.profile_destination())?;
        debug!("embedded {} in {}", profile.path.display(), bundle.path.display());
    }

    stage_swift_support(extracted_root, bundles, swift_toolchain)?;

    let identity = &resolution.identity.name;
    let mut signed = 0;
    for bundle in signing_order(bundles) {
        let diagnostics = if bundle.needs_profile() {
            let embedded = bundle.profile_destination();
            let document = tools.decoder.decode(&embedded)?;
            let entitlements = document
                .get("Entitlements")
                .and_then(Value::as_dictionary)
                .ok_or_else(|| ResignError::InvalidProfile {
                    path: embedded.clone(),
                    reason: "no Entitlements".to_string(),
                })?;
            let file = write_entitlements(entitlements)?;
            tools.signer.sign(&bundle.path, identity, Some(file.path()))?
        } else {
            tools.signer.sign(&bundle.path, identity, None)?
        };
        if !diagnostics.is_empty() {
            debug!("codesign {}: {}", bundle.path.display(), diagnostics);
        }
        signed += 1;
    }
    info!("[*] signed \x1b[96m{}\x1b[0m item(s)", signed);

    let top_level = bundles.iter().map(|b| b.depth).min().unwrap_or(0);
    for bundle in bundles.iter().filter(|b| b.depth == top_level) {
        let diagnostics = tools.signer.verify(&bundle.path)?;
        if !diagnostics.trim().is_empty() {
            return Err(ResignError::ResignVerificationFailed {
                path: bundle.path.clone(),
                diagnostics,
            });
        }
    }

    Ok(signed)
}

/// Warning naming the identity resolution settled on when several matched.
fn certificate_choice(candidates: &[SigningIdentity], chosen: &SigningIdentity) -> Option<String> {
    if candidates.len() < 2 {
        return None;
    }
    let names: Vec<&str> = candidates.iter().map(|i| i.name.as_str()).collect();
    Some(format!(
        "[?] multiple matching certificates found {:?}, using `{}`",
        names, chosen.name
    ))
}
