//! Selection of one signing identity and, per bundle identifier, the
//! provisioning profile to embed.
//!
//! An identity is only acceptable when it can sign every bundle that needs a
//! profile. A single nested extension without an eligible profile rules the
//! identity out entirely. Among acceptable identities the first in keychain
//! order wins, and for each bundle the first eligible profile in installation
//! order is taken.

use crate::certificate::subject_names_identity;
use crate::config::Channel;
use crate::error::{Result, ResignError};
use crate::identity::SigningIdentity;
use crate::profile::ProvisioningProfile;
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Resolution {
    pub identity: SigningIdentity,
    /// Exactly one profile per requested bundle identifier.
    pub profiles: BTreeMap<String, ProvisioningProfile>,
}

/// Inputs of one resolution.
pub struct ResolveRequest<'a> {
    pub channel: Channel,
    pub team_id: &'a str,
    pub app_id_prefix: &'a str,
    pub identities: &'a [SigningIdentity],
    pub profiles: &'a [ProvisioningProfile],
    pub bundle_ids: &'a [String],
}

pub fn resolve(request: &ResolveRequest<'_>) -> Result<Resolution> {
    let team_profiles: Vec<&ProvisioningProfile> = request
        .profiles
        .iter()
        .filter(|p| p.team_id == request.team_id)
        .collect();

    let team_identities = request
        .identities
        .iter()
        .filter(|i| i.team_id == request.team_id);

    for identity in team_identities {
        let mut chosen = BTreeMap::new();

        for bundle_id in request.bundle_ids {
            if chosen.contains_key(bundle_id) {
                continue;
            }
            let app_id = format!("{}.{}", request.app_id_prefix, bundle_id);
            let eligible = team_profiles.iter().find(|profile| {
                matches_app_id(&profile.application_identifier_pattern, &app_id)
                    && lists_identity(profile, identity)
                    && request.channel.accepts(profile)
            });

            match eligible {
                Some(profile) => {
                    chosen.insert(bundle_id.clone(), (*profile).clone());
                }
                None => {
                    debug!("{} has no eligible profile for {}", identity.name, app_id);
                    break;
                }
            }
        }

        if request.bundle_ids.iter().all(|id| chosen.contains_key(id)) {
            return Ok(Resolution {
                identity: identity.clone(),
                profiles: chosen,
            });
        }
    }

    Err(ResignError::NoValidProvisioningProfiles {
        team_id: request.team_id.to_string(),
        bundle_ids: request.bundle_ids.to_vec(),
    })
}

/// Application identifier match: exact, or any suffix after a trailing `*`.
pub fn matches_app_id(pattern: &str, app_id: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => app_id.starts_with(prefix),
        None => pattern == app_id,
    }
}

fn lists_identity(profile: &ProvisioningProfile, identity: &SigningIdentity) -> bool {
    profile
        .certificate_subjects
        .iter()
        .any(|subject| subject_names_identity(subject, &identity.name, &identity.team_id))
}
