use crate::config::Channel;
use crate::error::{Result, ResignError};
use log::debug;
use serde::Serialize;

/// A code signing identity installed in the keychain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningIdentity {
    pub name: String,
    pub team_id: String,
}

/// Access to the local trust store.
pub trait Keychain {
    /// Display names of the valid code signing identities, in keychain order.
    fn identity_names(&self) -> Result<Vec<String>>;

    /// Organizational unit (the team id) of the identity's certificate subject.
    fn organizational_unit(&self, identity: &str) -> Result<Option<String>>;
}

/// Identities usable for one channel, all belonging to `team_id`.
#[derive(Debug, Clone)]
pub struct IdentitySet {
    pub identities: Vec<SigningIdentity>,
    pub team_id: String,
}

/// Lists the identities matching `channel`, optionally restricted to `team_id`.
///
/// Identities of other teams are filtered out. When that filter removes every
/// identity the channel would otherwise accept, the caller's team disagrees
/// with what is installed and the call fails with `TeamConflict`.
pub fn list_identities(
    keychain: &dyn Keychain,
    channel: Channel,
    team_id: Option<&str>,
) -> Result<IdentitySet> {
    let mut identities: Vec<SigningIdentity> = Vec::new();
    let mut teams: Vec<String> = Vec::new();
    let mut other_teams: Vec<String> = Vec::new();

    for name in keychain.identity_names()? {
        if !channel.matches_certificate(&name) {
            continue;
        }
        if identities.iter().any(|i| i.name == name) {
            continue;
        }

        let Some(team) = keychain.organizational_unit(&name)? else {
            debug!("no team id in certificate subject of {}", name);
            continue;
        };

        if let Some(requested) = team_id {
            if team != requested {
                debug!("skipping {} (team {})", name, team);
                if !other_teams.contains(&team) {
                    other_teams.push(team);
                }
                continue;
            }
        }

        if !teams.contains(&team) {
            teams.push(team.clone());
        }
        identities.push(SigningIdentity { name, team_id: team });
    }

    if identities.is_empty() {
        return match team_id {
            Some(requested) if !other_teams.is_empty() => Err(ResignError::TeamConflict {
                requested: requested.to_string(),
                found: other_teams,
            }),
            _ => Err(ResignError::NoCertificatesFound(channel.to_string())),
        };
    }

    if teams.len() > 1 {
        return Err(ResignError::AmbiguousTeam(teams));
    }

    let team_id = teams.remove(0);
    Ok(IdentitySet {
        identities,
        team_id,
    })
}

/// Extracts the quoted identity name from a `security find-identity` line.
///
/// Format: `  1) 0123ABCD... "iPhone Distribution: Acme Corp (T1)"`
pub fn parse_identity_line(line: &str) -> Option<String> {
    let line = line.trim();
    if !line.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let start = line.find('"')?;
    let end = line[start + 1..].find('"')? + start + 1;
    let name = &line[start + 1..end];
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}
