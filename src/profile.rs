use crate::certificate::CertificateSubject;
use crate::error::{Result, ResignError};
use log::debug;
use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const PROFILE_EXTENSION: &str = "mobileprovision";

/// Turns a signed profile file into its property list payload.
pub trait ProfileDecoder {
    fn decode(&self, path: &Path) -> Result<Dictionary>;
}

/// An installed provisioning profile, decoded once.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningProfile {
    pub path: PathBuf,
    pub name: String,
    pub uuid: String,
    pub team_id: String,
    /// `application-identifier` entitlement, e.g. `T1.com.example.*`.
    pub application_identifier_pattern: String,
    pub debug_allowed: bool,
    pub has_device_list: bool,
    /// One line subjects (`/CN=.../OU=.../`) of `DeveloperCertificates`.
    pub certificate_subjects: Vec<String>,
    pub entitlements: Dictionary,
    pub expiration_date: Option<SystemTime>,
}

impl ProvisioningProfile {
    pub fn from_document(path: &Path, document: &Dictionary) -> Result<Self> {
        let invalid = |reason: &str| ResignError::InvalidProfile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let entitlements = document
            .get("Entitlements")
            .and_then(Value::as_dictionary)
            .cloned()
            .ok_or_else(|| invalid("no Entitlements"))?;

        let application_identifier_pattern = entitlements
            .get("application-identifier")
            .and_then(Value::as_string)
            .ok_or_else(|| invalid("no application-identifier entitlement"))?
            .to_string();

        let team_id = document
            .get("TeamIdentifier")
            .and_then(Value::as_array)
            .and_then(|teams| teams.first())
            .and_then(Value::as_string)
            .or_else(|| {
                entitlements
                    .get("com.apple.developer.team-identifier")
                    .and_then(Value::as_string)
            })
            .ok_or_else(|| invalid("no TeamIdentifier"))?
            .to_string();

        let debug_allowed = entitlements
            .get("get-task-allow")
            .and_then(Value::as_boolean)
            .unwrap_or(false);

        let has_device_list = document.contains_key("ProvisionedDevices");

        let mut certificate_subjects = Vec::new();
        if let Some(certs) = document.get("DeveloperCertificates").and_then(Value::as_array) {
            for cert in certs {
                let der = cert
                    .as_data()
                    .ok_or_else(|| invalid("DeveloperCertificates entry is not data"))?;
                certificate_subjects.push(CertificateSubject::from_der(der)?.one_line());
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            name: document
                .get("Name")
                .and_then(Value::as_string)
                .unwrap_or_default()
                .to_string(),
            uuid: document
                .get("UUID")
                .and_then(Value::as_string)
                .unwrap_or_default()
                .to_string(),
            team_id,
            application_identifier_pattern,
            debug_allowed,
            has_device_list,
            certificate_subjects,
            entitlements,
            expiration_date: document
                .get("ExpirationDate")
                .and_then(Value::as_date)
                .map(SystemTime::from),
        })
    }

    pub fn is_expired(&self) -> bool {
        self.expiration_date
            .map(|date| date < SystemTime::now())
            .unwrap_or(false)
    }
}

/// Decodes every `*.mobileprovision` in `dir`, ordered by file name.
///
/// A profile that fails to decode fails the whole listing. A missing
/// directory means nothing is installed.
pub fn list_installed_profiles(
    decoder: &dyn ProfileDecoder,
    dir: &Path,
) -> Result<Vec<ProvisioningProfile>> {
    if !dir.is_dir() {
        debug!("profile directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(true);
        if hidden || path.extension().map(|e| e != PROFILE_EXTENSION).unwrap_or(true) {
            continue;
        }
        paths.push(path);
    }
    paths.sort();

    let mut profiles = Vec::with_capacity(paths.len());
    for path in paths {
        let document = decoder.decode(&path)?;
        let profile = ProvisioningProfile::from_document(&path, &document)?;
        if profile.is_expired() {
            debug!("profile {} ({}) is expired", profile.name, profile.uuid);
        }
        profiles.push(profile);
    }

    Ok(profiles)
}
