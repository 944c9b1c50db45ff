use crate::error::{Result, ResignError};
use crate::profile::ProvisioningProfile;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_COMPRESSION: u32 = 6;

/// Distribution channel an archive is re-signed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    AppStore,
    InHouse,
    Development,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::AppStore => "appstore",
            Channel::InHouse => "inhouse",
            Channel::Development => "development",
        }
    }

    /// Whether a keychain identity name is of the kind this channel signs with.
    ///
    /// The kind is the text before the first `:` ("iPhone Distribution",
    /// "Apple Development"). Newer Apple development certificates say
    /// "Development" rather than "Developer", both are accepted.
    pub fn matches_certificate(&self, identity_name: &str) -> bool {
        let Some((kind, _)) = identity_name.split_once(':') else {
            return false;
        };
        let kind = kind.trim().to_lowercase();
        match self {
            Channel::AppStore | Channel::InHouse => kind.ends_with("distribution"),
            Channel::Development => {
                kind.ends_with("developer") || kind.ends_with("development")
            }
        }
    }

    /// Entitlement eligibility of a profile for this channel.
    pub fn accepts(&self, profile: &ProvisioningProfile) -> bool {
        match self {
            Channel::AppStore => {
                !profile.debug_allowed
                    && !profile.has_device_list
                    && !profile.application_identifier_pattern.ends_with('*')
            }
            Channel::InHouse => !profile.debug_allowed && profile.has_device_list,
            Channel::Development => profile.debug_allowed,
        }
    }
}

impl FromStr for Channel {
    type Err = ResignError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "appstore" => Ok(Channel::AppStore),
            "inhouse" => Ok(Channel::InHouse),
            "development" => Ok(Channel::Development),
            _ => Err(ResignError::InvalidChannel(s.to_string())),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options as they arrive from the command line or environment.
#[derive(Debug, Clone, Default)]
pub struct ResignOptions {
    pub distribution_type: Option<String>,
    pub ipa_path: Option<PathBuf>,
    pub team_id: Option<String>,
    pub app_id_prefix: Option<String>,
    pub profiles_dir: Option<PathBuf>,
    pub swift_libraries: Option<PathBuf>,
    pub tool_timeout: Option<Duration>,
    pub compression_level: Option<u32>,
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct ResignConfig {
    pub channel: Channel,
    pub ipa_path: PathBuf,
    pub team_id: Option<String>,
    pub app_id_prefix: Option<String>,
    pub profiles_dir: PathBuf,
    pub swift_libraries: Option<PathBuf>,
    pub tool_timeout: Duration,
    pub compression_level: u32,
}

impl ResignConfig {
    pub fn from_options(options: ResignOptions) -> Result<Self> {
        let distribution_type = non_empty(options.distribution_type)
            .ok_or_else(|| ResignError::MissingConfig("distribution_type is not set".to_string()))?;
        let channel = distribution_type.parse::<Channel>()?;

        let ipa_path = options
            .ipa_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ResignError::MissingConfig("ipa_path is not set".to_string()))?;
        if !ipa_path.is_file() {
            return Err(ResignError::MissingConfig(format!(
                "File not found at ipa_path: {}",
                ipa_path.display()
            )));
        }

        let profiles_dir = match options.profiles_dir {
            Some(dir) => dir,
            None => default_profiles_dir()?,
        };

        let compression_level = options.compression_level.unwrap_or(DEFAULT_COMPRESSION);
        if compression_level > 9 {
            return Err(ResignError::MissingConfig(format!(
                "compression level must be 0-9, got {}",
                compression_level
            )));
        }

        Ok(Self {
            channel,
            ipa_path,
            team_id: non_empty(options.team_id),
            app_id_prefix: non_empty(options.app_id_prefix),
            profiles_dir,
            swift_libraries: options.swift_libraries,
            tool_timeout: options.tool_timeout.unwrap_or(DEFAULT_TOOL_TIMEOUT),
            compression_level,
        })
    }

    /// `{dir}/{basename}-{channel}-resigned.ipa` beside the input archive.
    pub fn output_path(&self) -> PathBuf {
        let stem = self
            .ipa_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.ipa_path
            .with_file_name(format!("{}-{}-resigned.ipa", stem, self.channel))
    }
}

pub fn default_profiles_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("Library/MobileDevice/Provisioning Profiles"))
        .ok_or_else(|| ResignError::MissingConfig("cannot locate the home directory".to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
