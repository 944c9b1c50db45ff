use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("invalid distribution type: {0}")]
    InvalidChannel(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("team id conflicted: requested `{requested}`, installed certificates belong to {found:?}")]
    TeamConflict {
        requested: String,
        found: Vec<String>,
    },

    #[error("no valid certificates found for distribution type `{0}`")]
    NoCertificatesFound(String),

    #[error("multiple teams found ({0:?}). Please specify a `team id`")]
    AmbiguousTeam(Vec<String>),

    #[error("no valid provisioning profiles found for team `{team_id}` covering {bundle_ids:?}")]
    NoValidProvisioningProfiles {
        team_id: String,
        bundle_ids: Vec<String>,
    },

    #[error("could not resolve bundle identifier for {0}")]
    UnresolvedBundleIdentifier(PathBuf),

    #[error("{tool} failed: {diagnostics}")]
    ExternalToolFailure { tool: String, diagnostics: String },

    #[error("{tool} did not finish within {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    #[error("signature verification failed for {path}: {diagnostics}")]
    ResignVerificationFailed { path: PathBuf, diagnostics: String },

    #[error("Invalid IPA: {0}")]
    InvalidIpa(String),

    #[error("invalid provisioning profile {path}: {reason}")]
    InvalidProfile { path: PathBuf, reason: String },

    #[error("certificate error: {0}")]
    Certificate(String),
}

pub type Result<T> = std::result::Result<T, ResignError>;
