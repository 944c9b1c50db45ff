use crate::error::{Result, ResignError};
use crate::plist_ext::PlistFile;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const EMBEDDED_PROFILE: &str = "embedded.mobileprovision";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    App,
    AppExtension,
    Framework,
    Dylib,
}

impl BundleKind {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "app" if path.is_dir() => Some(BundleKind::App),
            "appex" if path.is_dir() => Some(BundleKind::AppExtension),
            "framework" if path.is_dir() => Some(BundleKind::Framework),
            "dylib" if path.is_file() => Some(BundleKind::Dylib),
            _ => None,
        }
    }
}

/// A piece of signable code found inside the extracted archive.
#[derive(Debug, Clone, Serialize)]
pub struct SignableBundle {
    pub path: PathBuf,
    pub kind: BundleKind,
    pub bundle_identifier: String,
    pub embedded_profile: Option<PathBuf>,
    /// Path components below `Payload/`; children are always deeper than their parent.
    pub depth: usize,
}

impl SignableBundle {
    /// Apps and extensions always run under a profile; anything else only
    /// when it was shipped with one.
    pub fn needs_profile(&self) -> bool {
        self.embedded_profile.is_some()
            || matches!(self.kind, BundleKind::App | BundleKind::AppExtension)
    }

    pub fn profile_destination(&self) -> PathBuf {
        self.path.join(EMBEDDED_PROFILE)
    }
}

/// Finds every `.app`, `.appex`, `.framework` and `.dylib` under `Payload/`.
///
/// Bundles are identified by the `CFBundleIdentifier` of their Info.plist,
/// dylibs by their file name.
pub fn scan<P: AsRef<Path>>(extracted_root: P) -> Result<Vec<SignableBundle>> {
    let payload = extracted_root.as_ref().join("Payload");
    if !payload.is_dir() {
        return Err(ResignError::InvalidIpa("No Payload folder found".to_string()));
    }

    let root = glob::Pattern::escape(&payload.to_string_lossy());
    let mut paths = Vec::new();
    for ext in ["app", "appex", "framework", "dylib"] {
        for path in glob::glob(&format!("{}/**/*.{}", root, ext))?.flatten() {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut bundles = Vec::new();
    for path in paths {
        let Some(kind) = BundleKind::from_path(&path) else {
            continue;
        };
        let depth = path
            .strip_prefix(&payload)
            .map(|rel| rel.components().count())
            .unwrap_or(0);

        let bundle_identifier = match kind {
            BundleKind::Dylib => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| ResignError::UnresolvedBundleIdentifier(path.clone()))?,
            _ => PlistFile::info_of(&path)
                .and_then(|info| info.bundle_identifier().map(str::to_string))
                .ok_or_else(|| ResignError::UnresolvedBundleIdentifier(path.clone()))?,
        };

        let embedded_profile = Some(path.join(EMBEDDED_PROFILE)).filter(|p| p.is_file());

        debug!("found {:?} {} at depth {}", kind, bundle_identifier, depth);
        bundles.push(SignableBundle {
            path,
            kind,
            bundle_identifier,
            embedded_profile,
            depth,
        });
    }

    if !bundles.iter().any(|b| b.kind == BundleKind::App) {
        return Err(ResignError::InvalidIpa("No .app folder found".to_string()));
    }

    Ok(bundles)
}

/// Identifiers that need a provisioning profile, deduplicated, in scan order.
pub fn profile_bundle_ids(bundles: &[SignableBundle]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for bundle in bundles.iter().filter(|b| b.needs_profile()) {
        if !ids.contains(&bundle.bundle_identifier) {
            ids.push(bundle.bundle_identifier.clone());
        }
    }
    ids
}

/// Deepest first. Everything at depth N+1 precedes everything at depth N.
pub fn signing_order(bundles: &[SignableBundle]) -> Vec<&SignableBundle> {
    let mut ordered: Vec<&SignableBundle> = bundles.iter().collect();
    ordered.sort_by(|a, b| b.depth.cmp(&a.depth));
    ordered
}
