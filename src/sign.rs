use crate::error::Result;
use crate::tools;
use log::debug;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

const CODESIGN: &str = "codesign";

/// Code signing and verification of a bundle or loose Mach-O file.
pub trait CodeSigner {
    /// Sign `path` in place with `identity`. Returns the tool's diagnostics.
    fn sign(&self, path: &Path, identity: &str, entitlements: Option<&Path>) -> Result<String>;

    /// Verify the signature of `path`. Empty diagnostics mean the signature is valid.
    fn verify(&self, path: &Path) -> Result<String>;
}

/// `codesign` from the Xcode command line tools.
pub struct Codesign {
    timeout: Duration,
}

impl Codesign {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CodeSigner for Codesign {
    fn sign(&self, path: &Path, identity: &str, entitlements: Option<&Path>) -> Result<String> {
        let mut args: Vec<OsString> = vec!["-f".into(), "-s".into(), identity.into()];
        if let Some(entitlements) = entitlements {
            args.push("--entitlements".into());
            args.push(entitlements.into());
        }
        args.push(path.into());

        let output = tools::run_checked(CODESIGN, args, self.timeout)?;
        Ok(tools::diagnostics(&output))
    }

    fn verify(&self, path: &Path) -> Result<String> {
        let args: Vec<OsString> = vec![
            "--verify".into(),
            "--deep".into(),
            "--strict".into(),
            path.into(),
        ];
        let output = tools::run(CODESIGN, args, self.timeout)?;
        let diagnostics = tools::diagnostics(&output);
        if !output.status.success() && diagnostics.is_empty() {
            return Ok(format!("codesign exited with {}", output.status));
        }
        Ok(diagnostics)
    }
}

/// Remove `_CodeSignature/` and `CodeResources` from a bundle directory.
///
/// Returns whether anything was removed. Loose files and unsigned bundles
/// are left alone.
pub fn remove_signature<P: AsRef<Path>>(bundle: P) -> Result<bool> {
    let bundle = bundle.as_ref();
    if !bundle.is_dir() {
        return Ok(false);
    }

    let mut removed = false;
    let signature_dir = bundle.join("_CodeSignature");
    if signature_dir.is_dir() {
        fs::remove_dir_all(&signature_dir)?;
        removed = true;
    }
    let resources = bundle.join("CodeResources");
    if resources.is_file() {
        fs::remove_file(&resources)?;
        removed = true;
    }

    if removed {
        debug!("removed signature from {}", bundle.display());
    }
    Ok(removed)
}

/// Write entitlements to a temporary XML plist for `codesign --entitlements`.
pub fn write_entitlements(entitlements: &plist::Dictionary) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("entitlements")
        .suffix(".plist")
        .tempfile()?;
    plist::to_file_xml(file.path(), entitlements)?;
    Ok(file)
}
