//! Swift runtime support libraries.
//!
//! Apps that embed the Swift runtime must also ship the unmodified runtime
//! under `SwiftSupport/iphoneos/` at the archive root. The copies inside the
//! app are re-signed with everything else, the support copies are not.

use crate::bundle::{BundleKind, SignableBundle};
use crate::error::Result;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub const SWIFT_SUPPORT_DIR: &str = "SwiftSupport/iphoneos";
const SWIFT_CORE: &str = "libswiftCore.dylib";

/// One runtime library and every place inside the app that embeds it.
#[derive(Debug)]
pub struct SwiftLibrary {
    pub name: String,
    pub embedded: Vec<PathBuf>,
}

impl SwiftLibrary {
    /// Pristine copy from the toolchain when available, else the first embedded copy.
    fn source(&self, toolchain: Option<&Path>) -> Option<PathBuf> {
        toolchain
            .map(|dir| dir.join(&self.name))
            .filter(|p| p.is_file())
            .or_else(|| self.embedded.first().cloned())
    }
}

/// Swift runtime libraries embedded in the `Frameworks/` of apps and extensions.
///
/// Empty unless some bundle embeds `libswiftCore.dylib`.
pub fn find_swift_libraries(bundles: &[SignableBundle]) -> Result<Vec<SwiftLibrary>> {
    let mut libraries: Vec<SwiftLibrary> = Vec::new();
    let mut has_core = false;

    for bundle in bundles
        .iter()
        .filter(|b| matches!(b.kind, BundleKind::App | BundleKind::AppExtension))
    {
        let frameworks = bundle.path.join("Frameworks");
        if !frameworks.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&frameworks)? {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if !(name.starts_with("libswift") && name.ends_with(".dylib")) || !path.is_file() {
                continue;
            }
            has_core |= name == SWIFT_CORE;
            match libraries.iter_mut().find(|l| l.name == name) {
                Some(library) => library.embedded.push(path),
                None => libraries.push(SwiftLibrary {
                    name,
                    embedded: vec![path],
                }),
            }
        }
    }

    if !has_core {
        return Ok(Vec::new());
    }
    libraries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(libraries)
}

/// Copies every embedded Swift runtime library into `SwiftSupport/iphoneos/`.
///
/// With a toolchain directory, the embedded copies are also refreshed from it
/// so the re-signed libraries start from the toolchain originals. Must run
/// before signing. Returns the number of libraries staged.
pub fn stage_swift_support(
    extracted_root: &Path,
    bundles: &[SignableBundle],
    toolchain: Option<&Path>,
) -> Result<usize> {
    let libraries = find_swift_libraries(bundles)?;
    if libraries.is_empty() {
        return Ok(0);
    }

    let support_dir = extracted_root.join(SWIFT_SUPPORT_DIR);
    fs::create_dir_all(&support_dir)?;

    let mut staged = 0;
    for library in &libraries {
        let Some(source) = library.source(toolchain) else {
            continue;
        };
        fs::copy(&source, support_dir.join(&library.name))?;
        staged += 1;

        if toolchain.is_some_and(|dir| source.starts_with(dir)) {
            for embedded in &library.embedded {
                fs::copy(&source, embedded)?;
                debug!("refreshed {}", embedded.display());
            }
        }
    }

    info!("[*] staged \x1b[96m{}\x1b[0m swift support librar(ies)", staged);
    Ok(staged)
}
