use crate::error::{Result, ResignError};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Extracts `ipa_path` into `dest` and returns the main `.app` folder.
///
/// The input archive is only read. Symlinks are recreated as links and must
/// resolve inside `dest`. Restored modes always keep owner write access.
pub fn extract_ipa<P: AsRef<Path>, Q: AsRef<Path>>(ipa_path: P, dest: Q) -> Result<PathBuf> {
    let ipa_path = ipa_path.as_ref();
    let dest = dest.as_ref();

    let file = File::open(ipa_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    // Check for valid IPA structure
    let has_payload = archive
        .file_names()
        .any(|name| name.starts_with("Payload/"));
    if !has_payload {
        return Err(ResignError::InvalidIpa(
            "No Payload folder found".to_string(),
        ));
    }

    let has_info_plist = archive
        .file_names()
        .any(|name| name.ends_with(".app/Info.plist"));
    if !has_info_plist {
        return Err(ResignError::InvalidIpa(
            "No Info.plist found, invalid app".to_string(),
        ));
    }

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name() else {
            return Err(ResignError::InvalidIpa(format!(
                "entry escapes the archive root: {}",
                file.name()
            )));
        };
        let outpath = dest.join(&relative);

        if let Some(p) = outpath.parent() {
            if !p.exists() {
                fs::create_dir_all(p)?;
            }
        }

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            restore_mode(&outpath, file.unix_mode(), OWNER_DIR_BITS)?;
        } else if is_symlink_mode(file.unix_mode()) {
            let mut target = String::new();
            file.read_to_string(&mut target)?;
            if !link_stays_inside(&relative, Path::new(&target)) {
                return Err(ResignError::InvalidIpa(format!(
                    "symlink escapes the archive root: {} -> {}",
                    file.name(),
                    target
                )));
            }
            make_symlink(&target, &outpath)?;
        } else {
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
            restore_mode(&outpath, file.unix_mode(), OWNER_FILE_BITS)?;
        }
    }

    find_app_in_payload(&dest.join("Payload"))
}

// the working copy is rewritten in place, so the owner keeps write access
const OWNER_FILE_BITS: u32 = 0o200;
const OWNER_DIR_BITS: u32 = 0o700;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

fn is_symlink_mode(mode: Option<u32>) -> bool {
    mode.map(|m| m & S_IFMT == S_IFLNK).unwrap_or(false)
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>, owner_bits: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode((mode & 0o7777) | owner_bits))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>, _owner_bits: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(windows)]
fn make_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link)?;
    Ok(())
}

/// Whether a link at `link` (relative to the extraction root) pointing at
/// `target` resolves to a path inside the root.
fn link_stays_inside(link: &Path, target: &Path) -> bool {
    use std::path::Component;

    if target.has_root() {
        return false;
    }
    let mut depth = link.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn find_app_in_payload(payload: &Path) -> Result<PathBuf> {
    let mut apps = Vec::new();
    for entry in fs::read_dir(payload)? {
        let path = entry?.path();
        if path.is_dir() && path.extension().map(|e| e == "app").unwrap_or(false) {
            apps.push(path);
        }
    }
    apps.sort();
    apps.into_iter()
        .next()
        .ok_or_else(|| ResignError::InvalidIpa("No .app folder found".to_string()))
}

/// Zips every top-level folder of `tmpdir` (`Payload/`, `SwiftSupport/`, ...) into `output`.
///
/// The archive is assembled in a temporary file beside `output` and only
/// moved into place once complete.
pub fn create_ipa<P: AsRef<Path>, Q: AsRef<Path>>(
    tmpdir: P,
    output: Q,
    compression_level: u32,
) -> Result<()> {
    let tmpdir = tmpdir.as_ref();
    let output = output.as_ref();

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staging = tempfile::Builder::new()
        .prefix(".resign")
        .suffix(".ipa")
        .tempfile_in(parent)?;

    let mut zip = zip::ZipWriter::new(staging.reopen()?);

    // stored entries take no level
    let options = match compression_level {
        0 => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        level => SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level as i64)),
    };

    for entry in WalkDir::new(tmpdir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let Ok(name) = path.strip_prefix(tmpdir) else {
            continue;
        };

        // Skip hidden files (fixes installd errors)
        if name
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            continue;
        }

        // loose top-level files are not part of an ipa
        if !entry.file_type().is_dir() && path.parent() == Some(tmpdir) {
            continue;
        }

        let name_str = name.to_string_lossy().replace('\\', "/");
        if entry.path_is_symlink() {
            let target = fs::read_link(path)?;
            zip.add_symlink(
                name_str.as_str(),
                target.to_string_lossy().replace('\\', "/"),
                options,
            )?;
        } else if path.is_file() {
            let mut file_options = options;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file_options = file_options.unix_permissions(entry.metadata()?.permissions().mode());
            }
            zip.start_file(name_str.as_str(), file_options)?;
            let mut f = File::open(path)?;
            let mut buffer = Vec::new();
            f.read_to_end(&mut buffer)?;
            zip.write_all(&buffer)?;
        } else if path.is_dir() {
            zip.add_directory(format!("{}/", name_str), options)?;
        }
    }

    zip.finish()?;
    staging
        .persist(output)
        .map_err(|e| ResignError::Io(e.error))?;

    Ok(())
}
