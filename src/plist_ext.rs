use crate::error::Result;
use std::path::{Path, PathBuf};

/// A property list file on disk, read as a dictionary.
pub struct PlistFile {
    pub path: PathBuf,
    pub data: plist::Dictionary,
}

impl PlistFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = plist::from_file::<_, plist::Dictionary>(&path)?;
        Ok(Self { path, data })
    }

    /// The `Info.plist` of a bundle directory, if it has a readable one.
    pub fn info_of<P: AsRef<Path>>(bundle: P) -> Option<Self> {
        Self::open(bundle.as_ref().join("Info.plist")).ok()
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_string())
    }

    pub fn bundle_identifier(&self) -> Option<&str> {
        self.get_string("CFBundleIdentifier")
            .filter(|id| !id.trim().is_empty())
    }
}
