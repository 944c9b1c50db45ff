//! The `security` command line tool as keychain and profile decoder.

use crate::certificate::CertificateSubject;
use crate::error::Result;
use crate::identity::{parse_identity_line, Keychain};
use crate::profile::ProfileDecoder;
use crate::tools;
use plist::Dictionary;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

const SECURITY: &str = "security";

pub struct SecurityTool {
    timeout: Duration,
}

impl SecurityTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Keychain for SecurityTool {
    fn identity_names(&self) -> Result<Vec<String>> {
        let output = tools::run_checked(
            SECURITY,
            ["find-identity", "-v", "-p", "codesigning"],
            self.timeout,
        )?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_identity_line)
            .collect())
    }

    fn organizational_unit(&self, identity: &str) -> Result<Option<String>> {
        let output = tools::run_checked(
            SECURITY,
            ["find-certificate", "-c", identity, "-p"],
            self.timeout,
        )?;
        let subject = CertificateSubject::from_pem(&output.stdout)?;
        Ok(subject.organizational_unit)
    }
}

impl ProfileDecoder for SecurityTool {
    fn decode(&self, path: &Path) -> Result<Dictionary> {
        let output = tools::run_checked(
            SECURITY,
            [OsStr::new("cms"), OsStr::new("-D"), OsStr::new("-i"), path.as_os_str()],
            self.timeout,
        )?;
        Ok(plist::from_bytes(&output.stdout)?)
    }
}
