pub mod bundle;
pub mod certificate;
pub mod config;
pub mod error;
pub mod identity;
pub mod ipa;
pub mod plist_ext;
pub mod profile;
pub mod publish;
pub mod resign;
pub mod resolve;
pub mod security;
pub mod sign;
pub mod swift;
pub mod tools;

pub use bundle::{scan, BundleKind, SignableBundle};
pub use config::{Channel, ResignConfig, ResignOptions};
pub use error::{ResignError, Result};
pub use identity::{list_identities, Keychain, SigningIdentity};
pub use ipa::{create_ipa, extract_ipa};
pub use plist_ext::PlistFile;
pub use profile::{list_installed_profiles, ProfileDecoder, ProvisioningProfile};
pub use publish::{Envman, LogSink, ResultSink, RESIGNED_IPA_PATH_KEY};
pub use resign::{apply, ResignOutcome, Resigner, Toolchain};
pub use resolve::{matches_app_id, resolve, Resolution, ResolveRequest};
pub use security::SecurityTool;
pub use sign::{CodeSigner, Codesign};
