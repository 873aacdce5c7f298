//! Credential cache file

use tracing::{debug, warn};

use crate::authn::credential::Credential;
use crate::errors::AgentError;
use crate::filesys::file::File;

/// Load a cached credential.
///
/// A missing or unreadable cache is not an error: the account simply authenticates from scratch.
pub async fn load_credential(file: &File) -> Option<Credential> {
    if !file.exists().await {
        debug!("No cached credential at {}", file.path().display());
        return None;
    }

    match file.read_json::<Credential>().await {
        Ok(credential) => Some(credential),
        Err(e) => {
            warn!(
                "Ignoring unreadable credential cache {}: {}",
                file.path().display(),
                e
            );
            None
        }
    }
}

/// Save a credential, readable by the owner only
pub async fn save_credential(file: &File, credential: &Credential) -> Result<(), AgentError> {
    file.write_private_json(credential).await
}
