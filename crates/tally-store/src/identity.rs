use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use tally_core::store::{IdentityError, IdentityProvider, UserId};

/// Anonymous sign-in backed by a single file under the data directory. The
/// first run mints a random id; every later run returns the same one.
#[derive(Debug)]
pub struct LocalIdentity {
    path: PathBuf,
}

impl LocalIdentity {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("identity"),
        }
    }

    fn load_or_create(&self) -> anyhow::Result<UserId> {
        if self.path.exists() {
            let raw = fs::read_to_string(&self.path)
                .with_context(|| format!("failed reading {}", self.path.display()))?;
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                debug!(user = %trimmed, "existing identity");
                return Ok(UserId(trimmed.to_string()));
            }
        }

        let id = Uuid::new_v4().to_string();
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&self.path, &id)
            .with_context(|| format!("failed writing {}", self.path.display()))?;
        info!(user = %id, "minted new identity");
        Ok(UserId(id))
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self) -> Result<UserId, IdentityError> {
        self.load_or_create()
            .map_err(|err| IdentityError::SignIn(format!("{err:#}")))
    }
}
