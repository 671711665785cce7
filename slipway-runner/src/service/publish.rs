//! Package index publishing

use anyhow::Result;
use async_trait::async_trait;
use slipway_client::{PackageIndexClient, UploadOutcome};
use slipway_core::domain::artifact::BuildArtifact;

use crate::config::Credentials;

/// Destination for published distribution files
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Uploads one file; an already published identical file is not an error
    async fn upload(
        &self,
        artifact: &BuildArtifact,
        credentials: &Credentials,
    ) -> Result<UploadOutcome>;
}

#[async_trait]
impl PackageIndex for PackageIndexClient {
    async fn upload(
        &self,
        artifact: &BuildArtifact,
        credentials: &Credentials,
    ) -> Result<UploadOutcome> {
        let outcome = PackageIndexClient::upload(
            self,
            artifact,
            &credentials.username,
            credentials.password.expose(),
        )
        .await?;
        Ok(outcome)
    }
}
