//! Deployment of the muninlite binary.
//!
//! The executor expects an executable at a fixed path. Before the service
//! starts, [`Deployer`] copies the binary there from its install location if
//! it is missing and grants the owner execute permission.

use std::path::{Path, PathBuf};

/// Errors that can occur while deploying the binary.
#[derive(thiserror::Error, Debug)]
pub enum DeployError {
    /// Neither the target nor a source binary exists.
    #[error("muninlite binary missing at {target} and no source to copy it from")]
    SourceMissing { target: PathBuf },

    /// Copying or changing permissions failed.
    #[error("Error deploying muninlite binary to {target}: {source}")]
    Io {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Places the muninlite binary at its runtime path.
#[derive(Debug, Clone)]
pub struct Deployer {
    source: Option<PathBuf>,
    target: PathBuf,
}

impl Deployer {
    /// Create a deployer for the given runtime path.
    #[must_use]
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            source: None,
            target: target.into(),
        }
    }

    /// Copy the binary from `source` when the target is missing.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Runtime path of the binary.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Make sure an executable binary exists at the target path.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::SourceMissing` if the target is absent and there
    /// is no source file, or `DeployError::Io` if copying or setting
    /// permissions fails.
    pub async fn ensure_deployed(&self) -> Result<(), DeployError> {
        if !tokio::fs::try_exists(&self.target)
            .await
            .map_err(|e| self.io_error(e))?
        {
            self.copy_from_source().await?;
        }
        self.ensure_executable().await
    }

    async fn copy_from_source(&self) -> Result<(), DeployError> {
        let missing = || DeployError::SourceMissing {
            target: self.target.clone(),
        };
        let source = self.source.as_ref().ok_or_else(missing)?;
        if !tokio::fs::try_exists(source)
            .await
            .map_err(|e| self.io_error(e))?
        {
            return Err(missing());
        }

        tracing::info!(
            source = %source.display(),
            destination = %self.target.display(),
            "Deploying muninlite binary"
        );
        tokio::fs::copy(source, &self.target)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    #[cfg(unix)]
    async fn ensure_executable(&self) -> Result<(), DeployError> {
        use std::os::unix::fs::PermissionsExt;

        const OWNER_EXECUTE: u32 = 0o100;

        let metadata = tokio::fs::metadata(&self.target)
            .await
            .map_err(|e| self.io_error(e))?;
        let mut permissions = metadata.permissions();
        if permissions.mode() & OWNER_EXECUTE != 0 {
            return Ok(());
        }

        tracing::debug!(path = %self.target.display(), "Granting owner execute permission");
        permissions.set_mode(permissions.mode() | OWNER_EXECUTE);
        tokio::fs::set_permissions(&self.target, permissions)
            .await
            .map_err(|e| self.io_error(e))
    }

    #[cfg(not(unix))]
    async fn ensure_executable(&self) -> Result<(), DeployError> {
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> DeployError {
        DeployError::Io {
            target: self.target.clone(),
            source,
        }
    }
}
