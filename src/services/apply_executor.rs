use crate::models::{DesiredKeys, DeviceProfile, Diff, SshKeysError, SshResult};
use crate::services::reconciler::DiffApplier;
use crate::services::remote_session::RemoteSession;
use async_trait::async_trait;

const OP_STAGE: &str = "stage";
const OP_IMPORT: &str = "import";
const OP_ZEROIZE: &str = "zeroize";

/// Drives a diff onto the device through one session.
///
/// Users are processed one at a time and independently: a failure stops the
/// run but earlier users stay applied.
pub struct ApplyExecutor<'a, S: RemoteSession + ?Sized> {
    session: &'a mut S,
    desired: &'a DesiredKeys,
    profile: &'a DeviceProfile,
    imported: Vec<String>,
    removed: Vec<String>,
}

impl<'a, S: RemoteSession + ?Sized> ApplyExecutor<'a, S> {
    pub fn new(session: &'a mut S, desired: &'a DesiredKeys, profile: &'a DeviceProfile) -> Self {
        Self {
            session,
            desired,
            profile,
            imported: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Users whose key was imported so far.
    pub fn imported(&self) -> &[String] {
        &self.imported
    }

    /// Users whose key was zeroized so far.
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    /// Imports first, then removals. Each import stages the user's file and
    /// imports it before the next user is touched.
    pub async fn apply_diff(&mut self, diff: &Diff) -> SshResult<()> {
        for user in diff.to_import() {
            self.import_key(user).await?;
            self.imported.push(user.clone());
        }

        for user in diff.to_remove() {
            self.zeroize_key(user).await?;
            self.removed.push(user.clone());
        }

        log::info!(
            "[apply_executor] Applied {} imports and {} removals",
            self.imported.len(),
            self.removed.len()
        );
        Ok(())
    }

    /// Stage the raw key blob, then import it.
    async fn import_key(&mut self, user: &str) -> SshResult<()> {
        let key = self.desired.get(user).ok_or_else(|| SshKeysError::Apply {
            user: user.to_string(),
            operation: OP_IMPORT.to_string(),
            message: "no desired key for user".to_string(),
        })?;

        let path = self.profile.staging_path(user);
        log::info!(
            "[apply_executor] Staging {} bytes for {} at {}",
            key.raw_blob.len(),
            user,
            path
        );
        self.session
            .stage_file(&key.raw_blob, &path)
            .await
            .map_err(|e| Self::wrap(user, OP_STAGE, e))?;

        let command = self.profile.import_command(user, &path);
        log::info!("[apply_executor] Importing key for {}", user);
        let output = self
            .session
            .run_with_confirmation(
                &command,
                &self.profile.confirm_prompt,
                &self.profile.confirm_answer,
            )
            .await
            .map_err(|e| Self::wrap(user, OP_IMPORT, e))?;

        self.check_output(user, OP_IMPORT, &output)
    }

    async fn zeroize_key(&mut self, user: &str) -> SshResult<()> {
        let command = self.profile.zeroize_command(user);
        log::info!("[apply_executor] Zeroizing key for {}", user);
        let output = self
            .session
            .run_with_confirmation(
                &command,
                &self.profile.confirm_prompt,
                &self.profile.confirm_answer,
            )
            .await
            .map_err(|e| Self::wrap(user, OP_ZEROIZE, e))?;

        self.check_output(user, OP_ZEROIZE, &output)
    }

    fn check_output(&self, user: &str, operation: &str, output: &str) -> SshResult<()> {
        match self.profile.device_error(output) {
            Some(line) => {
                log::error!(
                    "[apply_executor] Device rejected {} for {}: {}",
                    operation,
                    user,
                    line
                );
                Err(SshKeysError::Apply {
                    user: user.to_string(),
                    operation: operation.to_string(),
                    message: line.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    /// Device rejections become `Apply` errors naming the user; connectivity
    /// failures pass through so callers can tell the two apart.
    fn wrap(user: &str, operation: &str, error: SshKeysError) -> SshKeysError {
        if error.is_connectivity() {
            log::error!(
                "[apply_executor] Lost device while trying to {} key for {}: {}",
                operation,
                user,
                error
            );
            return error;
        }
        SshKeysError::Apply {
            user: user.to_string(),
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl<'a, S: RemoteSession + ?Sized> DiffApplier for ApplyExecutor<'a, S> {
    async fn apply(&mut self, diff: &Diff) -> SshResult<()> {
        self.apply_diff(diff).await
    }
}
