use crate::models::SshResult;
use async_trait::async_trait;

/// An open, authenticated channel to the device.
///
/// Every operation takes `&mut self`: the device's command interface holds one
/// interactive prompt at a time, so operations on a session never overlap.
#[async_trait]
pub trait RemoteSession: Send {
    /// Run a command and return its captured output.
    async fn run_command(&mut self, command: &str) -> SshResult<String>;

    /// Run a command that stops at `expected_prompt` and send `answer` in the
    /// same exchange. Fails if the prompt never appears.
    async fn run_with_confirmation(
        &mut self,
        command: &str,
        expected_prompt: &str,
        answer: &str,
    ) -> SshResult<String>;

    /// Write `contents` to `remote_path` in device storage, replacing any
    /// existing file.
    async fn stage_file(&mut self, contents: &[u8], remote_path: &str) -> SshResult<()>;
}
