use crate::models::{DesiredKeys, DeviceProfile, SshKeysError, SshResult};
use crate::services::{
    prepare_desired_keys, reconcile, resolve_target, ApplyExecutor, DeviceSession,
    InProcessConverter, KeyConverter, OutputParser, ReconcileError, RemoteSession,
    SshKeygenConverter, TargetOverrides,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Which key converter to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConverterKind {
    #[default]
    InProcess,
    SshKeygen,
}

impl ConverterKind {
    fn build(self) -> Box<dyn KeyConverter> {
        match self {
            ConverterKind::InProcess => Box::new(InProcessConverter),
            ConverterKind::SshKeygen => Box::new(SshKeygenConverter::default()),
        }
    }
}

impl FromStr for ConverterKind {
    type Err = SshKeysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in-process" | "inprocess" => Ok(ConverterKind::InProcess),
            "ssh-keygen" => Ok(ConverterKind::SshKeygen),
            other => Err(SshKeysError::InvalidConfig {
                message: format!("Unknown converter: {}", other),
            }),
        }
    }
}

/// Everything one sync run needs
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub host_alias: String,
    pub target: TargetOverrides,
    pub profile: DeviceProfile,
    /// User to OpenSSH public key line
    pub keys: BTreeMap<String, String>,
    pub dry_run: bool,
    pub converter: ConverterKind,
}

/// Before/after dumps for human diff display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffDisplay {
    pub before: String,
    pub after: String,
}

/// Result reported back to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub changed: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffDisplay>,
    pub to_import: Vec<String>,
    pub to_remove: Vec<String>,
    pub imported: Vec<String>,
    pub removed: Vec<String>,
    /// Set when applying failed part way; earlier users stay applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SshKeysError>,
}

/// Load the desired keys file: a JSON object mapping user to public key.
pub async fn load_keys_file(path: &Path) -> SshResult<BTreeMap<String, String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SshKeysError::InvalidConfig {
            message: format!("Cannot read keys file {}: {}", path.display(), e),
        })?;
    Ok(serde_json::from_str(&content)?)
}

/// Converge the device's authentication keys to `options.keys`.
///
/// Desired keys are converted before the device is contacted, so a bad key
/// never leads to a device change.
pub async fn sync_ssh_keys(options: SyncOptions) -> SshResult<SyncReport> {
    log::info!(
        "[sshkeys] Syncing {} keys to {} (dry_run={})",
        options.keys.len(),
        options.host_alias,
        options.dry_run
    );

    let converter = options.converter.build();
    let desired = prepare_desired_keys(&options.keys, converter.as_ref())?;

    let target = resolve_target(&options.host_alias, options.target.clone()).await?;
    let mut session = DeviceSession::connect(&target).await?;

    let report = converge(&mut session, &desired, &options.profile, options.dry_run).await;

    if let Err(e) = session.close().await {
        log::warn!("[sshkeys] Disconnect failed: {}", e);
    }

    let report = report?;
    log::info!(
        "[sshkeys] Done: changed={} imported={} removed={}",
        report.changed,
        report.imported.len(),
        report.removed.len()
    );
    Ok(report)
}

/// Read current state through `session`, reconcile against `desired` and
/// apply unless `dry_run`.
///
/// Failures before any change (unreadable or unparsable device state) are
/// returned as `Err`. A failure while applying is reported in
/// `SyncReport::error` together with the intended change.
pub async fn converge<S>(
    session: &mut S,
    desired: &DesiredKeys,
    profile: &DeviceProfile,
    dry_run: bool,
) -> SshResult<SyncReport>
where
    S: RemoteSession + ?Sized,
{
    let raw = session.run_command(&profile.show_command).await?;
    let current = OutputParser::parse(&raw)?;
    let wanted = desired.key_set();

    log::info!(
        "[sshkeys] Device has {} keys, {} wanted",
        current.len(),
        wanted.len()
    );

    let mut executor = ApplyExecutor::new(session, desired, profile);
    let (result, error) = match reconcile(&current, &wanted, dry_run, &mut executor).await {
        Ok(result) => (result, None),
        Err(ReconcileError { result, source }) => {
            log::error!("[sshkeys] Apply failed: {}", source);
            (result, Some(source))
        }
    };

    let diff = result.changed.then(|| DiffDisplay {
        before: current.to_mapping_dump(),
        after: wanted.to_mapping_dump(),
    });

    Ok(SyncReport {
        changed: result.changed,
        dry_run,
        diff,
        to_import: result.diff.to_import().iter().cloned().collect(),
        to_remove: result.diff.to_remove().iter().cloned().collect(),
        imported: executor.imported().to_vec(),
        removed: executor.removed().to_vec(),
        error,
    })
}
