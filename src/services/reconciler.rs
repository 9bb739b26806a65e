use crate::models::{Diff, KeySet, ReconcileResult, SshKeysError, SshResult};
use async_trait::async_trait;
use thiserror::Error;

/// Something that can push a diff onto the device.
#[async_trait]
pub trait DiffApplier: Send {
    async fn apply(&mut self, diff: &Diff) -> SshResult<()>;
}

/// Apply failed. `result` still describes the change that was attempted;
/// device state may now sit anywhere between current and desired.
#[derive(Error, Debug, Clone)]
#[error("{source}")]
pub struct ReconcileError {
    pub result: ReconcileResult,
    pub source: SshKeysError,
}

/// Diff `current` against `desired` and, unless `dry_run` or nothing
/// changed, hand the diff to `applier`.
pub async fn reconcile<A>(
    current: &KeySet,
    desired: &KeySet,
    dry_run: bool,
    applier: &mut A,
) -> Result<ReconcileResult, ReconcileError>
where
    A: DiffApplier + ?Sized,
{
    let diff = Diff::between(current, desired);
    let result = ReconcileResult {
        changed: !diff.is_empty(),
        diff,
    };

    log::info!(
        "[reconciler] changed={} import={:?} remove={:?} dry_run={}",
        result.changed,
        result.diff.to_import(),
        result.diff.to_remove(),
        dry_run
    );

    if dry_run || !result.changed {
        return Ok(result);
    }

    match applier.apply(&result.diff).await {
        Ok(()) => Ok(result),
        Err(source) => Err(ReconcileError { result, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyRecord;

    /// Applier that records diffs and can be told to fail.
    #[derive(Default)]
    struct RecordingApplier {
        calls: Vec<Diff>,
        fail_with: Option<SshKeysError>,
    }

    #[async_trait]
    impl DiffApplier for RecordingApplier {
        async fn apply(&mut self, diff: &Diff) -> SshResult<()> {
            self.calls.push(diff.clone());
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    fn set(pairs: &[(&str, &str)]) -> KeySet {
        KeySet::try_from_records(pairs.iter().map(|(u, k)| KeyRecord::new(*u, *k))).unwrap()
    }

    #[tokio::test]
    async fn test_no_change_skips_apply() {
        let mut applier = RecordingApplier::default();
        let keys = set(&[("alice", "AABB")]);
        let result = reconcile(&keys, &keys, false, &mut applier).await.unwrap();
        assert!(!result.changed);
        assert!(applier.calls.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_never_applies() {
        let mut applier = RecordingApplier::default();
        let result = reconcile(
            &KeySet::empty(),
            &set(&[("bob", "CCDD")]),
            true,
            &mut applier,
        )
        .await
        .unwrap();
        assert!(result.changed);
        assert!(result.diff.to_import().contains("bob"));
        assert!(applier.calls.is_empty());
    }

    #[tokio::test]
    async fn test_change_applies_once() {
        let mut applier = RecordingApplier::default();
        let result = reconcile(
            &set(&[("carol", "EEFF")]),
            &KeySet::empty(),
            false,
            &mut applier,
        )
        .await
        .unwrap();
        assert!(result.changed);
        assert_eq!(applier.calls, vec![result.diff.clone()]);
    }

    #[test]
    fn test_apply_failure_keeps_intended_diff() {
        let mut applier = RecordingApplier {
            fail_with: Some(SshKeysError::Apply {
                user: "bob".to_string(),
                operation: "import".to_string(),
                message: "% Failed".to_string(),
            }),
            ..Default::default()
        };
        let current = set(&[("carol", "EEFF")]);
        let desired = set(&[("bob", "CCDD")]);

        let err = tokio_test::block_on(reconcile(&current, &desired, false, &mut applier))
            .unwrap_err();
        assert!(err.result.changed);
        assert_eq!(err.result.diff, Diff::between(&current, &desired));
        assert_eq!(err.source.error_type(), "Apply");
    }
}
