//! Converge SSH public-key authentication on IOS-XR style network devices.
//!
//! The device is read with its `show` command, the output parsed into a
//! [`KeySet`], diffed against the wanted keys and, unless running as a dry
//! run, brought in line by staging and importing new keys and zeroizing
//! stale ones.

pub mod commands;
pub mod models;
pub mod services;
pub mod utils;

pub use commands::{
    converge, load_keys_file, sync_ssh_keys, ConverterKind, DiffDisplay, SyncOptions, SyncReport,
};
pub use models::{
    DesiredKey, DesiredKeys, DeviceProfile, DeviceTarget, Diff, KeyRecord, KeySet, KeyType,
    ReconcileResult, SshKeysError, SshResult,
};
pub use services::{
    prepare_desired_keys, reconcile, resolve_target, ApplyExecutor, DeviceSession, DiffApplier,
    InProcessConverter, KeyConverter, OutputParser, ReconcileError, RemoteSession,
    SshKeygenConverter, TargetOverrides,
};
