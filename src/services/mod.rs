pub mod apply_executor;
pub mod device_session;
pub mod key_converter;
pub mod output_parser;
pub mod reconciler;
pub mod remote_session;

pub use apply_executor::ApplyExecutor;
pub use device_session::{resolve_target, resolve_target_with, DeviceSession, TargetOverrides};
pub use key_converter::{
    decode_payload, prepare_desired_keys, InProcessConverter, KeyConverter, SshKeygenConverter,
};
pub use output_parser::OutputParser;
pub use reconciler::{reconcile, DiffApplier, ReconcileError};
pub use remote_session::RemoteSession;
