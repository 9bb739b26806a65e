pub mod desired_key;
pub mod device;
pub mod error;
pub mod key_state;

pub use desired_key::{DesiredKey, DesiredKeys, KeyType};
pub use device::{DeviceProfile, DeviceTarget};
pub use error::{SshKeysError, SshResult};
pub use key_state::{Diff, KeyRecord, KeySet, ReconcileResult};
