pub mod sshkeys;

pub use sshkeys::{
    converge, load_keys_file, sync_ssh_keys, ConverterKind, DiffDisplay, SyncOptions, SyncReport,
};
