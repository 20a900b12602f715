mod atomic_io;
mod channel;
mod clock;
mod file_store;
mod record;
mod store;

pub use atomic_io::{write_bytes_atomic, write_text_atomic};
pub use channel::{
    LocalPeerState, PeerSyncChannel, PeerView, PollReport, SyncConfig, SyncHandle,
    DEFAULT_MAX_MESSAGES, DEFAULT_NAMESPACE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_STALE_THRESHOLD_MS,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use file_store::FileStore;
pub use record::{MessageBody, PeerMessage, PeerRecord};
pub use store::{validate_key, MemoryStore, SharedStore, StoreError, MAX_KEY_LEN};
