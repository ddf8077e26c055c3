// Adapters layer: concrete implementations of the domain ports (storage, clock, events).

pub mod clock;
pub mod json_file;
pub mod memory;
pub mod sinks;

pub use clock::{FixedClock, SystemClock};
pub use json_file::JsonFileLedgerStore;
pub use memory::InMemoryLedgerStore;
pub use sinks::{EventDispatcher, NullSink, RecordingSink, TracingSink};
