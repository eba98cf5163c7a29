// # Shared State
//
// Lock-guarded handles shared between the scheduler, the engine and the
// administration surface.

pub mod current_ip;
pub mod desired;
pub mod records;

pub use current_ip::CurrentIp;
pub use desired::{DesiredRecordSet, RecordSetSlot};
pub use records::{RecordStore, StoredRecord};
