pub mod export;
pub mod record;
pub mod serial;
pub mod store;
pub mod validator;

pub use export::ExportBundle;
pub use record::{CertificateRecord, ListColumn, ListEntry, Tier, ValidityWindow};
pub use serial::{SerialAllocator, SerialNumber};
pub use store::{CertificateStore, ListFilter};
pub use validator::{ChainValidator, InvalidityReason, ValidationOutcome, MAX_CHAIN_DEPTH};
