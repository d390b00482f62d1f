//! Wire format for moving a file as a loop of QR codes.
//!
//! A file is base64-encoded and cut into data frames. Each frame is a
//! self-describing text record with a short checksum, and a metadata frame
//! carries the manifest at both ends of the loop.

pub mod checksum;
pub mod constants;
pub mod error;
pub mod frame;
pub mod metadata;

// Re-export primary types for convenience.
pub use checksum::{checksum, file_digest, verify_checksum};
pub use error::ProtocolError;
pub use frame::{Frame, decode_frame, encode_frame};
pub use metadata::{MetadataDraft, TransferMetadata};
