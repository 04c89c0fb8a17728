//! The wire codec (C7): frame header, message catalog, encryption
//! envelope, and CRC32 integrity checks.

pub mod crc;
pub mod crypto;
pub mod frame;
pub mod message;

pub use crc::crc32;
pub use crc::verify as crc32_verify;
pub use crypto::SessionKey;
pub use crypto::decrypt;
pub use crypto::encrypt;
pub use frame::FrameHeader;
pub use frame::MAGIC;
pub use frame::VERSION;
pub use message::AuthType;
pub use message::Message;
pub use message::MessageType;
pub use message::ProtocolError;
pub use message::RepoListing;
pub use message::StatusCode;
