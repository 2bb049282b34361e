//! Core traits defined in `messenger-core` and implemented by other crates.

pub mod membership;
pub mod offline;
pub mod repository;

pub use membership::MembershipGate;
pub use offline::OfflineStore;
pub use repository::MessageRepository;
