//! # folio-store
//!
//! Portfolio content behind the HTTP API: projects, certificates and contact
//! messages. [`MemStorage`] keeps everything in memory and can mirror itself
//! to a JSON snapshot file after every change.

pub mod entities;
pub mod storage;
pub mod validation;

pub use entities::{
    Certificate, CertificatePatch, Message, NewCertificate, NewMessage, NewProject, Project,
    ProjectPatch,
};
pub use storage::{MemStorage, Storage, StoreStats};
pub use validation::Validate;
