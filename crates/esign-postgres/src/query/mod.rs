//! Database query repositories.
//!
//! Repositories are traits implemented on [`PgConnection`], so a pooled
//! [`PgConn`] can call them directly.
//!
//! [`PgConnection`]: crate::PgConnection
//! [`PgConn`]: crate::PgConn

mod document;

pub use document::{DocumentRepository, SigningOutcome};
