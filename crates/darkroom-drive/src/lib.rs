//! Client for the remote file store hosting the actual photo files.
//!
//! Covers the two outbound operations the watch subsystem needs: creating a
//! change-notification channel on a folder and stopping one. Token
//! resolution for a user is a collaborator concern behind
//! [`AccessTokenProvider`].

pub mod client;
pub mod error;
pub mod token;

pub use client::{DriveClient, WatchChannel};
pub use error::DriveError;
pub use token::{AccessTokenProvider, StaticTokenProvider, TokenError};
