// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Errors surfaced by engine operations.
//!
//! Every kind propagates to the caller unchanged. The engine never retries
//! and never formats errors for end users; one failed fetch aborts the whole
//! page or tree request.

use thiserror::Error;

use crate::node::Kind;
use crate::remote::RemoteError;
use crate::storage::traits::StorageError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Network failure or non-2xx from the remote source.
    #[error("remote source unavailable: {0}")]
    RemoteUnavailable(String),

    /// The requested record is absent locally, or the remote says it does
    /// not exist.
    #[error("{} {id} not found", kind_label(.kind))]
    NotFound { kind: Option<Kind>, id: u64 },

    /// A fetched comment names a parent that is not in the resolved set.
    /// Dropping the comment instead would silently corrupt the tree shape.
    #[error("comment {id} declares parent {parent_id:?} which has not been resolved")]
    InconsistentParent { id: u64, parent_id: Option<u64> },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn kind_label(kind: &Option<Kind>) -> &'static str {
    kind.map_or("item", |k| k.as_str())
}

impl SyncError {
    #[must_use]
    pub fn not_found(kind: Kind, id: u64) -> Self {
        Self::NotFound { kind: Some(kind), id }
    }

    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::Storage(_))
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unavailable(msg) => Self::RemoteUnavailable(msg),
            RemoteError::NotFound(id) => Self::NotFound { kind: None, id },
        }
    }
}
