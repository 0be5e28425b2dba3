// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by the document, and the result contract for author callbacks.

use thiserror::Error;

/// Errors returned by [`Document`](crate::Document) operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomError {
    /// The tag is not a valid custom element name.
    #[error("invalid custom element name: {0:?}")]
    InvalidName(String),
    /// A custom element with this name was already defined.
    #[error("custom element already defined: {0:?}")]
    AlreadyDefined(String),
    /// The selector could not be parsed.
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector {
        /// The selector text as given.
        selector: String,
        /// What the parser tripped over.
        reason: &'static str,
    },
    /// Inserting the node would create a cycle or otherwise break the tree.
    #[error("hierarchy request error: {0}")]
    Hierarchy(&'static str),
    /// The node id is stale.
    #[error("node is no longer alive")]
    DeadNode,
}

/// Return types accepted from callbacks that the infrastructure invokes on an author's behalf.
///
/// Listener, cleanup, subscriber and scheduler closures may return `()` or any
/// `Result<(), E>` whose error converts into [`anyhow::Error`]. Failures are logged by
/// the caller and never propagated.
pub trait CallbackResult {
    /// Convert into a uniform result.
    fn into_result(self) -> anyhow::Result<()>;
}

impl CallbackResult for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> CallbackResult for Result<(), E> {
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}
