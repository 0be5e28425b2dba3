// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component errors.

use bramble_dom::{DomError, NodeId};
use thiserror::Error;

use crate::props::PropKind;

/// Errors returned by the component registry and runtime.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// The tag is not a valid custom element name.
    #[error("invalid component tag {0:?}: must be lowercase and contain a hyphen")]
    InvalidTag(String),
    /// A component with this tag was already defined through this registry.
    #[error("component <{0}> is already defined")]
    AlreadyDefined(String),
    /// The node is not an element of a registered component.
    #[error("node {0:?} is not a registered component")]
    NotAComponent(NodeId),
    /// The node is a component but is not currently connected.
    #[error("component <{tag}> has no live instance")]
    NotConnected {
        /// The component's tag.
        tag: String,
    },
    /// The component declares no such property.
    #[error("component <{tag}> has no property `{prop}`")]
    UnknownProp {
        /// The component's tag.
        tag: String,
        /// The requested property.
        prop: String,
    },
    /// A value of the wrong kind was assigned to a property.
    #[error("property `{prop}` expects a {expected} value")]
    PropType {
        /// The property.
        prop: String,
        /// Its declared kind.
        expected: PropKind,
    },
    /// The component declares no such method.
    #[error("component <{tag}> has no method `{method}`")]
    UnknownMethod {
        /// The component's tag.
        tag: String,
        /// The requested method.
        method: String,
    },
    /// A method ran and failed.
    #[error("method `{method}` on <{tag}> failed: {message}")]
    Method {
        /// The component's tag.
        tag: String,
        /// The method.
        method: String,
        /// The failure, rendered.
        message: String,
    },
    /// A document operation failed.
    #[error(transparent)]
    Dom(#[from] DomError),
}
