// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public handle types: node identifiers, event targets and registration handles.

/// Identifier for a node in a [`Document`](crate::Document) (generational).
///
/// A `NodeId` stays valid until the node is destroyed. Slots are recycled with a
/// bumped generation, so a stale id never aliases a newer node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// What a node is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// The single document node at the top of the tree.
    Document,
    /// An element with a lowercase tag name.
    Element(String),
    /// A text node.
    Text(String),
}

/// Something listeners can be attached to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventTarget {
    /// The window sits above the document node in every propagation path.
    Window,
    /// A node in the document (including the document node itself).
    Node(NodeId),
}

impl From<NodeId> for EventTarget {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);
    };
}

handle_type!(
    /// Handle returned by [`Document::add_event_listener`](crate::Document::add_event_listener).
    ListenerId
);
handle_type!(
    /// Handle for a pending animation-frame callback.
    FrameHandle
);
handle_type!(
    /// Handle for a pending timer.
    TimerHandle
);
handle_type!(
    /// Handle for a pending idle callback.
    IdleHandle
);
handle_type!(
    /// Handle for a resize observation or a disposal hook.
    ObserverId
);
