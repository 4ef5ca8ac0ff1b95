//! Pass-through filter.

use alloc::sync::Arc;

use super::{shutdown_all, Interface, Operations};
use crate::error::{Error, Status};

/// Two-endpoint layer that forwards everything it receives on one side out
/// of the other.
///
/// Closing either side closes both, passing the status through the
/// translation function if one was given.
pub struct Relay {
    upper: Interface,
    lower: Interface,
    translate: Option<fn(Error) -> Error>,
}

impl Relay {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// Relay that rewrites error statuses on close.
    pub fn with_translation(translate: fn(Error) -> Error) -> Arc<Self> {
        Self::build(Some(translate))
    }

    fn build(translate: Option<fn(Error) -> Error>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            upper: Interface::new("relay-upper", me),
            lower: Interface::new("relay-lower", me),
            translate,
        })
    }

    /// Endpoint facing the consumer.
    pub fn upper(&self) -> &Interface {
        &self.upper
    }

    /// Endpoint facing the source.
    pub fn lower(&self) -> &Interface {
        &self.lower
    }

    fn other(&self, intf: &Interface) -> &Interface {
        if intf == &self.upper {
            &self.lower
        } else {
            &self.upper
        }
    }
}

impl Operations for Relay {
    fn close(&self, intf: &Interface, status: Status) {
        let status = match (status, self.translate) {
            (Err(e), Some(translate)) => Err(translate(e)),
            (status, _) => status,
        };
        shutdown_all(status, &[self.other(intf), intf]);
    }

    fn passthru(&self, intf: &Interface) -> Option<&Interface> {
        Some(self.other(intf))
    }
}
