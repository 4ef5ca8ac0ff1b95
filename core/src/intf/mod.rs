//! Object interfaces.
//!
//! An [`Interface`] is one end of a bidirectional link between two objects
//! (layers). Calling an operation on an interface dispatches it to whatever
//! object owns the endpoint at the other end of the link, through that
//! object's [`Operations`] implementation. Neither side knows the concrete
//! type of the other.
//!
//! # Ownership
//!
//! ```text
//!   object A ──owns──► endpoint a ══link══► endpoint b ◄──owns── object B
//!       ▲                  │                   │                    ▲
//!       └──── weak ────────┘                   └────── weak ────────┘
//!   link a→b holds strong refs to endpoint b *and* object B (and vice versa)
//! ```
//!
//! A link keeps the peer alive; an endpoint only looks up its own owner.
//! Linked pairs form a reference cycle that is broken by `close()` /
//! `unplug()`, so a layer lives exactly as long as somebody is connected to
//! it (or somebody else holds it).
//!
//! # Dispatch rules
//!
//! - The link is cloned before the peer is invoked, so the callee cannot be
//!   freed while its operation is on the stack, even if it closes itself.
//! - No lock is held while a peer operation runs.
//! - An operation on an unconnected, closed or dropped peer is a no-op with
//!   a defined result (see each method).
//! - `close()` disables the endpoint and detaches the link *before*
//!   notifying the peer, so cascading closes terminate.

mod job;
mod relay;
mod xfer;

pub use job::JobProgress;
pub use relay::Relay;
pub use xfer::{check_order, Location, Metadata, Signal};

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::error::{Error, Result, Status};
use crate::iobuf::IoBuffer;

/// Operations an object accepts through one of its interfaces.
///
/// `intf` is the endpoint the operation arrived on, so an object owning
/// several endpoints can tell them apart (`intf == &self.xfer`).
///
/// Implementations must not hold their own locks across calls into other
/// interfaces; the peer may call straight back.
pub trait Operations: Send + Sync + 'static {
    /// Peer closed the link.
    ///
    /// Default: shut down and restart the receiving endpoint, leaving it
    /// unplugged but usable.
    fn close(&self, intf: &Interface, status: Status) {
        intf.restart(status);
    }

    /// Endpoint that operations this object does not handle on `intf` are
    /// forwarded out of. Default: none.
    ///
    /// Every default below except `close` goes through here first, so a
    /// filter only implements what it changes.
    fn passthru(&self, _intf: &Interface) -> Option<&Interface> {
        None
    }

    /// Data from the peer. Default: pass through, else `Err(NotConnected)`.
    fn deliver(&self, intf: &Interface, buf: IoBuffer, meta: &Metadata) -> Result<()> {
        match self.passthru(intf) {
            Some(next) => next.deliver(buf, meta),
            None => Err(Error::NotConnected),
        }
    }

    /// Control message from the peer. Default: pass through, else ignore.
    fn signal(&self, intf: &Interface, signal: Signal) {
        if let Some(next) = self.passthru(intf) {
            next.signal(signal);
        }
    }

    /// How many bytes the object is willing to accept. Default: pass
    /// through, else unlimited.
    fn window(&self, intf: &Interface) -> usize {
        match self.passthru(intf) {
            Some(next) => next.window(),
            None => usize::MAX,
        }
    }

    /// Fill in job progress. Default: pass through, else report nothing.
    fn progress(&self, intf: &Interface, progress: &mut JobProgress) -> Result<()> {
        match self.passthru(intf) {
            Some(next) => next.progress(progress),
            None => Ok(()),
        }
    }

    /// Peer asks to be replaced by a new data source. Default: pass
    /// through, else `Err(NotSupported)`.
    fn redirect(&self, intf: &Interface, location: &Location) -> Result<()> {
        match self.passthru(intf) {
            Some(next) => next.redirect(location),
            None => Err(Error::NotSupported),
        }
    }
}

/// Owner of detached endpoints. Never instantiated.
struct Detached;

impl Operations for Detached {}

#[derive(Clone)]
struct Link {
    dest: Interface,
    // Keeps the peer object alive while linked.
    object: Option<Arc<dyn Operations>>,
}

struct Endpoint {
    label: &'static str,
    owner: Weak<dyn Operations>,
    enabled: AtomicBool,
    link: Mutex<Option<Link>>,
}

/// Reference to an interface endpoint.
///
/// Cloning takes another reference to the same endpoint; equality is
/// identity.
#[derive(Clone)]
pub struct Interface {
    core: Arc<Endpoint>,
}

impl Interface {
    /// Endpoint owned by `owner`. Usually built inside `Arc::new_cyclic`.
    pub fn new<T: Operations>(label: &'static str, owner: &Weak<T>) -> Self {
        let owner: Weak<dyn Operations> = owner.clone();
        Self::with_owner(label, owner)
    }

    /// Endpoint with no owning object. Every operation sent to it takes the
    /// default path.
    pub fn detached(label: &'static str) -> Self {
        Self::with_owner(label, Weak::<Detached>::new())
    }

    fn with_owner(label: &'static str, owner: Weak<dyn Operations>) -> Self {
        Self {
            core: Arc::new(Endpoint {
                label,
                owner,
                enabled: AtomicBool::new(true),
                link: Mutex::new(None),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        self.core.label
    }

    /// Current peer, if linked.
    pub fn peer(&self) -> Option<Interface> {
        self.core.link.lock().as_ref().map(|link| link.dest.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.core.link.lock().is_some()
    }

    /// Whether inbound operations are accepted.
    pub fn is_enabled(&self) -> bool {
        self.core.enabled.load(Ordering::Acquire)
    }

    /// Point this endpoint at `dest` (one direction only).
    ///
    /// Any existing link is dropped.
    pub fn plug(&self, dest: &Interface) {
        log::trace!("[INTF] {} plug -> {}", self.label(), dest.label());
        let link = Link {
            dest: dest.clone(),
            object: dest.core.owner.upgrade(),
        };
        let old = self.core.link.lock().replace(link);
        drop(old);
    }

    /// Drop the link, if any.
    pub fn unplug(&self) {
        let old = self.core.link.lock().take();
        if let Some(old) = old {
            log::trace!("[INTF] {} unplug from {}", self.label(), old.dest.label());
        }
    }

    /// Ignore all further inbound operations.
    pub fn nullify(&self) {
        self.core.enabled.store(false, Ordering::Release);
    }

    /// Accept inbound operations again after `nullify()` / `close()`.
    pub fn reinit(&self) {
        self.core.enabled.store(true, Ordering::Release);
    }

    /// Finish with this link.
    ///
    /// Disables this endpoint, detaches the link and tells the peer, once.
    /// Closing an endpoint that is already closed does nothing.
    pub fn close(&self, status: Status) {
        self.nullify();
        let link = self.core.link.lock().take();
        let Some(link) = link else {
            return;
        };
        log::debug!(
            "[INTF] {} close -> {} ({})",
            self.label(),
            link.dest.label(),
            crate::error::describe(&status)
        );
        match link.dest.target() {
            Some((dest, object)) => object.close(&dest, status),
            // Owner gone: nobody will close the peer's side, so drop its
            // reference to us here.
            None if link.dest.is_enabled() => link.dest.unplug(),
            None => {}
        }
        drop(link);
    }

    /// Close, then accept operations again (the endpoint may be re-plugged).
    pub fn restart(&self, status: Status) {
        self.close(status);
        self.reinit();
    }

    /// Splice a filter between this endpoint and its peer.
    ///
    /// `self ↔ upper` and `lower ↔ old peer`. Without a peer, `lower` is
    /// left unplugged.
    pub fn insert(&self, upper: &Interface, lower: &Interface) {
        let dest = self.peer();
        connect(self, upper);
        if let Some(dest) = dest {
            connect(lower, &dest);
        }
    }

    /// The peer endpoint and a strong reference to its object, if the peer
    /// can currently accept operations.
    fn dest_op(&self) -> Option<(Interface, Arc<dyn Operations>)> {
        let dest = self.core.link.lock().as_ref()?.dest.clone();
        dest.target()
    }

    /// This endpoint and its owner, if enabled and alive.
    fn target(&self) -> Option<(Interface, Arc<dyn Operations>)> {
        if !self.is_enabled() {
            return None;
        }
        let object = self.core.owner.upgrade()?;
        Some((self.clone(), object))
    }

    /// Send data to the peer.
    ///
    /// `Err(NotConnected)` if there is nobody to take it.
    pub fn deliver(&self, buf: IoBuffer, meta: &Metadata) -> Result<()> {
        let Some((dest, object)) = self.dest_op() else {
            log::trace!("[INTF] {} deliver {}: not connected", self.label(), buf.len());
            return Err(Error::NotConnected);
        };
        let len = buf.len();
        let rc = object.deliver(&dest, buf, meta);
        if let Err(e) = rc {
            log::debug!("[INTF] {} deliver {} failed: {}", self.label(), len, e);
        }
        rc
    }

    /// Send a copy of `data` at the current position.
    pub fn deliver_raw(&self, data: &[u8]) -> Result<()> {
        self.deliver(IoBuffer::from_slice(data), &Metadata::default())
    }

    /// Send formatted text.
    pub fn printf(&self, args: fmt::Arguments<'_>) -> Result<()> {
        let mut text = String::new();
        fmt::write(&mut text, args).map_err(|_| Error::NoMemory)?;
        self.deliver_raw(text.as_bytes())
    }

    /// Move the peer's stream position to `offset` (zero-length delivery).
    pub fn seek(&self, offset: u64) -> Result<()> {
        log::trace!("[INTF] {} seek to {}", self.label(), offset);
        self.deliver(IoBuffer::default(), &Metadata::at(offset))
    }

    /// Bytes the peer will currently accept. Zero when unconnected.
    pub fn window(&self) -> usize {
        match self.dest_op() {
            Some((dest, object)) => object.window(&dest),
            None => 0,
        }
    }

    /// Send a control message. Dropped when unconnected.
    pub fn signal(&self, signal: Signal) {
        if let Some((dest, object)) = self.dest_op() {
            object.signal(&dest, signal);
        }
    }

    /// Tell the peer our window changed.
    pub fn window_changed(&self) {
        self.signal(Signal::WindowChanged);
    }

    /// Ask the peer for job progress. Untouched when unconnected.
    pub fn progress(&self, progress: &mut JobProgress) -> Result<()> {
        match self.dest_op() {
            Some((dest, object)) => object.progress(&dest, progress),
            None => Ok(()),
        }
    }

    /// Ask the peer to reopen on `location`.
    pub fn redirect(&self, location: &Location) -> Result<()> {
        let Some((dest, object)) = self.dest_op() else {
            return Err(Error::NotConnected);
        };
        log::debug!("[INTF] {} redirect to {}", self.label(), location);
        object.redirect(&dest, location)
    }
}

impl PartialEq for Interface {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for Interface {}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("label", &self.label())
            .field("peer", &self.peer().map(|p| p.label()))
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Plug two endpoints into each other.
pub fn connect(a: &Interface, b: &Interface) {
    a.plug(b);
    b.plug(a);
}

/// Close several endpoints of one object.
///
/// All are disabled first so the closes cannot bounce between them.
pub fn shutdown_all(status: Status, intfs: &[&Interface]) {
    for intf in intfs {
        intf.nullify();
    }
    for intf in intfs {
        intf.close(status);
    }
}
