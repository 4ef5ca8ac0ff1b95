//! Interface lifecycle tests

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::Recorder;
use morpheus_core::intf::{connect, shutdown_all, Interface, JobProgress, Location, Operations, Relay};
use morpheus_core::{Error, Status};

#[test]
fn test_close_idempotent() {
    let a = Recorder::new("a");
    let b = Recorder::new("b");
    connect(&a.intf, &b.intf);

    a.intf.close(Err(Error::Code(9)));
    a.intf.close(Ok(()));
    b.intf.close(Ok(()));

    assert_eq!(b.closes(), vec![Err(Error::Code(9))]);
    assert!(a.closes().is_empty());
    assert!(!a.intf.is_connected());
    assert!(!b.intf.is_connected());
}

#[test]
fn test_closed_endpoint_ignores_inbound() {
    let a = Recorder::new("a");
    let b = Recorder::new("b");
    a.intf.plug(&b.intf);
    b.intf.plug(&a.intf);
    b.intf.nullify();

    assert_eq!(a.intf.deliver_raw(b"dropped"), Err(Error::NotConnected));
    assert_eq!(a.intf.window(), 0);
    b.intf.reinit();
    assert_eq!(a.intf.deliver_raw(b"kept"), Ok(()));
    assert_eq!(b.data(), b"kept");
    a.intf.close(Ok(()));
}

#[test]
fn test_restart_allows_replug() {
    let a = Recorder::new("a");
    let b = Recorder::new("b");
    let c = Recorder::new("c");
    connect(&a.intf, &b.intf);
    a.intf.restart(Err(Error::Canceled));
    assert_eq!(b.closes(), vec![Err(Error::Canceled)]);

    connect(&a.intf, &c.intf);
    a.intf.printf(format_args!("retry {}", 2)).unwrap();
    assert_eq!(c.data(), b"retry 2");
    assert!(b.data().is_empty());
}

struct SelfDropping {
    intf: Interface,
    holder: Arc<Mutex<Option<Arc<SelfDropping>>>>,
    seen: Arc<Mutex<Vec<Status>>>,
    drops: Arc<AtomicUsize>,
    marker: Vec<u8>,
}

impl Operations for SelfDropping {
    fn close(&self, intf: &Interface, status: Status) {
        let last = self.holder.lock().unwrap().take();
        drop(last);
        assert_eq!(self.drops.load(Ordering::SeqCst), 0);
        assert_eq!(self.marker, b"alive");
        self.seen.lock().unwrap().push(status);
        intf.close(status);
    }
}

impl Drop for SelfDropping {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_close_handler_dropping_last_reference() {
    let holder = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let drops = Arc::new(AtomicUsize::new(0));

    let obj = Arc::new_cyclic(|me| SelfDropping {
        intf: Interface::new("self-dropping", me),
        holder: holder.clone(),
        seen: seen.clone(),
        drops: drops.clone(),
        marker: b"alive".to_vec(),
    });
    *holder.lock().unwrap() = Some(obj.clone());

    let a = Recorder::new("a");
    connect(&a.intf, &obj.intf);
    drop(obj);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    a.intf.close(Err(Error::Code(1)));

    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![Err(Error::Code(1))]);
    assert!(a.closes().is_empty());
}

#[test]
fn test_cascade_through_relay() {
    let a = Recorder::new("a");
    let c = Recorder::new("c");
    let relay = Relay::new();
    connect(&a.intf, relay.upper());
    connect(relay.lower(), &c.intf);

    a.intf.close(Err(Error::Code(5)));

    assert_eq!(c.closes(), vec![Err(Error::Code(5))]);
    assert!(a.closes().is_empty());
    assert!(!relay.upper().is_connected());
    assert!(!relay.lower().is_connected());
}

#[test]
fn test_relay_forwards_queries() {
    let a = Recorder::new("a");
    let c = Recorder::with_window("c", 1460);
    connect(&a.intf, &c.intf);
    let relay = Relay::new();
    a.intf.insert(relay.upper(), relay.lower());

    assert_eq!(a.intf.window(), 1460);
    assert_eq!(
        a.intf.redirect(&Location::uri("http://mirror/")),
        Err(Error::NotSupported)
    );
    let mut progress = JobProgress::default();
    assert_eq!(a.intf.progress(&mut progress), Ok(()));
    assert_eq!(progress, JobProgress::default());

    c.intf.deliver_raw(b"upstream").unwrap();
    assert_eq!(a.data(), b"upstream");
    shutdown_all(Ok(()), &[relay.upper(), relay.lower()]);
    assert_eq!(a.closes(), vec![Ok(())]);
    assert_eq!(c.closes(), vec![Ok(())]);
}

#[test]
fn test_seek_is_zero_length_delivery() {
    let a = Recorder::new("a");
    let b = Recorder::new("b");
    connect(&a.intf, &b.intf);
    a.intf.seek(4096).unwrap();
    assert!(b.data().is_empty());
    a.intf.close(Ok(()));
}
