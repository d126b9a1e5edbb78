//! In-process host runtime.
//!
//! Ports are mailboxes: a client binds a port, the family unicasts confirms
//! into it and the client drains it with [`LoopbackRuntime::recv`].

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::transport::{FamilyId, FamilySpec, FamilyTable, RegisteredFamily, Transport};

#[derive(Debug, Default)]
struct Inner {
    families: FamilyTable,
    mailboxes: HashMap<u32, VecDeque<Bytes>>,
}

/// Thread-safe loopback runtime
#[derive(Debug, Default)]
pub struct LoopbackRuntime {
    inner: Mutex<Inner>,
}

impl LoopbackRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| ProtocolError::LockPoisoned)
    }

    /// Open a mailbox for `port_id`; port 0 is reserved
    pub fn bind(&self, port_id: u32) -> Result<()> {
        if port_id == 0 {
            return Err(ProtocolError::Invalid(
                crate::error::constants::ERR_ZERO_PORT,
            ));
        }
        self.lock()?.mailboxes.entry(port_id).or_default();
        Ok(())
    }

    /// Close a mailbox, dropping anything still queued
    pub fn close(&self, port_id: u32) -> Result<()> {
        self.lock()?.mailboxes.remove(&port_id);
        Ok(())
    }

    /// Pop the oldest message delivered to `port_id`
    pub fn recv(&self, port_id: u32) -> Result<Option<Bytes>> {
        Ok(self
            .lock()?
            .mailboxes
            .get_mut(&port_id)
            .and_then(VecDeque::pop_front))
    }

    /// Number of messages waiting on `port_id`
    pub fn pending(&self, port_id: u32) -> Result<usize> {
        Ok(self
            .lock()?
            .mailboxes
            .get(&port_id)
            .map_or(0, VecDeque::len))
    }

    /// Look a family up by name
    pub fn resolve(&self, name: &str) -> Result<Option<RegisteredFamily>> {
        Ok(self.lock()?.families.resolve(name).cloned())
    }
}

impl Transport for LoopbackRuntime {
    fn register_family(&self, spec: &FamilySpec) -> Result<FamilyId> {
        self.lock()?.families.register(spec)
    }

    fn unregister_family(&self, id: FamilyId) -> Result<()> {
        self.lock()?.families.unregister(id)
    }

    fn unicast(&self, port_id: u32, message: Bytes) -> Result<()> {
        let mut inner = self.lock()?;
        match inner.mailboxes.get_mut(&port_id) {
            Some(mailbox) => {
                debug!(port_id, bytes = message.len(), "Loopback delivery");
                mailbox.push_back(message);
                Ok(())
            }
            None => {
                warn!(port_id, "Unicast to unbound port");
                Err(ProtocolError::SendFailure {
                    port_id,
                    reason: "no such port".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_reaches_only_bound_port() {
        let rt = LoopbackRuntime::new();
        rt.bind(1).unwrap();
        rt.bind(2).unwrap();

        rt.unicast(2, Bytes::from_static(b"x")).unwrap();
        assert_eq!(rt.pending(1).unwrap(), 0);
        assert_eq!(rt.recv(2).unwrap(), Some(Bytes::from_static(b"x")));
        assert_eq!(rt.recv(2).unwrap(), None);
    }

    #[test]
    fn test_unicast_to_unbound_port_fails() {
        let rt = LoopbackRuntime::new();
        assert!(matches!(
            rt.unicast(9, Bytes::new()),
            Err(ProtocolError::SendFailure { port_id: 9, .. })
        ));
    }

    #[test]
    fn test_port_zero_reserved() {
        let rt = LoopbackRuntime::new();
        assert!(rt.bind(0).is_err());
    }

    #[test]
    fn test_close_drops_mailbox() {
        let rt = LoopbackRuntime::new();
        rt.bind(3).unwrap();
        rt.unicast(3, Bytes::from_static(b"y")).unwrap();
        rt.close(3).unwrap();
        assert!(rt.unicast(3, Bytes::new()).is_err());
    }
}
