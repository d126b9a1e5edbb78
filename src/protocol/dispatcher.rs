//! Family registration, inbound dispatch and teardown.

use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::core::attr;
use crate::core::message::Message;
use crate::debugf;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::command::ctrl_attr;
use crate::protocol::handlers::RequestContext;
use crate::protocol::registry;
use crate::protocol::response::ResponseBuilder;
use crate::protocol::state::ControlState;
use crate::transport::{FamilyId, FamilySpec, Transport};
use crate::utils::metrics::{Metrics, Timer};

/// A control family registered with a host runtime
///
/// Messages are only accepted between [`register`](Self::register) and
/// [`unregister`](Self::unregister); dropping a registered family unregisters
/// it. Each call to [`handle`](Self::handle) runs to completion: decode,
/// handler, confirm.
pub struct Family<T: Transport> {
    transport: T,
    id: Option<FamilyId>,
    name: String,
    version: u8,
    capacity: usize,
    state: ControlState,
    metrics: Metrics,
}

impl<T: Transport> Family<T> {
    /// Register the family with `transport`
    ///
    /// A registration failure is fatal to the family: no `Family` is returned.
    /// The family section of `config` is validated first, so a family that
    /// could never fit a confirm is refused before it reaches the runtime.
    pub fn register(transport: T, config: &ControlConfig) -> Result<Self> {
        let errors = config.family.validate();
        if !errors.is_empty() {
            return Err(ProtocolError::Registration(errors.join("; ")));
        }

        let spec = FamilySpec {
            name: config.family.name.clone(),
            version: config.family.version,
            max_attr: ctrl_attr::MAX,
            ops: registry::op_specs(),
            multicast_groups: config.family.multicast_groups.clone(),
        };

        let id = transport.register_family(&spec)?;
        info!(
            family = %spec.name,
            id = id.get(),
            version = spec.version,
            debug_level = config.module.debug_level,
            "Control family ready"
        );

        Ok(Self {
            transport,
            id: Some(id),
            name: spec.name,
            version: spec.version,
            capacity: config.family.message_capacity,
            state: ControlState::new(config.module.debug_level, config.module.version.clone()),
            metrics: Metrics::new(),
        })
    }

    /// Handle one inbound message
    ///
    /// Exactly one confirm is unicast to the requester on success. Malformed
    /// or unknown requests return an error and send nothing.
    pub fn handle(&self, raw: &[u8]) -> Result<()> {
        let id = self.id.ok_or(ProtocolError::NotRegistered)?;
        let _timer = Timer::start("handle");
        self.metrics.request_received(raw.len() as u64);

        let result = self.dispatch(id, raw);
        if let Err(ref e) = result {
            if e.is_rejection() {
                self.metrics.request_rejected();
                debugf!(self.state.debug_level(), 4, error = %e, "request dropped");
            } else {
                warn!(family = %self.name, error = %e, "Request failed");
            }
        }
        result
    }

    fn dispatch(&self, id: FamilyId, raw: &[u8]) -> Result<()> {
        let message = Message::parse(raw)?;
        if message.header.family != id.get() {
            return Err(ProtocolError::Invalid(constants::ERR_FAMILY_MISMATCH));
        }
        let endpoint = message.endpoint()?;

        let op = registry::lookup(message.header.command)?;
        let attrs = attr::decode(message.payload, op.policy)?;

        let responder = ResponseBuilder::new(
            &self.transport,
            id,
            self.version,
            self.capacity,
            &self.state,
            &self.metrics,
        );
        let ctx = RequestContext {
            endpoint,
            state: &self.state,
            responder: &responder,
        };
        (op.handler)(&ctx, &attrs)
    }

    pub fn id(&self) -> Option<FamilyId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    /// Unregister from the runtime and reset the family state
    ///
    /// Runs once; later calls and the drop are no-ops. Errors are logged,
    /// never returned. Messages handled afterwards fail with `NotRegistered`.
    pub fn unregister(&mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        self.metrics.log_metrics(&self.name);
        if let Err(e) = self.transport.unregister_family(id) {
            warn!(family = %self.name, error = %e, "Failed to unregister family");
        } else {
            debug!(family = %self.name, "Family unregistered");
        }
        self.state.reset();
    }
}

impl<T: Transport> Drop for Family<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
