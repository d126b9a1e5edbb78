use bytes::Bytes;

use crate::config::DEFAULT_MESSAGE_CAPACITY;
use crate::core::attr::{self, AttrSet};
use crate::core::message::{Endpoint, Message, MessageBuffer, MessageHeader, FLAG_REQUEST};
use crate::error::{ProtocolError, Result};
use crate::protocol::command::{
    ctrl_attr, info_conf_attr, param_conf_attr, param_req_attr, Command, CTRL_POLICY,
    INFO_CONF_POLICY, PARAM_CONF_POLICY,
};
use crate::transport::FamilyId;

/// Builds requests addressed to one resolved family
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder {
    family: FamilyId,
    version: u8,
}

impl RequestBuilder {
    pub fn new(family: FamilyId, version: u8) -> Self {
        Self { family, version }
    }

    pub fn family(&self) -> FamilyId {
        self.family
    }

    fn message(&self, command: Command, endpoint: Endpoint) -> Result<MessageBuffer> {
        let header = MessageHeader::new(
            self.family.get(),
            command.id(),
            self.version,
            endpoint,
            FLAG_REQUEST,
        );
        MessageBuffer::new(header, DEFAULT_MESSAGE_CAPACITY)
    }

    /// `GET_INFO_REQUEST` carrying the empty request marker
    pub fn get_info_request(&self, endpoint: Endpoint) -> Result<Bytes> {
        let mut msg = self.message(Command::GetInfoRequest, endpoint)?;
        msg.put_marker(ctrl_attr::GET_INFO_REQ)?;
        Ok(msg.finish())
    }

    /// `SET_PARAM_REQUEST` carrying `{ DEBUG_LEVEL = level }`
    pub fn set_param_request(&self, endpoint: Endpoint, level: u16) -> Result<Bytes> {
        let mut msg = self.message(Command::SetParamRequest, endpoint)?;
        let nest = msg.nest_start(ctrl_attr::SET_PARAM_REQ)?;
        msg.put_u16(param_req_attr::DEBUG_LEVEL, level)?;
        msg.nest_end(nest)?;
        Ok(msg.finish())
    }
}

/// A decoded confirm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    Info { debug_level: u16, module_version: String },
    Param { status: u16 },
}

/// Decode a confirm sent by the control family
pub fn parse_confirm(raw: &[u8]) -> Result<(MessageHeader, Confirm)> {
    let message = Message::parse(raw)?;
    let attrs = attr::decode(message.payload, &CTRL_POLICY)?;

    let confirm = match Command::try_from(message.header.command)? {
        Command::GetInfoConfirm => {
            let children = attrs
                .get_nested(ctrl_attr::GET_INFO_CONF)
                .ok_or(ProtocolError::MissingAttribute("GET_INFO_CONF"))?;
            let info = AttrSet::from_nested(children, &INFO_CONF_POLICY)?;
            Confirm::Info {
                debug_level: info
                    .get_u16(info_conf_attr::DEBUG_LEVEL)
                    .ok_or(ProtocolError::MissingAttribute("GET_INFO_CONF_DEBUG_LEVEL"))?,
                module_version: info
                    .get_str(info_conf_attr::MODULE_VERSION)
                    .ok_or(ProtocolError::MissingAttribute("GET_INFO_CONF_MODULE_VERSION"))?
                    .to_string(),
            }
        }
        Command::SetParamConfirm => {
            let children = attrs
                .get_nested(ctrl_attr::SET_PARAM_CONF)
                .ok_or(ProtocolError::MissingAttribute("SET_PARAM_CONF"))?;
            let param = AttrSet::from_nested(children, &PARAM_CONF_POLICY)?;
            Confirm::Param {
                status: param
                    .get_u16(param_conf_attr::STATUS)
                    .ok_or(ProtocolError::MissingAttribute("SET_PARAM_CONF_STATUS"))?,
            }
        }
        other => return Err(ProtocolError::UnknownCommand(other.id())),
    };

    Ok((message.header, confirm))
}

#[cfg(unix)]
pub use local_client::LocalClient;

#[cfg(unix)]
mod local_client {
    use std::path::Path;
    use std::time::Duration;

    use bytes::{Bytes, BytesMut};
    use futures::{SinkExt, StreamExt};
    use tokio::net::UnixStream;
    use tokio_util::codec::Framed;
    use tracing::{debug, instrument};

    use super::{parse_confirm, Confirm, RequestBuilder};
    use crate::config::ControlConfig;
    use crate::core::codec::MessageCodec;
    use crate::core::message::{Endpoint, MessageHeader};
    use crate::error::{ProtocolError, Result};
    use crate::transport::ctrl::{self, FamilyInfo};
    use crate::transport::local;

    /// Client for a family served by the local socket runtime
    ///
    /// The runtime assigns the port id, so requests go out with port 0 and
    /// confirms are matched by sequence number.
    pub struct LocalClient {
        framed: Framed<UnixStream, MessageCodec>,
        family: FamilyInfo,
        requests: RequestBuilder,
        sequence: u32,
        response_timeout: Duration,
    }

    impl LocalClient {
        /// Connect and resolve `family_name` through the control family
        ///
        /// An unknown family gets no answer and surfaces as `Timeout`.
        #[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
        pub async fn connect<P: AsRef<Path>>(
            path: P,
            family_name: &str,
            response_timeout: Duration,
        ) -> Result<Self> {
            let mut framed = local::connect(path).await?;

            let sequence = 1;
            framed
                .send(ctrl::resolve_request(Endpoint::new(0, sequence), family_name)?)
                .await?;
            let reply = recv_sequence(&mut framed, sequence, response_timeout).await?;
            let (_, family) = ctrl::parse_family_info(&reply)?;
            debug!(family = %family.name, id = family.id.get(), "Family resolved");

            let requests = RequestBuilder::new(family.id, family.version as u8);
            Ok(Self {
                framed,
                family,
                requests,
                sequence,
                response_timeout,
            })
        }

        /// Connect to the configured socket and family
        ///
        /// Uses `server.socket_path`, `family.name` and `server.response_timeout`.
        pub async fn connect_with_config(config: &ControlConfig) -> Result<Self> {
            Self::connect(
                &config.server.socket_path,
                &config.family.name,
                config.server.response_timeout,
            )
            .await
        }

        pub fn family(&self) -> &FamilyInfo {
            &self.family
        }

        fn next_endpoint(&mut self) -> Endpoint {
            self.sequence = self.sequence.wrapping_add(1);
            Endpoint::new(0, self.sequence)
        }

        async fn exchange(&mut self, request: Bytes) -> Result<(MessageHeader, Confirm)> {
            self.framed.send(request).await?;
            let raw = recv_sequence(&mut self.framed, self.sequence, self.response_timeout).await?;
            parse_confirm(&raw)
        }

        /// Current debug level and module version
        #[instrument(skip(self), level = "debug")]
        pub async fn get_info(&mut self) -> Result<(u16, String)> {
            let endpoint = self.next_endpoint();
            let request = self.requests.get_info_request(endpoint)?;
            match self.exchange(request).await? {
                (_, Confirm::Info {
                    debug_level,
                    module_version,
                }) => Ok((debug_level, module_version)),
                (header, _) => Err(ProtocolError::UnknownCommand(header.command)),
            }
        }

        /// Set the debug level; returns the confirm status
        #[instrument(skip(self), level = "debug")]
        pub async fn set_debug_level(&mut self, level: u16) -> Result<u16> {
            let endpoint = self.next_endpoint();
            let request = self.requests.set_param_request(endpoint, level)?;
            match self.exchange(request).await? {
                (_, Confirm::Param { status }) => Ok(status),
                (header, _) => Err(ProtocolError::UnknownCommand(header.command)),
            }
        }
    }

    /// Wait for the frame answering `sequence`, bounded by `response_timeout`
    async fn recv_sequence(
        framed: &mut Framed<UnixStream, MessageCodec>,
        sequence: u32,
        response_timeout: Duration,
    ) -> Result<BytesMut> {
        tokio::time::timeout(response_timeout, next_with_sequence(framed, sequence))
            .await
            .map_err(|_| ProtocolError::Timeout)?
    }

    async fn next_with_sequence(
        framed: &mut Framed<UnixStream, MessageCodec>,
        sequence: u32,
    ) -> Result<BytesMut> {
        loop {
            let frame = framed
                .next()
                .await
                .ok_or(ProtocolError::ConnectionClosed)??;
            let header = MessageHeader::decode(&frame)?;
            if header.sequence == sequence {
                return Ok(frame);
            }
            debug!(expected = sequence, got = header.sequence, "Dropping stale frame");
        }
    }
}
