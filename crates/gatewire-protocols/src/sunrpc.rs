//! ONC-RPC probe (RFC 5531). Sends a record-marked NULL call to the
//! portmapper program and checks that the reply is an accepted RPC
//! response, which is enough to tell a real rpcbind from a mute port.

use async_trait::async_trait;
use bytes::{Buf, BufMut, BytesMut};
use log::debug;
use gatewire_core::adapter::read_frame;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Frame, GatewayError, Handshake, Interactivity,
    ProbeOutcome, ProtocolAdapter, Result, Transport, TransportKind,
};
use gatewire_framing::{Decoded, RecordMarkCodec};

const PORTMAP_PROGRAM: u32 = 100_000;
const PORTMAP_VERSION: u32 = 2;
const PROC_NULL: u32 = 0;
const RPC_VERSION: u32 = 2;
const MSG_CALL: u32 = 0;
const MSG_REPLY: u32 = 1;
const REPLY_ACCEPTED: u32 = 0;
const XID: u32 = 0x6774_7772;

const MAX_RECORD: usize = 8 * 1024;

pub struct SunRpcAdapter {
    descriptor: AdapterDescriptor,
    codec: RecordMarkCodec,
}

impl SunRpcAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "sunrpc",
                TransportKind::Tcp,
                Interactivity::Probe,
                AuthMode::None,
                "RFC 5531",
            )
            .with_max_frame(MAX_RECORD),
            codec: RecordMarkCodec::new(MAX_RECORD),
        }
    }

    fn null_call(&self) -> Result<bytes::Bytes> {
        let mut body = BytesMut::with_capacity(40);
        body.put_u32(XID);
        body.put_u32(MSG_CALL);
        body.put_u32(RPC_VERSION);
        body.put_u32(PORTMAP_PROGRAM);
        body.put_u32(PORTMAP_VERSION);
        body.put_u32(PROC_NULL);
        // AUTH_NONE credential and verifier, both empty.
        body.put_u32(0);
        body.put_u32(0);
        body.put_u32(0);
        body.put_u32(0);
        Ok(self.codec.encode(&body)?)
    }
}

impl Default for SunRpcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn read_u32(buf: &mut impl Buf, field: &str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(GatewayError::ProtocolViolation(format!(
            "RPC reply truncated before {field}"
        )));
    }
    Ok(buf.get_u32())
}

#[async_trait]
impl ProtocolAdapter for SunRpcAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        let sent_at = std::time::Instant::now();
        transport.write_all(&self.null_call()?).await?;

        let mut buf = BytesMut::new();
        let Frame::Record(record) = read_frame(self, transport, &mut buf).await? else {
            return Err(GatewayError::ProtocolViolation(
                "sunrpc decode yielded a non-record frame".to_string(),
            ));
        };

        let mut record = record;
        let xid = read_u32(&mut record, "xid")?;
        if xid != XID {
            return Err(GatewayError::ProtocolViolation(format!(
                "RPC reply xid {xid:#010x} does not match the call"
            )));
        }
        let msg_type = read_u32(&mut record, "message type")?;
        if msg_type != MSG_REPLY {
            return Err(GatewayError::ProtocolViolation(format!(
                "expected an RPC reply, got message type {msg_type}"
            )));
        }
        let reply_stat = read_u32(&mut record, "reply status")?;
        debug!("portmapper NULL reply: stat={}", reply_stat);

        let mut metadata = serde_json::Map::new();
        metadata.insert("program".to_string(), PORTMAP_PROGRAM.into());
        metadata.insert("version".to_string(), PORTMAP_VERSION.into());
        metadata.insert("accepted".to_string(), (reply_stat == REPLY_ACCEPTED).into());
        metadata.insert(
            "rtt_ms".to_string(),
            (sent_at.elapsed().as_millis() as u64).into(),
        );
        Ok(Handshake::Complete(ProbeOutcome::ok(metadata)))
    }

    fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        match self.codec.decode(buf)? {
            Decoded::Frame { frame, consumed } => {
                buf.advance(consumed);
                Ok(Some(Frame::Record(frame)))
            }
            Decoded::NeedMore => Ok(None),
        }
    }
}
