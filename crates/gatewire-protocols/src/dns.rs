//! DNS-over-TCP probe (RFC 1035 §4.2.2, RFC 7766). Sends a length-prefixed
//! NS query for the root zone and reports the response code and answer
//! count from the reply header.

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::debug;
use gatewire_core::adapter::read_frame;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Frame, GatewayError, Handshake, Interactivity,
    ProbeOutcome, ProtocolAdapter, Result, Transport, TransportKind,
};
use gatewire_framing::{Decoded, LengthPrefixCodec, PrefixWidth};

const MAX_MESSAGE: usize = 16 * 1024;
const QUERY_ID: u16 = 0x6757;
const HEADER_LEN: usize = 12;

const TYPE_NS: u16 = 2;
const CLASS_IN: u16 = 1;
const FLAG_RD: u16 = 0x0100;
const FLAG_QR: u16 = 0x8000;

pub struct DnsAdapter {
    descriptor: AdapterDescriptor,
    codec: LengthPrefixCodec,
}

impl DnsAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "dns",
                TransportKind::Tcp,
                Interactivity::Probe,
                AuthMode::None,
                "RFC 1035",
            )
            .with_max_frame(MAX_MESSAGE),
            codec: LengthPrefixCodec::new(PrefixWidth::U16, MAX_MESSAGE),
        }
    }

    /// Recursion-desired NS query for the root zone.
    fn root_ns_query(&self) -> Result<Bytes> {
        let mut message = BytesMut::with_capacity(HEADER_LEN + 5);
        message.put_u16(QUERY_ID);
        message.put_u16(FLAG_RD);
        message.put_u16(1); // one question
        message.put_u16(0);
        message.put_u16(0);
        message.put_u16(0);
        message.put_u8(0); // root label
        message.put_u16(TYPE_NS);
        message.put_u16(CLASS_IN);
        Ok(self.codec.encode(&message)?)
    }
}

impl Default for DnsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for DnsAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        transport.write_all(&self.root_ns_query()?).await?;

        let mut buf = BytesMut::new();
        let Frame::Packet(mut message) = read_frame(self, transport, &mut buf).await? else {
            return Err(GatewayError::ProtocolViolation(
                "dns decode yielded a non-packet frame".to_string(),
            ));
        };
        if message.len() < HEADER_LEN {
            return Err(GatewayError::ProtocolViolation(format!(
                "DNS reply of {} bytes is shorter than the header",
                message.len()
            )));
        }

        let id = message.get_u16();
        if id != QUERY_ID {
            return Err(GatewayError::ProtocolViolation(format!(
                "DNS reply id {id:#06x} does not match the query"
            )));
        }
        let flags = message.get_u16();
        if flags & FLAG_QR == 0 {
            return Err(GatewayError::ProtocolViolation(
                "DNS reply does not have the response flag set".to_string(),
            ));
        }
        let _qdcount = message.get_u16();
        let ancount = message.get_u16();
        debug!("root NS reply: rcode={} answers={}", flags & 0x000f, ancount);

        let mut metadata = serde_json::Map::new();
        metadata.insert("rcode".to_string(), (flags & 0x000f).into());
        metadata.insert("answers".to_string(), ancount.into());
        metadata.insert(
            "recursion_available".to_string(),
            (flags & 0x0080 != 0).into(),
        );
        Ok(Handshake::Complete(ProbeOutcome::ok(metadata)))
    }

    fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        match self.codec.decode(buf)? {
            Decoded::Frame { frame, consumed } => {
                buf.advance(consumed);
                Ok(Some(Frame::Packet(frame)))
            }
            Decoded::NeedMore => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewire_core::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn reply(id: u16, flags: u16, ancount: u16) -> Vec<u8> {
        let mut message = BytesMut::new();
        message.put_u16(id);
        message.put_u16(flags);
        message.put_u16(1);
        message.put_u16(ancount);
        message.put_u16(0);
        message.put_u16(0);
        LengthPrefixCodec::new(PrefixWidth::U16, 1024)
            .encode(&message)
            .unwrap()
            .to_vec()
    }

    async fn probe_against(reply_bytes: Vec<u8>) -> Result<Handshake> {
        let (near, mut far) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let mut prefix = [0u8; 2];
            far.read_exact(&mut prefix).await.unwrap();
            let len = u16::from_be_bytes(prefix) as usize;
            let mut query = vec![0u8; len];
            far.read_exact(&mut query).await.unwrap();
            // Root NS question: null label, type NS, class IN.
            assert_eq!(&query[12..], &[0, 0, 2, 0, 1]);

            far.write_all(&reply_bytes).await.unwrap();
        });

        let adapter = DnsAdapter::new();
        let mut transport = Transport::from_stream(near);
        adapter
            .handshake(&mut transport, &ConnectOptions::new("target", 53))
            .await
    }

    #[tokio::test]
    async fn reports_rcode_and_answer_count() {
        let flags = FLAG_QR | FLAG_RD | 0x0080; // response, RD, RA
        let Handshake::Complete(outcome) =
            probe_against(reply(QUERY_ID, flags, 13)).await.unwrap()
        else {
            panic!("dns must complete as a probe");
        };

        assert!(outcome.success);
        assert_eq!(outcome.metadata["rcode"].as_u64().unwrap(), 0);
        assert_eq!(outcome.metadata["answers"].as_u64().unwrap(), 13);
        assert!(outcome.metadata["recursion_available"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn mismatched_id_is_a_protocol_violation() {
        let err = probe_against(reply(0x1234, FLAG_QR, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[tokio::test]
    async fn non_response_is_a_protocol_violation() {
        let err = probe_against(reply(QUERY_ID, FLAG_RD, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
        assert!(err.to_string().contains("response flag"));
    }
}
