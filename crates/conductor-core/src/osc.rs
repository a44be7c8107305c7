//! OSC client for sending parameter messages.
//!
//! This is the controlling side of the protocol: it sends `/ai` messages to
//! whoever owns the parameter store (an [`OscReceiver`](crate::OscReceiver)
//! or any other OSC host listening on port 4560).

use crate::error::Result;
use crate::params::ParamValue;
use crate::protocol::{encode_param, AddressMode, DEFAULT_ADDRESS};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::UdpSocket;
use std::sync::Arc;

/// UDP-based OSC client for sending parameter messages.
#[derive(Clone)]
pub struct OscClient {
    /// The underlying UDP socket (None in noop mode).
    sock: Option<Arc<UdpSocket>>,
    /// Target address in "host:port" format.
    pub addr: String,
    /// Base OSC address parameters are sent under.
    pub base: String,
    /// Addressing convention used by [`send_param`](Self::send_param).
    pub mode: AddressMode,
}

impl OscClient {
    /// Create a new OSC client targeting the given address.
    ///
    /// # Arguments
    /// * `addr` - The target address in "host:port" format (e.g., "127.0.0.1:4560")
    ///
    /// # Returns
    /// A new client bound to an ephemeral port, sending `/ai [key, value]`.
    pub fn new<A: Into<String>>(addr: A) -> Result<Self> {
        let sock = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            sock: Some(Arc::new(sock)),
            addr: addr.into(),
            base: DEFAULT_ADDRESS.to_string(),
            mode: AddressMode::Pair,
        })
    }

    /// Create a no-op OSC client for dry runs.
    ///
    /// All send operations will succeed but do nothing.
    pub fn noop() -> Self {
        Self {
            sock: None,
            addr: "noop".to_string(),
            base: DEFAULT_ADDRESS.to_string(),
            mode: AddressMode::Pair,
        }
    }

    /// Use a different base address and addressing convention.
    pub fn with_address<S: Into<String>>(mut self, base: S, mode: AddressMode) -> Self {
        self.base = base.into();
        self.mode = mode;
        self
    }

    /// Check if this client is in noop mode.
    pub fn is_noop(&self) -> bool {
        self.sock.is_none()
    }

    /// Send an OSC message with the given path and arguments.
    pub fn send_msg(&self, path: &str, args: Vec<OscType>) -> Result<()> {
        self.send_packet(&OscPacket::Message(OscMessage {
            addr: path.into(),
            args,
        }))
    }

    /// Send an already-built packet.
    pub fn send_packet(&self, packet: &OscPacket) -> Result<()> {
        let sock = match &self.sock {
            Some(s) => s,
            None => return Ok(()), // noop mode
        };
        let buf = encoder::encode(packet)?;
        sock.send_to(&buf, &self.addr)?;
        Ok(())
    }

    /// Send a single `key = value` parameter message.
    pub fn send_param(&self, key: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let msg = encode_param(&self.base, self.mode, key, &value)?;
        log::debug!("[OSC] -> {} {} {:?}", self.addr, msg.addr, msg.args);
        self.send_packet(&OscPacket::Message(msg))
    }

    /// Send several parameter messages, one packet each, in order.
    ///
    /// Stops at the first failure.
    pub fn send_batch<K, V, I>(&self, items: I) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in items {
            self.send_param(key.as_ref(), value)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for OscClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscClient")
            .field("addr", &self.addr)
            .field("base", &self.base)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn listener() -> UdpSocket {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        sock
    }

    fn recv_message(sock: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; rosc::decoder::MTU];
        let (size, _) = sock.recv_from(&mut buf).unwrap();
        match rosc::decoder::decode_udp(&buf[..size]).unwrap().1 {
            OscPacket::Message(msg) => msg,
            OscPacket::Bundle(_) => panic!("Expected message packet"),
        }
    }

    #[test]
    fn test_osc_client_creation() {
        let client = OscClient::new("127.0.0.1:4560").unwrap();
        assert!(!client.is_noop());
        assert_eq!(client.base, "/ai");
        assert_eq!(client.mode, AddressMode::Pair);
    }

    #[test]
    fn test_noop_client_accepts_everything() {
        let client = OscClient::noop();
        assert!(client.is_noop());
        assert!(client.send_param("energy", 0.8).is_ok());
        assert!(client.send_msg("/anything", vec![]).is_ok());
    }

    #[test]
    fn test_send_param_pair() {
        let sock = listener();
        let client = OscClient::new(sock.local_addr().unwrap().to_string()).unwrap();
        client.send_param("energy", 0.8).unwrap();

        let msg = recv_message(&sock);
        assert_eq!(msg.addr, "/ai");
        assert_eq!(msg.args, vec![OscType::String("energy".into()), OscType::Float(0.8)]);
    }

    #[test]
    fn test_send_param_path() {
        let sock = listener();
        let client = OscClient::new(sock.local_addr().unwrap().to_string())
            .unwrap()
            .with_address("/ai", AddressMode::Path);
        client.send_param("bpm", 130).unwrap();

        let msg = recv_message(&sock);
        assert_eq!(msg.addr, "/ai/bpm/130");
        assert!(msg.args.is_empty());
    }

    #[test]
    fn test_send_batch_in_order() {
        let sock = listener();
        let client = OscClient::new(sock.local_addr().unwrap().to_string()).unwrap();
        client
            .send_batch(vec![("hats", ParamValue::Float(0.4)), ("kick_on", ParamValue::Int(0))])
            .unwrap();

        let first = recv_message(&sock);
        let second = recv_message(&sock);
        assert_eq!(first.args[0], OscType::String("hats".into()));
        assert_eq!(second.args, vec![OscType::String("kick_on".into()), OscType::Int(0)]);
    }

    #[test]
    fn test_send_param_rejects_bad_key() {
        let client = OscClient::noop().with_address("/ai", AddressMode::Path);
        assert!(client.send_param("a/b", 1).is_err());
    }
}
