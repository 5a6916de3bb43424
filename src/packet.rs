// src/packet.rs
//! Control-message framing and UDP helpers.
//!
//! A frame carries one control message:
//!
//! ```text
//! magic(1) version(1) opcode_len(1) opcode(opcode_len) body_len(2, BE) body(body_len)
//! ```
//!
//! The body is the message's keyed encoding serialized as JSON. The engines
//! never see frames; only the driver does.

use std::io::{self, Cursor, Read};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde_json::Value;

use crate::data::ControlMessage;
use crate::error::FrameError;

/// Default control port and link-local multicast group.
pub const CONTROL_PORT: u16 = 5680;
pub const MULTICAST_V4_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 112);

/// One framed control message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: String,
    pub body: Value,
}

impl Frame {
    pub const MAGIC: u8 = 0x53;
    pub const VERSION: u8 = 1;

    pub fn new(opcode: impl Into<String>, body: Value) -> Self {
        Frame {
            opcode: opcode.into(),
            body,
        }
    }

    pub fn from_message(msg: &ControlMessage) -> Self {
        Frame::new(msg.opcode(), msg.to_value())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        let opcode = self.opcode.as_bytes();
        let opcode_len = u8::try_from(opcode.len()).map_err(|_| FrameError::TooLong(opcode.len()))?;
        let body = serde_json::to_vec(&self.body)?;
        let body_len = u16::try_from(body.len()).map_err(|_| FrameError::TooLong(body.len()))?;

        let mut buf = Vec::with_capacity(5 + opcode.len() + body.len());
        buf.write_u8(Self::MAGIC)?;
        buf.write_u8(Self::VERSION)?;
        buf.write_u8(opcode_len)?;
        buf.extend_from_slice(opcode);
        buf.write_u16::<BigEndian>(body_len)?;
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, FrameError> {
        let mut cur = Cursor::new(buf);
        let magic = cur.read_u8()?;
        let version = cur.read_u8()?;
        if magic != Self::MAGIC || version != Self::VERSION {
            return Err(FrameError::BadHeader { magic, version });
        }

        let opcode_len = cur.read_u8()? as usize;
        let mut opcode = vec![0; opcode_len];
        cur.read_exact(&mut opcode)?;
        let opcode = String::from_utf8(opcode).map_err(|_| FrameError::BadOpcode)?;

        let body_len = cur.read_u16::<BigEndian>()? as usize;
        let mut body = vec![0; body_len];
        cur.read_exact(&mut body)?;
        let body = serde_json::from_slice(&body)?;

        Ok(Frame { opcode, body })
    }

    pub fn send_to(&self, socket: &UdpSocket, dest: SocketAddr) -> io::Result<usize> {
        let buf = self
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        socket.send_to(&buf, dest)
    }

    pub fn recv(socket: &UdpSocket, buf: &mut [u8]) -> io::Result<(Frame, SocketAddr)> {
        let (amt, src) = socket.recv_from(buf)?;
        let frame = Frame::from_bytes(&buf[..amt])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok((frame, src))
    }
}

/// Bind the control port and join the IPv4 multicast group on `interface`.
pub fn bind_multicast_v4(interface: Ipv4Addr) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, CONTROL_PORT))?;
    socket.join_multicast_v4(&MULTICAST_V4_ADDR, &interface)?;
    // Don't receive our own multicast packets.
    socket.set_multicast_loop_v4(false)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MessageHello, RouterId};
    use serde_json::json;
    use std::thread;

    fn hello_frame() -> Frame {
        let msg = MessageHello::new("R1", "area", [RouterId::from("R2")]);
        Frame::from_message(&ControlMessage::Hello(msg))
    }

    #[test]
    fn hello_frame_layout() {
        let bytes = hello_frame().to_bytes().unwrap();
        assert_eq!(bytes[0], Frame::MAGIC);
        assert_eq!(bytes[1], Frame::VERSION);
        assert_eq!(bytes[2], 5);
        assert_eq!(&bytes[3..8], b"HELLO");
        let body_len = u16::from_be_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!(bytes.len(), 10 + body_len);
    }

    #[test]
    fn frame_decodes_to_message() {
        let bytes = hello_frame().to_bytes().unwrap();
        let frame = Frame::from_bytes(&bytes).unwrap();
        let msg = ControlMessage::decode(&frame.opcode, &frame.body).unwrap();
        let ControlMessage::Hello(hello) = msg else {
            panic!("expected a hello");
        };
        assert_eq!(hello.id, "R1");
        assert!(hello.is_seen("R2"));
    }

    #[test]
    fn rejects_bad_header_and_truncation() {
        assert!(matches!(
            Frame::from_bytes(&[0x00, 1, 0, 0, 0]),
            Err(FrameError::BadHeader { magic: 0, version: 1 })
        ));

        let bytes = hello_frame().to_bytes().unwrap();
        assert!(matches!(
            Frame::from_bytes(&bytes[..bytes.len() - 3]),
            Err(FrameError::Truncated(_))
        ));
    }

    #[test]
    fn rejects_oversized_opcode() {
        let frame = Frame::new("X".repeat(300), json!({}));
        assert!(matches!(frame.to_bytes(), Err(FrameError::TooLong(300))));
    }

    #[test]
    fn send_recv_local() {
        let server = UdpSocket::bind(("127.0.0.1", 0)).expect("bind failed");
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let client = UdpSocket::bind(("127.0.0.1", 0)).expect("bind failed");
            hello_frame().send_to(&client, addr).expect("send failed");
        });
        let mut buf = [0u8; 1500];
        let (frame, _src) = Frame::recv(&server, &mut buf).expect("recv failed");
        assert_eq!(frame, hello_frame());
        handle.join().unwrap();
    }
}
