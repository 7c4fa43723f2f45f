//! wirecall client: drives the CONNECT/FUNC_FIND/FUNC_CALL/DISCONNECT
//! exchange over a single `TcpStream` (spec §4.4, §4.5).

pub mod error;

use std::net::{TcpStream, ToSocketAddrs};

pub use error::ClientError;
use wirecall_core::{
    protocol::{LOCAL_INT_WIDTH, LOCAL_SIZE_WIDTH},
    ClientConnectionState,
};
use wirecall_proto::{wire, MessageTag, Payload, ProtocolError, END};

/// An opaque handle to a procedure resolved by FUNC_FIND, valid only for the
/// connection it was resolved on.
pub type Handle = u64;

/// A connected wirecall client.
pub struct Client {
    stream: TcpStream,
    conn: ClientConnectionState,
}

impl Client {
    /// Connects to `addr` and runs the CONNECT handshake, negotiating this
    /// implementation's own (8-byte, 8-byte) widths against whatever the
    /// server reports back.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] on any transport failure,
    /// [`ClientError::BadConnectReply`] if the server's reported widths are
    /// out of `1..=8`, or [`ClientError::Remote`] if the server refuses the
    /// handshake.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let mut stream = TcpStream::connect(addr).map_err(|_| ProtocolError::Disconnected)?;

        wire::write_u8(&mut stream, MessageTag::Connect.to_u8())?;
        wire::write_u8(&mut stream, LOCAL_INT_WIDTH)?;
        wire::write_u8(&mut stream, LOCAL_SIZE_WIDTH)?;
        wire::write_u8(&mut stream, END)?;

        let mut conn = ClientConnectionState::new();
        match read_reply_tag(&mut stream)? {
            MessageTag::RtnSuccess => {
                let int_width = wire::read_u8(&mut stream)?;
                let size_width = wire::read_u8(&mut stream)?;
                expect_end(&mut stream)?;
                if !conn.apply_connect_reply(int_width, size_width) {
                    return Err(ClientError::BadConnectReply);
                }
            },
            MessageTag::RtnError => return Err(read_remote_error(&mut stream)?),
            _ => return Err(ProtocolError::PacketInvalid.into()),
        }

        Ok(Self { stream, conn })
    }

    /// Resolves `name` to a [`Handle`] via FUNC_FIND.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] (carrying `FUNC_NOT_FOUND` or
    /// `CXN_INVALID`) if the server rejects the lookup, or
    /// [`ClientError::Protocol`] (carrying `InvalidName`) if `name` is longer
    /// than 65535 bytes — rejected before anything is sent, since the
    /// length prefix can't represent it — or on a transport failure.
    pub fn find(&mut self, name: &[u8]) -> Result<Handle, ClientError> {
        let name_len = u16::try_from(name.len()).map_err(|_| ProtocolError::InvalidName)?;

        wire::write_u8(&mut self.stream, MessageTag::FuncFind.to_u8())?;
        wire::write_u16_be(&mut self.stream, name_len)?;
        wire::write_all(&mut self.stream, name)?;
        wire::write_u8(&mut self.stream, END)?;

        match read_reply_tag(&mut self.stream)? {
            MessageTag::RtnSuccess => {
                let digest = wire::read_u64_be(&mut self.stream)?;
                expect_end(&mut self.stream)?;
                Ok(digest)
            },
            MessageTag::RtnError => Err(read_remote_error(&mut self.stream)?),
            _ => Err(ProtocolError::PacketInvalid.into()),
        }
    }

    /// Invokes the procedure behind `handle` with `payload`, returning its
    /// result.
    ///
    /// The payload is validated against the server's negotiated profile
    /// before anything is sent; a payload that would overflow the server's
    /// integer or buffer limits is rejected locally as
    /// [`ClientError::OutboundRejected`] rather than round-tripped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::OutboundRejected`] if the payload fails local
    /// validation, [`ClientError::Remote`] if the server rejects the call, or
    /// [`ClientError::Protocol`] on a transport failure.
    pub fn call(&mut self, handle: Handle, payload: Payload) -> Result<Payload, ClientError> {
        let mask = self.conn.validate_outbound(&payload);
        if !mask.is_none() {
            return Err(ClientError::OutboundRejected(mask));
        }

        wire::write_u8(&mut self.stream, MessageTag::FuncCall.to_u8())?;
        payload.encode(&mut self.stream)?;
        wire::write_u64_be(&mut self.stream, handle)?;
        wire::write_u8(&mut self.stream, END)?;

        match read_reply_tag(&mut self.stream)? {
            MessageTag::RtnSuccess => {
                let result = Payload::decode(&mut self.stream)?;
                expect_end(&mut self.stream)?;
                Ok(result)
            },
            MessageTag::RtnError => Err(read_remote_error(&mut self.stream)?),
            _ => Err(ProtocolError::PacketInvalid.into()),
        }
    }

    /// Sends DISCONNECT and consumes the client. Best-effort: a transport
    /// failure here is not reported, since the caller is tearing the
    /// connection down anyway.
    pub fn close(mut self) {
        let _ = wire::write_u8(&mut self.stream, MessageTag::Disconnect.to_u8());
    }
}

fn read_reply_tag(stream: &mut TcpStream) -> Result<MessageTag, ClientError> {
    let byte = wire::read_u8(stream)?;
    MessageTag::from_u8(byte).ok_or_else(|| ProtocolError::UnknownTag(byte).into())
}

fn read_remote_error(stream: &mut TcpStream) -> Result<ClientError, ProtocolError> {
    let mask = wirecall_proto::ErrorMask::from_byte(wire::read_u8(stream)?);
    expect_end(stream)?;
    Ok(ClientError::Remote(mask))
}

fn expect_end(stream: &mut TcpStream) -> Result<(), ProtocolError> {
    if wire::read_u8(stream)? == END {
        Ok(())
    } else {
        Err(ProtocolError::PacketInvalid)
    }
}
