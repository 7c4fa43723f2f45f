//! The per-connection loop: reads one request, hands it to
//! [`ServerConnectionState`], writes the reply, repeats until DISCONNECT or a
//! transport failure (spec §4.5, §4.6).

#![allow(clippy::expect_used, reason = "registry lock poisoning should panic")]

use std::{net::TcpStream, sync::RwLock};

use wirecall_core::{
    protocol::{ServerAction, ServerReply},
    Registry, ServerConnectionState,
};
use wirecall_proto::{wire, ErrorMask, MessageTag, Payload, ProtocolError, END};

/// Drives one connection's request/reply loop until DISCONNECT, an unknown
/// tag opening a message that turns out unrecoverable, or a short read/write.
///
/// A short read or write propagates as `Err` and the caller closes the
/// socket; it is never retried, matching spec §4.5's failure semantics.
pub fn serve(mut stream: TcpStream, registry: &RwLock<Registry>) -> Result<(), ProtocolError> {
    let mut conn = ServerConnectionState::new();

    loop {
        let tag_byte = wire::read_u8(&mut stream)?;

        let action = match MessageTag::from_u8(tag_byte) {
            Some(MessageTag::Connect) => handle_connect(&mut stream, &mut conn)?,
            Some(MessageTag::FuncFind) => handle_find(&mut stream, &conn, registry)?,
            Some(MessageTag::FuncCall) => handle_call(&mut stream, &conn, registry)?,
            Some(MessageTag::Disconnect) => conn.handle_disconnect(),
            // END/RTN_SUCCESS/RTN_ERROR never open a client request.
            Some(MessageTag::End | MessageTag::RtnSuccess | MessageTag::RtnError) | None => {
                conn.handle_unknown_tag()
            },
        };

        match action {
            ServerAction::Reply(reply) => send_reply(&mut stream, &reply)?,
            ServerAction::Close => return Ok(()),
        }
    }
}

fn handle_connect(
    stream: &mut TcpStream,
    conn: &mut ServerConnectionState,
) -> Result<ServerAction, ProtocolError> {
    let int_width = wire::read_u8(stream)?;
    let size_width = wire::read_u8(stream)?;
    if wire::read_u8(stream)? != END {
        return Ok(conn.handle_missing_end());
    }
    Ok(conn.handle_connect(int_width, size_width))
}

fn handle_find(
    stream: &mut TcpStream,
    conn: &ServerConnectionState,
    registry: &RwLock<Registry>,
) -> Result<ServerAction, ProtocolError> {
    let name_len = wire::read_u16_be(stream)?;
    let name = wire::read_exact(stream, usize::from(name_len))?;
    if wire::read_u8(stream)? != END {
        return Ok(conn.handle_missing_end());
    }
    if name_len == 0 {
        return Ok(conn.handle_missing_end());
    }
    let registry = registry.read().expect("registry lock poisoned");
    Ok(conn.handle_find(&registry, &name))
}

fn handle_call(
    stream: &mut TcpStream,
    conn: &ServerConnectionState,
    registry: &RwLock<Registry>,
) -> Result<ServerAction, ProtocolError> {
    let payload = match Payload::decode(stream) {
        Ok(payload) => payload,
        Err(ProtocolError::Disconnected) => return Err(ProtocolError::Disconnected),
        Err(_) => {
            // The client already sent digest+END as part of this same
            // message; drain them so the next tag byte read stays in sync.
            wire::read_u64_be(stream)?;
            wire::read_u8(stream)?;
            return Ok(ServerAction::Reply(ServerReply::Error(ErrorMask::DATA_INVALID)));
        },
    };
    let digest = wire::read_u64_be(stream)?;
    if wire::read_u8(stream)? != END {
        return Ok(conn.handle_missing_end());
    }
    let registry = registry.read().expect("registry lock poisoned");
    Ok(conn.handle_call(&registry, digest, payload))
}

fn send_reply(stream: &mut TcpStream, reply: &ServerReply) -> Result<(), ProtocolError> {
    match reply {
        ServerReply::ConnectOk { int_width, size_width } => {
            wire::write_u8(stream, MessageTag::RtnSuccess.to_u8())?;
            wire::write_u8(stream, *int_width)?;
            wire::write_u8(stream, *size_width)?;
        },
        ServerReply::FindOk { digest } => {
            wire::write_u8(stream, MessageTag::RtnSuccess.to_u8())?;
            wire::write_u64_be(stream, *digest)?;
        },
        ServerReply::CallOk { payload } => {
            wire::write_u8(stream, MessageTag::RtnSuccess.to_u8())?;
            payload.encode(stream)?;
        },
        ServerReply::Error(mask) => {
            wire::write_u8(stream, MessageTag::RtnError.to_u8())?;
            wire::write_u8(stream, mask.to_byte())?;
        },
    }
    wire::write_u8(stream, END)
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::{TcpListener, TcpStream},
        sync::{Arc, RwLock},
        thread,
    };

    use wirecall_core::Registry;
    use wirecall_proto::{wire, MessageTag, Payload, END};

    use super::serve;

    fn spawn_loopback() -> (TcpStream, thread::JoinHandle<Result<(), wirecall_proto::ProtocolError>>, Arc<RwLock<Registry>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let registry = Arc::new(RwLock::new(Registry::new()));
        registry.write().unwrap().insert(b"echo", Arc::new(|p: Payload| p)).unwrap();

        let registry_for_server = Arc::clone(&registry);
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, &registry_for_server)
        });

        let client = TcpStream::connect(addr).unwrap();
        (client, handle, registry)
    }

    #[test]
    fn full_exchange_connect_find_call_disconnect() {
        let (mut client, handle, _registry) = spawn_loopback();

        // CONNECT
        wire::write_u8(&mut client, MessageTag::Connect.to_u8()).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, END).unwrap();

        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnSuccess.to_u8());
        assert_eq!(wire::read_u8(&mut client).unwrap(), 8);
        assert_eq!(wire::read_u8(&mut client).unwrap(), 8);
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        // FUNC_FIND "echo"
        wire::write_u8(&mut client, MessageTag::FuncFind.to_u8()).unwrap();
        wire::write_u16_be(&mut client, 4).unwrap();
        client.write_all(b"echo").unwrap();
        wire::write_u8(&mut client, END).unwrap();

        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnSuccess.to_u8());
        let digest = wire::read_u64_be(&mut client).unwrap();
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        // FUNC_CALL
        wire::write_u8(&mut client, MessageTag::FuncCall.to_u8()).unwrap();
        Payload::int_only(42).encode(&mut client).unwrap();
        wire::write_u64_be(&mut client, digest).unwrap();
        wire::write_u8(&mut client, END).unwrap();

        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnSuccess.to_u8());
        let reply_payload = Payload::decode(&mut client).unwrap();
        assert_eq!(reply_payload, Payload::int_only(42));
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        // DISCONNECT
        wire::write_u8(&mut client, MessageTag::Disconnect.to_u8()).unwrap();
        drop(client);

        handle.join().unwrap().unwrap();
    }

    #[test]
    fn unknown_tag_before_connect_gets_msg_invalid_then_recovers() {
        let (mut client, handle, _registry) = spawn_loopback();

        wire::write_u8(&mut client, 0x00).unwrap();
        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnError.to_u8());
        let mask = wirecall_proto::ErrorMask::from_byte(wire::read_u8(&mut client).unwrap());
        assert!(mask.contains(wirecall_proto::ErrorMask::MSG_INVALID));
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        wire::write_u8(&mut client, MessageTag::Disconnect.to_u8()).unwrap();
        drop(client);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn find_before_connect_is_cxn_invalid() {
        let (mut client, handle, _registry) = spawn_loopback();

        wire::write_u8(&mut client, MessageTag::FuncFind.to_u8()).unwrap();
        wire::write_u16_be(&mut client, 4).unwrap();
        client.write_all(b"echo").unwrap();
        wire::write_u8(&mut client, END).unwrap();

        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnError.to_u8());
        let mask = wirecall_proto::ErrorMask::from_byte(wire::read_u8(&mut client).unwrap());
        assert!(mask.contains(wirecall_proto::ErrorMask::CXN_INVALID));

        wire::write_u8(&mut client, MessageTag::Disconnect.to_u8()).unwrap();
        drop(client);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn missing_end_byte_reports_pkt_invalid_and_stays_open() {
        let (mut client, handle, _registry) = spawn_loopback();

        wire::write_u8(&mut client, MessageTag::Connect.to_u8()).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, 0x00).unwrap(); // not END

        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnError.to_u8());
        let mask = wirecall_proto::ErrorMask::from_byte(wire::read_u8(&mut client).unwrap());
        assert!(mask.contains(wirecall_proto::ErrorMask::PKT_INVALID));
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        // Connection is still open: a well-formed CONNECT now succeeds.
        wire::write_u8(&mut client, MessageTag::Connect.to_u8()).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, END).unwrap();
        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnSuccess.to_u8());

        wire::write_u8(&mut client, MessageTag::Disconnect.to_u8()).unwrap();
        drop(client);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn empty_name_find_is_pkt_invalid_not_func_not_found() {
        let (mut client, handle, _registry) = spawn_loopback();

        wire::write_u8(&mut client, MessageTag::Connect.to_u8()).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, END).unwrap();
        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnSuccess.to_u8());
        assert_eq!(wire::read_u8(&mut client).unwrap(), 8);
        assert_eq!(wire::read_u8(&mut client).unwrap(), 8);
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        wire::write_u8(&mut client, MessageTag::FuncFind.to_u8()).unwrap();
        wire::write_u16_be(&mut client, 0).unwrap();
        wire::write_u8(&mut client, END).unwrap();

        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnError.to_u8());
        let mask = wirecall_proto::ErrorMask::from_byte(wire::read_u8(&mut client).unwrap());
        assert!(mask.contains(wirecall_proto::ErrorMask::PKT_INVALID));
        assert!(!mask.contains(wirecall_proto::ErrorMask::FUNC_NOT_FOUND));
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        wire::write_u8(&mut client, MessageTag::Disconnect.to_u8()).unwrap();
        drop(client);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn malformed_call_payload_drains_trailing_bytes_and_stays_open() {
        let (mut client, handle, _registry) = spawn_loopback();

        wire::write_u8(&mut client, MessageTag::Connect.to_u8()).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, 8).unwrap();
        wire::write_u8(&mut client, END).unwrap();
        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnSuccess.to_u8());
        assert_eq!(wire::read_u8(&mut client).unwrap(), 8);
        assert_eq!(wire::read_u8(&mut client).unwrap(), 8);
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        // A FUNC_CALL whose payload flags byte has INT clear is malformed:
        // the flags byte, the digest, and the END byte that would normally
        // follow a well-formed payload all still cross the wire.
        wire::write_u8(&mut client, MessageTag::FuncCall.to_u8()).unwrap();
        wire::write_u8(&mut client, 0x00).unwrap(); // flags: INT clear
        wire::write_u64_be(&mut client, 0).unwrap(); // digest
        wire::write_u8(&mut client, END).unwrap();

        assert_eq!(wire::read_u8(&mut client).unwrap(), MessageTag::RtnError.to_u8());
        let mask = wirecall_proto::ErrorMask::from_byte(wire::read_u8(&mut client).unwrap());
        assert!(mask.contains(wirecall_proto::ErrorMask::DATA_INVALID));
        assert_eq!(wire::read_u8(&mut client).unwrap(), END);

        // The connection is still in sync: the next tag byte is read as a
        // fresh tag, not as leftover digest/END bytes from the call above.
        wire::write_u8(&mut client, MessageTag::Disconnect.to_u8()).unwrap();
        drop(client);
        handle.join().unwrap().unwrap();
    }
}
