//! The per-connection protocol state machine, server and client sides
//! (spec §4.5).
//!
//! Both sides are expressed the same way the teacher's connection state
//! machine is: pure functions over an explicit state struct that take an
//! already-decoded message and return a semantic reply/action rather than
//! touching a socket. The dispatcher (server crate) and the client's
//! transport loop own the actual `Read`/`Write` calls and the wire-level
//! framing; this module only decides *what* the reply should be.

use wirecall_proto::{ErrorMask, Payload};

use crate::{profile::HardwareProfile, registry::Registry};

/// This implementation's own integer and size field widths: both fields are
/// always `i64`/`u64`, 8 bytes wide.
pub const LOCAL_INT_WIDTH: u8 = 8;
/// See [`LOCAL_INT_WIDTH`].
pub const LOCAL_SIZE_WIDTH: u8 = 8;

/// Server-side connection state (spec §3 "Connection state", §4.5 state
/// diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No CONNECT exchange has completed yet.
    Fresh,
    /// CONNECT completed; FIND/CALL are accepted.
    Ready,
    /// DISCONNECT received, or the connection loop is tearing down.
    Closed,
}

/// The semantic outcome of handling one request, before wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    /// Reply to a successful CONNECT with this implementation's own widths.
    ConnectOk {
        /// This side's integer field width, in bytes.
        int_width: u8,
        /// This side's size field width, in bytes.
        size_width: u8,
    },
    /// Reply to a successful FUNC_FIND with the resolved digest.
    FindOk {
        /// The digest clients should cache as an opaque handle.
        digest: u64,
    },
    /// Reply to a successful FUNC_CALL with the handler's output.
    CallOk {
        /// The handler's return payload.
        payload: Payload,
    },
    /// An RTN_ERROR reply carrying one or more error bits.
    Error(ErrorMask),
}

/// What the connection loop should do after handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Send `reply`, then keep serving this connection.
    Reply(ServerReply),
    /// Tear the connection down without sending anything (DISCONNECT).
    Close,
}

/// Server-side per-connection state: negotiated peer profile plus the
/// `fresh`/`ready`/`closed` state from spec §4.5.
#[derive(Debug, Clone)]
pub struct ServerConnectionState {
    state: ServerState,
    profile: HardwareProfile,
}

impl Default for ServerConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConnectionState {
    /// A fresh connection, profile uninitialised.
    #[must_use]
    pub fn new() -> Self {
        Self { state: ServerState::Fresh, profile: HardwareProfile::uninitialised() }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The negotiated peer profile (uninitialised until CONNECT succeeds).
    #[must_use]
    pub fn profile(&self) -> HardwareProfile {
        self.profile
    }

    /// Handles a CONNECT request carrying the peer's reported widths.
    ///
    /// Re-CONNECT on an already-`Ready` connection is accepted and simply
    /// renegotiates the profile; the spec does not forbid it and the
    /// reference implementation performs no such check either.
    pub fn handle_connect(&mut self, int_width: u8, size_width: u8) -> ServerAction {
        match HardwareProfile::negotiate(int_width, size_width) {
            Some(profile) => {
                self.profile = profile;
                self.state = ServerState::Ready;
                ServerAction::Reply(ServerReply::ConnectOk {
                    int_width: LOCAL_INT_WIDTH,
                    size_width: LOCAL_SIZE_WIDTH,
                })
            },
            None => ServerAction::Reply(ServerReply::Error(ErrorMask::DATA_INVALID)),
        }
    }

    /// Handles a FUNC_FIND request for `name`.
    ///
    /// An invalid name can never have been registered, so it is reported the
    /// same way an unregistered valid name is: `FUNC_NOT_FOUND`.
    pub fn handle_find(&self, registry: &Registry, name: &[u8]) -> ServerAction {
        if !self.profile.initialised {
            return ServerAction::Reply(ServerReply::Error(ErrorMask::CXN_INVALID));
        }
        match crate::registry::digest_of_name(name) {
            Some(digest) if registry.lookup_by_digest(digest).is_some() => {
                ServerAction::Reply(ServerReply::FindOk { digest })
            },
            _ => ServerAction::Reply(ServerReply::Error(ErrorMask::FUNC_NOT_FOUND)),
        }
    }

    /// Handles a FUNC_CALL request for `digest` with decoded input `payload`.
    pub fn handle_call(&self, registry: &Registry, digest: u64, payload: Payload) -> ServerAction {
        if !self.profile.initialised {
            return ServerAction::Reply(ServerReply::Error(ErrorMask::CXN_INVALID));
        }
        let Some(handler) = registry.lookup_by_digest(digest) else {
            return ServerAction::Reply(ServerReply::Error(ErrorMask::HNDL_INVALID));
        };

        let output = handler(payload);
        let mask = self.profile.validate_payload(Some(&output));
        if mask.is_none() {
            ServerAction::Reply(ServerReply::CallOk { payload: output })
        } else {
            ServerAction::Reply(ServerReply::Error(mask))
        }
    }

    /// Handles a DISCONNECT request: no reply, connection torn down.
    pub fn handle_disconnect(&mut self) -> ServerAction {
        self.state = ServerState::Closed;
        ServerAction::Close
    }

    /// Handles an unrecognised message tag: current state is preserved.
    pub fn handle_unknown_tag(&self) -> ServerAction {
        ServerAction::Reply(ServerReply::Error(ErrorMask::MSG_INVALID))
    }

    /// Handles a request body that was not terminated by END.
    pub fn handle_missing_end(&self) -> ServerAction {
        ServerAction::Reply(ServerReply::Error(ErrorMask::PKT_INVALID))
    }
}

/// Client-side per-connection state: just the negotiated server profile,
/// used to validate outbound requests before they are ever framed (spec
/// §4.4's "the client validates the outbound request against the server's
/// negotiated profile before transmitting").
#[derive(Debug, Clone)]
pub struct ClientConnectionState {
    profile: HardwareProfile,
}

impl Default for ClientConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConnectionState {
    /// A client with no negotiated server profile yet.
    #[must_use]
    pub fn new() -> Self {
        Self { profile: HardwareProfile::uninitialised() }
    }

    /// The negotiated server profile.
    #[must_use]
    pub fn profile(&self) -> HardwareProfile {
        self.profile
    }

    /// Records the server's reported widths after a successful CONNECT
    /// exchange. Returns `false` (and leaves the profile untouched) if the
    /// reported widths are out of range.
    #[must_use]
    pub fn apply_connect_reply(&mut self, int_width: u8, size_width: u8) -> bool {
        match HardwareProfile::negotiate(int_width, size_width) {
            Some(profile) => {
                self.profile = profile;
                true
            },
            None => false,
        }
    }

    /// Validates an outbound payload against the server's negotiated
    /// profile before it is transmitted.
    #[must_use]
    pub fn validate_outbound(&self, payload: &Payload) -> ErrorMask {
        self.profile.validate_payload(Some(payload))
    }
}
