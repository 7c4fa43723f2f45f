//! Client-side error types.

use thiserror::Error;
use wirecall_proto::ErrorMask;

/// Errors from driving a [`crate::Client`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// A transport-level failure: short read/write, disconnected peer, or a
    /// malformed frame the client itself could not parse.
    #[error(transparent)]
    Protocol(#[from] wirecall_proto::ProtocolError),

    /// The server rejected the negotiated widths in a CONNECT reply (out of
    /// `1..=8`). The reference server never sends this, but a conforming
    /// client still guards against a misbehaving one.
    #[error("server reported an invalid width negotiation")]
    BadConnectReply,

    /// The outbound payload was rejected by the client's own validation
    /// against the server's negotiated profile before anything was sent.
    #[error("outbound payload rejected: {0}")]
    OutboundRejected(ErrorMask),

    /// The server replied RTN_ERROR.
    #[error("server returned an error: {0}")]
    Remote(ErrorMask),
}
