//! Negotiated per-peer limits and payload validation (spec §3, §4.4).

use wirecall_proto::{ErrorMask, Payload};

/// Per-peer negotiated integer range and buffer-length ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    /// Largest signed integer the peer accepts.
    pub int_max: i64,
    /// Smallest signed integer the peer accepts.
    pub int_min: i64,
    /// Largest buffer length the peer accepts.
    pub size_max: u64,
    /// Whether a CONNECT exchange has completed for this peer.
    pub initialised: bool,
}

impl HardwareProfile {
    /// The profile before any CONNECT exchange: nothing negotiated, nothing
    /// accepted.
    #[must_use]
    pub const fn uninitialised() -> Self {
        Self { int_max: 0, int_min: 0, size_max: 0, initialised: false }
    }

    /// Derives a profile from a peer's reported integer and size widths (in
    /// bytes). Returns `None` if either width is outside `1..=8`.
    #[must_use]
    pub fn negotiate(int_width: u8, size_width: u8) -> Option<Self> {
        if !(1..=8).contains(&int_width) || !(1..=8).contains(&size_width) {
            return None;
        }

        let int_max =
            if int_width == 8 { i64::MAX } else { (1i64 << (8 * int_width - 1)) - 1 };
        let int_min = -int_max - 1;
        let size_max = if size_width == 8 { u64::MAX } else { (1u64 << (8 * size_width)) - 1 };

        Some(Self { int_max, int_min, size_max, initialised: true })
    }

    /// Validates `payload` against this profile, returning every applicable
    /// error bit (spec §4.4). `payload` is `None` to represent "missing
    /// entirely"; a present payload's buffer absence/presence is already
    /// guaranteed consistent with its length by [`Payload::new`] and the
    /// wire decoder, so `DATA_INVALID` here only fires on a missing payload.
    #[must_use]
    pub fn validate_payload(&self, payload: Option<&Payload>) -> ErrorMask {
        let mut mask = ErrorMask::NONE;

        if !self.initialised {
            mask |= ErrorMask::CXN_INVALID;
        }

        match payload {
            None => mask |= ErrorMask::DATA_INVALID,
            Some(payload) => {
                if payload.i < self.int_min || payload.i > self.int_max {
                    mask |= ErrorMask::DATA_INT_OVF;
                }
                if payload.buf_len() > self.size_max {
                    mask |= ErrorMask::DATA_BUFF_OVF;
                }
            },
        }

        mask
    }
}
