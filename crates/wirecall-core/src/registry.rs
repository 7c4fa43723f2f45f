//! Name → handler registry with stable 64-bit digests (spec §4.3).

use std::sync::Arc;

use wirecall_proto::Payload;

use crate::error::RegistryError;

/// A registered procedure: a plain function from an input payload to an
/// output payload. `Arc` rather than `Box` so `Registry::digest_of` can
/// answer the reverse-lookup question by pointer identity.
pub type Handler = Arc<dyn Fn(Payload) -> Payload + Send + Sync>;

/// Base prime for the polynomial rolling hash.
const DIGEST_BASE: u64 = 97;

/// The largest prime below 2^64 (2^64 − 59).
const DIGEST_MODULUS: u64 = u64::MAX - 58;

/// Sentinel returned by [`Registry::digest_of`] for an unregistered handler.
/// No real digest can collide with it since digests are always `< DIGEST_MODULUS`.
pub const DIGEST_NOT_FOUND: u64 = u64::MAX;

const NAME_MIN_BYTE: u8 = 0x20;
const NAME_MAX_BYTE: u8 = 0x84;
const NAME_MAX_LEN: usize = u16::MAX as usize;

/// Checks a procedure name against the valid byte range and length ceiling.
pub fn validate_name(name: &[u8]) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    if name.len() > NAME_MAX_LEN {
        return Err(RegistryError::NameTooLong);
    }
    for &byte in name {
        if !(NAME_MIN_BYTE..=NAME_MAX_BYTE).contains(&byte) {
            return Err(RegistryError::InvalidByte(byte));
        }
    }
    Ok(())
}

/// Computes the digest of a name already known to be valid, via Horner's
/// method: `acc = (acc * base + contribution) mod modulus`, contribution
/// `byte - 0x20 + 1`.
fn digest_of_valid_name(name: &[u8]) -> u64 {
    name.iter().fold(0u64, |acc, &byte| {
        let contribution = u64::from(byte - NAME_MIN_BYTE + 1);
        (acc.wrapping_mul(DIGEST_BASE).wrapping_add(contribution)) % DIGEST_MODULUS
    })
}

/// Computes the digest of `name`, or `None` if the name is invalid.
#[must_use]
pub fn digest_of_name(name: &[u8]) -> Option<u64> {
    validate_name(name).ok()?;
    Some(digest_of_valid_name(name))
}

/// Maps procedure names to handlers by digest.
///
/// Append-only with update-in-place: re-registering a name replaces its
/// handler but keeps the original digest and insertion slot. `remove` shifts
/// later entries down by one (`Vec::remove`), preserving order rather than
/// swapping in the last entry — the reference hash table's deletion path
/// underflows its offset arithmetic when the removed entry is the last one,
/// and a linear shift avoids that class of bug entirely.
#[derive(Default)]
pub struct Registry {
    entries: Vec<(u64, Handler)>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers `handler` under `name`. Replaces the existing handler in
    /// place if `name`'s digest is already present.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if `name` fails validation.
    pub fn insert(&mut self, name: &[u8], handler: Handler) -> Result<u64, RegistryError> {
        validate_name(name)?;
        let digest = digest_of_valid_name(name);
        match self.entries.iter_mut().find(|(d, _)| *d == digest) {
            Some(entry) => entry.1 = handler,
            None => self.entries.push((digest, handler)),
        }
        Ok(digest)
    }

    /// Looks up a handler by name, or `None` if invalid or unregistered.
    #[must_use]
    pub fn lookup_by_name(&self, name: &[u8]) -> Option<Handler> {
        let digest = digest_of_name(name)?;
        self.lookup_by_digest(digest)
    }

    /// Looks up a handler by digest.
    #[must_use]
    pub fn lookup_by_digest(&self, digest: u64) -> Option<Handler> {
        self.entries.iter().find(|(d, _)| *d == digest).map(|(_, h)| Handler::clone(h))
    }

    /// Reverse-looks-up the digest bound to `handler` by pointer identity, or
    /// [`DIGEST_NOT_FOUND`] if no entry currently points at it.
    #[must_use]
    pub fn digest_of(&self, handler: &Handler) -> u64 {
        self.entries
            .iter()
            .find(|(_, h)| Arc::ptr_eq(h, handler))
            .map_or(DIGEST_NOT_FOUND, |(d, _)| *d)
    }

    /// Removes the entry registered under `name`, if any, preserving the
    /// relative order of the remaining entries. A no-op if `name` is invalid
    /// or unregistered.
    pub fn remove(&mut self, name: &[u8]) {
        let Some(digest) = digest_of_name(name) else { return };
        if let Some(pos) = self.entries.iter().position(|(d, _)| *d == digest) {
            self.entries.remove(pos);
        }
    }

    /// Number of registered procedures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no procedures are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> Handler {
        Arc::new(|p: Payload| p)
    }

    #[test]
    fn valid_name_accepted() {
        assert!(validate_name(b"echo").is_ok());
        assert!(validate_name(&[0x20; 1]).is_ok());
        assert!(validate_name(&[0x84; 1]).is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        assert_eq!(validate_name(b""), Err(RegistryError::EmptyName));
    }

    #[test]
    fn out_of_range_byte_rejected() {
        assert_eq!(validate_name(&[0x1F]), Err(RegistryError::InvalidByte(0x1F)));
        assert_eq!(validate_name(&[0x85]), Err(RegistryError::InvalidByte(0x85)));
    }

    #[test]
    fn overlong_name_rejected() {
        let name = vec![b'a'; NAME_MAX_LEN + 1];
        assert_eq!(validate_name(&name), Err(RegistryError::NameTooLong));
    }

    #[test]
    fn digest_is_deterministic() {
        let a = digest_of_name(b"echo").unwrap();
        let b = digest_of_name(b"echo").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn digest_differs_across_distinct_names() {
        let names: &[&[u8]] = &[b"echo", b"copy", b"add", b"subtract", b"noop"];
        let digests: Vec<u64> = names.iter().map(|n| digest_of_name(n).unwrap()).collect();
        for (i, a) in digests.iter().enumerate() {
            for (j, b) in digests.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "collision between {:?} and {:?}", names[i], names[j]);
                }
            }
        }
    }

    #[test]
    fn insert_then_lookup_by_name_and_digest() {
        let mut registry = Registry::new();
        let handler = echo_handler();
        let digest = registry.insert(b"echo", handler.clone()).unwrap();

        assert!(registry.lookup_by_name(b"echo").is_some());
        assert!(registry.lookup_by_digest(digest).is_some());
        assert_eq!(registry.digest_of(&handler), digest);
    }

    #[test]
    fn reregistration_is_idempotent_and_updates_in_place() {
        let mut registry = Registry::new();
        let first = echo_handler();
        let second = echo_handler();

        let d1 = registry.insert(b"echo", first.clone()).unwrap();
        assert_eq!(registry.len(), 1);

        let d2 = registry.insert(b"echo", second.clone()).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.digest_of(&first), DIGEST_NOT_FOUND);
        assert_eq!(registry.digest_of(&second), d2);
    }

    #[test]
    fn invalid_registration_fails() {
        let mut registry = Registry::new();
        assert!(registry.insert(b"", echo_handler()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_preserves_order_of_remaining_entries() {
        let mut registry = Registry::new();
        let d_a = registry.insert(b"alpha", echo_handler()).unwrap();
        let d_b = registry.insert(b"bravo", echo_handler()).unwrap();
        let d_c = registry.insert(b"charlie", echo_handler()).unwrap();

        registry.remove(b"bravo");

        assert_eq!(registry.len(), 2);
        assert!(registry.lookup_by_digest(d_a).is_some());
        assert!(registry.lookup_by_digest(d_b).is_none());
        assert!(registry.lookup_by_digest(d_c).is_some());
    }

    #[test]
    fn remove_last_entry_does_not_panic() {
        let mut registry = Registry::new();
        registry.insert(b"only", echo_handler()).unwrap();
        registry.remove(b"only");
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_absent_name_is_a_no_op() {
        let mut registry = Registry::new();
        registry.insert(b"echo", echo_handler()).unwrap();
        registry.remove(b"nope");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_by_digest_not_found_sentinel_never_collides() {
        let mut registry = Registry::new();
        registry.insert(b"echo", echo_handler()).unwrap();
        assert!(registry.lookup_by_digest(DIGEST_NOT_FOUND).is_none());
    }

    proptest::proptest! {
        #[test]
        fn digest_never_equals_sentinel(
            name in proptest::collection::vec(0x20u8..=0x84u8, 1..64)
        ) {
            let digest = digest_of_name(&name).unwrap();
            proptest::prop_assert_ne!(digest, DIGEST_NOT_FOUND);
            proptest::prop_assert!(digest < DIGEST_MODULUS);
        }
    }
}
