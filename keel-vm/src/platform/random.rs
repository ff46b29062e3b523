//! Cryptographic randomness from the host.

use rand::{
    rngs::OsRng,
    RngCore,
};

/// Fill `out` with cryptographically secure random bytes.
///
/// Panics if the host RNG is unavailable; an engine cannot run without
/// one.
pub fn random_bytes(out: &mut [u8]) {
    OsRng
        .try_fill_bytes(out)
        .expect("host random number generator unavailable");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_not_constant() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        random_bytes(&mut a);
        random_bytes(&mut b);
        assert_ne!(a, b);
    }
}
