//! FNV-1a (32-bit) fingerprint used to detect value changes between passes.
//! Not a security primitive.

/// Change-detection fingerprint of a property value
pub type Fingerprint = u32;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

#[must_use]
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
