//! 32-bit FNV-1a
//!
//! Trivial to reimplement identically on any peer; not a cryptographic hash.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over raw bytes
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// FNV-1a over the UTF-8 bytes of `input`
pub fn fnv1a32_str(input: &str) -> u32 {
    fnv1a32(input.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(fnv1a32_str("foobar"), 0xbf9c_f968);
        assert_eq!(fnv1a32_str(""), 0x811c_9dc5);
        assert_eq!(fnv1a32_str("a"), 0xe40c_292c);
    }
}
