use sha1::{Digest, Sha1};

/// SHA-1 of arbitrary bytes as uppercase hex (40 characters).
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode_upper(Sha1::digest(data))
}

/// True if `s` already looks like an uppercase or lowercase SHA-1 digest.
pub fn is_sha1_hex(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(sha1_hex(b"abc"), "A9993E364706816ABA3E25717850C26C9CD0D89D");
        assert!(is_sha1_hex("A9993E364706816ABA3E25717850C26C9CD0D89D"));
        assert!(!is_sha1_hex("abc"));
    }
}
