use ucoin_core::hash::{is_sha1_hex, sha1_hex};

/// Hash of a merkle leaf. A leaf that already is a SHA-1 hex digest is
/// used as-is (uppercased); anything else is hashed.
pub fn leaf_hash(leaf: &str) -> String {
    if is_sha1_hex(leaf) {
        leaf.to_ascii_uppercase()
    } else {
        sha1_hex(leaf.as_bytes())
    }
}

/// Parent of two merkle nodes: SHA-1 of their concatenated hex digests.
pub fn node_hash(left: &str, right: &str) -> String {
    let mut buf = String::with_capacity(left.len() + right.len());
    buf.push_str(left);
    buf.push_str(right);
    sha1_hex(buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_are_their_own_leaf() {
        let fpr = "c73882b64b7e72237a2f460ce9cab76d19a8651e";
        assert_eq!(leaf_hash(fpr), fpr.to_ascii_uppercase());
    }

    #[test]
    fn other_leaves_are_hashed() {
        assert_eq!(leaf_hash("abc"), "A9993E364706816ABA3E25717850C26C9CD0D89D");
    }

    #[test]
    fn node_hash_is_order_sensitive() {
        let a = leaf_hash("a");
        let b = leaf_hash("b");
        assert_ne!(node_hash(&a, &b), node_hash(&b, &a));
        assert_eq!(node_hash(&a, &b), sha1_hex(format!("{a}{b}").as_bytes()));
    }
}
