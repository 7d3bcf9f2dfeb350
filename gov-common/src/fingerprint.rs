use sha2::{Digest, Sha256};

/// 16-character hex prefix of a SHA-256 digest over the given parts, joined
/// by `\0`. Used for spec and batch fingerprints.
pub fn hash_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    let mut s = String::with_capacity(len);
    for b in bytes {
        if s.len() >= len {
            break;
        }
        s.push_str(&format!("{b:02x}"));
    }
    s.truncate(len);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(hash_hex(&["a", "b"]), hash_hex(&["a", "b"]));
        assert_ne!(hash_hex(&["a", "b"]), hash_hex(&["a", "c"]));
    }

    #[test]
    fn is_sixteen_chars() {
        assert_eq!(hash_hex(&["anything"]).len(), 16);
    }
}
