/*!
 * Content Checksums
 */

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_sensitive() {
        assert_ne!(sha256_hex(b"KEY=a\n"), sha256_hex(b"KEY=b\n"));
    }
}
