use crate::Fault;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex-encoded SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Checks that a staged file exists and is non-empty, then hashes it
///
/// Returns the content hash and byte size. Anything else is an
/// [`Fault::Integrity`], which the download retry loop treats like any other
/// failed attempt.
pub async fn verify_staged(path: &Path) -> Result<(String, u64), Fault> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        Fault::integrity(format!("staged file {} missing: {}", path.display(), e))
    })?;

    if metadata.len() == 0 {
        return Err(Fault::integrity(format!(
            "staged file {} is empty",
            path.display()
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    Ok((sha256_hex(&bytes), bytes.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_verify_staged_ok() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.part");
        std::fs::write(&path, b"abc").unwrap();

        let (hash, size) = verify_staged(&path).await.unwrap();
        assert_eq!(hash, sha256_hex(b"abc"));
        assert_eq!(size, 3);
    }

    #[tokio::test]
    async fn test_verify_staged_rejects_missing_and_empty() {
        let dir = TempDir::new().unwrap();

        let missing = verify_staged(&dir.path().join("nope.part")).await;
        assert!(matches!(missing, Err(Fault::Integrity(_))));

        let empty = dir.path().join("empty.part");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            verify_staged(&empty).await,
            Err(Fault::Integrity(_))
        ));
    }
}
