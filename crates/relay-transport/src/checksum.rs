//! SHA-256 helpers for download verification

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::TransportError;

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Stream a file through SHA-256 without holding it in memory.
pub async fn sha256_file(path: &Path) -> Result<String, TransportError> {
    let mut file = File::open(path).await.map_err(|e| {
        TransportError::transfer(path.display().to_string(), format!("failed to open: {e}"))
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await.map_err(|e| {
            TransportError::transfer(path.display().to_string(), format!("read failed: {e}"))
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
