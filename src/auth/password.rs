use anyhow::Context;
use tracing::error;

/// Salted one-way hash of a plaintext password. bcrypt is CPU-bound, so the
/// work runs on the blocking pool. Plaintext is never logged.
pub async fn hash_password(plain: &str, cost: u32) -> anyhow::Result<String> {
    let plain = plain.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .context("hash task panicked")?
        .map_err(|e| {
            error!(error = %e, "bcrypt hash error");
            anyhow::anyhow!(e.to_string())
        })?;
    Ok(hash)
}

/// Constant-time verification of a plaintext against a stored hash.
pub async fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .context("verify task panicked")?
        .map_err(|e| {
            error!(error = %e, "bcrypt parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
    Ok(ok)
}
