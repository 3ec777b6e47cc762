use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const ED25519: &str = "ssh-ed25519";

/// An `ssh-ed25519` key line with a deterministic blob derived from `seed`.
pub fn ed25519_key_seeded(seed: u8, comment: &str) -> String {
    let mut blob = Vec::with_capacity(4 + ED25519.len() + 4 + 32);
    blob.extend_from_slice(&(ED25519.len() as u32).to_be_bytes());
    blob.extend_from_slice(ED25519.as_bytes());
    blob.extend_from_slice(&32u32.to_be_bytes());
    blob.extend((0..32u8).map(|i| i.wrapping_mul(7).wrapping_add(seed)));

    let encoded = STANDARD.encode(blob);
    if comment.is_empty() {
        format!("{} {}", ED25519, encoded)
    } else {
        format!("{} {} {}", ED25519, encoded, comment)
    }
}

/// An `ssh-ed25519` key line with the given comment.
pub fn ed25519_key(comment: &str) -> String {
    ed25519_key_seeded(1, comment)
}

/// Newline-separated listing of `count` distinct keys, like a `.keys` endpoint.
pub fn listing(count: u8) -> String {
    (0..count)
        .map(|i| ed25519_key_seeded(i, &format!("key-{}", i)))
        .map(|line| line + "\n")
        .collect()
}
