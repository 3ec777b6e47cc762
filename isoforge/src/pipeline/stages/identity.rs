//! Stage 1: Identity resolution.

use crate::pipeline::types::{IdentityInput, IdentityOutput};
use isoforge_shared::ForgeResult;

/// Fetch and validate the identity's public keys.
pub async fn run(input: IdentityInput<'_>) -> ForgeResult<IdentityOutput> {
    let keys = input.resolver.resolve(input.identity).await?;
    Ok(IdentityOutput { keys })
}
