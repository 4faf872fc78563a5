//! Serialization boundary for values that leave the process (spec.md §6).
//!
//! The core store never serializes — it holds `V` directly (§1, "in-process,
//! not a wire protocol"). `Codec` exists for embedders who persist a
//! snapshot or ship a value elsewhere and want one place to plug that in,
//! the same `#[async_trait::async_trait]` collaborator shape the teacher
//! uses for `Upstream`/`Dumper`.

use async_trait::async_trait;

/// Converts a value to and from a byte representation. Not used on the
/// foreground `get`/`set` path; only by collaborators that need bytes
/// (loaders talking to a remote source, an embedder's own snapshot writer).
#[async_trait]
pub trait Codec<V>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    fn marshal(&self, value: &V) -> Result<Vec<u8>, Self::Error>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<V, Self::Error>;
}

/// A no-op codec for values that are already bytes, useful in tests and for
/// embedders whose `V` is `Vec<u8>`.
pub struct IdentityCodec;

#[derive(Debug, thiserror::Error)]
#[error("identity codec received a non-Vec<u8> value")]
pub struct IdentityCodecError;

#[async_trait]
impl Codec<Vec<u8>> for IdentityCodec {
    type Error = IdentityCodecError;

    fn name(&self) -> &str {
        "identity"
    }

    fn marshal(&self, value: &Vec<u8>) -> Result<Vec<u8>, Self::Error> {
        Ok(value.clone())
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Vec<u8>, Self::Error> {
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_codec_round_trips() {
        let codec = IdentityCodec;
        let original = vec![1u8, 2, 3];
        let bytes = codec.marshal(&original).unwrap();
        let back = codec.unmarshal(&bytes).unwrap();
        assert_eq!(original, back);
    }
}
