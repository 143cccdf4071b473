// crates/lti-toolbox-core/src/core/hashing.rs
// ============================================================================
// Module: LTI Toolbox Hashing
// Description: Digest helpers for tool identifiers and generated credentials.
// Purpose: Produce stable lowercase hex digests.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Tool identifiers are derived from the configuration description so the
//! same file in the same directory always yields the same id. Digests are
//! SHA-256 rendered as lowercase hex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

use crate::core::identifiers::ToolId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of hex characters kept from the digest in derived tool ids.
pub const TOOL_ID_DIGEST_LEN: usize = 32;

// ============================================================================
// SECTION: Digest Helpers
// ============================================================================

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_encode(&Sha256::digest(bytes))
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

/// Derives a tool id from the configuration directory name and contents.
///
/// The id is `<dir_name>_<digest>` where the digest covers the directory
/// name followed by the raw description bytes.
#[must_use]
pub fn derive_tool_id(dir_name: &str, contents: &[u8]) -> ToolId {
    let mut material = Vec::with_capacity(dir_name.len() + contents.len());
    material.extend_from_slice(dir_name.as_bytes());
    material.extend_from_slice(contents);
    let digest = sha256_hex(&material);
    let short = digest.get(.. TOOL_ID_DIGEST_LEN).unwrap_or(&digest);
    ToolId::new(format!("{dir_name}_{short}"))
}
