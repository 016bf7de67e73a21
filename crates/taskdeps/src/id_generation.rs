//! Hash-based dependency ID generation.
//!
//! Dependency ids have the form `dep-{hash}`, where `hash` is the first
//! eight bytes of a SHA-256 digest over the edge's owner, both endpoints,
//! the creation time and a nonce, encoded as 8 base36 characters.
//!
//! # Example
//!
//! ```
//! use taskdeps::domain::{TaskId, UserId};
//! use taskdeps::id_generation::DependencyIdGenerator;
//!
//! let mut generator = DependencyIdGenerator::new();
//! let id = generator
//!     .generate(&UserId::new("alice"), &TaskId::new("a"), &TaskId::new("b"))
//!     .unwrap();
//! assert!(id.as_str().starts_with("dep-"));
//! ```

use crate::domain::{DependencyId, TaskId, UserId};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Prefix shared by every generated dependency id
pub const DEPENDENCY_ID_PREFIX: &str = "dep";

/// Number of base36 characters after the prefix
pub const HASH_LENGTH: usize = 8;

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;

/// Errors that can occur during ID generation
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Every nonce produced an id that is already taken
    #[error("Unable to generate unique ID after {attempts} attempts")]
    CollisionExhausted {
        /// Number of nonces tried
        attempts: u32,
    },
}

/// Dependency id generator with collision detection.
///
/// Ids handed out, and ids registered via [`register_id`](Self::register_id),
/// are remembered so the generator never returns the same id twice.
#[derive(Debug, Default)]
pub struct DependencyIdGenerator {
    existing_ids: HashSet<String>,
}

impl DependencyIdGenerator {
    /// Create an empty generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing ID to prevent collisions
    pub fn register_id(&mut self, id: &DependencyId) {
        self.existing_ids.insert(id.as_str().to_string());
    }

    /// Forget a previously generated or registered id
    pub fn release_id(&mut self, id: &DependencyId) {
        self.existing_ids.remove(id.as_str());
    }

    /// Number of ids currently tracked
    pub fn len(&self) -> usize {
        self.existing_ids.len()
    }

    /// Whether no ids are tracked
    pub fn is_empty(&self) -> bool {
        self.existing_ids.is_empty()
    }

    /// Generate a new unique id for an edge `blocking -> blocked` owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if every nonce collides with a known id.
    pub fn generate(
        &mut self,
        owner: &UserId,
        blocking: &TaskId,
        blocked: &TaskId,
    ) -> Result<DependencyId, IdGenerationError> {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        for nonce in 0..MAX_NONCE {
            let id = hash_id(owner, blocking, blocked, timestamp, nonce);

            if self.existing_ids.insert(id.clone()) {
                if nonce > 0 {
                    debug!(nonce, "Generated unique dependency ID after collision retries");
                }
                return Ok(DependencyId::new(id));
            }
        }

        Err(IdGenerationError::CollisionExhausted {
            attempts: MAX_NONCE,
        })
    }
}

fn hash_id(owner: &UserId, blocking: &TaskId, blocked: &TaskId, timestamp: i64, nonce: u32) -> String {
    let content = format!("{owner}|{blocking}|{blocked}|{timestamp}|{nonce}");

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash_bytes = hasher.finalize();

    format!(
        "{}-{}",
        DEPENDENCY_ID_PREFIX,
        encode_base36(&hash_bytes[..8], HASH_LENGTH)
    )
}

/// Encode up to 8 bytes as a fixed-length base36 string.
///
/// Bytes are folded into a `u64` with wrapping shifts, so longer inputs
/// only keep their last 8 bytes.
fn encode_base36(bytes: &[u8], length: usize) -> String {
    let mut num: u64 = 0;
    for &byte in bytes {
        num = num.wrapping_shl(8).wrapping_add(u64::from(byte));
    }

    let mut result = Vec::with_capacity(length);
    while result.len() < length {
        // remainder < 36, always a valid index
        result.push(BASE36_CHARS[(num % 36) as usize]);
        num /= 36;
    }
    result.reverse();

    result.into_iter().map(char::from).collect()
}
