//! Topic model

use serde::{Deserialize, Serialize};

/// A named channel messages are published under
///
/// Topics have no row of their own in the cache; they exist only as the
/// `topic` value of stored messages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
}

impl Topic {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
