//! Overflow guard for reassembly buffers.

use crate::config::OVERFLOW_FACTOR;
use crate::error::{ProtocolError, Result};

/// Bounds how many unconsumed bytes a connection may accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowGuard {
    limit: usize,
}

impl OverflowGuard {
    /// Guard for a connection whose largest legal payload is `max_payload`.
    pub fn for_max_payload(max_payload: usize) -> Self {
        Self::with_limit(max_payload.saturating_mul(OVERFLOW_FACTOR))
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Checked before `incoming` bytes are appended to `buffered` ones.
    #[inline]
    pub fn admit(&self, buffered: usize, incoming: usize) -> Result<()> {
        if buffered.saturating_add(incoming) > self.limit {
            return Err(ProtocolError::BufferOverflow {
                buffered,
                incoming,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_inclusive() {
        let guard = OverflowGuard::for_max_payload(100);
        assert_eq!(guard.limit(), 400);
        assert!(guard.admit(0, 400).is_ok());
        assert!(guard.admit(399, 1).is_ok());
        assert!(guard.admit(400, 1).is_err());
        assert!(guard.admit(usize::MAX, 1).is_err());
    }
}
