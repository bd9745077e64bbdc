//! TEID Pool for GTPv2-C
//!
//! Hands out local S5-C tunnel endpoint identifiers. TEID 0 is reserved for
//! "not yet assigned" and is never allocated.

use crate::error::{GtpError, GtpResult};

/// Sequential TEID allocator over `base..=max`
#[derive(Debug, Clone)]
pub struct TeidPool {
    next: u32,
    base: u32,
    max: u32,
}

impl TeidPool {
    /// Create a pool covering the whole non-zero TEID space
    pub fn new() -> Self {
        Self {
            next: 1,
            base: 1,
            max: u32::MAX,
        }
    }

    /// Create a pool with a custom range
    pub fn with_range(base: u32, max: u32) -> GtpResult<Self> {
        if base == 0 {
            return Err(GtpError::ResourceExhausted(
                "TEID base must be greater than 0".to_string(),
            ));
        }
        if base > max {
            return Err(GtpError::ResourceExhausted(format!(
                "empty TEID range {base}..={max}"
            )));
        }
        Ok(Self {
            next: base,
            base,
            max,
        })
    }

    /// Allocate the next TEID for which `in_use` is false.
    ///
    /// The cursor wraps from `max` back to `base`; a full lap with every
    /// value taken is reported as exhaustion.
    pub fn allocate(&mut self, in_use: impl Fn(u32) -> bool) -> GtpResult<u32> {
        let span = u64::from(self.max - self.base) + 1;
        for _ in 0..span {
            let teid = self.next;
            self.next = if teid >= self.max { self.base } else { teid + 1 };
            if !in_use(teid) {
                return Ok(teid);
            }
        }
        Err(GtpError::ResourceExhausted("TEID pool exhausted".to_string()))
    }

    /// Get the next TEID that will be tried (without allocating it)
    pub fn peek_next(&self) -> u32 {
        self.next
    }
}

impl Default for TeidPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_teid_pool_allocation() {
        let mut pool = TeidPool::new();
        assert_eq!(pool.allocate(|_| false).unwrap(), 1);
        assert_eq!(pool.allocate(|_| false).unwrap(), 2);
        assert_eq!(pool.peek_next(), 3);
    }

    #[test]
    fn test_teid_pool_skips_in_use() {
        let mut pool = TeidPool::with_range(1000, 2000).unwrap();
        let taken: HashSet<u32> = [1000, 1001].into_iter().collect();
        assert_eq!(pool.allocate(|t| taken.contains(&t)).unwrap(), 1002);
    }

    #[test]
    fn test_teid_pool_wrap_around() {
        let mut pool = TeidPool::with_range(1, 3).unwrap();
        let got: Vec<u32> = (0..4).map(|_| pool.allocate(|_| false).unwrap()).collect();
        assert_eq!(got, vec![1, 2, 3, 1]);
    }

    #[test]
    fn test_teid_pool_exhausted() {
        let mut pool = TeidPool::with_range(10, 12).unwrap();
        assert!(matches!(
            pool.allocate(|_| true),
            Err(GtpError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_teid_pool_invalid_range() {
        assert!(TeidPool::with_range(0, 100).is_err());
        assert!(TeidPool::with_range(100, 50).is_err());
    }
}
