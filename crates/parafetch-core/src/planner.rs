//! Range Planner: partitions a byte span into an ordered queue of disjoint
//! fetch ranges and derives how many connections to actually use.
//!
//! The sizing-policy priority order and emission loop follow the reference
//! downloader's range-creation routine, re-expressed with a half-open
//! `[start, end)` convention instead of inclusive `[start, end-1]` pairs.

use crate::types::{EngineError, Range, Result};

const TEN_MIB: u64 = 10 * 1024 * 1024;
const ONE_MIB: u64 = 1024 * 1024;

/// Sizing policy inputs. At most one of `chunks`/`chunk_size` may be set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizingPolicy {
    pub chunks: Option<u64>,
    pub chunk_size: Option<u64>,
}

impl SizingPolicy {
    fn validate(&self) -> Result<()> {
        if self.chunks.is_some() && self.chunk_size.is_some() {
            return Err(EngineError::Policy(
                "--chunks and --chunk-size are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// Partition `[offset, total)` into an ordered queue of disjoint ranges, and
/// cap `conns` to the resulting chunk count so a file with fewer chunks than
/// requested connections never starts idle workers.
///
/// Returns `(ranges, capped_conns)`.
pub fn plan(total: u64, offset: u64, conns: u32, policy: SizingPolicy) -> Result<(Vec<Range>, u32)> {
    policy.validate()?;

    if offset >= total {
        return Ok((Vec::new(), conns));
    }

    let remaining = total - offset;
    let size = if let Some(chunk_size) = policy.chunk_size {
        chunk_size.max(1)
    } else if let Some(chunks) = policy.chunks {
        (remaining / chunks.max(1)).max(1)
    } else if conns >= 8 {
        (remaining / conns as u64).min(TEN_MIB).max(1)
    } else {
        ONE_MIB
    };

    let mut ranges = Vec::new();
    let mut start = offset;
    while start < total {
        let end = (start + size).min(total);
        ranges.push(Range::new(start, end));
        start += size;
    }

    let capped_conns = if conns as usize > ranges.len() {
        ranges.len() as u32
    } else {
        conns
    };

    Ok((ranges, capped_conns.max(1)))
}
