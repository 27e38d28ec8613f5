//! Offset generator distributions (C5)
//!
//! This module provides the block-number generators that choose which block
//! of a target file each I/O operation touches. Different distributions
//! simulate different access patterns.
//!
//! # Distributions
//!
//! - **Sequential**: increments by one block per call, wrapping at the end
//! - **Uniform**: equal probability across the whole block range (default random)
//!
//! # Block-Based Design
//!
//! Distributions generate block numbers (0, 1, 2, ..., N-1) rather than byte
//! offsets. This keeps every offset naturally aligned to the block size,
//! which direct I/O requires, without a division or alignment pass at the
//! call site.
//!
//! The caller converts a block number to a byte offset:
//! `offset = block_num * block_size`
//!
//! # Example
//!
//! ```
//! use diskbench::distribution::{Distribution, uniform::UniformDistribution};
//!
//! let mut dist = UniformDistribution::new();
//! let block_num = dist.next_block(1024); // Random block in range [0, 1024)
//! assert!(block_num < 1024);
//!
//! let block_size = 4096;
//! let offset = block_num * block_size; // Naturally aligned to 4K
//! ```

/// Per-slot offset generator.
///
/// Each I/O slot owns its own `Distribution` instance (seeded from the
/// base seed XOR'd with the slot index) so generators never share mutable
/// state across the single completion thread's slots.
///
/// # Implementation Notes
///
/// - Must be fast: called once per submitted operation.
/// - Must be `Send`: slots can be handed between worker setup and the
///   completion thread during trial preparation.
pub trait Distribution: Send {
    /// Generate the next block number in the range `[0, num_blocks)`.
    fn next_block(&mut self, num_blocks: u64) -> u64;
}

pub mod sequential;
pub mod uniform;
