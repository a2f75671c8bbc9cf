//! Per-interaction compression for the in-memory store.
//!
//! Every interaction is compressed into its own zstd frame on append so a
//! session's log can hold thousands of requests cheaply. Compression contexts
//! are expensive to set up, so writers borrow them from a [`CompressorPool`]
//! and hand them back through a guard, including on the error path.
//!
//! Reads go through [`InteractionCodec::decompress_all`], which uses one
//! decompression context for a whole drained batch and skips any frame it
//! cannot decode.

use std::ops::{Deref, DerefMut};

use log::{trace, warn};
use parking_lot::Mutex;
use zstd::bulk::{Compressor, Decompressor};

use crate::error_handling::types::CodecError;

use super::types::CompressedInteraction;

/// Default number of idle compressors kept around for reuse.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Upper bound on a single decompressed interaction.
pub const MAX_INTERACTION_SIZE: usize = 64 * 1024 * 1024;

/// Bounded free-list of zstd compression contexts.
///
/// Borrowing never blocks: an idle context is reused when one is available,
/// otherwise a fresh one is created. At most `max_idle` contexts are retained
/// when returned; extras are dropped.
pub struct CompressorPool {
    idle: Mutex<Vec<Compressor<'static>>>,
    max_idle: usize,
    level: i32,
}

impl CompressorPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Borrows a compressor. It returns to the pool when the guard drops.
    pub fn acquire(&self) -> Result<PooledCompressor<'_>, CodecError> {
        let reused = self.idle.lock().pop();
        let compressor = match reused {
            Some(c) => c,
            None => {
                trace!("compressor pool empty, creating a new context");
                Compressor::new(self.level)?
            }
        };
        Ok(PooledCompressor {
            pool: self,
            compressor: Some(compressor),
        })
    }

    /// Number of contexts currently waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, compressor: Compressor<'static>) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(compressor);
        }
    }
}

impl Default for CompressorPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

/// Scoped loan of a compressor from a [`CompressorPool`].
pub struct PooledCompressor<'a> {
    pool: &'a CompressorPool,
    compressor: Option<Compressor<'static>>,
}

impl Deref for PooledCompressor<'_> {
    type Target = Compressor<'static>;

    fn deref(&self) -> &Self::Target {
        match &self.compressor {
            Some(c) => c,
            None => unreachable!("compressor taken before drop"),
        }
    }
}

impl DerefMut for PooledCompressor<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.compressor {
            Some(c) => c,
            None => unreachable!("compressor taken before drop"),
        }
    }
}

impl Drop for PooledCompressor<'_> {
    fn drop(&mut self) {
        if let Some(compressor) = self.compressor.take() {
            self.pool.release(compressor);
        }
    }
}

/// Compresses interactions on the way into the store and restores them on
/// the way out.
#[derive(Default)]
pub struct InteractionCodec {
    pool: CompressorPool,
}

impl InteractionCodec {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: CompressorPool::new(pool_size),
        }
    }

    pub fn pool(&self) -> &CompressorPool {
        &self.pool
    }

    pub fn compress(&self, raw: &[u8]) -> Result<CompressedInteraction, CodecError> {
        let mut compressor = self.pool.acquire()?;
        let frame = compressor.compress(raw)?;
        trace!("compressed {} byte(s) into {}", raw.len(), frame.len());
        Ok(CompressedInteraction {
            raw_len: raw.len(),
            frame,
        })
    }

    /// Restores a drained batch in order.
    ///
    /// This is lossy on purpose: a frame that fails to decode becomes an empty
    /// entry at its position instead of failing the whole batch, so one
    /// corrupt record never hides the rest of a session's data.
    pub fn decompress_all(&self, items: Vec<CompressedInteraction>) -> Vec<Vec<u8>> {
        if items.is_empty() {
            return Vec::new();
        }

        let mut decompressor = match Decompressor::new() {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "Could not create decompressor, dropping {} interaction(s): {}",
                    items.len(),
                    e
                );
                return vec![Vec::new(); items.len()];
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                if item.raw_len > MAX_INTERACTION_SIZE {
                    warn!(
                        "Skipping interaction {}: declared size {} exceeds limit",
                        index, item.raw_len
                    );
                    return Vec::new();
                }
                match decompressor.decompress(&item.frame, item.raw_len) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("Skipping undecodable interaction {}: {}", index, e);
                        Vec::new()
                    }
                }
            })
            .collect()
    }
}
