//! Fixed-width binary layout and memory-mapped store file.
//!
//! The in-memory [`TieredStore`] is a fixed shape: three rings of `C` samples
//! plus three indices each. This module packs that shape into a block of
//! known size and back, and keeps it in a file so a host can restore the
//! store across restarts.
//!
//! # Tier Block
//!
//! All integers are big-endian.
//!
//! ```text
//! [0..8)      head    u64
//! [8..16)     tail    u64
//! [16..24)    length  u64
//! [24..)      C × (time i64, id u64)   physical slot order
//! ```
//!
//! A store block is the minute, day and month tier blocks back to back.
//!
//! # File Format
//!
//! ```text
//! [0..32)     Header (magic, version, capacity, gating thresholds)
//! [32..)      Store block
//! ```

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;
use tracing::{debug, warn};

use crate::config::Gating;
use crate::error::{Result, SlabError};
use crate::ring::{RingBuffer, Sample};
use crate::store::TieredStore;

/// Magic bytes identifying a tidemark store file.
const SLAB_MAGIC: [u8; 4] = *b"TDMK";

/// Current store file format version.
const SLAB_VERSION: u32 = 1;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Size of the head/tail/length prefix of a tier block.
const TIER_PREFIX_SIZE: usize = 24;

/// Size of one packed sample.
const SAMPLE_SIZE: usize = 16;

/// Bytes needed to pack one tier of the given capacity.
pub const fn tier_block_size(capacity: usize) -> usize {
    TIER_PREFIX_SIZE + capacity * SAMPLE_SIZE
}

/// Bytes needed to pack a whole store of the given capacity.
pub const fn store_block_size(capacity: usize) -> usize {
    3 * tier_block_size(capacity)
}

fn check_size(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SlabError::BufferSize { expected, actual }.into());
    }
    Ok(())
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

fn read_i64(buf: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_be_bytes(bytes)
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(bytes)
}

/// Packs one ring into `buf`.
///
/// # Errors
///
/// Returns [`SlabError::BufferSize`] unless `buf` is exactly
/// [`tier_block_size`]`(C)` bytes.
pub fn pack_tier<const C: usize>(ring: &RingBuffer<C>, buf: &mut [u8]) -> Result<()> {
    check_size(tier_block_size(C), buf.len())?;

    let (prefix, samples) = buf.split_at_mut(TIER_PREFIX_SIZE);
    prefix[0..8].copy_from_slice(&(ring.head() as u64).to_be_bytes());
    prefix[8..16].copy_from_slice(&(ring.tail() as u64).to_be_bytes());
    prefix[16..24].copy_from_slice(&(ring.len() as u64).to_be_bytes());

    for (chunk, sample) in samples.chunks_exact_mut(SAMPLE_SIZE).zip(ring.slots()) {
        chunk[0..8].copy_from_slice(&sample.time.to_be_bytes());
        chunk[8..16].copy_from_slice(&sample.id.to_be_bytes());
    }

    Ok(())
}

/// Restores one ring from a packed tier block.
///
/// # Errors
///
/// Returns [`SlabError::BufferSize`] if `buf` has the wrong length and
/// [`SlabError::InvalidTier`] if the stored indices are inconsistent.
pub fn unpack_tier<const C: usize>(buf: &[u8]) -> Result<RingBuffer<C>> {
    check_size(tier_block_size(C), buf.len())?;

    let head = read_u64(buf, 0);
    let tail = read_u64(buf, 8);
    let length = read_u64(buf, 16);
    let to_index = |value: u64| {
        usize::try_from(value).map_err(|_| SlabError::InvalidTier {
            head,
            tail,
            length,
            capacity: C,
        })
    };

    let mut entries = [Sample::ZERO; C];
    for (slot, chunk) in entries
        .iter_mut()
        .zip(buf[TIER_PREFIX_SIZE..].chunks_exact(SAMPLE_SIZE))
    {
        *slot = Sample::new(read_i64(chunk, 0), read_u64(chunk, 8));
    }

    RingBuffer::from_parts(to_index(head)?, to_index(tail)?, to_index(length)?, entries)
        .inspect_err(|e| warn!("rejected tier block: {e}"))
}

/// Packs the three tiers of `store` into `buf`, finest first.
///
/// # Errors
///
/// Returns [`SlabError::BufferSize`] unless `buf` is exactly
/// [`store_block_size`]`(C)` bytes.
pub fn pack_store<const C: usize>(store: &TieredStore<C>, buf: &mut [u8]) -> Result<()> {
    check_size(store_block_size(C), buf.len())?;

    let (minutes, rest) = buf.split_at_mut(tier_block_size(C));
    let (days, months) = rest.split_at_mut(tier_block_size(C));
    pack_tier(store.minutes(), minutes)?;
    pack_tier(store.days(), days)?;
    pack_tier(store.months(), months)
}

/// Restores a store from a packed store block.
///
/// Gating thresholds are not part of the block and are supplied by the caller.
///
/// # Errors
///
/// Returns [`SlabError`] if the block has the wrong size or any tier is invalid.
pub fn unpack_store<const C: usize>(buf: &[u8], gating: Gating) -> Result<TieredStore<C>> {
    check_size(store_block_size(C), buf.len())?;

    let (minutes, rest) = buf.split_at(tier_block_size(C));
    let (days, months) = rest.split_at(tier_block_size(C));
    Ok(TieredStore::from_tiers(
        unpack_tier(minutes)?,
        unpack_tier(days)?,
        unpack_tier(months)?,
        gating,
    ))
}

/// Header at the start of every store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlabHeader {
    version: u32,
    capacity: u32,
    gating: Gating,
}

impl SlabHeader {
    fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&SLAB_MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_be_bytes());
        buf[8..12].copy_from_slice(&self.capacity.to_be_bytes());
        buf[12..16].fill(0);
        buf[16..24].copy_from_slice(&self.gating.day.to_be_bytes());
        buf[24..32].copy_from_slice(&self.gating.month.to_be_bytes());
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::Corrupted`] for bad magic, an unknown version or
    /// invalid thresholds.
    fn decode(buf: &[u8], path: &str) -> Result<Self> {
        let corrupted = |reason: String| SlabError::Corrupted {
            path: path.to_string(),
            reason,
        };

        let magic = &buf[0..4];
        if magic != SLAB_MAGIC {
            return Err(corrupted(format!(
                "invalid magic bytes: expected {SLAB_MAGIC:?}, found {magic:?}"
            ))
            .into());
        }

        let version = read_u32(buf, 4);
        if version != SLAB_VERSION {
            return Err(corrupted(format!(
                "unsupported version: expected {SLAB_VERSION}, found {version}"
            ))
            .into());
        }

        let capacity = read_u32(buf, 8);
        if capacity == 0 {
            return Err(corrupted("capacity is zero".to_string()).into());
        }

        let gating = Gating {
            day: read_i64(buf, 16),
            month: read_i64(buf, 24),
        };
        gating
            .validate()
            .map_err(|e| corrupted(format!("invalid gating thresholds: {e}")))?;

        Ok(Self {
            version,
            capacity,
            gating,
        })
    }
}

/// A store file mapped into memory.
///
/// The mapping holds the packed form only; [`load`](Self::load) decodes it
/// into a [`TieredStore`] and [`save`](Self::save) writes one back. Callers
/// decide when to persist and when to [`sync`](Self::sync).
///
/// # Thread Safety
///
/// Designed for a single writer. Concurrent access to the same file from
/// several processes must be coordinated externally.
#[derive(Debug)]
pub struct Slab {
    mmap: MmapMut,
    header: SlabHeader,
    path: String,
}

impl Slab {
    /// Creates (or truncates) a store file holding `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::Io`] if the file cannot be created, sized or
    /// mapped.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use tidemark::slab::Slab;
    /// use tidemark::store::TieredStore;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let store: TieredStore = TieredStore::new();
    /// let slab = Slab::create("txg.tdm", &store)?;
    /// slab.sync()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create<P: AsRef<Path>, const C: usize>(path: P, store: &TieredStore<C>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();
        let io_err = |source| SlabError::Io {
            path: path_str.clone(),
            source,
        };

        let capacity = u32::try_from(C).map_err(|_| SlabError::Corrupted {
            path: path_str.clone(),
            reason: format!("capacity {C} does not fit the file header"),
        })?;
        let file_size = HEADER_SIZE + store_block_size(C);

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_err)?;
        file.set_len(file_size as u64).map_err(io_err)?;

        // SAFETY: The file was just created and sized by us and is not mapped
        // anywhere else in this process.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(io_err)?;

        let mut slab = Self {
            mmap,
            header: SlabHeader {
                version: SLAB_VERSION,
                capacity,
                gating: store.gating(),
            },
            path: path_str,
        };
        slab.save(store)?;

        debug!(path = %slab.path, capacity = C, file_size, "created store file");
        Ok(slab)
    }

    /// Opens an existing store file and validates its header and size.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::Io`] if the file cannot be opened or mapped and
    /// [`SlabError::Corrupted`] if the header or size is invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();
        let io_err = |source| SlabError::Io {
            path: path_str.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_err)?;

        // SAFETY: The file was opened read/write; the mapping is private to
        // this handle and external writers are excluded by the single-writer
        // contract.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(io_err)?;

        if mmap.len() < HEADER_SIZE {
            return Err(SlabError::Corrupted {
                path: path_str,
                reason: format!(
                    "file too small: {} bytes, expected at least {HEADER_SIZE}",
                    mmap.len()
                ),
            }
            .into());
        }

        let header = SlabHeader::decode(&mmap[..HEADER_SIZE], &path_str)?;
        let expected = HEADER_SIZE + store_block_size(header.capacity as usize);
        if mmap.len() != expected {
            return Err(SlabError::Corrupted {
                path: path_str,
                reason: format!("file size mismatch: {} bytes, expected {expected}", mmap.len()),
            }
            .into());
        }

        debug!(path = %path_str, capacity = header.capacity, "opened store file");
        Ok(Self {
            mmap,
            header,
            path: path_str,
        })
    }

    /// Decodes the stored tiers into a store of capacity `C`.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::CapacityMismatch`] if the file was written for a
    /// different capacity, or [`SlabError::InvalidTier`] if a tier is
    /// inconsistent.
    pub fn load<const C: usize>(&self) -> Result<TieredStore<C>> {
        self.check_capacity::<C>()?;
        unpack_store(&self.mmap[HEADER_SIZE..], self.header.gating)
    }

    /// Writes `store` and its gating thresholds into the mapping.
    ///
    /// The data reaches disk on [`sync`](Self::sync) or when the OS flushes
    /// the mapping.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::CapacityMismatch`] if `C` differs from the file's
    /// capacity.
    pub fn save<const C: usize>(&mut self, store: &TieredStore<C>) -> Result<()> {
        self.check_capacity::<C>()?;

        self.header.gating = store.gating();
        self.header.encode(&mut self.mmap[..HEADER_SIZE]);
        pack_store(store, &mut self.mmap[HEADER_SIZE..])?;

        debug!(
            path = %self.path,
            minutes = store.minutes().len(),
            days = store.days().len(),
            months = store.months().len(),
            "saved store"
        );
        Ok(())
    }

    /// Flushes the mapping to disk.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::SyncFailed`] if the flush fails.
    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().map_err(|e| {
            SlabError::SyncFailed {
                path: self.path.clone(),
                source: e,
            }
            .into()
        })
    }

    /// Ring capacity recorded in the header.
    pub fn capacity(&self) -> u32 {
        self.header.capacity
    }

    /// Gating thresholds recorded in the header.
    pub fn gating(&self) -> Gating {
        self.header.gating
    }

    /// Total size of the mapped file in bytes.
    pub fn file_size(&self) -> usize {
        self.mmap.len()
    }

    /// Path of the store file.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn check_capacity<const C: usize>(&self) -> Result<()> {
        if self.header.capacity as usize != C {
            return Err(SlabError::CapacityMismatch {
                found: self.header.capacity,
                expected: C,
            }
            .into());
        }
        Ok(())
    }
}
