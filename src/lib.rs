//! Cauchy MDS erasure coding over GF(256).
//!
//! This library encodes `original_count` data blocks into `recovery_count`
//! recovery blocks using a normalized Cauchy matrix over GF(256). Any
//! `original_count` blocks out of the combined set, in any mix of originals
//! and recoveries, are enough to reconstruct the original data, as long as
//! `original_count + recovery_count <= 256`.
//!
//! Decoding happens in place: recovery payloads are rewritten into the
//! missing originals and their [`BlockMut::index`] tags are updated to the
//! original row they now hold. The caller routes blocks by index afterwards.
//!
//! # Example
//!
//! ```
//! use cauchy256::{encode, decode, Block, BlockMut, Params};
//!
//! let params = Params::new(3, 2, 8).unwrap();
//!
//! let originals: Vec<Vec<u8>> = vec![vec![1; 8], vec![2; 8], vec![3; 8]];
//! let blocks: Vec<Block> = originals
//!     .iter()
//!     .enumerate()
//!     .map(|(i, data)| Block::new(i as u8, data))
//!     .collect();
//!
//! let mut recovery = vec![0u8; 2 * 8];
//! encode(&params, &blocks, &mut recovery).unwrap();
//!
//! // Lose original 1; decode from originals 0 and 2 plus the first recovery
//! // block (block index 3).
//! let mut a = originals[0].clone();
//! let mut c = originals[2].clone();
//! let mut r = recovery[..8].to_vec();
//! let mut received = vec![
//!     BlockMut::new(0, &mut a),
//!     BlockMut::new(3, &mut r),
//!     BlockMut::new(2, &mut c),
//! ];
//! decode(&params, &mut received).unwrap();
//!
//! assert_eq!(received[1].index, 1);
//! assert_eq!(&received[1].data[..], &originals[1][..]);
//! ```

use gf256::gf::gf;
use tracing::debug;

mod field;

// GF(256) under the polynomial x^8 + x^6 + x^3 + x^2 + 1 (0x14d) with
// generator 0x02. The known-answer vectors in the tests pin this choice;
// changing it changes the wire format.
#[gf(polynomial = 0x14d, generator = 0x2)]
pub type Gf256;

/// Version handshake constant. Callers pass the constant they compiled
/// against to [`init`]; the library rejects a mismatch.
pub const VERSION: u32 = 2;

/// Validate the caller's version constant.
///
/// The field tables are built at compile time, so there is nothing to set up
/// at runtime; this exists purely as the version handshake and may be called
/// from any number of threads, any number of times.
pub fn init(version: u32) -> Result<(), Error> {
    if version != VERSION {
        return Err(Error::VersionMismatch);
    }
    Ok(())
}

/// Error type for encode/decode operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Caller was compiled against a different [`VERSION`]
    VersionMismatch,
    /// Invalid parameter values (zero counts or block size)
    InvalidParams,
    /// Too many total blocks (original + recovery > 256)
    TooManyBlocks,
    /// Wrong slice length or out-of-range block index
    InvalidInput,
    /// Duplicate block indices found during decoding
    DuplicateIndex,
    /// Wrong number of blocks provided for decoding
    InsufficientBlocks,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::VersionMismatch => write!(f, "library version mismatch"),
            Error::InvalidParams => write!(f, "invalid encoder parameters"),
            Error::TooManyBlocks => write!(f, "original_count + recovery_count > 256"),
            Error::InvalidInput => write!(f, "invalid input"),
            Error::DuplicateIndex => write!(f, "duplicate block index"),
            Error::InsufficientBlocks => write!(f, "wrong number of blocks for decoding"),
        }
    }
}

impl std::error::Error for Error {}

/// Encoder/decoder parameters
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// Number of original data blocks
    original_count: usize,
    /// Number of recovery blocks
    recovery_count: usize,
    /// Size of each block in bytes
    block_bytes: usize,
}

impl Params {
    /// Create new encoder parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParams`] if any count or the block size is
    /// zero, and [`Error::TooManyBlocks`] if
    /// `original_count + recovery_count > 256`.
    pub fn new(
        original_count: usize,
        recovery_count: usize,
        block_bytes: usize,
    ) -> Result<Self, Error> {
        if original_count == 0 || recovery_count == 0 || block_bytes == 0 {
            return Err(Error::InvalidParams);
        }
        if original_count + recovery_count > 256 {
            return Err(Error::TooManyBlocks);
        }
        Ok(Self {
            original_count,
            recovery_count,
            block_bytes,
        })
    }

    #[inline]
    pub fn original_count(&self) -> usize {
        self.original_count
    }

    #[inline]
    pub fn recovery_count(&self) -> usize {
        self.recovery_count
    }

    #[inline]
    pub fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    /// Block index carried by a recovery block
    #[inline]
    pub fn recovery_block_index(&self, recovery_index: usize) -> u8 {
        debug_assert!(recovery_index < self.recovery_count);
        (self.original_count + recovery_index) as u8
    }

    /// Block index carried by an original block
    #[inline]
    pub fn original_block_index(&self, original_index: usize) -> u8 {
        debug_assert!(original_index < self.original_count);
        original_index as u8
    }
}

/// An original data block handed to the encoder
#[derive(Debug, Clone)]
pub struct Block<'a> {
    /// Block payload
    pub data: &'a [u8],
    /// Block index (0..original_count for originals)
    pub index: u8,
}

impl<'a> Block<'a> {
    #[inline]
    pub fn new(index: u8, data: &'a [u8]) -> Self {
        Self { data, index }
    }
}

/// A received block handed to the decoder.
///
/// The decoder rewrites recovery payloads in place and retags their `index`
/// with the original row they reconstruct.
#[derive(Debug)]
pub struct BlockMut<'a> {
    /// Block payload, rewritten in place during decoding
    pub data: &'a mut [u8],
    /// Block index (0..original_count originals, then recoveries)
    pub index: u8,
}

impl<'a> BlockMut<'a> {
    #[inline]
    pub fn new(index: u8, data: &'a mut [u8]) -> Self {
        Self { data, index }
    }
}

// =============================================================================
// Cauchy matrix
// =============================================================================

/// One element of the column-normalized Cauchy matrix:
///
///   a_ij = (y_j + x_0) / (x_i + y_j)
///
/// where x_i is the recovery block index, x_0 = original_count is the first
/// recovery index, and y_j is the original column. The normalization makes
/// the first recovery row all ones, so callers never evaluate this for
/// x_i == x_0; that row is a plain XOR parity. The denominator cannot be
/// zero: x_i >= original_count > y_j.
#[inline]
fn matrix_element(x_i: u8, x_0: u8, y_j: u8) -> Gf256 {
    (Gf256(y_j) + Gf256(x_0)) / (Gf256(x_i) + Gf256(y_j))
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a single recovery block.
///
/// `recovery_index` selects which of the `recovery_count` rows to produce;
/// `output` must be `block_bytes` long.
pub fn encode_block(
    params: &Params,
    originals: &[Block<'_>],
    recovery_index: usize,
    output: &mut [u8],
) {
    debug_assert_eq!(originals.len(), params.original_count);
    debug_assert_eq!(output.len(), params.block_bytes);
    debug_assert!(recovery_index < params.recovery_count);

    // One original: every recovery row degenerates to a copy.
    if params.original_count == 1 {
        output.copy_from_slice(originals[0].data);
        return;
    }

    // The first recovery row is all ones, a parity of the originals.
    if recovery_index == 0 {
        field::addset_mem(output, originals[0].data, originals[1].data);
        for j in 2..params.original_count {
            field::add_mem(output, originals[j].data);
        }
        return;
    }

    let x_0 = params.original_count as u8;
    let x_i = (params.original_count + recovery_index) as u8;

    field::mul_mem(output, originals[0].data, matrix_element(x_i, x_0, 0).0);
    for j in 1..params.original_count {
        let coeff = matrix_element(x_i, x_0, j as u8);
        field::muladd_mem(output, originals[j].data, coeff.0);
    }
}

/// Encode all recovery blocks.
///
/// Recovery blocks are written end-to-end into `recovery_output` in row
/// order, `recovery_count * block_bytes` bytes total. Output depends only on
/// the parameters and the original payloads; two identical calls produce
/// byte-identical buffers.
///
/// # Errors
/// Returns [`Error::InvalidInput`] if any slice length disagrees with
/// `params`.
pub fn encode(
    params: &Params,
    originals: &[Block<'_>],
    recovery_output: &mut [u8],
) -> Result<(), Error> {
    if originals.len() != params.original_count {
        return Err(Error::InvalidInput);
    }
    if recovery_output.len() != params.recovery_count * params.block_bytes {
        return Err(Error::InvalidInput);
    }
    if originals.iter().any(|block| block.data.len() != params.block_bytes) {
        return Err(Error::InvalidInput);
    }

    let block_bytes = params.block_bytes;
    for recovery_index in 0..params.recovery_count {
        let start = recovery_index * block_bytes;
        encode_block(
            params,
            originals,
            recovery_index,
            &mut recovery_output[start..start + block_bytes],
        );
    }

    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Scratch matrices up to this size live on the stack; larger erasure counts
/// spill to a heap allocation.
const MATRIX_STACK_BYTES: usize = 2048;

/// Decoder state: received blocks partitioned into originals and recoveries,
/// plus the ascending list of erased original rows. Input order is preserved
/// within each partition.
struct Decoder<'a, 'b> {
    params: Params,
    /// Received recovery blocks; payloads and indices are rewritten in place
    recovery: Vec<&'b mut BlockMut<'a>>,
    /// Payloads of received original blocks
    original: Vec<&'b [u8]>,
    /// Rows of received original blocks, matching `original`
    original_rows: Vec<u8>,
    /// Erased original rows, ascending
    erasures: Vec<u8>,
}

impl<'a, 'b> Decoder<'a, 'b> {
    /// Single-recovery case: the only recovery row is the parity row, so the
    /// missing original is the XOR of the recovery block with every received
    /// original.
    fn decode_m1(&mut self) {
        let out = &mut *self.recovery[0].data;

        // XOR originals in pairs, then fold in the odd one out.
        let mut pending: Option<&[u8]> = None;
        for &data in &self.original {
            match pending.take() {
                None => pending = Some(data),
                Some(first) => field::add2_mem(out, first, data),
            }
        }
        if let Some(last) = pending {
            field::add_mem(out, last);
        }

        self.recovery[0].index = self.erasures[0];
    }

    /// General case: cancel the received originals out of every recovery
    /// row, then Gauss-Jordan the remaining square system in place.
    fn decode(&mut self) {
        let k = self.recovery.len();
        let x_0 = self.params.original_count as u8;

        debug!(erasures = k, "reconstructing erased originals");

        // Each recovery row is a linear combination of all original columns.
        // XOR-adding the known columns back out leaves a K-column system over
        // only the erased originals.
        for o in 0..self.original.len() {
            let data = self.original[o];
            let row = self.original_rows[o];
            for rec in self.recovery.iter_mut() {
                let coeff = matrix_element(rec.index, x_0, row);
                field::muladd_mem(&mut *rec.data, data, coeff.0);
            }
        }

        // K x K Cauchy sub-matrix over the erased columns, row-major.
        let mut stack = [0u8; MATRIX_STACK_BYTES];
        let mut heap: Vec<u8>;
        let matrix: &mut [u8] = if k * k <= MATRIX_STACK_BYTES {
            &mut stack[..k * k]
        } else {
            heap = vec![0u8; k * k];
            &mut heap
        };
        let mut at = 0;
        for rec in self.recovery.iter() {
            for &y_j in &self.erasures {
                matrix[at] = matrix_element(rec.index, x_0, y_j).0;
                at += 1;
            }
        }

        // Forward sweep. Rows are swapped implicitly through `pivots`;
        // payload mutations mirror the matrix mutations exactly.
        let mut pivots: Vec<usize> = (0..k).collect();
        for j in 0..k {
            // Lowest remaining row with a non-zero entry. Every square
            // sub-matrix of a Cauchy matrix is invertible, so a fully zero
            // column can only mean corrupted block data.
            let p = (j..k)
                .find(|&p| matrix[pivots[p] * k + j] != 0)
                .expect("no pivot in Cauchy sub-matrix: block data corrupted");
            pivots.swap(j, p);
            let i = pivots[j];

            // This recovery slot becomes the j-th missing original.
            self.recovery[i].index = self.erasures[j];

            let e = matrix[i * k + j];
            if e != 1 {
                let inv = (Gf256(1) / Gf256(e)).0;
                field::mul_mem_inplace(&mut matrix[i * k + j + 1..(i + 1) * k], inv);
                field::mul_mem_inplace(&mut *self.recovery[i].data, inv);
            }

            // Eliminate the column from the remaining rows.
            for t in j + 1..k {
                let other = pivots[t];
                let f = matrix[other * k + j];
                let (pivot_row, other_row) = matrix_rows(matrix, k, i, other);
                field::muladd_mem(&mut other_row[j + 1..], &pivot_row[j + 1..], f);
                let (pivot_block, other_block) = self.payload_pair(i, other);
                field::muladd_mem(other_block, pivot_block, f);
            }
        }

        // Back-substitute payloads only; the matrix entries above the
        // diagonal are never read again once their row is consumed.
        for j in (0..k - 1).rev() {
            let i = pivots[j];
            for t in (j + 1..k).rev() {
                let f = matrix[i * k + t];
                let solved = pivots[t];
                let (solved_block, target_block) = self.payload_pair(solved, i);
                field::muladd_mem(target_block, solved_block, f);
            }
        }
    }

    /// Disjoint (pivot, target) payload borrows out of the recovery set.
    fn payload_pair(&mut self, pivot: usize, target: usize) -> (&[u8], &mut [u8]) {
        debug_assert_ne!(pivot, target);
        if pivot < target {
            let (lo, hi) = self.recovery.split_at_mut(target);
            (&*lo[pivot].data, &mut *hi[0].data)
        } else {
            let (lo, hi) = self.recovery.split_at_mut(pivot);
            (&*hi[0].data, &mut *lo[target].data)
        }
    }
}

/// Disjoint (pivot, target) row borrows out of the row-major scratch matrix.
fn matrix_rows(
    matrix: &mut [u8],
    width: usize,
    pivot: usize,
    target: usize,
) -> (&[u8], &mut [u8]) {
    debug_assert_ne!(pivot, target);
    if pivot < target {
        let (lo, hi) = matrix.split_at_mut(target * width);
        (&lo[pivot * width..(pivot + 1) * width], &mut hi[..width])
    } else {
        let (lo, hi) = matrix.split_at_mut(pivot * width);
        (&hi[..width], &mut lo[target * width..(target + 1) * width])
    }
}

/// Recover erased originals from any `original_count` received blocks.
///
/// `blocks` must hold exactly `original_count` entries, each tagged with its
/// block index. On success every original row `0..original_count` is present
/// across the slots: received originals are untouched, and each used
/// recovery block carries a reconstructed original payload with its `index`
/// rewritten to that original row. Slots are not reordered; route by index.
///
/// # Errors
/// - [`Error::InsufficientBlocks`] if `blocks.len() != original_count`
/// - [`Error::InvalidInput`] on a wrong payload length or an index outside
///   `0..original_count + recovery_count`
/// - [`Error::DuplicateIndex`] if two blocks carry the same index
pub fn decode(params: &Params, blocks: &mut [BlockMut<'_>]) -> Result<(), Error> {
    if blocks.len() != params.original_count {
        return Err(Error::InsufficientBlocks);
    }
    let total = params.original_count + params.recovery_count;
    for block in blocks.iter() {
        if block.data.len() != params.block_bytes {
            return Err(Error::InvalidInput);
        }
        if (block.index as usize) >= total {
            return Err(Error::InvalidInput);
        }
    }

    // One original: any received block is a copy of it.
    if params.original_count == 1 {
        blocks[0].index = 0;
        return Ok(());
    }

    // Partition into originals and recoveries, preserving input order.
    let mut present = [false; 256];
    let mut recovery: Vec<&mut BlockMut<'_>> = Vec::new();
    let mut original: Vec<&[u8]> = Vec::new();
    let mut original_rows: Vec<u8> = Vec::new();

    for block in blocks.iter_mut() {
        let idx = block.index as usize;
        if present[idx] {
            return Err(Error::DuplicateIndex);
        }
        present[idx] = true;

        if idx < params.original_count {
            original_rows.push(block.index);
            original.push(&*block.data);
        } else {
            recovery.push(block);
        }
    }

    // Erased original rows, ascending. With distinct indices there are
    // exactly as many of these as received recovery blocks.
    let mut erasures: Vec<u8> = Vec::with_capacity(recovery.len());
    for row in 0..params.original_count {
        if !present[row] {
            erasures.push(row as u8);
        }
    }

    if erasures.is_empty() {
        return Ok(());
    }
    debug_assert_eq!(recovery.len(), erasures.len());

    let mut decoder = Decoder {
        params: *params,
        recovery,
        original,
        original_rows,
        erasures,
    };

    if params.recovery_count == 1 {
        decoder.decode_m1();
    } else {
        decoder.decode();
    }

    Ok(())
}
