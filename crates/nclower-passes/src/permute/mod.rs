//! Permutation normalization.
//!
//! Turns a source-level permutation description plus the input tensor's
//! layout into a canonical permutation over the axes the backend sees, then
//! into the backend encoding.
//!
//! Two source descriptions are supported:
//! - an explicit axis order (`Tensor.permute dims=…`)
//! - a two-axis swap (`torch.transpose dim0=… dim1=…`), where negative axes
//!   count from the end
//!
//! The batch axis is implicit in the backend, so it is removed from the
//! permutation before validation. Identity permutations become no-ops.

mod table;

pub use table::{MAX_RANK, permute_code};

use nclower_core::{AxisEncoding, Node, Parameter, Tensor};
use thiserror::Error;
use tracing::debug;

/// Reasons a permutation cannot be lowered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermuteError {
    #[error("permute {rank}-rank tensor is not supported")]
    UnsupportedRank { rank: usize },

    #[error("permute {rank}-rank tensor with {dims}-rank dims is not possible")]
    RankMismatch { rank: usize, dims: usize },

    #[error("invalid permutation {perm:?} for rank {rank}")]
    InvalidPermutation { perm: Vec<i64>, rank: usize },

    #[error("transpose of axes ({dim0}, {dim1}) crosses batch axis {batch_axis}")]
    BatchAxisConflict {
        dim0: i64,
        dim1: i64,
        batch_axis: usize,
    },

    #[error("unsupported {rank}-rank permutation {perm:?}")]
    UnmappablePermutation { perm: Vec<usize>, rank: usize },

    #[error("cannot resolve negative axes ({dim0}, {dim1}) without a known input rank")]
    UnknownRankNegativeIndex { dim0: i64, dim1: i64 },

    #[error("cannot transpose axes ({dim0}, {dim1}) without a known input rank")]
    UnknownRank { dim0: i64, dim1: i64 },

    #[error("axis {axis} is out of range for rank {rank}")]
    AxisOutOfRange { axis: i64, rank: usize },

    #[error("bad captured parameter: {0}")]
    Capture(String),
}

impl PermuteError {
    /// Stable name of the failure kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PermuteError::UnsupportedRank { .. } => "UnsupportedRank",
            PermuteError::RankMismatch { .. } => "RankMismatch",
            PermuteError::InvalidPermutation { .. } => "InvalidPermutation",
            PermuteError::BatchAxisConflict { .. } => "BatchAxisConflict",
            PermuteError::UnmappablePermutation { .. } => "UnmappablePermutation",
            PermuteError::UnknownRankNegativeIndex { .. } => "UnknownRankNegativeIndex",
            PermuteError::UnknownRank { .. } => "UnknownRank",
            PermuteError::AxisOutOfRange { .. } => "AxisOutOfRange",
            PermuteError::Capture(_) => "InvalidCapture",
        }
    }
}

impl From<nclower_core::Error> for PermuteError {
    fn from(err: nclower_core::Error) -> Self {
        PermuteError::Capture(err.to_string())
    }
}

/// Source-level description of a permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermuteSource {
    /// Output axis `i` takes input axis `dims[i]`.
    Dims(Vec<i64>),

    /// Swap two axes; negative values count from the end.
    Swap { dim0: i64, dim1: i64 },
}

/// Layout facts about the permuted tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputLayout {
    /// Declared rank, `None` when the shape is unknown.
    pub rank: Option<usize>,

    /// Axis the backend keeps implicit.
    pub batch_axis: Option<usize>,
}

impl InputLayout {
    pub fn of(tensor: &Tensor) -> Self {
        Self {
            rank: tensor.rank(),
            batch_axis: tensor.batch_axis,
        }
    }
}

/// How a lowered permutation is written to the backend node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermuteEncoding {
    /// Backend enumeration code.
    EnumCode(i64),

    /// Source axis of every output axis.
    ExplicitAxes(Vec<usize>),
}

impl PermuteEncoding {
    /// Sentinel written under key `"0"` when explicit axes follow.
    pub const EXPLICIT_SENTINEL: i64 = -1;

    /// Write the encoding as indexed node parameters.
    pub fn write(&self, node: &mut Node) {
        match self {
            PermuteEncoding::EnumCode(code) => node.set_param("0", Parameter::Int(*code)),
            PermuteEncoding::ExplicitAxes(axes) => {
                node.set_param("0", Parameter::Int(Self::EXPLICIT_SENTINEL));
                for (i, &axis) in axes.iter().enumerate() {
                    node.set_param((i + 1).to_string(), Parameter::Int(axis as i64));
                }
            }
        }
    }
}

/// Result of lowering one permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lowering {
    /// The permutation is an identity over the backend-visible axes.
    Noop,

    /// The permutation and its backend encoding.
    Permute {
        perm: Vec<usize>,
        encoding: PermuteEncoding,
    },
}

/// Normalize `source` against `layout` into a permutation of the axes the
/// backend sees.
///
/// The result is a validated bijection on `0..R` with `R ≤ MAX_RANK`; it
/// may be the identity.
pub fn normalize(source: &PermuteSource, layout: InputLayout) -> Result<Vec<usize>, PermuteError> {
    match source {
        PermuteSource::Dims(dims) => normalize_dims(dims, layout),
        PermuteSource::Swap { dim0, dim1 } => normalize_swap(*dim0, *dim1, layout),
    }
}

fn normalize_dims(dims: &[i64], layout: InputLayout) -> Result<Vec<usize>, PermuteError> {
    let mut rank = match layout.rank {
        Some(rank) => rank,
        None => {
            // Unchecked: the producer may have a different rank than `dims`
            debug!(
                rank = dims.len(),
                "input rank unknown, assuming rank from dims length"
            );
            dims.len()
        }
    };

    let mut dims = dims.to_vec();
    if let Some(batch) = layout.batch_axis.filter(|&b| b < rank) {
        let batch = batch as i64;
        dims = dims
            .into_iter()
            .filter(|&d| d != batch)
            .map(|d| if d > batch { d - 1 } else { d })
            .collect();
        rank -= 1;
    }

    if rank > MAX_RANK {
        return Err(PermuteError::UnsupportedRank { rank });
    }

    if dims.len() != rank {
        return Err(PermuteError::RankMismatch {
            rank,
            dims: dims.len(),
        });
    }

    validate(&dims, rank)
}

fn normalize_swap(dim0: i64, dim1: i64, layout: InputLayout) -> Result<Vec<usize>, PermuteError> {
    let Some(mut rank) = layout.rank else {
        if dim0 < 0 || dim1 < 0 {
            return Err(PermuteError::UnknownRankNegativeIndex { dim0, dim1 });
        }
        return Err(PermuteError::UnknownRank { dim0, dim1 });
    };

    let resolve = |axis: i64| {
        let resolved = if axis < 0 { axis + rank as i64 } else { axis };
        if (0..rank as i64).contains(&resolved) {
            Ok(resolved as usize)
        } else {
            Err(PermuteError::AxisOutOfRange { axis, rank })
        }
    };
    let mut a = resolve(dim0)?;
    let mut b = resolve(dim1)?;

    if let Some(batch) = layout.batch_axis.filter(|&axis| axis < rank) {
        if a == batch || b == batch {
            return Err(PermuteError::BatchAxisConflict {
                dim0,
                dim1,
                batch_axis: batch,
            });
        }
        if a > batch {
            a -= 1;
        }
        if b > batch {
            b -= 1;
        }
        rank -= 1;
    }

    if rank > MAX_RANK {
        return Err(PermuteError::UnsupportedRank { rank });
    }

    let mut perm: Vec<usize> = (0..rank).collect();
    perm.swap(a, b);
    Ok(perm)
}

/// Check that `dims` is a bijection on `0..rank`.
fn validate(dims: &[i64], rank: usize) -> Result<Vec<usize>, PermuteError> {
    let mut sorted = dims.to_vec();
    sorted.sort_unstable();

    if !sorted.iter().copied().eq(0..rank as i64) {
        return Err(PermuteError::InvalidPermutation {
            perm: dims.to_vec(),
            rank,
        });
    }

    Ok(dims.iter().map(|&d| d as usize).collect())
}

pub fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &axis)| i == axis)
}

/// Normalize `source` and pick its backend encoding.
///
/// Swaps always use the enumeration code. Explicit axis lists use
/// `encoding`: [`AxisEncoding::Explicit`] writes the permutation itself, so
/// it is not limited by the enumeration table.
pub fn lower(
    source: &PermuteSource,
    layout: InputLayout,
    encoding: AxisEncoding,
) -> Result<Lowering, PermuteError> {
    let perm = normalize(source, layout)?;

    if is_identity(&perm) {
        return Ok(Lowering::Noop);
    }

    let explicit = matches!(source, PermuteSource::Dims(_)) && encoding == AxisEncoding::Explicit;
    let encoding = if explicit {
        PermuteEncoding::ExplicitAxes(perm.clone())
    } else {
        let code = permute_code(&perm).ok_or_else(|| PermuteError::UnmappablePermutation {
            perm: perm.clone(),
            rank: perm.len(),
        })?;
        PermuteEncoding::EnumCode(code)
    };

    Ok(Lowering::Permute { perm, encoding })
}
