//! Memory-space descriptors.

use bon::bon;
use enumset::{EnumSet, EnumSetType};
use kiln_dtype::ScalarDType;
use snafu::ensure;

use crate::error::*;

/// Access capabilities of a memory space.
#[derive(Debug, Hash, EnumSetType)]
pub enum MemFlag {
    /// Individual elements may be read by ordinary statements.
    ElementRead,
    /// Individual elements may be written by ordinary statements.
    ElementWrite,
    /// Data moves in and out only through whole-block instructions.
    BlockTransferOnly,
}

/// Allocation legality rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocRule {
    /// Innermost stride of any buffer in this space must be provably 1.
    pub unit_inner_stride: bool,
    /// Innermost dimension must equal this literal (e.g. vector lanes).
    pub inner_extent: Option<usize>,
    /// Element kinds the space can hold.
    pub elements: EnumSet<ScalarDType>,
}

impl Default for AllocRule {
    fn default() -> Self {
        Self { unit_inner_stride: false, inner_extent: None, elements: EnumSet::all() }
    }
}

/// How allocations and windows in the space are spelled in C.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EmitStyle {
    /// `malloc`/`free` for arrays, plain locals for scalars.
    #[default]
    Heap,
    /// One vector register per innermost row.
    Vector { ctype: String, lanes: usize },
    /// Accelerator scratchpad reached through allocator calls.
    Scratchpad { alloc_fn: String, free_fn: String },
}

/// A named memory space.
#[derive(Debug, Clone)]
pub struct MemSpace {
    name: String,
    flags: EnumSet<MemFlag>,
    alloc: AllocRule,
    emit: EmitStyle,
    header: Option<String>,
}

impl PartialEq for MemSpace {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MemSpace {}

impl std::hash::Hash for MemSpace {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for MemSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[bon]
impl MemSpace {
    /// Create a memory space descriptor.
    ///
    /// Fails when `BlockTransferOnly` is combined with element capabilities.
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        #[builder(default)] flags: EnumSet<MemFlag>,
        #[builder(default)] alloc: AllocRule,
        #[builder(default)] emit: EmitStyle,
        #[builder(into)] header: Option<String>,
    ) -> Result<Self> {
        ensure!(
            !(flags.contains(MemFlag::BlockTransferOnly)
                && (flags.contains(MemFlag::ElementRead) || flags.contains(MemFlag::ElementWrite))),
            InvalidCapabilitiesSnafu { name, reason: "block-transfer-only spaces cannot allow element access" }
        );
        if let EmitStyle::Vector { lanes, .. } = &emit {
            ensure!(
                alloc.inner_extent == Some(*lanes),
                InvalidCapabilitiesSnafu {
                    name,
                    reason: "vector spaces must fix the innermost extent to the lane count",
                }
            );
        }
        Ok(Self { name, flags, alloc, emit, header })
    }
}

impl MemSpace {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> EnumSet<MemFlag> {
        self.flags
    }

    pub fn alloc_rule(&self) -> &AllocRule {
        &self.alloc
    }

    pub fn emit_style(&self) -> &EmitStyle {
        &self.emit
    }

    /// Extra C header the space needs (`<immintrin.h>` for AVX).
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn can_read_element(&self) -> bool {
        self.flags.contains(MemFlag::ElementRead)
    }

    pub fn can_write_element(&self) -> bool {
        self.flags.contains(MemFlag::ElementWrite)
    }

    pub fn is_block_only(&self) -> bool {
        self.flags.contains(MemFlag::BlockTransferOnly)
    }

    /// Check an allocation of `elem` with the given dimensions.
    ///
    /// `dims` holds the literal value of each dimension, or `None` when the
    /// extent is symbolic.
    pub fn check_alloc(&self, elem: ScalarDType, dims: &[Option<i64>]) -> Result<()> {
        ensure!(
            self.alloc.elements.contains(elem),
            UnsupportedElementSnafu { space: self.name.clone(), elem }
        );
        if let Some(expected) = self.alloc.inner_extent {
            let Some(inner) = dims.last() else {
                return RankRequiredSnafu { space: self.name.clone() }.fail();
            };
            ensure!(
                *inner == Some(expected as i64),
                InnerExtentSnafu {
                    space: self.name.clone(),
                    expected,
                    actual: inner.map(|v| v.to_string()).unwrap_or_else(|| "a symbolic extent".to_string()),
                }
            );
        }
        tracing::trace!(space = %self.name, %elem, rank = dims.len(), "allocation accepted");
        Ok(())
    }

    /// Check the innermost stride of a buffer placed in this space.
    ///
    /// `inner_stride` is the proven literal stride, `None` when unknown.
    pub fn check_inner_stride(&self, inner_stride: Option<i64>) -> Result<()> {
        if self.alloc.unit_inner_stride {
            ensure!(inner_stride == Some(1), NonContiguousInnerSnafu { space: self.name.clone() });
        }
        Ok(())
    }

    /// C declaration for a block-scoped allocation.
    pub fn alloc_c(&self, name: &str, elem: ScalarDType, dims: &[String]) -> String {
        let ctype = elem.c_style();
        match &self.emit {
            EmitStyle::Heap if dims.is_empty() => format!("{ctype} {name};"),
            EmitStyle::Heap => {
                format!("{ctype} *{name} = ({ctype}*) malloc({} * sizeof(*{name}));", dims.join(" * "))
            }
            EmitStyle::Vector { ctype, .. } => match dims.split_last() {
                Some((_, [])) | None => format!("{ctype} {name};"),
                Some((_, outer)) => format!("{ctype} {name}[{}];", outer.join(" * ")),
            },
            EmitStyle::Scratchpad { alloc_fn, .. } => {
                let count = if dims.is_empty() { "1".to_string() } else { dims.join(" * ") };
                format!("{ctype} *{name} = ({ctype}*) {alloc_fn}({count} * sizeof({ctype}));")
            }
        }
    }

    /// C statement releasing an allocation at block exit, if any.
    pub fn free_c(&self, name: &str, dims: &[String]) -> Option<String> {
        match &self.emit {
            EmitStyle::Heap if dims.is_empty() => None,
            EmitStyle::Heap => Some(format!("free({name});")),
            EmitStyle::Vector { .. } => None,
            EmitStyle::Scratchpad { free_fn, .. } => Some(format!("{free_fn}({name});")),
        }
    }

    /// C expression for the start of a window beginning at `offset` elements.
    pub fn window_c(&self, name: &str, offset: &str, offset_is_zero: bool) -> String {
        match &self.emit {
            EmitStyle::Vector { .. } if offset_is_zero => name.to_string(),
            EmitStyle::Vector { lanes, .. } => format!("{name}[({offset}) / {lanes}]"),
            EmitStyle::Heap | EmitStyle::Scratchpad { .. } if offset_is_zero => name.to_string(),
            EmitStyle::Heap | EmitStyle::Scratchpad { .. } => format!("&{name}[{offset}]"),
        }
    }
}
