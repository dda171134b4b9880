//! Types for code generation.

use kiln_dtype::{DType, ScalarDType};

/// A rendered translation unit ready for a C compiler.
#[derive(Debug, Clone)]
pub struct RenderedKernel {
    /// The generated source.
    pub code: String,

    /// Entry point function name.
    pub entry_point: String,

    /// Name of the procedure the unit was rendered from.
    pub name: String,

    /// Arguments of the entry point, in signature order.
    pub args: Vec<KernelArg>,
}

/// One argument of the entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelArg {
    /// Position in the C signature.
    pub index: usize,

    pub name: String,

    pub kind: ArgKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    /// The `kiln_Context *` carrying config state.
    Context,
    /// Size, index, stride or boolean value.
    Control(DType),
    /// Numeric scalar or tensor passed by address.
    Buffer { elem: ScalarDType, rank: usize, space: String, is_output: bool },
}

impl RenderedKernel {
    pub fn new(code: String, entry_point: String, name: String) -> Self {
        Self { code, entry_point, name, args: Vec::new() }
    }

    pub fn add_arg(&mut self, name: impl Into<String>, kind: ArgKind) {
        let index = self.args.len();
        self.args.push(KernelArg { index, name: name.into(), kind });
    }

    /// Buffer arguments written by the kernel.
    pub fn outputs(&self) -> impl Iterator<Item = &KernelArg> {
        self.args.iter().filter(|arg| matches!(arg.kind, ArgKind::Buffer { is_output: true, .. }))
    }
}
