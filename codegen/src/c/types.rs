//! C type mapping and literal rendering for the C backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use itertools::Itertools;
use kiln_dtype::{DType, ScalarDType};
use kiln_ir::{ConfigDecl, ConstValue, Sym};

/// C type of a control value.
pub fn c_control(dtype: DType, index_ctype: &str) -> String {
    if dtype.is_indexable() { index_ctype.to_string() } else { dtype.c_style().to_string() }
}

/// C type of a config field.
pub fn c_field(dtype: DType, index_ctype: &str) -> String {
    match dtype {
        DType::Scalar(s) => s.c_style().to_string(),
        other => c_control(other, index_ctype),
    }
}

/// Render a float as a C double literal.
pub fn c_float(value: f64) -> String {
    if value.is_nan() {
        "(0.0 / 0.0)".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "(1.0 / 0.0)" } else { "(-1.0 / 0.0)" }.to_string()
    } else {
        format!("{value:?}")
    }
}

pub fn c_const(value: &ConstValue) -> String {
    match value {
        ConstValue::Int(v) => v.to_string(),
        ConstValue::Float(v) => c_float(*v),
        ConstValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
    }
}

/// Name of the struct describing a strided view, e.g. `win_2f32`.
pub fn window_struct(rank: usize, elem: ScalarDType) -> String {
    format!("win_{rank}{}", elem.c_suffix())
}

pub fn window_struct_decl(rank: usize, elem: ScalarDType, index_ctype: &str) -> String {
    let name = window_struct(rank, elem);
    format!("struct {name} {{\n    {} *data;\n    {index_ctype} strides[{rank}];\n}};", elem.c_style())
}

/// Struct declarations for every config plus the context gathering them.
pub fn context_decls(configs: &BTreeMap<Sym, Arc<ConfigDecl>>, index_ctype: &str) -> Vec<String> {
    if configs.is_empty() {
        return vec!["typedef struct kiln_Context kiln_Context;".to_string()];
    }
    let mut decls: Vec<String> = configs
        .values()
        .map(|config| {
            let fields = config
                .fields()
                .iter()
                .map(|(field, dtype)| format!("    {} {field};", c_field(*dtype, index_ctype)))
                .join("\n");
            format!("struct {} {{\n{fields}\n}};", config.name())
        })
        .collect();
    let members = configs.keys().map(|name| format!("    struct {name} {name};")).join("\n");
    decls.push(format!("typedef struct kiln_Context {{\n{members}\n}} kiln_Context;"));
    decls
}
