//! Descriptor and generic-signature synthesis for resolved types.
//!
//! Descriptors are the erased encoding stored in a class file's method
//! table; generic signatures are the parallel `Signature` attribute
//! encoding that keeps type variables and type arguments.
//!
//! | type                        | descriptor             | signature                 |
//! |-----------------------------|------------------------|---------------------------|
//! | `int`                       | `I`                    | `I`                       |
//! | `String[][]`                | `[[Ljava/lang/String;` | `[[Ljava/lang/String;`    |
//! | `List<T>`, `T extends Number` | `Ljava/util/List;`   | `Ljava/util/List<TT;>;`   |
//! | `T`, `T extends Number`     | `Ljava/lang/Number;`   | `TT;`                     |

use std::fmt::Write as _;

use crate::errors::{StirrinError, StirrinResult};
use crate::models::{PrimitiveType, ResolvedType, TypeArgument, TypeParameter, OBJECT_CLASS};

/// Type-variable chains deeper than this are treated as unbounded.
const MAX_BOUND_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// `java.util.Map$Entry` → `java/util/Map$Entry`.
pub fn internal_name(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// `java/util/Map$Entry` → `java.util.Map$Entry`.
pub fn binary_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// `java.lang.String` → `Ljava/lang/String;`.
pub fn class_descriptor(binary_name: &str) -> String {
    format!("L{};", internal_name(binary_name))
}

pub fn primitive_code(primitive: PrimitiveType) -> char {
    match primitive {
        PrimitiveType::Void => 'V',
        PrimitiveType::Boolean => 'Z',
        PrimitiveType::Char => 'C',
        PrimitiveType::Byte => 'B',
        PrimitiveType::Short => 'S',
        PrimitiveType::Int => 'I',
        PrimitiveType::Float => 'F',
        PrimitiveType::Long => 'J',
        PrimitiveType::Double => 'D',
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Erased descriptor of `ty`. Type variables are erased to the erasure of
/// their first bound in `scope`, or to the root object type.
pub fn descriptor(ty: &ResolvedType, scope: &[TypeParameter]) -> String {
    let mut out = String::new();
    write_descriptor(&mut out, ty, scope, 0);
    out
}

fn write_descriptor(out: &mut String, ty: &ResolvedType, scope: &[TypeParameter], depth: usize) {
    match ty {
        ResolvedType::Primitive(p) => out.push(primitive_code(*p)),
        ResolvedType::Array {
            dimensions,
            element,
        } => {
            for _ in 0..*dimensions {
                out.push('[');
            }
            write_descriptor(out, element, scope, depth);
        }
        ResolvedType::Class(name) | ResolvedType::Parameterized { class: name, .. } => {
            out.push_str(&class_descriptor(name));
        }
        ResolvedType::TypeVariable(name) => {
            match first_bound(name, scope).filter(|_| depth < MAX_BOUND_DEPTH) {
                Some(bound) => write_descriptor(out, bound, scope, depth + 1),
                None => out.push_str(&class_descriptor(OBJECT_CLASS)),
            }
        }
    }
}

fn first_bound<'a>(name: &str, scope: &'a [TypeParameter]) -> Option<&'a ResolvedType> {
    scope
        .iter()
        .find(|p| p.name == name)
        .and_then(|p| p.bounds.first())
}

/// Internal name of the erased class of `ty`, used where the class file
/// wants a class reference rather than a descriptor (thrown exceptions).
pub fn erased_internal_name(ty: &ResolvedType, scope: &[TypeParameter]) -> String {
    let desc = descriptor(ty, scope);
    match desc.strip_prefix('L').and_then(|d| d.strip_suffix(';')) {
        Some(name) => name.to_string(),
        None => desc,
    }
}

pub fn method_descriptor(
    parameters: &[ResolvedType],
    return_type: &ResolvedType,
    scope: &[TypeParameter],
) -> String {
    let mut out = String::from("(");
    for param in parameters {
        write_descriptor(&mut out, param, scope, 0);
    }
    out.push(')');
    write_descriptor(&mut out, return_type, scope, 0);
    out
}

// ---------------------------------------------------------------------------
// Generic signatures
// ---------------------------------------------------------------------------

/// Generic-signature fragment of `ty`.
///
/// Fails on bounded wildcards, which are not supported.
pub fn type_signature(ty: &ResolvedType) -> StirrinResult<String> {
    let mut out = String::new();
    write_signature(&mut out, ty)?;
    Ok(out)
}

fn write_signature(out: &mut String, ty: &ResolvedType) -> StirrinResult<()> {
    match ty {
        ResolvedType::Primitive(p) => out.push(primitive_code(*p)),
        ResolvedType::Array {
            dimensions,
            element,
        } => {
            for _ in 0..*dimensions {
                out.push('[');
            }
            write_signature(out, element)?;
        }
        ResolvedType::Class(name) => out.push_str(&class_descriptor(name)),
        ResolvedType::Parameterized { class, arguments } => {
            // Arguments go right after the raw name, inside the same class
            // type: `Ljava/util/List<TT;>;`, never `Ljava/util/List;<TT;>;`.
            out.push('L');
            out.push_str(&internal_name(class));
            if !arguments.is_empty() {
                out.push('<');
                for arg in arguments {
                    write_type_argument(out, arg)?;
                }
                out.push('>');
            }
            out.push(';');
        }
        ResolvedType::TypeVariable(name) => {
            let _ = write!(out, "T{name};");
        }
    }
    Ok(())
}

fn write_type_argument(out: &mut String, arg: &TypeArgument) -> StirrinResult<()> {
    match arg {
        TypeArgument::Type(ty) => write_signature(out, ty),
        TypeArgument::Wildcard => {
            out.push('*');
            Ok(())
        }
        TypeArgument::Extends(bound) | TypeArgument::Super(bound) => Err(StirrinError::Signature(
            format!("bounded wildcard `{}` is not supported", wildcard_text(arg, bound)),
        )),
    }
}

fn wildcard_text(arg: &TypeArgument, bound: &ResolvedType) -> String {
    match arg {
        TypeArgument::Super(_) => format!("? super {bound}"),
        _ => format!("? extends {bound}"),
    }
}

/// `<T:Ljava/lang/Number;U:Ljava/lang/Object;:Ljava/lang/Comparable<TU;>;>`
///
/// The first bound follows the parameter name with `:`, each further bound
/// gets its own `:` prefix; an unbounded parameter is bound to the root
/// object type.
pub fn formal_type_parameters(params: &[TypeParameter]) -> StirrinResult<String> {
    let mut out = String::new();
    if params.is_empty() {
        return Ok(out);
    }
    out.push('<');
    for param in params {
        out.push_str(&param.name);
        if param.bounds.is_empty() {
            out.push(':');
            out.push_str(&class_descriptor(OBJECT_CLASS));
            continue;
        }
        for bound in &param.bounds {
            out.push(':');
            write_signature(&mut out, bound)?;
        }
    }
    out.push('>');
    Ok(out)
}

/// Complete method signature. Thrown types are only encoded when at least
/// one of them is a type variable, as the descriptor-level exception list
/// already covers plain classes.
pub fn method_signature(
    type_parameters: &[TypeParameter],
    parameters: &[ResolvedType],
    return_type: &ResolvedType,
    thrown: &[ResolvedType],
) -> StirrinResult<String> {
    let mut out = formal_type_parameters(type_parameters)?;
    out.push('(');
    for param in parameters {
        write_signature(&mut out, param)?;
    }
    out.push(')');
    write_signature(&mut out, return_type)?;
    if thrown.iter().any(|t| matches!(t, ResolvedType::TypeVariable(_))) {
        for t in thrown {
            out.push('^');
            write_signature(&mut out, t)?;
        }
    }
    Ok(out)
}

/// Whether `ty` needs a generic signature to be described faithfully.
pub fn is_generic(ty: &ResolvedType) -> bool {
    match ty {
        ResolvedType::Primitive(_) | ResolvedType::Class(_) => false,
        ResolvedType::Array { element, .. } => is_generic(element),
        ResolvedType::Parameterized { .. } | ResolvedType::TypeVariable(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Descriptor inspection
// ---------------------------------------------------------------------------

/// Parameter count and local-variable slots taken by the parameters of a
/// method descriptor (`long` and `double` take two).
pub fn parameter_layout(method_descriptor: &str) -> StirrinResult<(usize, u16)> {
    let bytes = method_descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(bad_descriptor(method_descriptor));
    }
    let mut i = 1;
    let mut count = 0usize;
    let mut slots = 0u16;
    loop {
        match bytes.get(i) {
            Some(b')') => break,
            None => return Err(bad_descriptor(method_descriptor)),
            Some(_) => {}
        }
        let start = i;
        while bytes.get(i) == Some(&b'[') {
            i += 1;
        }
        match bytes.get(i) {
            Some(b'L') => {
                let end = bytes[i..]
                    .iter()
                    .position(|&b| b == b';')
                    .ok_or_else(|| bad_descriptor(method_descriptor))?;
                i += end + 1;
            }
            Some(b'B' | b'C' | b'F' | b'I' | b'S' | b'Z' | b'J' | b'D') => i += 1,
            _ => return Err(bad_descriptor(method_descriptor)),
        }
        let wide = i - start == 1 && matches!(bytes[start], b'J' | b'D');
        slots = slots.saturating_add(if wide { 2 } else { 1 });
        count += 1;
    }
    Ok((count, slots))
}

fn bad_descriptor(desc: &str) -> StirrinError {
    StirrinError::Signature(format!("malformed method descriptor `{desc}`"))
}
