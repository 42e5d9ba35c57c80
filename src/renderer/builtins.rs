//! Functions callable from templates
//!
//! Filters desugar to calls, so `archs | join(", ")` reaches `join` with the
//! piped value as its first argument.

use std::borrow::Cow;

use crate::catalog::{Arch, Catalog, Kernel, Machine};
use crate::renderer::error::Reason;
use crate::renderer::value::Value;

/// Invoke builtin `name` with already-evaluated arguments
pub fn call<'a>(
    name: &str,
    args: Vec<Value<'a>>,
    catalog: &'a Catalog,
) -> Result<Value<'a>, Reason> {
    match name {
        "len" => {
            let [value] = arity::<1>(name, "1", args)?;
            len(&value)
        }
        "range" => match args.len() {
            1 => range(0, args[0].as_int()?),
            2 => range(args[0].as_int()?, args[1].as_int()?),
            found => Err(Reason::ArgumentCount {
                function: name.to_string(),
                expected: "1 or 2",
                found,
            }),
        },
        "join" => {
            let [items, sep] = arity::<2>(name, "2", args)?;
            join(&items, sep.as_str()?)
        }
        "upper" => {
            let [s] = arity::<1>(name, "1", args)?;
            Ok(Value::from(s.as_str()?.to_uppercase()))
        }
        "lower" => {
            let [s] = arity::<1>(name, "1", args)?;
            Ok(Value::from(s.as_str()?.to_lowercase()))
        }
        "replace" => {
            let [s, from, to] = arity::<3>(name, "3", args)?;
            Ok(Value::from(s.as_str()?.replace(from.as_str()?, to.as_str()?)))
        }
        "flags" => {
            let [arch, compiler] = arity::<2>(name, "2", args)?;
            let arch = as_arch(&arch, catalog)?;
            Ok(Value::list(
                arch.flags_for(compiler.as_str()?)
                    .iter()
                    .map(|f| Value::Str(Cow::Borrowed(f.as_str())))
                    .collect(),
            ))
        }
        "impls" => {
            let [kernel, machine] = arity::<2>(name, "2", args)?;
            let kernel = as_kernel(&kernel, catalog)?;
            let machine = as_machine(&machine, catalog)?;
            Ok(Value::list(
                kernel
                    .impls_for(machine)
                    .map(|imp| Value::Impl(kernel, imp))
                    .collect(),
            ))
        }
        _ => Err(Reason::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

fn arity<'a, const N: usize>(
    function: &str,
    expected: &'static str,
    args: Vec<Value<'a>>,
) -> Result<[Value<'a>; N], Reason> {
    let found = args.len();
    args.try_into().map_err(|_| Reason::ArgumentCount {
        function: function.to_string(),
        expected,
        found,
    })
}

fn len(value: &Value<'_>) -> Result<Value<'static>, Reason> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        other => return Err(Reason::type_mismatch("string, list or map", other)),
    };
    i64::try_from(n).map(Value::Int).map_err(|_| Reason::Overflow)
}

/// Most items a single `range` call may produce
pub const RANGE_LIMIT: u64 = 1_000_000;

fn range(start: i64, end: i64) -> Result<Value<'static>, Reason> {
    // Empty when end <= start; i128 keeps the width of extreme bounds exact
    let len = (i128::from(end) - i128::from(start)).max(0);
    let len = u64::try_from(len).unwrap_or(u64::MAX);
    if len > RANGE_LIMIT {
        return Err(Reason::RangeTooLarge {
            len,
            limit: RANGE_LIMIT,
        });
    }
    Ok(Value::list((start..end).map(Value::Int).collect()))
}

fn join(items: &Value<'_>, sep: &str) -> Result<Value<'static>, Reason> {
    let mut out = String::new();
    for (i, item) in items.iter_items()?.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        item.write_text(&mut out)?;
    }
    Ok(Value::from(out))
}

// Records may be passed directly or by name

fn as_arch<'a>(value: &Value<'a>, catalog: &'a Catalog) -> Result<&'a Arch, Reason> {
    match value {
        Value::Arch(arch) => Ok(*arch),
        Value::Str(name) => catalog.arch(name).ok_or_else(|| Reason::UndefinedKey {
            key: name.to_string(),
        }),
        other => Err(Reason::type_mismatch("architecture", other)),
    }
}

fn as_kernel<'a>(value: &Value<'a>, catalog: &'a Catalog) -> Result<&'a Kernel, Reason> {
    match value {
        Value::Kernel(kernel) => Ok(*kernel),
        Value::Str(name) => catalog.kernel(name).ok_or_else(|| Reason::UndefinedKey {
            key: name.to_string(),
        }),
        other => Err(Reason::type_mismatch("kernel", other)),
    }
}

fn as_machine<'a>(value: &Value<'a>, catalog: &'a Catalog) -> Result<&'a Machine, Reason> {
    match value {
        Value::Machine(machine) => Ok(*machine),
        Value::Str(name) => catalog.machine(name).ok_or_else(|| Reason::UndefinedKey {
            key: name.to_string(),
        }),
        other => Err(Reason::type_mismatch("machine", other)),
    }
}
