//! Runtime values seen by templates
//!
//! Catalog records are held by reference; attribute access is resolved
//! against a fixed table per record type, so a misspelled field is an error
//! and never an empty string.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{Arch, Catalog, Impl, Kernel, KernelArg, Machine};
use crate::renderer::error::Reason;

#[derive(Debug, Clone)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Str(Cow<'a, str>),
    List(Arc<Vec<Value<'a>>>),
    Map(Arc<BTreeMap<String, Value<'a>>>),
    Arch(&'a Arch),
    Machine(&'a Machine),
    Kernel(&'a Kernel),
    Impl(&'a Kernel, &'a Impl),
    Arg(&'a KernelArg),
}

impl<'a> Value<'a> {
    pub fn list(items: Vec<Value<'a>>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn map(entries: BTreeMap<String, Value<'a>>) -> Self {
        Value::Map(Arc::new(entries))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Arch(_) => "architecture",
            Value::Machine(_) => "machine",
            Value::Kernel(_) => "kernel",
            Value::Impl(..) => "implementation",
            Value::Arg(_) => "argument",
        }
    }

    /// Human-readable owner for error messages
    fn describe(&self) -> String {
        match self {
            Value::Arch(a) => format!("architecture `{}`", a.name),
            Value::Machine(m) => format!("machine `{}`", m.name),
            Value::Kernel(k) => format!("kernel `{}`", k.name),
            Value::Impl(k, i) => format!("implementation `{}` of kernel `{}`", i.name, k.name),
            Value::Arg(a) => format!("argument `{}`", a.name),
            other => other.type_name().to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Result<&str, Reason> {
        match self {
            Value::Str(s) => Ok(&**s),
            other => Err(Reason::type_mismatch("string", other)),
        }
    }

    pub fn as_int(&self) -> Result<i64, Reason> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(Reason::type_mismatch("int", other)),
        }
    }

    /// Append the text form of this value
    pub fn write_text(&self, out: &mut String) -> Result<(), Reason> {
        match self {
            Value::Str(s) => out.push_str(s),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Arch(a) => out.push_str(&a.name),
            Value::Machine(m) => out.push_str(&m.name),
            Value::Kernel(k) => out.push_str(&k.name),
            Value::Impl(_, i) => out.push_str(&i.name),
            Value::Arg(a) => out.push_str(&a.name),
            other => return Err(Reason::type_mismatch("a printable value", other)),
        }
        Ok(())
    }

    /// Items visited by a `for` loop; maps yield their keys in order
    pub fn iter_items(&self) -> Result<Vec<Value<'a>>, Reason> {
        match self {
            Value::List(items) => Ok(items.as_ref().clone()),
            Value::Map(entries) => Ok(entries
                .keys()
                .map(|k| Value::Str(Cow::Owned(k.clone())))
                .collect()),
            other => Err(Reason::type_mismatch("list or map", other)),
        }
    }

    /// Resolve `self.name`
    pub fn attr(&self, name: &str, catalog: &'a Catalog) -> Result<Value<'a>, Reason> {
        let found = match self {
            Value::Arch(arch) => arch_attr(*arch, name),
            Value::Machine(machine) => machine_attr(*machine, name, catalog)?,
            Value::Kernel(kernel) => kernel_attr(*kernel, name),
            Value::Impl(kernel, imp) => impl_attr(*kernel, *imp, name, catalog)?,
            Value::Arg(arg) => match name {
                "type" => Some(Value::Str(Cow::Borrowed((*arg).ty.as_str()))),
                "name" => Some(Value::Str(Cow::Borrowed((*arg).name.as_str()))),
                _ => None,
            },
            Value::Map(entries) => entries.get(name).cloned(),
            _ => None,
        };
        found.ok_or_else(|| Reason::UndefinedAttribute {
            owner: self.describe(),
            name: name.to_string(),
        })
    }

    /// Resolve `self[index]`
    pub fn index(&self, index: &Value<'a>) -> Result<Value<'a>, Reason> {
        match (self, index) {
            (Value::List(items), Value::Int(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(Reason::IndexOutOfRange {
                    index: *i,
                    len: items.len(),
                }),
            (Value::Map(entries), Value::Str(key)) => {
                entries
                    .get(&**key)
                    .cloned()
                    .ok_or_else(|| Reason::UndefinedKey {
                        key: key.to_string(),
                    })
            }
            (Value::List(_), other) => Err(Reason::type_mismatch("int index", other)),
            (Value::Map(_), other) => Err(Reason::type_mismatch("string key", other)),
            (other, _) => Err(Reason::type_mismatch("list or map", other)),
        }
    }

    /// `self in container`
    pub fn is_in(&self, container: &Value<'a>) -> Result<bool, Reason> {
        match container {
            Value::List(items) => Ok(items.iter().any(|item| item == self)),
            Value::Map(entries) => Ok(entries.contains_key(self.as_str()?)),
            Value::Str(haystack) => Ok(haystack.contains(self.as_str()?)),
            other => Err(Reason::type_mismatch("list, map or string", other)),
        }
    }
}

fn borrowed_strs(items: &[String]) -> Value<'_> {
    Value::list(
        items
            .iter()
            .map(|s| Value::Str(Cow::Borrowed(s.as_str())))
            .collect(),
    )
}

fn resolve_archs<'a>(
    names: &'a [String],
    owner: impl Fn() -> String,
    catalog: &'a Catalog,
) -> Result<Vec<&'a Arch>, Reason> {
    names
        .iter()
        .map(|name| {
            catalog.arch(name).ok_or_else(|| Reason::DanglingArch {
                owner: owner(),
                arch: name.clone(),
            })
        })
        .collect()
}

fn arch_attr<'a>(arch: &'a Arch, name: &str) -> Option<Value<'a>> {
    let optional = |field: &'a Option<String>| match field {
        Some(s) => Value::Str(Cow::Borrowed(s.as_str())),
        None => Value::Null,
    };
    Some(match name {
        "name" => Value::Str(Cow::Borrowed(arch.name.as_str())),
        "kind" => Value::Str(Cow::Borrowed(arch.kind.as_str())),
        "orable" => Value::Bool(arch.is_orable()),
        "alignment" => Value::Int(i64::from(arch.alignment)),
        "flags" => Value::map(
            arch.flags
                .iter()
                .map(|(compiler, flags)| (compiler.clone(), borrowed_strs(flags)))
                .collect(),
        ),
        "checks" => borrowed_strs(&arch.checks),
        "environment" => optional(&arch.environment),
        "include" => optional(&arch.include),
        _ => return None,
    })
}

fn machine_attr<'a>(
    machine: &'a Machine,
    name: &str,
    catalog: &'a Catalog,
) -> Result<Option<Value<'a>>, Reason> {
    let owner = || format!("machine `{}`", machine.name);
    Ok(Some(match name {
        "name" => Value::Str(Cow::Borrowed(machine.name.as_str())),
        "arch_names" => borrowed_strs(&machine.archs),
        "archs" => Value::list(
            resolve_archs(&machine.archs, owner, catalog)?
                .into_iter()
                .map(Value::Arch)
                .collect(),
        ),
        "alignment" => {
            let archs = resolve_archs(&machine.archs, owner, catalog)?;
            let alignment = archs.iter().map(|a| a.alignment).max().unwrap_or(1);
            Value::Int(i64::from(alignment))
        }
        _ => return Ok(None),
    }))
}

fn kernel_attr<'a>(kernel: &'a Kernel, name: &str) -> Option<Value<'a>> {
    Some(match name {
        "name" => Value::Str(Cow::Borrowed(kernel.name.as_str())),
        "impls" => Value::list(kernel.impls.iter().map(|i| Value::Impl(kernel, i)).collect()),
        "args" => Value::list(kernel.args.iter().map(Value::Arg).collect()),
        "arglist" => Value::Str(Cow::Owned(kernel.arglist())),
        "argnames" => Value::Str(Cow::Owned(kernel.argnames())),
        _ => return None,
    })
}

fn impl_attr<'a>(
    kernel: &'a Kernel,
    imp: &'a Impl,
    name: &str,
    catalog: &'a Catalog,
) -> Result<Option<Value<'a>>, Reason> {
    let owner = || format!("implementation `{}` of kernel `{}`", imp.name, kernel.name);
    Ok(Some(match name {
        "name" => Value::Str(Cow::Borrowed(imp.name.as_str())),
        "kernel" => Value::Kernel(kernel),
        "function" => Value::Str(Cow::Owned(kernel.function_name(imp))),
        "aligned" => Value::Bool(imp.is_aligned()),
        "dep_names" => borrowed_strs(&imp.deps),
        "deps" => Value::list(
            resolve_archs(&imp.deps, owner, catalog)?
                .into_iter()
                .map(Value::Arch)
                .collect(),
        ),
        _ => return Ok(None),
    }))
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Arch(a), Value::Arch(b)) => a.name == b.name,
            (Value::Machine(a), Value::Machine(b)) => a.name == b.name,
            (Value::Kernel(a), Value::Kernel(b)) => a.name == b.name,
            (Value::Impl(ka, a), Value::Impl(kb, b)) => ka.name == kb.name && a.name == b.name,
            (Value::Arg(a), Value::Arg(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value<'_> {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::Str(Cow::Owned(s))
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }
}

impl<'a, T: Into<Value<'a>>> From<Vec<T>> for Value<'a> {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into).collect())
    }
}
