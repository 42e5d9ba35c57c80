//! Catalog record types
//!
//! These are the closed schema the template engine resolves attributes
//! against; see `renderer::value` for the attribute names exposed.

use std::collections::BTreeMap;

use serde::Deserialize;

/// How an architecture participates in machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchKind {
    /// A CPU extension with its own code paths
    #[default]
    Hardware,
    /// A build-environment alternative (word size, float ABI, orc) that
    /// machines choose between with `a|b` groups
    Orable,
}

impl ArchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchKind::Hardware => "hardware",
            ArchKind::Orable => "orable",
        }
    }
}

fn default_alignment() -> u32 {
    1
}

/// One CPU instruction-set extension
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Arch {
    pub name: String,
    #[serde(default)]
    pub kind: ArchKind,
    /// Required memory alignment in bytes for aligned kernels
    #[serde(default = "default_alignment")]
    pub alignment: u32,
    /// Compiler name -> flags enabling this extension
    #[serde(default)]
    pub flags: BTreeMap<String, Vec<String>>,
    /// Runtime CPU feature checks that must all pass
    #[serde(default)]
    pub checks: Vec<String>,
    /// Statement run once when the extension is selected
    pub environment: Option<String>,
    /// Header providing the extension's intrinsics
    pub include: Option<String>,
}

impl Arch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArchKind::Hardware,
            alignment: 1,
            flags: BTreeMap::new(),
            checks: Vec::new(),
            environment: None,
            include: None,
        }
    }

    pub fn with_kind(mut self, kind: ArchKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_flags<S: Into<String>>(
        mut self,
        compiler: impl Into<String>,
        flags: impl IntoIterator<Item = S>,
    ) -> Self {
        self.flags
            .insert(compiler.into(), flags.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_orable(&self) -> bool {
        self.kind == ArchKind::Orable
    }

    /// Flags for `compiler`, empty when the compiler needs none
    pub fn flags_for(&self, compiler: &str) -> &[String] {
        self.flags.get(compiler).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A deployable CPU profile: architectures in preference order
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub name: String,
    pub archs: Vec<String>,
}

impl Machine {
    pub fn new<S: Into<String>>(name: impl Into<String>, archs: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            archs: archs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_arch(&self, name: &str) -> bool {
        self.archs.iter().any(|a| a == name)
    }
}

/// One parameter of a kernel's C signature
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KernelArg {
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
}

/// One architecture-specific variant of a kernel
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Impl {
    pub name: String,
    /// Architectures this variant needs
    #[serde(default)]
    pub deps: Vec<String>,
}

impl Impl {
    pub fn new<S: Into<String>>(name: impl Into<String>, deps: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            deps: deps.into_iter().map(Into::into).collect(),
        }
    }

    /// Aligned variants are named `a_<arch>`
    pub fn is_aligned(&self) -> bool {
        self.name.starts_with("a_")
    }
}

/// A computational routine with per-architecture variants
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Kernel {
    pub name: String,
    #[serde(default, rename = "impl")]
    pub impls: Vec<Impl>,
    #[serde(default)]
    pub args: Vec<KernelArg>,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            impls: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn with_impl(mut self, imp: Impl) -> Self {
        self.impls.push(imp);
        self
    }

    pub fn with_arg(mut self, ty: impl Into<String>, name: impl Into<String>) -> Self {
        self.args.push(KernelArg {
            ty: ty.into(),
            name: name.into(),
        });
        self
    }

    /// Symbol name of one variant
    pub fn function_name(&self, imp: &Impl) -> String {
        format!("{}_{}", self.name, imp.name)
    }

    /// `type name, type name, ...`
    pub fn arglist(&self) -> String {
        self.args
            .iter()
            .map(|a| format!("{} {}", a.ty, a.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `name, name, ...`
    pub fn argnames(&self) -> String {
        self.args
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Variants whose dependencies the machine fully provides, in catalog order
    pub fn impls_for<'k>(&'k self, machine: &'k Machine) -> impl Iterator<Item = &'k Impl> + 'k {
        self.impls
            .iter()
            .filter(move |imp| imp.deps.iter().all(|d| machine.has_arch(d)))
    }
}
