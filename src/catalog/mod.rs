//! Architecture, machine and kernel catalogs
//!
//! A catalog is authored as a single TOML document:
//!
//! ```toml
//! [[arch]]
//! name = "sse2"
//! alignment = 16
//! flags = { gnu = ["-msse2"] }
//!
//! [[machine]]
//! name = "sse2"
//! archs = ["generic", "32|64", "sse", "sse2", "orc|"]
//!
//! [[kernel]]
//! name = "x2_add_32f"
//! [[kernel.impl]]
//! name = "a_sse2"
//! deps = ["sse2"]
//! ```
//!
//! Machine arch lists may hold alternative groups (`32|64`, `orc|`). Each
//! machine expands into one concrete machine per combination; choosing `x`
//! appends `_x` to the machine name, and an empty alternative drops the group.

mod records;

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub use records::{Arch, ArchKind, Impl, Kernel, KernelArg, Machine};

/// Errors that can occur when loading or validating catalogs
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse catalog TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("duplicate {what} name: {name}")]
    Duplicate { what: &'static str, name: String },
    #[error("{owner} references unknown architecture `{arch}`")]
    UnknownArch { owner: String, arch: String },
    #[error("machine {machine}: `{arch}` is used as an alternative but is not orable")]
    NotOrable { machine: String, arch: String },
}

/// The three read-only tables a template renders against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub archs: Vec<Arch>,
    pub machines: Vec<Machine>,
    pub kernels: Vec<Kernel>,
}

/// TOML structure for deserializing catalogs
#[derive(Deserialize)]
struct TomlCatalog {
    #[serde(default)]
    arch: Vec<Arch>,
    #[serde(default)]
    machine: Vec<TomlMachine>,
    #[serde(default)]
    kernel: Vec<Kernel>,
}

#[derive(Deserialize)]
struct TomlMachine {
    name: String,
    archs: Vec<String>,
}

/// Catalog compiled into the binary, used when no `--catalog` is given
const BUILTIN_CATALOG: &str = include_str!("builtin.toml");

impl Catalog {
    /// Assemble a catalog from already-built tables, without validation
    pub fn new(archs: Vec<Arch>, machines: Vec<Machine>, kernels: Vec<Kernel>) -> Self {
        Self {
            archs,
            machines,
            kernels,
        }
    }

    /// Catalog shipped with the crate
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_str(BUILTIN_CATALOG)
    }

    /// Load catalog from TOML file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load catalog from TOML string, expanding and validating machines
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, CatalogError> {
        let parsed: TomlCatalog = toml::from_str(content)?;

        let mut machines = Vec::new();
        for machine in &parsed.machine {
            check_alternatives(machine, &parsed.arch)?;
            expand_machine(&machine.name, &machine.archs, &mut machines);
        }

        let catalog = Catalog::new(parsed.arch, machines, parsed.kernel);
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check name uniqueness and that every arch reference resolves
    pub fn validate(&self) -> Result<(), CatalogError> {
        unique("architecture", self.archs.iter().map(|a| a.name.as_str()))?;
        unique("machine", self.machines.iter().map(|m| m.name.as_str()))?;
        unique("kernel", self.kernels.iter().map(|k| k.name.as_str()))?;

        for machine in &self.machines {
            for arch in &machine.archs {
                self.require_arch(format!("machine {}", machine.name), arch)?;
            }
        }
        for kernel in &self.kernels {
            unique(
                "implementation",
                kernel.impls.iter().map(|i| i.name.as_str()),
            )?;
            for imp in &kernel.impls {
                for dep in &imp.deps {
                    self.require_arch(format!("kernel {} impl {}", kernel.name, imp.name), dep)?;
                }
            }
        }
        Ok(())
    }

    fn require_arch(&self, owner: String, arch: &str) -> Result<(), CatalogError> {
        match self.arch(arch) {
            Some(_) => Ok(()),
            None => Err(CatalogError::UnknownArch {
                owner,
                arch: arch.to_string(),
            }),
        }
    }

    pub fn arch(&self, name: &str) -> Option<&Arch> {
        self.archs.iter().find(|a| a.name == name)
    }

    pub fn machine(&self, name: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.name == name)
    }

    pub fn kernel(&self, name: &str) -> Option<&Kernel> {
        self.kernels.iter().find(|k| k.name == name)
    }
}

fn unique<'n>(what: &'static str, names: impl Iterator<Item = &'n str>) -> Result<(), CatalogError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CatalogError::Duplicate {
                what,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Only orable architectures may appear in `a|b` groups
fn check_alternatives(machine: &TomlMachine, archs: &[Arch]) -> Result<(), CatalogError> {
    for group in machine.archs.iter().filter(|a| a.contains('|')) {
        for alternative in group.split('|').filter(|a| !a.is_empty()) {
            match archs.iter().find(|a| a.name == alternative) {
                Some(arch) if arch.is_orable() => {}
                Some(_) => {
                    return Err(CatalogError::NotOrable {
                        machine: machine.name.clone(),
                        arch: alternative.to_string(),
                    })
                }
                None => {
                    return Err(CatalogError::UnknownArch {
                        owner: format!("machine {}", machine.name),
                        arch: alternative.to_string(),
                    })
                }
            }
        }
    }
    Ok(())
}

/// Expand the first alternative group, recursing until none remain
fn expand_machine(name: &str, archs: &[String], out: &mut Vec<Machine>) {
    let Some(index) = archs.iter().position(|a| a.contains('|')) else {
        out.push(Machine::new(name, archs.iter().cloned()));
        return;
    };
    for alternative in archs[index].split('|') {
        let mut chosen = archs.to_vec();
        if alternative.is_empty() {
            chosen.remove(index);
            expand_machine(name, &chosen, out);
        } else {
            chosen[index] = alternative.to_string();
            expand_machine(&format!("{}_{}", name, alternative), &chosen, out);
        }
    }
}
