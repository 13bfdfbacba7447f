// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codespec: an immutable, versioned container specification.
//!
//! Generalized from `oj-core::container::ContainerConfig` (a single `image`
//! field carried on agent-spawn effects) to the full attribute set spec.md
//! §3 requires: kind, command, args, env, working dir, resources, and the
//! two ordered buffer-parameter sets.

use crate::error::TygerError;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Kind of codespec: a single job, or a replicated worker set launched
/// alongside a job (spec.md §3, §4.4 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodespecKind {
    Job,
    Worker,
}

crate::simple_display! {
    CodespecKind {
        Job => "job",
        Worker => "worker",
    }
}

/// Resource quantities requested for a codespec's container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<String>,
}

/// The two ordered, case-insensitive-unique buffer parameter sets a
/// codespec declares (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferParameters {
    pub inputs: IndexSet<String>,
    pub outputs: IndexSet<String>,
}

impl BufferParameters {
    /// All declared parameter names, inputs then outputs.
    pub fn all_names(&self) -> impl Iterator<Item = &String> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Validate: no slashes, and case-insensitive-unique across inputs+outputs.
    fn validate(&self) -> Result<(), TygerError> {
        let mut seen_lower = std::collections::HashSet::new();
        for name in self.all_names() {
            if name.is_empty() {
                return Err(TygerError::validation("buffer parameter name must not be empty"));
            }
            if name.contains('/') {
                return Err(TygerError::validation(format!(
                    "buffer parameter name {name:?} must not contain '/'"
                )));
            }
            if !seen_lower.insert(name.to_ascii_lowercase()) {
                return Err(TygerError::validation(format!(
                    "buffer parameter name {name:?} is not unique (case-insensitive)"
                )));
            }
        }
        Ok(())
    }
}

/// An immutable, versioned container specification (spec.md §3).
///
/// `name` and `version` are assigned by the persistent store; everything
/// else is supplied by the caller of `upsert` (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codespec {
    pub name: String,
    pub version: u32,
    pub kind: CodespecKind,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub buffers: BufferParameters,
}

impl Codespec {
    /// Canonical reference string, e.g. `"foo/versions/3"`.
    pub fn canonical_ref(&self) -> String {
        format!("{}/versions/{}", self.name, self.version)
    }

    /// Validate the spec's own invariants (name, buffer parameter set).
    /// Does not touch version assignment — that belongs to the store.
    pub fn validate(&self) -> Result<(), TygerError> {
        if self.name.is_empty() {
            return Err(TygerError::validation("codespec name must not be empty"));
        }
        if self.name.contains('/') {
            return Err(TygerError::validation("codespec name must not contain '/'"));
        }
        if self.image.is_empty() {
            return Err(TygerError::validation("codespec image must not be empty"));
        }
        self.buffers.validate()
    }

    /// Deep-equality used by upsert to decide whether to assign a new
    /// version, per spec.md §4.1: "empty strings/collections treated as
    /// absent" — so an explicit `working_dir: Some("")` and `None` compare
    /// equal, and likewise for empty env/command/args maps.
    pub fn content_equals(&self, other: &Codespec) -> bool {
        self.kind == other.kind
            && self.image == other.image
            && normalize_vec(&self.command) == normalize_vec(&other.command)
            && normalize_vec(&self.args) == normalize_vec(&other.args)
            && normalize_map(&self.env) == normalize_map(&other.env)
            && normalize_opt_string(&self.working_dir) == normalize_opt_string(&other.working_dir)
            && self.resources == other.resources
            && self.buffers == other.buffers
    }
}

fn normalize_vec(v: &[String]) -> &[String] {
    if v.is_empty() {
        &[]
    } else {
        v
    }
}

fn normalize_map<'a>(m: &'a IndexMap<String, String>) -> Option<&'a IndexMap<String, String>> {
    if m.is_empty() {
        None
    } else {
        Some(m)
    }
}

fn normalize_opt_string(s: &Option<String>) -> Option<&str> {
    match s {
        Some(s) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// A parsed, unresolved reference of the form `NAME` or `NAME/versions/N`
/// (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodespecRef {
    pub name: String,
    pub version: Option<u32>,
}

impl CodespecRef {
    pub fn parse(reference: &str) -> Result<Self, TygerError> {
        if reference.is_empty() {
            return Err(TygerError::validation("codespec reference must not be empty"));
        }
        match reference.split_once("/versions/") {
            None => {
                if reference.contains('/') {
                    return Err(TygerError::validation(format!(
                        "malformed codespec reference: {reference:?}"
                    )));
                }
                Ok(Self { name: reference.to_string(), version: None })
            }
            Some((name, version_str)) => {
                if name.is_empty() || name.contains('/') {
                    return Err(TygerError::validation(format!(
                        "malformed codespec reference: {reference:?}"
                    )));
                }
                let version = version_str.parse::<u32>().map_err(|_| {
                    TygerError::validation(format!("malformed codespec reference: {reference:?}"))
                })?;
                Ok(Self { name: name.to_string(), version: Some(version) })
            }
        }
    }
}

crate::builder! {
    pub struct CodespecBuilder => Codespec {
        into {
            name: String = "test-codespec",
            image: String = "example.test/image:latest",
        }
        set {
            version: u32 = 1,
            kind: CodespecKind = CodespecKind::Job,
            command: Vec<String> = Vec::new(),
            args: Vec<String> = Vec::new(),
            env: IndexMap<String, String> = IndexMap::new(),
            resources: Resources = Resources::default(),
            buffers: BufferParameters = BufferParameters::default(),
        }
        option {
            working_dir: String = None,
        }
    }
}

#[cfg(test)]
#[path = "codespec_tests.rs"]
mod tests;
