//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example, a
//! [`RunId`] with a [`JobId`] even though both are `u64` under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: GitHub-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies one concrete execution ("run") of a workflow.
    RunId
}

u64_id! {
    /// Identifies a single job belonging to a workflow run.
    JobId
}

u64_id! {
    /// Identifies a check run reported against a commit.
    CheckRunId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single invocation of the dispatcher.
///
/// Generated fresh for every CLI invocation and attached to the root tracing
/// span so all activity from one invocation can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generates a new random invocation identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration / Git names)
// ---------------------------------------------------------------------------

string_id! {
    /// A Git ref the workflow is dispatched on (branch, tag, or commit SHA).
    GitRef
}

string_id! {
    /// A caller-supplied run name used to locate the run through its check run.
    RunName
}

string_id! {
    /// The user-supplied workflow reference: a name, a numeric id, or a file path.
    ///
    /// Resolved exactly once per invocation into a [`WorkflowId`].
    WorkflowReference
}

impl WorkflowReference {
    /// Returns `true` if the reference looks like a workflow file name
    /// (`<something>.yml` or `<something>.yaml`).
    pub fn is_file_name(&self) -> bool {
        let s = self.0.as_str();
        [".yml", ".yaml"]
            .iter()
            .any(|ext| s.len() > ext.len() && s.ends_with(ext))
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Identifies a GitHub repository in `"owner/repo"` format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    /// Parses an `"owner/repo"` string.
    ///
    /// Returns `None` unless the value has exactly two non-empty segments.
    pub fn parse(value: &str) -> Option<Self> {
        let (owner, name) = value.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Returns the repository owner (user or organisation).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the repository name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Workflow identifier
// ---------------------------------------------------------------------------

/// The identifier the remote service accepts for a workflow.
///
/// GitHub accepts either the numeric workflow id or the workflow file name
/// anywhere a `workflow_id` path segment is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowId {
    /// Numeric id assigned by GitHub.
    Numeric(u64),
    /// Workflow file name, e.g. `"deploy.yml"`.
    File(String),
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::File(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_requires_owner_and_name() {
        let repo = RepositoryId::parse("octo/hello").unwrap();
        assert_eq!(repo.owner(), "octo");
        assert_eq!(repo.name(), "hello");
        assert_eq!(repo.to_string(), "octo/hello");

        assert!(RepositoryId::parse("octo").is_none());
        assert!(RepositoryId::parse("/hello").is_none());
        assert!(RepositoryId::parse("octo/").is_none());
        assert!(RepositoryId::parse("octo/hello/extra").is_none());
    }

    #[test]
    fn file_name_references_are_detected() {
        let yes = ["ci.yml", "deploy.yaml", ".github/workflows/ci.yml"];
        for r in yes {
            assert!(WorkflowReference::new(r).unwrap().is_file_name(), "{r}");
        }

        let no = ["Deploy", "1234", ".yml", "ci.yml.bak", "yaml"];
        for r in no {
            assert!(!WorkflowReference::new(r).unwrap().is_file_name(), "{r}");
        }
    }

    #[test]
    fn empty_string_ids_are_rejected() {
        assert!(GitRef::new("").is_none());
        assert_eq!(GitRef::new("main").unwrap().as_str(), "main");
    }

    #[test]
    fn workflow_id_displays_as_path_segment() {
        assert_eq!(WorkflowId::Numeric(42).to_string(), "42");
        assert_eq!(WorkflowId::File("ci.yml".into()).to_string(), "ci.yml");
    }
}
