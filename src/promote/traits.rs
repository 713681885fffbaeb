//! Core types shared by the promotion engine.
//!
//! - Ecosystem and package classification via [`Ecosystem`], [`PackageType`]
//!   and [`TransferOperation`]
//! - Per-component working state via [`ComponentTransferRequest`]
//! - Store-reported artifacts via [`SearchMatch`]
//! - Recorded results via [`TransferOutcome`]

use crate::model::Component;
use crate::traits::{StoreError, StoreResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Classification
// ============================================================================

/// Package ecosystem of a component, derived from its purl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ecosystem {
    Npm,
    Nuget,
    Maven,
    Poetry,
    Conan,
    Debian,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 6] = [
        Ecosystem::Npm,
        Ecosystem::Nuget,
        Ecosystem::Maven,
        Ecosystem::Poetry,
        Ecosystem::Conan,
        Ecosystem::Debian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "NPM",
            Ecosystem::Nuget => "NUGET",
            Ecosystem::Maven => "MAVEN",
            Ecosystem::Poetry => "POETRY",
            Ecosystem::Conan => "CONAN",
            Ecosystem::Debian => "DEBIAN",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a component is being promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    /// Third-party component whose clearing is approved
    ClearedThirdParty,

    /// Internally developed component
    Internal,

    /// Development-only dependency
    Development,

    /// Clearing state not resolved; never transferred
    Unknown,
}

impl PackageType {
    pub fn operation(&self) -> TransferOperation {
        match self {
            PackageType::ClearedThirdParty | PackageType::Development => TransferOperation::Copy,
            PackageType::Internal => TransferOperation::Move,
            PackageType::Unknown => TransferOperation::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOperation {
    Copy,
    Move,
    /// Already in the destination namespace; nothing to send
    Skip,
    Unknown,
}

impl TransferOperation {
    pub fn label(&self) -> &'static str {
        match self {
            TransferOperation::Copy => "copy",
            TransferOperation::Move => "move",
            TransferOperation::Skip => "skip",
            TransferOperation::Unknown => "unknown",
        }
    }
}

// ============================================================================
// Store-side artifacts
// ============================================================================

/// One artifact as reported by the store's search API.
///
/// Property values are the store's own and may differ in case or formatting
/// from what the bill of materials declares.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchMatch {
    pub repo: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl SearchMatch {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Where an artifact lives inside a repository.
///
/// A `file_name` of `None` addresses the whole directory at `path` (Maven
/// coordinates, Conan recipes). The file name may carry a `*` wildcard until
/// the existence check replaces it with the concrete name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub path: String,
    pub file_name: Option<String>,
}

impl ArtifactLocation {
    pub fn file(path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: Some(file_name.into()),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: None,
        }
    }

    /// Path plus file name, without a leading separator for root-level files.
    pub fn full_path(&self) -> String {
        match (&self.file_name, self.path.is_empty()) {
            (Some(name), true) => name.clone(),
            (Some(name), false) => format!("{}/{}", self.path, name),
            (None, _) => self.path.clone(),
        }
    }

    pub fn to_lowercase(&self) -> Self {
        Self {
            path: self.path.to_lowercase(),
            file_name: self.file_name.as_ref().map(|n| n.to_lowercase()),
        }
    }
}

// ============================================================================
// Per-component request
// ============================================================================

/// Where a component is in its promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Classified,
    Resolving,
    Found,
    NotFound,
    Transferring,
    Succeeded,
    Failed,
    Recorded,
}

/// Working state for one component while it moves through the pipeline.
///
/// Ecosystem and package type are fixed at construction.
#[derive(Debug, Clone)]
pub struct ComponentTransferRequest {
    pub name: String,
    pub package_name: String,
    pub version: String,
    pub purl: String,
    ecosystem: Ecosystem,
    package_type: PackageType,
    operation: TransferOperation,
    pub source_repo: String,
    pub dest_repo: String,
    /// Empty until an artifact has been matched in the store
    pub source_path: String,
    pub source_full_name: String,
    pub package_file_name: String,
    pub dry_run: bool,
    pub copy_url: String,
    pub move_url: String,
    pub response: Option<StoreResponse>,
    pub operation_label: String,
    pub dry_run_suffix: String,
    state: TransferState,
}

impl ComponentTransferRequest {
    pub fn new(
        component: &Component,
        ecosystem: Ecosystem,
        package_type: PackageType,
        source_repo: impl Into<String>,
        dest_repo: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        let operation = package_type.operation();
        Self {
            name: component.name.clone(),
            package_name: package_name(component, ecosystem),
            version: component.version.clone(),
            purl: component.purl.clone(),
            ecosystem,
            package_type,
            operation,
            source_repo: source_repo.into(),
            dest_repo: dest_repo.into(),
            source_path: String::new(),
            source_full_name: String::new(),
            package_file_name: String::new(),
            dry_run,
            copy_url: String::new(),
            move_url: String::new(),
            response: None,
            operation_label: operation.label().to_string(),
            dry_run_suffix: if dry_run { " (dry-run)".to_string() } else { String::new() },
            state: TransferState::Classified,
        }
    }

    /// Marks a request whose source already sits in the destination
    /// namespace. Only valid straight after construction.
    pub fn already_present(mut self) -> Self {
        self.operation = TransferOperation::Skip;
        self.operation_label = self.operation.label().to_string();
        self
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn advance(&mut self, next: TransferState) {
        tracing::debug!(
            component = %self.name,
            version = %self.version,
            from = ?self.state,
            to = ?next,
            "State transition"
        );
        self.state = next;
    }

    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn operation(&self) -> TransferOperation {
        self.operation
    }

    /// URL for the classified operation; `None` for skip/unknown.
    pub fn transfer_url(&self) -> Option<&str> {
        match self.operation {
            TransferOperation::Copy => Some(&self.copy_url),
            TransferOperation::Move => Some(&self.move_url),
            TransferOperation::Skip | TransferOperation::Unknown => None,
        }
    }
}

/// Npm scoped packages are addressed as `@scope/name`.
fn package_name(component: &Component, ecosystem: Ecosystem) -> String {
    match (&component.group, ecosystem) {
        (Some(group), Ecosystem::Npm) if !group.is_empty() => {
            let scope = group.trim_start_matches('@');
            format!("@{}/{}", scope, component.name)
        }
        _ => component.name.clone(),
    }
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeBucket {
    /// Ecosystem or operation could not be derived
    Unknown,
    NotFound,
    /// Located and a transfer was attempted
    Found,
    AlreadyPresent,
}

/// Final record of one component. Created once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub name: String,
    pub version: String,
    pub purl: String,
    pub ecosystem: Option<Ecosystem>,
    pub package_type: PackageType,
    pub bucket: OutcomeBucket,
    pub response: Option<StoreResponse>,
    pub operation_label: String,
    pub dry_run_suffix: String,
    pub dest_repo: Option<String>,
    /// Corroborated destination path, or the not-found sentinel
    pub repo_path: Option<String>,
}

impl TransferOutcome {
    pub fn unknown(component: &Component, ecosystem: Option<Ecosystem>, package_type: PackageType) -> Self {
        Self {
            name: component.name.clone(),
            version: component.version.clone(),
            purl: component.purl.clone(),
            ecosystem,
            package_type,
            bucket: OutcomeBucket::Unknown,
            response: None,
            operation_label: package_type.operation().label().to_string(),
            dry_run_suffix: String::new(),
            dest_repo: None,
            repo_path: None,
        }
    }

    pub fn from_request(request: &ComponentTransferRequest, bucket: OutcomeBucket) -> Self {
        Self {
            name: request.name.clone(),
            version: request.version.clone(),
            purl: request.purl.clone(),
            ecosystem: Some(request.ecosystem()),
            package_type: request.package_type(),
            bucket,
            response: request.response.clone(),
            operation_label: request.operation_label.clone(),
            dry_run_suffix: request.dry_run_suffix.clone(),
            dest_repo: Some(request.dest_repo.clone()),
            repo_path: None,
        }
    }

    pub fn with_repo_path(mut self, repo_path: impl Into<String>) -> Self {
        self.repo_path = Some(repo_path.into());
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    pub fn is_success(&self) -> bool {
        self.response.as_ref().is_some_and(StoreResponse::is_success)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors building a transfer URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Store base URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),
}

/// Errors that end a promotion run early.
#[derive(Error, Debug)]
pub enum RunError {
    /// Resolution calls keep timing out; the store is unreachable
    #[error("Store unreachable while resolving {component} {version}: {source}")]
    StoreUnreachable {
        component: String,
        version: String,
        source: StoreError,
    },

    #[error("Failed to build transfer request: {0}")]
    Build(#[from] BuildError),
}

// ============================================================================
// Tests
// ============================================================================
