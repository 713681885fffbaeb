//! Ecosystem dispatch table and the URL/path builder.
//!
//! Every ecosystem-specific decision lives in one [`EcosystemRules`] entry:
//! how the classifier recognises its purl, how the search client looks it
//! up, where its artifacts sit in a repository, and whether a not-found
//! deserves the case-normalised second attempt. Adding an ecosystem means
//! adding one entry to [`Ecosystem::rules`].

use crate::promote::traits::{
    ArtifactLocation, BuildError, ComponentTransferRequest, Ecosystem, SearchMatch,
};
use url::Url;

/// Suffix some Debian BOM versions carry that never appears in file names.
pub const DEBIAN_VERSION_EXTENSION: &str = ".debian";

const COPY_ENDPOINT: &str = "copy";
const MOVE_ENDPOINT: &str = "move";

/// How the search client locates an ecosystem's artifact before transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Exact match on the store's package name/version properties.
    PackageProperties {
        name_key: &'static str,
        version_key: &'static str,
    },
    /// The result path must contain `{name}/{version}`.
    PathContains,
    /// Layout is deterministic; nothing is looked up before the existence check.
    Deterministic,
}

/// Which field of a search match carries the package name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    Path,
    Name,
}

impl NameField {
    pub fn as_field(&self) -> &'static str {
        match self {
            NameField::Path => "path",
            NameField::Name => "name",
        }
    }
}

/// Case-blind lookup of the name the store files a package under.
///
/// Every ASCII letter of the name is a `?` in the pattern, so the store
/// returns candidates in any case; [`NameLookup::reported_name`] keeps the
/// one whose leading characters equal the name ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameLookup {
    pub field: NameField,
    pub pattern: String,
}

impl NameLookup {
    pub fn reported_name(&self, name: &str, found: &SearchMatch) -> Option<String> {
        let value = match self.field {
            NameField::Path => found.path.as_str(),
            NameField::Name => found.name.as_str(),
        };
        value
            .get(..name.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(name))
            .map(str::to_string)
    }
}

/// Name and version used to build a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    pub name: String,
    pub version: String,
}

impl Coordinates {
    pub fn of(request: &ComponentTransferRequest) -> Self {
        Self {
            name: request.package_name.clone(),
            version: request.version.clone(),
        }
    }
}

type LocateFn = fn(&Coordinates, Option<&SearchMatch>) -> Option<ArtifactLocation>;
type NameLookupFn = fn(&Coordinates) -> NameLookup;

pub struct EcosystemRules {
    pub purl_marker: &'static str,
    pub search: SearchStrategy,
    pub locate: LocateFn,
    /// Store names may differ from the BOM in case only.
    pub case_normalized_retry: bool,
    /// How the second attempt learns the store's spelling of the name.
    pub name_lookup: Option<NameLookupFn>,
    /// Transfers address a directory; the stored path gets a `/*` suffix afterwards.
    pub wildcard_subtree: bool,
}

static NPM: EcosystemRules = EcosystemRules {
    purl_marker: "pkg:npm",
    search: SearchStrategy::PackageProperties {
        name_key: "npm.name",
        version_key: "npm.version",
    },
    locate: locate_npm,
    case_normalized_retry: false,
    name_lookup: None,
    wildcard_subtree: false,
};

static NUGET: EcosystemRules = EcosystemRules {
    purl_marker: "pkg:nuget",
    search: SearchStrategy::Deterministic,
    locate: locate_nuget,
    case_normalized_retry: true,
    name_lookup: Some(nuget_name_lookup),
    wildcard_subtree: false,
};

static MAVEN: EcosystemRules = EcosystemRules {
    purl_marker: "pkg:maven",
    search: SearchStrategy::Deterministic,
    locate: locate_maven,
    case_normalized_retry: true,
    name_lookup: Some(maven_name_lookup),
    wildcard_subtree: false,
};

static POETRY: EcosystemRules = EcosystemRules {
    purl_marker: "pkg:pypi",
    search: SearchStrategy::PackageProperties {
        name_key: "pypi.normalized.name",
        version_key: "pypi.version",
    },
    locate: locate_from_match,
    case_normalized_retry: false,
    name_lookup: None,
    wildcard_subtree: false,
};

static CONAN: EcosystemRules = EcosystemRules {
    purl_marker: "pkg:conan",
    search: SearchStrategy::PathContains,
    locate: locate_conan,
    case_normalized_retry: false,
    name_lookup: None,
    wildcard_subtree: true,
};

static DEBIAN: EcosystemRules = EcosystemRules {
    purl_marker: "pkg:deb/debian",
    search: SearchStrategy::Deterministic,
    locate: locate_debian,
    case_normalized_retry: true,
    name_lookup: Some(debian_name_lookup),
    wildcard_subtree: false,
};

impl Ecosystem {
    pub fn rules(&self) -> &'static EcosystemRules {
        match self {
            Ecosystem::Npm => &NPM,
            Ecosystem::Nuget => &NUGET,
            Ecosystem::Maven => &MAVEN,
            Ecosystem::Poetry => &POETRY,
            Ecosystem::Conan => &CONAN,
            Ecosystem::Debian => &DEBIAN,
        }
    }

    /// Builds the source location. `found` is the search client's match for
    /// ecosystems that search first; `None` means nothing was found (or no
    /// search applies).
    pub fn locate(&self, coords: &Coordinates, found: Option<&SearchMatch>) -> Option<ArtifactLocation> {
        (self.rules().locate)(coords, found)
    }

    pub fn name_lookup(&self, coords: &Coordinates) -> Option<NameLookup> {
        self.rules().name_lookup.map(|lookup| lookup(coords))
    }
}

// ============================================================================
// Per-ecosystem layouts
// ============================================================================

fn locate_npm(coords: &Coordinates, found: Option<&SearchMatch>) -> Option<ArtifactLocation> {
    if let Some(m) = found {
        return Some(ArtifactLocation::file(m.path.clone(), m.name.clone()));
    }
    // Tarballs are named after the unscoped part.
    let base = coords.name.rsplit('/').next().unwrap_or(&coords.name);
    Some(ArtifactLocation::file(
        format!("{}/-", coords.name),
        format!("{}-{}.tgz", base, coords.version),
    ))
}

fn locate_nuget(coords: &Coordinates, _found: Option<&SearchMatch>) -> Option<ArtifactLocation> {
    Some(ArtifactLocation::file(
        "",
        format!("{}.{}.nupkg", coords.name, coords.version),
    ))
}

fn locate_maven(coords: &Coordinates, _found: Option<&SearchMatch>) -> Option<ArtifactLocation> {
    Some(ArtifactLocation::directory(format!(
        "{}/{}",
        coords.name, coords.version
    )))
}

fn locate_from_match(_coords: &Coordinates, found: Option<&SearchMatch>) -> Option<ArtifactLocation> {
    found.map(|m| ArtifactLocation::file(m.path.clone(), m.name.clone()))
}

fn locate_conan(coords: &Coordinates, found: Option<&SearchMatch>) -> Option<ArtifactLocation> {
    let m = found?;
    truncate_conan_path(&m.path, &coords.name, &coords.version).map(ArtifactLocation::directory)
}

fn locate_debian(coords: &Coordinates, _found: Option<&SearchMatch>) -> Option<ArtifactLocation> {
    let first = coords.name.chars().next()?;
    Some(ArtifactLocation::file(
        format!("pool/main/{}/{}", first, coords.name),
        debian_file_pattern(&coords.name, &coords.version),
    ))
}

fn nuget_name_lookup(coords: &Coordinates) -> NameLookup {
    NameLookup {
        field: NameField::Name,
        pattern: format!("{}.{}.nupkg", mask_letters(&coords.name), coords.version),
    }
}

fn maven_name_lookup(coords: &Coordinates) -> NameLookup {
    NameLookup {
        field: NameField::Path,
        pattern: format!("{}/{}", mask_letters(&coords.name), coords.version),
    }
}

fn debian_name_lookup(coords: &Coordinates) -> NameLookup {
    NameLookup {
        field: NameField::Name,
        pattern: debian_file_pattern(&mask_letters(&coords.name), &coords.version),
    }
}

fn mask_letters(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphabetic() { '?' } else { c })
        .collect()
}

/// Byte offset just past the first `{name}/{version}` that spans whole path
/// segments.
pub fn conan_segment_end(path: &str, name: &str, version: &str) -> Option<usize> {
    let needle = format!("{name}/{version}");
    path.match_indices(&needle).find_map(|(start, _)| {
        let end = start + needle.len();
        let bounded_left = start == 0 || path[..start].ends_with('/');
        let bounded_right = end == path.len() || path[end..].starts_with('/');
        (bounded_left && bounded_right).then_some(end)
    })
}

/// Cuts a Conan path right after the `{name}/{version}` segment.
pub fn truncate_conan_path(path: &str, name: &str, version: &str) -> Option<String> {
    conan_segment_end(path, name, version).map(|end| path[..end].to_string())
}

/// Debian file names carry architecture and revision suffixes the BOM lacks.
pub fn debian_file_pattern(name: &str, version: &str) -> String {
    let version = version
        .strip_suffix(DEBIAN_VERSION_EXTENSION)
        .unwrap_or(version);
    format!("{name}_{version}*")
}

/// PEP 503 normalisation: lowercase, runs of `-`, `_` and `.` become one `-`.
pub fn normalize_pypi_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(ch.to_lowercase());
            in_separator = false;
        }
    }
    out
}

// ============================================================================
// Transfer URLs
// ============================================================================

/// Everything the builder derives for one located artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferUrls {
    /// Path inside the repository, file name included
    pub source_path: String,
    pub copy_url: String,
    pub move_url: String,
    /// Canonical file name; empty for directory transfers
    pub file_name: String,
}

/// Builds copy and move URLs for `location` in the request's source
/// repository. The destination keeps the same layout.
pub fn build_transfer_urls(
    base: &Url,
    request: &ComponentTransferRequest,
    location: &ArtifactLocation,
) -> Result<TransferUrls, BuildError> {
    let source_path = location.full_path();
    let copy_url = transfer_url(
        base,
        COPY_ENDPOINT,
        &request.source_repo,
        &source_path,
        &request.dest_repo,
        request.dry_run,
    )?;
    let move_url = transfer_url(
        base,
        MOVE_ENDPOINT,
        &request.source_repo,
        &source_path,
        &request.dest_repo,
        request.dry_run,
    )?;

    Ok(TransferUrls {
        source_path,
        copy_url,
        move_url,
        file_name: location.file_name.clone().unwrap_or_default(),
    })
}

/// `{base}/api/{endpoint}/{srcRepo}/{path}?to=/{destRepo}/{path}[&dry=1]`
pub fn transfer_url(
    base: &Url,
    endpoint: &str,
    source_repo: &str,
    artifact_path: &str,
    dest_repo: &str,
    dry_run: bool,
) -> Result<String, BuildError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BuildError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(["api", endpoint, source_repo])
        .extend(artifact_path.split('/').filter(|s| !s.is_empty()));

    let mut query = format!("to=/{dest_repo}/{artifact_path}");
    if dry_run {
        query.push_str("&dry=1");
    }
    url.set_query(Some(&query));
    Ok(url.into())
}

// ============================================================================
// Tests
// ============================================================================
