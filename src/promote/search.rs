//! Artifact search client and the store's query model.
//!
//! Queries are rendered in the store's `items.find(...)` language. A search
//! that finds nothing is `Ok(None)`; only transport-level trouble is an error.

use crate::executor::RetryExecutor;
use crate::promote::ecosystem::{conan_segment_end, normalize_pypi_name, Coordinates, SearchStrategy};
use crate::promote::traits::{ArtifactLocation, ComponentTransferRequest, Ecosystem, SearchMatch};
use crate::traits::{ArtifactStore, StoreError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Path the store reports for files at a repository's root.
const ROOT_PATH: &str = ".";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// `$eq`
    Eq,
    /// `$match`, with `*` and `?` wildcards
    Match,
}

impl MatchOp {
    fn as_aql(&self) -> &'static str {
        match self {
            MatchOp::Eq => "$eq",
            MatchOp::Match => "$match",
        }
    }
}

/// One field condition. Fields starting with `@` address artifact properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    pub field: String,
    pub op: MatchOp,
    pub value: String,
}

impl Criterion {
    pub fn eq(field: &str, value: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            op: MatchOp::Eq,
            value: value.into(),
        }
    }

    pub fn matching(field: &str, pattern: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            op: MatchOp::Match,
            value: pattern.into(),
        }
    }
}

/// All of `criteria` must hold, and at least one of `any_of` when it is
/// not empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub repo: String,
    pub criteria: Vec<Criterion>,
    pub any_of: Vec<Criterion>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn in_repo(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            criteria: Vec::new(),
            any_of: Vec::new(),
            limit: None,
        }
    }

    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.criteria.push(Criterion::eq(field, value));
        self
    }

    pub fn matching(mut self, field: &str, pattern: impl Into<String>) -> Self {
        self.criteria.push(Criterion::matching(field, pattern));
        self
    }

    pub fn any_of(mut self, alternatives: Vec<Criterion>) -> Self {
        self.any_of = alternatives;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Existence query for a built location.
    ///
    /// Files match their directory exactly and their name by pattern;
    /// directories match themselves or anything below a `/`.
    pub fn artifact_at(repo: &str, location: &ArtifactLocation) -> Self {
        let query = Self::in_repo(repo);
        let query = match &location.file_name {
            Some(file_name) => {
                let path = if location.path.is_empty() {
                    ROOT_PATH
                } else {
                    location.path.as_str()
                };
                query.eq("path", path).matching("name", file_name.as_str())
            }
            None => query.any_of(vec![
                Criterion::eq("path", location.path.as_str()),
                Criterion::matching("path", format!("{}/*", location.path)),
            ]),
        };
        query.limit(1)
    }

    /// Renders the query as the store's AQL text. Conditions are emitted in
    /// key order so the text is stable.
    pub fn to_aql(&self) -> String {
        let mut ordered = BTreeMap::new();
        ordered.insert("repo".to_string(), condition(MatchOp::Eq, &self.repo));
        for criterion in &self.criteria {
            ordered.insert(criterion.field.clone(), condition(criterion.op, &criterion.value));
        }
        if !self.any_of.is_empty() {
            let alternatives = self
                .any_of
                .iter()
                .map(|criterion| {
                    let mut single = Map::new();
                    single.insert(criterion.field.clone(), condition(criterion.op, &criterion.value));
                    Value::Object(single)
                })
                .collect();
            ordered.insert("$or".to_string(), Value::Array(alternatives));
        }
        let conditions: Map<String, Value> = ordered.into_iter().collect();

        let mut aql = format!(
            "items.find({}).include(\"repo\",\"path\",\"name\",\"property\")",
            Value::Object(conditions)
        );
        if let Some(limit) = self.limit {
            aql.push_str(&format!(".limit({limit})"));
        }
        aql
    }
}

fn condition(op: MatchOp, value: &str) -> Value {
    let mut inner = Map::new();
    inner.insert(op.as_aql().to_string(), Value::String(value.to_string()));
    Value::Object(inner)
}

/// Package lookup query for a request's ecosystem; `None` when the
/// ecosystem's layout is deterministic and needs no lookup.
pub fn package_query(request: &ComponentTransferRequest) -> Option<SearchQuery> {
    let query = SearchQuery::in_repo(&request.source_repo);
    match request.ecosystem().rules().search {
        SearchStrategy::PackageProperties {
            name_key,
            version_key,
        } => {
            let name = match request.ecosystem() {
                Ecosystem::Poetry => normalize_pypi_name(&request.package_name),
                _ => request.package_name.clone(),
            };
            Some(
                query
                    .eq(&format!("@{name_key}"), name)
                    .eq(&format!("@{version_key}"), &request.version)
                    .limit(1),
            )
        }
        SearchStrategy::PathContains => Some(query.matching(
            "path",
            format!("*{}/{}*", request.package_name, request.version),
        )),
        SearchStrategy::Deterministic => None,
    }
}

/// Locates artifacts in a repository through an [`ArtifactStore`].
pub struct ArtifactSearch<S: ArtifactStore> {
    store: Arc<S>,
    retry: RetryExecutor,
}

impl<S: ArtifactStore> Clone for ArtifactSearch<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry: self.retry.clone(),
        }
    }
}

impl<S: ArtifactStore> ArtifactSearch<S> {
    pub fn new(store: Arc<S>, retry: RetryExecutor) -> Self {
        Self { store, retry }
    }

    /// Finds the request's package by its ecosystem's search strategy.
    pub async fn find_package(
        &self,
        request: &ComponentTransferRequest,
    ) -> Result<Option<SearchMatch>, StoreError> {
        let Some(query) = package_query(request) else {
            return Ok(None);
        };
        let matches = self.run(&query).await?;

        let found = match request.ecosystem().rules().search {
            SearchStrategy::PathContains => matches.into_iter().find(|m| {
                conan_segment_end(&m.path, &request.package_name, &request.version).is_some()
            }),
            _ => matches.into_iter().next(),
        };
        debug!(
            component = %request.name,
            version = %request.version,
            found = found.is_some(),
            "Package search finished"
        );
        Ok(found)
    }

    /// Existence check: the first artifact at `location` in `repo`, if any.
    pub async fn find_at(
        &self,
        repo: &str,
        location: &ArtifactLocation,
    ) -> Result<Option<SearchMatch>, StoreError> {
        let query = SearchQuery::artifact_at(repo, location);
        Ok(self.run(&query).await?.into_iter().next())
    }

    /// The store's spelling of the request's package name, found by a
    /// case-blind lookup in the source repository.
    pub async fn find_reported_name(
        &self,
        request: &ComponentTransferRequest,
    ) -> Result<Option<String>, StoreError> {
        let coords = Coordinates::of(request);
        let Some(lookup) = request.ecosystem().name_lookup(&coords) else {
            return Ok(None);
        };
        let query = SearchQuery::in_repo(&request.source_repo)
            .matching(lookup.field.as_field(), lookup.pattern.as_str());
        let reported = self
            .run(&query)
            .await?
            .iter()
            .find_map(|m| lookup.reported_name(&coords.name, m));
        debug!(
            component = %request.name,
            reported = reported.as_deref().unwrap_or(""),
            "Name lookup finished"
        );
        Ok(reported)
    }

    async fn run(&self, query: &SearchQuery) -> Result<Vec<SearchMatch>, StoreError> {
        self.retry
            .execute("search", || self.store.search(query))
            .await
    }
}
