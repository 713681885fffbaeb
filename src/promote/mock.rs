//! In-memory artifact store for tests.
//!
//! Evaluates [`SearchQuery`] criteria against a fixed artifact list the way
//! the real store does (case-sensitive, `*`/`?` wildcards for `$match`) and
//! records every search and transfer it receives.

use crate::promote::search::{Criterion, MatchOp, SearchQuery};
use crate::promote::traits::SearchMatch;
use crate::traits::{ArtifactStore, StoreError, StoreResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockStore {
    artifacts: Vec<SearchMatch>,
    search_errors: Mutex<VecDeque<StoreError>>,
    sticky_search_error: Option<StoreError>,
    transfer_results: Mutex<VecDeque<Result<StoreResponse, StoreError>>>,
    searches: Mutex<Vec<SearchQuery>>,
    transfers: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, repo: &str, path: &str, name: &str, properties: &[(&str, &str)]) -> Self {
        self.artifacts.push(SearchMatch {
            repo: repo.to_string(),
            path: path.to_string(),
            name: name.to_string(),
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    /// Every search fails with `err`.
    pub fn with_search_error(mut self, err: StoreError) -> Self {
        self.sticky_search_error = Some(err);
        self
    }

    /// The next search fails with `err`; later ones behave normally.
    pub fn with_failing_search(self, err: StoreError) -> Self {
        lock(&self.search_errors).push_back(err);
        self
    }

    /// Queues the result of the next transfer. Transfers beyond the queue succeed with 200.
    pub fn with_transfer_result(self, result: Result<StoreResponse, StoreError>) -> Self {
        lock(&self.transfer_results).push_back(result);
        self
    }

    pub fn searches(&self) -> Vec<SearchQuery> {
        lock(&self.searches).clone()
    }

    pub fn transfers(&self) -> Vec<String> {
        lock(&self.transfers).clone()
    }

    fn evaluate(&self, query: &SearchQuery) -> Vec<SearchMatch> {
        let hits = self
            .artifacts
            .iter()
            .filter(|a| a.repo == query.repo)
            .filter(|a| query.criteria.iter().all(|c| holds(a, c)))
            .filter(|a| query.any_of.is_empty() || query.any_of.iter().any(|c| holds(a, c)))
            .cloned();
        match query.limit {
            Some(limit) => hits.take(limit).collect(),
            None => hits.collect(),
        }
    }
}

fn holds(artifact: &SearchMatch, criterion: &Criterion) -> bool {
    let actual = match criterion.field.strip_prefix('@') {
        Some(key) => artifact.property(key),
        None => match criterion.field.as_str() {
            "path" => Some(artifact.path.as_str()),
            "name" => Some(artifact.name.as_str()),
            _ => None,
        },
    };
    actual.is_some_and(|actual| match criterion.op {
        MatchOp::Eq => actual == criterion.value,
        MatchOp::Match => wildcard_match(&criterion.value, actual),
    })
}

#[async_trait]
impl ArtifactStore for MockStore {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchMatch>, StoreError> {
        lock(&self.searches).push(query.clone());
        if let Some(err) = lock(&self.search_errors).pop_front() {
            return Err(err);
        }
        if let Some(err) = &self.sticky_search_error {
            return Err(err.clone());
        }
        Ok(self.evaluate(query))
    }

    async fn transfer(&self, url: &str) -> Result<StoreResponse, StoreError> {
        lock(&self.transfers).push(url.to_string());
        lock(&self.transfer_results)
            .pop_front()
            .unwrap_or_else(|| Ok(StoreResponse::new(200, "OK")))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `*` matches any run of characters, `?` exactly one.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("adduser_3.118*", "adduser_3.118_all.deb"));
        assert!(wildcard_match("*mylib/1.2.3*", "_/mylib/1.2.3/_/rev"));
        assert!(wildcard_match("a?c", "abc"));
        assert!(!wildcard_match("AddUser_3*", "adduser_3.deb"));
        assert!(!wildcard_match("junit/4.13.2*", "junit/4.13"));
    }
}
