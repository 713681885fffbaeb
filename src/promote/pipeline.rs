//! Transfer orchestrator.
//!
//! [`TransferPipeline`] drives each component through
//! `Classified → Resolving → {Found, NotFound} → Transferring → {Succeeded, Failed} → Recorded`:
//! - classification from bill-of-materials properties
//! - source resolution through the search client, with one case-normalised
//!   second attempt for ecosystems whose store names drift in case
//! - copy or move through the retry executor
//! - a recorded [`TransferOutcome`] per component
//!
//! Components are processed one after another. Per-component failures
//! become outcomes; only an unreachable store stops the run.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::PromoterConfig;
use crate::executor::RetryExecutor;
use crate::model::{Bom, Component, PROP_REPO_NAME};
use crate::promote::classifier::classify;
use crate::promote::ecosystem::{build_transfer_urls, Coordinates};
use crate::promote::report::{OutcomeAggregator, PromotionReport, NOT_FOUND_IN_REPO};
use crate::promote::search::ArtifactSearch;
use crate::promote::traits::{
    ArtifactLocation, ComponentTransferRequest, Ecosystem, OutcomeBucket, RunError, SearchMatch,
    TransferOutcome, TransferState,
};
use crate::traits::{ArtifactStore, StoreError, StoreResponse};

// ============================================================================
// Resolution strategies
// ============================================================================

/// How a source location is derived for an existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Layout built from the BOM's name, or from the search match.
    Primary,
    /// Second chance after a not-found: the store's spelling of the name
    /// replaces a differing BOM name, and every path component taken from
    /// the BOM is lower-cased.
    CaseNormalized,
}

impl ResolutionStrategy {
    /// Strategies tried in order for `ecosystem`.
    pub fn sequence(ecosystem: Ecosystem) -> &'static [ResolutionStrategy] {
        if ecosystem.rules().case_normalized_retry {
            &[ResolutionStrategy::Primary, ResolutionStrategy::CaseNormalized]
        } else {
            &[ResolutionStrategy::Primary]
        }
    }

    /// `reported_name` is the store's spelling of the package name, when a
    /// lookup found one.
    pub fn location(
        &self,
        ecosystem: Ecosystem,
        coords: &Coordinates,
        searched: Option<&SearchMatch>,
        reported_name: Option<&str>,
    ) -> Option<ArtifactLocation> {
        match self {
            ResolutionStrategy::Primary => ecosystem.locate(coords, searched),
            ResolutionStrategy::CaseNormalized => match reported_name {
                Some(reported) if reported != coords.name => {
                    let coords = Coordinates {
                        name: reported.to_string(),
                        version: coords.version.to_lowercase(),
                    };
                    ecosystem.locate(&coords, searched)
                }
                _ => ecosystem
                    .locate(coords, searched)
                    .map(|location| location.to_lowercase()),
            },
        }
    }
}

/// Why resolution stopped without a location.
enum ResolveFailure {
    /// Fatal: resolution keeps timing out.
    Unreachable(StoreError),
    /// Any other store failure; recorded against the component.
    Store(StoreError),
}

impl From<StoreError> for ResolveFailure {
    fn from(err: StoreError) -> Self {
        if err.is_timeout() {
            ResolveFailure::Unreachable(err)
        } else {
            ResolveFailure::Store(err)
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Promotes bill-of-materials components through an [`ArtifactStore`].
///
/// The store and retry executor are injected; the pipeline holds no other
/// state between components.
///
/// # Example
///
/// ```ignore
/// let config = PromoterConfig::load(Path::new("promoter.json"))?;
/// let store = Arc::new(HttpArtifactStore::from_config(&config)?);
/// let pipeline = TransferPipeline::new(store, config);
///
/// let report = pipeline.promote(&mut bom).await?;
/// report.log_summary();
/// std::process::exit(report.exit_status().code());
/// ```
pub struct TransferPipeline<S: ArtifactStore> {
    store: Arc<S>,
    search: ArtifactSearch<S>,
    retry: RetryExecutor,
    config: PromoterConfig,
}

impl<S: ArtifactStore> TransferPipeline<S> {
    /// Creates a pipeline whose retry policy comes from `config`.
    pub fn new(store: Arc<S>, config: PromoterConfig) -> Self {
        let retry = RetryExecutor::new(config.retry_policy());
        Self::with_executor(store, retry, config)
    }

    pub fn with_executor(store: Arc<S>, retry: RetryExecutor, config: PromoterConfig) -> Self {
        Self {
            search: ArtifactSearch::new(Arc::clone(&store), retry.clone()),
            store,
            retry,
            config,
        }
    }

    pub fn config(&self) -> &PromoterConfig {
        &self.config
    }

    /// Runs every component and patches `bom` with the resolved repository
    /// paths of successful transfers.
    pub async fn promote(&self, bom: &mut Bom) -> Result<PromotionReport, RunError> {
        let report = self.run(&bom.components).await?;
        let patched = report.patch_bom(bom);
        info!(patched, "Bill of materials updated");
        Ok(report)
    }

    /// Processes `components` in order and aggregates their outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::StoreUnreachable`] when resolution calls keep
    /// timing out, and [`RunError::Build`] when the store base URL cannot
    /// carry a path. Every other failure is recorded per component.
    #[instrument(skip_all, fields(components = components.len(), dry_run = self.config.dry_run))]
    pub async fn run(&self, components: &[Component]) -> Result<PromotionReport, RunError> {
        let mut aggregator = OutcomeAggregator::new(self.config.dry_run);
        for component in components {
            let outcome = self.process(component).await?;
            aggregator.record(outcome);
        }
        Ok(aggregator.finish())
    }

    /// Takes one component from classification to its recorded outcome.
    #[instrument(skip_all, fields(component = %component.name, version = %component.version))]
    pub async fn process(&self, component: &Component) -> Result<TransferOutcome, RunError> {
        let classification = classify(component);
        let ecosystem = match classification.ecosystem {
            Some(ecosystem) if classification.is_transferable() => ecosystem,
            _ => {
                info!(purl = %component.purl, "Unknown package, not actioned");
                return Ok(TransferOutcome::unknown(
                    component,
                    classification.ecosystem,
                    classification.package_type,
                ));
            }
        };

        let Some(dest_repo) = self.config.destination(ecosystem, classification.package_type) else {
            warn!(
                %ecosystem,
                package_type = ?classification.package_type,
                "No destination repository configured, not actioned"
            );
            return Ok(TransferOutcome::unknown(
                component,
                Some(ecosystem),
                classification.package_type,
            ));
        };

        let source_repo = component.property(PROP_REPO_NAME).unwrap_or_default().trim();
        let mut request = ComponentTransferRequest::new(
            component,
            ecosystem,
            classification.package_type,
            source_repo,
            dest_repo,
            self.config.dry_run,
        );

        if source_repo.is_empty() {
            warn!("No source repository recorded, package not found");
            request.response = Some(StoreResponse::not_found());
            return Ok(self.record(&mut request, OutcomeBucket::NotFound));
        }

        if source_repo.contains(&self.config.release_marker) {
            let mut request = request.already_present();
            info!(%source_repo, "Already in destination namespace");
            request.response = Some(StoreResponse::new(200, "Already present"));
            let repo_path = present_repo_path(&request);
            return Ok(self
                .record(&mut request, OutcomeBucket::AlreadyPresent)
                .with_repo_path(repo_path));
        }

        request.advance(TransferState::Resolving);
        let location = match self.resolve(&request).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                request.advance(TransferState::NotFound);
                warn!(%ecosystem, repo = %request.source_repo, "Package not found in store");
                request.response = Some(StoreResponse::not_found());
                return Ok(self.record(&mut request, OutcomeBucket::NotFound));
            }
            Err(ResolveFailure::Unreachable(source)) => {
                return Err(RunError::StoreUnreachable {
                    component: request.name,
                    version: request.version,
                    source,
                });
            }
            Err(ResolveFailure::Store(err)) => {
                warn!(error = %err, "Resolution failed, not actioned");
                request.response = Some(StoreResponse::from(&err));
                request.advance(TransferState::Failed);
                return Ok(self.record(&mut request, OutcomeBucket::Found));
            }
        };

        request.advance(TransferState::Found);
        self.prepare(&mut request, &location)?;
        self.transfer(&mut request, &location).await
    }

    /// Resolves the request's source location, or `None` when the store has
    /// nothing at any attempted location.
    async fn resolve(
        &self,
        request: &ComponentTransferRequest,
    ) -> Result<Option<ArtifactLocation>, ResolveFailure> {
        let ecosystem = request.ecosystem();
        let coords = Coordinates::of(request);
        let searched = self.search.find_package(request).await?;

        for strategy in ResolutionStrategy::sequence(ecosystem) {
            let reported_name = match strategy {
                ResolutionStrategy::Primary => None,
                ResolutionStrategy::CaseNormalized => self.search.find_reported_name(request).await?,
            };
            let Some(location) =
                strategy.location(ecosystem, &coords, searched.as_ref(), reported_name.as_deref())
            else {
                continue;
            };
            if let Some(found) = self.search.find_at(&request.source_repo, &location).await? {
                if *strategy == ResolutionStrategy::CaseNormalized {
                    info!(path = %location.full_path(), "Found after case normalisation");
                }
                return Ok(Some(concrete_location(&location, &found)));
            }
        }
        Ok(None)
    }

    /// Fills the request's resolved path and transfer URLs.
    fn prepare(
        &self,
        request: &mut ComponentTransferRequest,
        location: &ArtifactLocation,
    ) -> Result<(), RunError> {
        let urls = build_transfer_urls(&self.config.store.base_url, request, location)?;
        request.source_path = location.path.clone();
        request.source_full_name = urls.source_path;
        request.package_file_name = urls.file_name;
        request.copy_url = urls.copy_url;
        request.move_url = urls.move_url;

        if request.ecosystem().rules().wildcard_subtree {
            request.source_path.push_str("/*");
        }
        Ok(())
    }

    async fn transfer(
        &self,
        request: &mut ComponentTransferRequest,
        location: &ArtifactLocation,
    ) -> Result<TransferOutcome, RunError> {
        let Some(url) = request.transfer_url().map(str::to_string) else {
            // Unknown and skipped operations are filtered before resolution.
            request.response = Some(StoreResponse::new(500, "No transfer operation"));
            return Ok(self.record(request, OutcomeBucket::Found));
        };

        request.advance(TransferState::Transferring);
        let operation = request.operation_label.clone();
        match self
            .retry
            .execute(&operation, || self.store.transfer(&url))
            .await
        {
            Ok(response) => {
                request.advance(TransferState::Succeeded);
                info!(
                    operation = %format!("{}{}", request.operation_label, request.dry_run_suffix),
                    from = %request.source_repo,
                    to = %request.dest_repo,
                    status = response.status,
                    "Package transferred"
                );
                request.response = Some(response);
                if request.dry_run {
                    return Ok(self.record(request, OutcomeBucket::Found));
                }
                let repo_path = self.corroborate(request, location).await;
                Ok(self.record(request, OutcomeBucket::Found).with_repo_path(repo_path))
            }
            Err(err) => {
                request.advance(TransferState::Failed);
                warn!(error = %err, url = %url, "Package not transferred due to error");
                request.response = Some(StoreResponse::from(&err));
                Ok(self.record(request, OutcomeBucket::Found))
            }
        }
    }

    /// Confirms the artifact now exists in the destination and returns its
    /// repository path, or the not-found sentinel.
    async fn corroborate(&self, request: &ComponentTransferRequest, location: &ArtifactLocation) -> String {
        match self.search.find_at(&request.dest_repo, location).await {
            Ok(Some(_)) => format!("{}/{}", request.dest_repo, request.source_full_name),
            Ok(None) => {
                warn!(repo = %request.dest_repo, "Transferred package not found in destination");
                NOT_FOUND_IN_REPO.to_string()
            }
            Err(err) => {
                warn!(error = %err, "Destination check failed");
                NOT_FOUND_IN_REPO.to_string()
            }
        }
    }

    fn record(&self, request: &mut ComponentTransferRequest, bucket: OutcomeBucket) -> TransferOutcome {
        request.advance(TransferState::Recorded);
        TransferOutcome::from_request(request, bucket)
    }
}

/// Repository path of an artifact already in a release repository, built
/// without asking the store. Layouts that need a search or carry a wildcard
/// get the not-found sentinel.
fn present_repo_path(request: &ComponentTransferRequest) -> String {
    let location = request
        .ecosystem()
        .locate(&Coordinates::of(request), None)
        .map(|location| location.full_path())
        .filter(|path| !path.contains('*'));
    match location {
        Some(path) => format!("{}/{}", request.source_repo, path),
        None => NOT_FOUND_IN_REPO.to_string(),
    }
}

/// Replaces a wildcarded file name with the one the store reported.
fn concrete_location(location: &ArtifactLocation, found: &SearchMatch) -> ArtifactLocation {
    match location.file_name {
        Some(_) => ArtifactLocation::file(location.path.clone(), found.name.clone()),
        None => location.clone(),
    }
}

// ============================================================================
// Tests
// ============================================================================
