//! Outcome aggregation, run counters and bill-of-materials patching.

use crate::model::{Bom, Component, PROP_REPO_NAME, PROP_REPO_PATH};
use crate::promote::traits::{Ecosystem, OutcomeBucket, PackageType, RunError, TransferOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Repository-path value written when the destination could not be corroborated.
pub const NOT_FOUND_IN_REPO: &str = "Not Found in Repository";

/// KPI snapshot of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub total_components: usize,
    pub third_party_to_copy: usize,
    pub internal_to_move: usize,
    pub development_to_copy: usize,
    pub not_approved: usize,
    pub already_present: usize,
    pub actioned_successfully: usize,
    pub not_actioned_not_found: usize,
    pub not_actioned_error: usize,
}

/// Outcomes of one ecosystem, by bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EcosystemBuckets {
    pub unknown: Vec<TransferOutcome>,
    pub not_found: Vec<TransferOutcome>,
    pub found: Vec<TransferOutcome>,
    pub already_present: Vec<TransferOutcome>,
}

impl EcosystemBuckets {
    fn push(&mut self, outcome: TransferOutcome) {
        match outcome.bucket {
            OutcomeBucket::Unknown => self.unknown.push(outcome),
            OutcomeBucket::NotFound => self.not_found.push(outcome),
            OutcomeBucket::Found => self.found.push(outcome),
            OutcomeBucket::AlreadyPresent => self.already_present.push(outcome),
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.found.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.found.iter().filter(|o| !o.is_success())
    }

    fn iter(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.unknown
            .iter()
            .chain(&self.not_found)
            .chain(&self.found)
            .chain(&self.already_present)
    }
}

/// Process exit signal derived from a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitStatus {
    Success,
    /// Something was not found or failed to transfer
    Warning,
    /// The run was aborted
    Critical,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Critical => 1,
            ExitStatus::Warning => 2,
        }
    }
}

impl From<&RunError> for ExitStatus {
    fn from(_: &RunError) -> Self {
        ExitStatus::Critical
    }
}

/// Collects outcomes for one run. Processing is sequential, so nothing here
/// is synchronised.
#[derive(Debug, Default)]
pub struct OutcomeAggregator {
    counters: Counters,
    buckets: BTreeMap<Ecosystem, EcosystemBuckets>,
    unknown_ecosystem: Vec<TransferOutcome>,
    dry_run: bool,
}

impl OutcomeAggregator {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: TransferOutcome) {
        let c = &mut self.counters;
        c.total_components += 1;

        if outcome.bucket == OutcomeBucket::Unknown {
            c.not_approved += 1;
        } else {
            match outcome.package_type {
                PackageType::ClearedThirdParty => c.third_party_to_copy += 1,
                PackageType::Internal => c.internal_to_move += 1,
                PackageType::Development => c.development_to_copy += 1,
                PackageType::Unknown => c.not_approved += 1,
            }
        }

        match outcome.bucket {
            OutcomeBucket::Unknown => {}
            OutcomeBucket::NotFound => c.not_actioned_not_found += 1,
            OutcomeBucket::AlreadyPresent => {
                c.already_present += 1;
                c.actioned_successfully += 1;
            }
            OutcomeBucket::Found if outcome.is_success() => c.actioned_successfully += 1,
            OutcomeBucket::Found => c.not_actioned_error += 1,
        }

        match outcome.ecosystem {
            Some(ecosystem) => self.buckets.entry(ecosystem).or_default().push(outcome),
            None => self.unknown_ecosystem.push(outcome),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn finish(self) -> PromotionReport {
        PromotionReport {
            counters: self.counters,
            buckets: self.buckets,
            unknown_ecosystem: self.unknown_ecosystem,
            dry_run: self.dry_run,
        }
    }
}

/// Everything a run produced, for the downstream formatter and the patcher.
#[derive(Debug, Clone, Serialize)]
pub struct PromotionReport {
    pub counters: Counters,
    pub buckets: BTreeMap<Ecosystem, EcosystemBuckets>,
    pub unknown_ecosystem: Vec<TransferOutcome>,
    pub dry_run: bool,
}

impl PromotionReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.buckets
            .values()
            .flat_map(|buckets| buckets.iter())
            .chain(&self.unknown_ecosystem)
    }

    pub fn ecosystem(&self, ecosystem: Ecosystem) -> Option<&EcosystemBuckets> {
        self.buckets.get(&ecosystem)
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.counters.not_actioned_not_found > 0 || self.counters.not_actioned_error > 0 {
            ExitStatus::Warning
        } else {
            ExitStatus::Success
        }
    }

    /// Writes the resolved repository path of every successful transfer, and
    /// of every component already in a release repository, back into `bom`.
    /// Returns how many components were patched.
    ///
    /// Matching is tolerant: the outcome's name must contain the component's
    /// name, versions must agree and one purl must contain the other.
    pub fn patch_bom(&self, bom: &mut Bom) -> usize {
        let mut patched = 0;
        for outcome in self.outcomes() {
            let patchable = matches!(outcome.bucket, OutcomeBucket::Found | OutcomeBucket::AlreadyPresent);
            if !patchable || !outcome.is_success() {
                continue;
            }
            let Some(repo_path) = outcome.repo_path.as_deref() else {
                continue;
            };

            let Some(component) = bom.components.iter_mut().find(|c| same_component(c, outcome)) else {
                warn!(
                    component = %outcome.name,
                    version = %outcome.version,
                    "No bill-of-materials entry for transferred component"
                );
                continue;
            };

            component.set_property(PROP_REPO_PATH, repo_path);
            // Already-present components keep the repository they came from.
            if outcome.bucket == OutcomeBucket::Found && repo_path != NOT_FOUND_IN_REPO {
                if let Some(dest) = outcome.dest_repo.as_deref() {
                    component.set_property(PROP_REPO_NAME, dest);
                }
            }
            patched += 1;
        }
        patched
    }

    pub fn log_summary(&self) {
        let c = &self.counters;
        info!(
            total = c.total_components,
            third_party_to_copy = c.third_party_to_copy,
            internal_to_move = c.internal_to_move,
            development_to_copy = c.development_to_copy,
            not_approved = c.not_approved,
            already_present = c.already_present,
            succeeded = c.actioned_successfully,
            not_found = c.not_actioned_not_found,
            errors = c.not_actioned_error,
            dry_run = self.dry_run,
            "Promotion finished"
        );

        for (ecosystem, buckets) in &self.buckets {
            for outcome in &buckets.not_found {
                warn!(%ecosystem, component = %outcome.name, version = %outcome.version, "Package not found in store");
            }
            for outcome in buckets.failed() {
                warn!(
                    %ecosystem,
                    component = %outcome.name,
                    version = %outcome.version,
                    status = outcome.status(),
                    "Package not transferred due to error"
                );
            }
        }
    }
}

fn same_component(component: &Component, outcome: &TransferOutcome) -> bool {
    outcome.name.contains(&component.name)
        && outcome.version == component.version
        && (component.purl.contains(&outcome.purl) || outcome.purl.contains(&component.purl))
}
