// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::Category;
use crate::CategoryReport;
use crate::CleanupPlan;
use crate::CleanupReport;
use crate::FailurePolicy;
use crate::ItemFailure;
use crate::Narrowing;
use crate::ReconcileError;
use crate::dhcp;
use crate::filter_owned;
use crate::load_balancers;
use crate::qos;
use crate::security_groups;
use crate::segments;
use crate::tier1;
use nsx_cleanup_db::AuthorityIndex;
use nsx_client::Backend;
use nsx_common::DEFAULT_DOMAIN;
use nsx_common::OS_API_VERSION_SCOPE;
use nsx_common::Resource;
use nsx_common::ResourceType;
use nsx_common::TagPredicate;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Knobs controlling a cleanup run
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// policy domain holding security groups and gateway policies
    pub domain: String,
    /// the tag that marks an object as created by the orchestrator
    pub marker: TagPredicate,
    /// per-category overrides of [`Category::default_policy()`]
    pub policies: BTreeMap<Category, FailurePolicy>,
    /// find and report candidates without changing anything
    pub dry_run: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            domain: DEFAULT_DOMAIN.to_string(),
            marker: TagPredicate::scope(OS_API_VERSION_SCOPE),
            policies: BTreeMap::new(),
            dry_run: false,
        }
    }
}

impl ReconcilerConfig {
    pub fn policy(&self, category: Category) -> FailurePolicy {
        self.policies
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_policy())
    }
}

/// Finds the backend objects the orchestrator created and deletes them
pub struct Reconciler {
    backend: Arc<dyn Backend>,
    authority: Option<Arc<dyn AuthorityIndex>>,
    config: ReconcilerConfig,
    plan: CleanupPlan,
    log: Logger,
}

impl Reconciler {
    pub fn new(
        backend: Arc<dyn Backend>,
        authority: Option<Arc<dyn AuthorityIndex>>,
        config: ReconcilerConfig,
        log: &Logger,
    ) -> Reconciler {
        let log = log.new(o!(
            "component" => "Reconciler",
            "dry_run" => config.dry_run,
        ));
        Reconciler {
            backend,
            authority,
            config,
            plan: CleanupPlan::standard(),
            log,
        }
    }

    /// Run `plan` instead of [`CleanupPlan::standard()`].
    pub fn with_plan(
        mut self,
        plan: CleanupPlan,
    ) -> Result<Reconciler, ReconcileError> {
        plan.validate()?;
        self.plan = plan;
        Ok(self)
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Clean up every category of the plan, in order
    ///
    /// Per-object failures are recorded in the report.  A category whose
    /// objects cannot be listed, or whose failure policy is
    /// [`FailurePolicy::Propagate`], stops the run with an error.
    pub async fn cleanup_all(&self) -> Result<CleanupReport, ReconcileError> {
        info!(self.log, "starting cleanup";
            "domain" => &self.config.domain,
            "marker" => %self.config.marker,
            "authority" => self.authority.is_some(),
        );
        let mut categories = Vec::new();
        for step in self.plan.steps() {
            let report = self.cascade_delete(step.category).await?;
            categories.push(report);
        }
        let report = CleanupReport { dry_run: self.config.dry_run, categories };
        info!(self.log, "cleanup finished";
            "deleted" => report.total_deleted(),
            "failures" => report.total_failures(),
        );
        Ok(report)
    }

    /// Clean up one category
    pub async fn cascade_delete(
        &self,
        category: Category,
    ) -> Result<CategoryReport, ReconcileError> {
        let mut run = CategoryRun::new(self, category);
        info!(run.log, "cleaning up category"; "policy" => %run.policy);
        match category {
            Category::SecurityGroups => {
                security_groups::clean_security_groups(&mut run).await?
            }
            Category::SegmentInterfaces => {
                segments::clean_segment_interfaces(&mut run).await?
            }
            Category::Segments => segments::clean_segments(&mut run).await?,
            Category::QosPolicies => qos::clean_qos_policies(&mut run).await?,
            Category::LoadBalancers => {
                load_balancers::clean_load_balancers(&mut run).await?
            }
            Category::Dhcp => dhcp::clean_dhcp(&mut run).await?,
            Category::Tier1Routers => {
                tier1::clean_tier1_routers(&mut run).await?
            }
        }
        let report = run.report;
        info!(self.log, "category done";
            "category" => %category,
            "candidates" => report.candidates,
            "deleted" => report.deleted,
            "already_gone" => report.already_gone,
            "failures" => report.failures.len(),
        );
        Ok(report)
    }
}

/// State of one category while it is being cleaned up
pub(crate) struct CategoryRun<'a> {
    pub(crate) reconciler: &'a Reconciler,
    pub(crate) policy: FailurePolicy,
    pub(crate) report: CategoryReport,
    pub(crate) log: Logger,
}

impl<'a> CategoryRun<'a> {
    fn new(reconciler: &'a Reconciler, category: Category) -> CategoryRun<'a> {
        CategoryRun {
            reconciler,
            policy: reconciler.config.policy(category),
            report: CategoryReport::new(category),
            log: reconciler.log.new(o!("category" => category.to_string())),
        }
    }

    pub(crate) fn backend(&self) -> &'a dyn Backend {
        self.reconciler.backend()
    }

    pub(crate) fn config(&self) -> &'a ReconcilerConfig {
        &self.reconciler.config
    }

    pub(crate) fn dry_run(&self) -> bool {
        self.reconciler.config.dry_run
    }

    pub(crate) fn domain(&self) -> &'a str {
        &self.reconciler.config.domain
    }

    /// List `kind` inside `parents`
    pub(crate) async fn list(
        &self,
        kind: ResourceType,
        parents: &[&str],
    ) -> Result<Vec<Resource>, ReconcileError> {
        self.backend()
            .list(kind, parents)
            .await
            .map_err(|err| ReconcileError::List { kind, err })
    }

    /// Like [`CategoryRun::list()`], but a missing container counts as an
    /// empty collection
    pub(crate) async fn list_if_present(
        &self,
        kind: ResourceType,
        parents: &[&str],
    ) -> Result<Vec<Resource>, ReconcileError> {
        match self.backend().list(kind, parents).await {
            Ok(resources) => Ok(resources),
            Err(err) if err.is_not_found() => {
                debug!(self.log, "container is gone, nothing to list";
                    "kind" => %kind,
                    "parents" => ?parents,
                );
                Ok(Vec::new())
            }
            Err(err) => Err(ReconcileError::List { kind, err }),
        }
    }

    /// List `kind` inside `parents` and keep what the orchestrator owns
    pub(crate) async fn owned(
        &self,
        kind: ResourceType,
        parents: &[&str],
        narrowing: &[Narrowing],
    ) -> Result<Vec<Resource>, ReconcileError> {
        let all = self.list(kind, parents).await?;
        Ok(self.keep_owned(kind, all, narrowing))
    }

    /// Like [`CategoryRun::owned()`], but a missing container counts as an
    /// empty collection
    pub(crate) async fn owned_if_present(
        &self,
        kind: ResourceType,
        parents: &[&str],
        narrowing: &[Narrowing],
    ) -> Result<Vec<Resource>, ReconcileError> {
        let all = self.list_if_present(kind, parents).await?;
        Ok(self.keep_owned(kind, all, narrowing))
    }

    fn keep_owned(
        &self,
        kind: ResourceType,
        all: Vec<Resource>,
        narrowing: &[Narrowing],
    ) -> Vec<Resource> {
        let total = all.len();
        let owned = filter_owned(
            all,
            &self.config().marker,
            self.reconciler.authority.as_deref(),
            narrowing,
        );
        debug!(self.log, "found owned objects";
            "kind" => %kind,
            "total" => total,
            "owned" => owned.len(),
        );
        owned
    }

    /// Delete an object this category answers for, recording the outcome in
    /// the category's report
    ///
    /// Only a failure under [`FailurePolicy::Propagate`] is returned.
    pub(crate) async fn delete(
        &mut self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<(), ReconcileError> {
        self.report.candidates += 1;
        if self.dry_run() {
            info!(self.log, "would delete"; "kind" => %kind, "id" => id);
            return Ok(());
        }
        match self.backend().delete(kind, parents, id).await {
            Ok(()) => {
                info!(self.log, "deleted"; "kind" => %kind, "id" => id);
                self.report.deleted += 1;
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(self.log, "already gone"; "kind" => %kind, "id" => id);
                self.report.already_gone += 1;
                Ok(())
            }
            Err(err) => match self.policy {
                FailurePolicy::Isolate => {
                    warn!(self.log, "failed to delete";
                        "kind" => %kind,
                        "id" => id,
                        "error" => %err,
                    );
                    self.report.failures.push(ItemFailure {
                        kind,
                        id: id.to_string(),
                        message: err.to_string(),
                    });
                    Ok(())
                }
                FailurePolicy::Propagate => Err(ReconcileError::Delete {
                    kind,
                    id: id.to_string(),
                    err,
                }),
            },
        }
    }

    /// Delete an object that only exists to serve one of this category's
    /// objects
    ///
    /// Failures are logged and otherwise ignored: if the dependent object
    /// really is still there, deleting its container fails and is reported.
    pub(crate) async fn delete_dependent(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) {
        if self.dry_run() {
            debug!(self.log, "would delete"; "kind" => %kind, "id" => id);
            return;
        }
        match self.backend().delete(kind, parents, id).await {
            Ok(()) => debug!(self.log, "deleted"; "kind" => %kind, "id" => id),
            Err(err) if err.is_not_found() => (),
            Err(err) => {
                warn!(self.log, "failed to delete dependent object";
                    "kind" => %kind,
                    "id" => id,
                    "error" => %err,
                );
            }
        }
    }

    /// Apply `body` to an object, logging (but not reporting) failure
    pub(crate) async fn patch_dependent(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
        body: &serde_json::Value,
    ) {
        if self.dry_run() {
            debug!(self.log, "would update"; "kind" => %kind, "id" => id);
            return;
        }
        if let Err(err) = self.backend().patch(kind, parents, id, body).await {
            warn!(self.log, "failed to update object";
                "kind" => %kind,
                "id" => id,
                "error" => %err,
            );
        }
    }
}
