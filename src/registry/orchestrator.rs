/*!
 * Orchestrator
 * Idempotent reconcile of declared applications into a registry
 *
 * A reconcile validates the whole batch, stages secrets in parallel,
 * resolves network policies, builds descriptors and swaps the registry in
 * one step. Any failure leaves the previous registry in effect.
 *
 * Readers load the current snapshot lock-free; reconciles are serialized.
 */

use super::report::{ReconcileReport, Warning};
use super::snapshot::Registry;
use crate::app::{validate_batch, ApplicationSpec, RawApplicationSpec};
use crate::config::ProvisionerConfig;
use crate::core::errors::{FatalError, ProvisionError, Result, StagingError, StagingResult};
use crate::core::types::{Gid, UserIdentity};
use crate::host::HostFacts;
use crate::monitoring::RunSpan;
use crate::network::{hosts::host_matches, resolve};
use crate::secrets::{SecretStager, StagedSecret};
use crate::service::{build, BuildContext, ServiceDescriptor};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Owner of the registry and entry point for configuration changes
pub struct Orchestrator {
    config: ProvisionerConfig,
    context: BuildContext,
    host: Arc<dyn HostFacts>,
    stager: SecretStager,
    registry: ArcSwap<Registry>,
    reconcile_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(config: ProvisionerConfig, host: Arc<dyn HostFacts>) -> Self {
        let stager = SecretStager::new(&config.state_dir, host.system_identity());
        info!(
            state_dir = %config.state_dir.display(),
            runtime_dir = %config.runtime_dir.display(),
            "Orchestrator initialized"
        );
        Self {
            context: config.build_context(),
            config,
            host,
            stager,
            registry: ArcSwap::from_pointee(Registry::default()),
            reconcile_lock: Mutex::new(()),
        }
    }

    /// Registry currently in effect (lock-free)
    pub fn current(&self) -> Arc<Registry> {
        self.registry.load_full()
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn stager(&self) -> &SecretStager {
        &self.stager
    }

    /// Apply a complete declaration set
    ///
    /// Commits a new registry or nothing at all.
    pub fn reconcile(&self, raws: &[RawApplicationSpec]) -> Result<ReconcileReport> {
        let _guard = self.reconcile_lock.lock();

        let span = RunSpan::new("reconcile");
        let _entered = span.enter();
        span.record_apps(raws.len());

        let result = self.reconcile_locked(raws);
        span.record_result(result.is_ok());
        if let Err(e) = &result {
            warn!(error = %e, "Reconcile aborted; previous registry stays in effect");
        }
        result
    }

    /// Destroy the staged secrets of an application no longer declared
    ///
    /// Accounts are found through the owner markers in the secrets tree, so
    /// this works from a fresh process once the current declarations have
    /// been reconciled. Returns false when nothing was staged.
    pub fn decommission(&self, name: &str) -> Result<bool> {
        let _guard = self.reconcile_lock.lock();
        let current = self.registry.load();

        if current.contains(name) {
            return Err(ProvisionError::Configuration(format!(
                "`{}` is still declared; drop it from the declarations and reconcile first",
                name
            )));
        }

        let accounts: Vec<_> = self
            .stager
            .accounts()?
            .into_iter()
            .filter(|account| account.app() == name)
            .collect();
        if let Some((account, owner)) = accounts
            .iter()
            .find_map(|a| current.find_by_user(&a.user).map(|d| (a, d)))
        {
            return Err(ProvisionError::Configuration(format!(
                "account `{}` still runs `{}`",
                account.user,
                owner.name()
            )));
        }

        let mut removed = false;
        for account in &accounts {
            removed |= self.stager.remove(&account.user)?;
        }
        info!(app = %name, accounts = accounts.len(), removed, "Application decommissioned");
        Ok(removed)
    }

    fn reconcile_locked(&self, raws: &[RawApplicationSpec]) -> Result<ReconcileReport> {
        let specs = validate_batch(raws, &self.config.runtime_dir).map_err(|e| {
            warn!(app = %e.app(), field = %e.field(), error = %e, "Declaration rejected");
            e
        })?;

        let identities = specs
            .iter()
            .map(|spec| self.identity_for(spec))
            .collect::<StagingResult<Vec<_>>>()?;

        // Each application stages into its own directory
        let secrets = specs
            .par_iter()
            .zip(identities.par_iter())
            .map(|(spec, (owner, gid))| {
                let secret = self.stager.stage(owner, *gid, spec.secrets_file())?;
                self.stager.record_owner(&owner.name, spec.name())?;
                Ok::<_, StagingError>(secret)
            })
            .collect::<StagingResult<Vec<StagedSecret>>>()?;

        let descriptors = specs
            .iter()
            .zip(&secrets)
            .map(|(spec, secret)| build(spec, secret, &resolve(spec), &self.context))
            .collect::<std::result::Result<Vec<ServiceDescriptor>, FatalError>>()?;

        let previous = self.registry.load_full();
        let mut warnings = self.collect_warnings(&previous, &specs);
        let registry = Arc::new(Registry::from_descriptors(descriptors));
        let removed: BTreeSet<String> = previous
            .names()
            .difference(&registry.names())
            .cloned()
            .collect();

        self.registry.store(Arc::clone(&registry));

        let (purged, unused) = self.sweep_accounts(&registry);
        warnings.extend(unused);

        for warning in &warnings {
            warn!(app = %warning.app(), "{}", warning);
        }
        info!(
            apps = registry.len(),
            removed = removed.len(),
            purged = purged.len(),
            warnings = warnings.len(),
            "Registry swapped"
        );

        Ok(ReconcileReport {
            registry,
            warnings,
            removed,
            purged,
        })
    }

    /// Deal with staged secrets no registered service reads
    ///
    /// A secret left under an account an application no longer runs as is
    /// removed; one whose application is gone waits for `decommission`.
    /// Runs after the swap, so failures become warnings.
    fn sweep_accounts(&self, registry: &Registry) -> (BTreeSet<String>, Vec<Warning>) {
        let mut purged = BTreeSet::new();
        let mut warnings = Vec::new();

        let accounts = match self.stager.accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, "Could not list staged secrets");
                return (purged, warnings);
            }
        };

        for account in accounts {
            if registry.find_by_user(&account.user).is_some() {
                continue;
            }
            let app = account.app().to_string();
            if registry.contains(&app) {
                match self.stager.remove(&account.user) {
                    Ok(_) => {
                        info!(app = %app, user = %account.user, "Removed secret of previous account");
                        purged.insert(account.user);
                        continue;
                    }
                    Err(e) => {
                        warn!(app = %app, user = %account.user, error = %e, "Could not remove secret of previous account");
                    }
                }
            }
            warnings.push(Warning::UnusedSecret {
                app,
                user: account.user,
            });
        }
        (purged, warnings)
    }

    fn identity_for(&self, spec: &ApplicationSpec) -> StagingResult<(UserIdentity, Gid)> {
        let owner = self
            .host
            .lookup_user(spec.user())
            .ok_or_else(|| StagingError::UnknownUser(spec.user().to_string()))?;
        let gid = self
            .host
            .lookup_group(spec.group())
            .ok_or_else(|| StagingError::UnknownGroup(spec.group().to_string()))?;
        Ok((owner, gid))
    }

    fn collect_warnings(&self, previous: &Registry, specs: &[ApplicationSpec]) -> Vec<Warning> {
        let mut warnings = Vec::new();

        for spec in specs {
            if let Some(port) = spec.binding().tcp_port() {
                // A port we already hold is expected to be busy
                let already_ours = previous.iter().any(|d| d.spec().binding() == spec.binding());
                if !already_ours && self.host.tcp_port_in_use(port) {
                    warnings.push(Warning::PortInUse {
                        app: spec.name().to_string(),
                        port,
                    });
                }
            }

            if spec.expose_via_proxy()
                && !spec
                    .allowed_hosts()
                    .iter()
                    .any(|pattern| host_matches(spec.host_name(), pattern))
            {
                warnings.push(Warning::HostNotAllowed {
                    app: spec.name().to_string(),
                    host_name: spec.host_name().to_string(),
                });
            }
        }
        warnings
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("apps", &self.registry.load().len())
            .finish()
    }
}
