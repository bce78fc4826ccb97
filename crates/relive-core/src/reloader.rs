//! Reload and wrap entry points

use crate::config::ReloadConfig;
use crate::driver::{RecompileDriver, Recompiler};
use crate::error::ReloadError;
use crate::index;
use crate::report::ReloadReport;
use crate::session::ReloadSession;
use crate::wrap::{self, WrapOptions, Wrapper};
use parking_lot::Mutex;
use relive_object::{ObjectEnumerator, Unit, UnitRegistry};
use std::sync::Arc;

/// Reloads and wraps units of one registry.
///
/// Calls on the same reloader are serialized: a call made while another is
/// running returns [`ReloadError::Busy`] instead of waiting.
pub struct Reloader {
    registry: Arc<UnitRegistry>,
    recompiler: Arc<dyn Recompiler>,
    enumerator: Arc<dyn ObjectEnumerator>,
    config: ReloadConfig,
    in_flight: Mutex<()>,
}

impl Reloader {
    /// Create a reloader that finds instances through the registry's heap
    #[must_use]
    pub fn new(registry: Arc<UnitRegistry>, recompiler: Arc<dyn Recompiler>) -> Self {
        let enumerator: Arc<dyn ObjectEnumerator> = registry.clone();
        Self {
            registry,
            recompiler,
            enumerator,
            config: ReloadConfig::default(),
            in_flight: Mutex::new(()),
        }
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: ReloadConfig) -> Self {
        self.config = config;
        self
    }

    /// With a different instance enumerator
    #[must_use]
    pub fn with_enumerator(mut self, enumerator: Arc<dyn ObjectEnumerator>) -> Self {
        self.enumerator = enumerator;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReloadConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    /// Reload one unit.
    ///
    /// # Errors
    /// See [`Reloader::reload`].
    pub fn reload_unit(&self, name: &str) -> Result<ReloadReport, ReloadError> {
        self.reload(&[name])
    }

    /// Recompile `names` as one batch, then repair every reference to their
    /// old definitions.
    ///
    /// Units that fail to recompile are listed in the report and left as
    /// they were; their old definitions stay in use.
    ///
    /// # Errors
    /// [`ReloadError::Busy`], [`ReloadError::Config`],
    /// [`ReloadError::UnknownUnit`] or [`ReloadError::Introspect`]. Nothing
    /// has been changed when an error is returned.
    pub fn reload(&self, names: &[&str]) -> Result<ReloadReport, ReloadError> {
        let _guard = self.in_flight.try_lock().ok_or(ReloadError::Busy)?;
        self.config.validate()?;
        let targets = self.resolve(names)?;

        tracing::info!(units = ?names, "reload started");
        let session = ReloadSession::open(
            &targets,
            &self.registry,
            self.enumerator.as_ref(),
            self.config.clone(),
        )?;

        let outcome =
            RecompileDriver::new(self.recompiler.as_ref(), &self.registry, &self.config, session.journal())
                .run(&targets);
        let stats = session.propagate(&outcome.succeeded);

        let report = session.finish(&outcome.succeeded, outcome.failures, stats);
        tracing::info!(
            session = %report.session,
            reloaded = report.reloaded.len(),
            failed = report.failures.len(),
            attempts = outcome.attempts,
            "reload finished"
        );
        Ok(report)
    }

    /// Wrap every callable of one unit.
    ///
    /// # Errors
    /// See [`Reloader::wrap_with`].
    pub fn wrap_unit(&self, name: &str, wrapper: &Wrapper<'_>) -> Result<ReloadReport, ReloadError> {
        self.wrap_with(&[name], wrapper, &WrapOptions::default())
    }

    /// Wrap every callable of `names`.
    ///
    /// # Errors
    /// See [`Reloader::wrap_with`].
    pub fn wrap(&self, names: &[&str], wrapper: &Wrapper<'_>) -> Result<ReloadReport, ReloadError> {
        self.wrap_with(names, wrapper, &WrapOptions::default())
    }

    /// Replace every callable the units own, and the selected members of
    /// every type they own, with `wrapper`'s output, then repair references
    /// as a reload would.
    ///
    /// # Errors
    /// Same as [`Reloader::reload`], minus recompilation failures, which
    /// cannot happen here.
    pub fn wrap_with(
        &self,
        names: &[&str],
        wrapper: &Wrapper<'_>,
        options: &WrapOptions,
    ) -> Result<ReloadReport, ReloadError> {
        let _guard = self.in_flight.try_lock().ok_or(ReloadError::Busy)?;
        self.config.validate()?;
        let targets = self.resolve(names)?;

        let session = ReloadSession::open(
            &targets,
            &self.registry,
            self.enumerator.as_ref(),
            self.config.clone(),
        )?;
        let owned = targets
            .iter()
            .map(|unit| index::internal_members(unit))
            .collect::<Result<Vec<_>, _>>()?;
        for (unit, defs) in targets.iter().zip(owned) {
            wrap::wrap_owned(unit, defs, wrapper, options, session.journal());
        }
        let stats = session.propagate(&targets);
        Ok(session.finish(&targets, Vec::new(), stats))
    }

    fn resolve(&self, names: &[&str]) -> Result<Vec<Arc<Unit>>, ReloadError> {
        let mut targets: Vec<Arc<Unit>> = Vec::with_capacity(names.len());
        for name in names {
            let unit = self
                .registry
                .get(name)
                .ok_or_else(|| ReloadError::UnknownUnit((*name).to_string()))?;
            if !targets.iter().any(|t| Arc::ptr_eq(t, &unit)) {
                targets.push(unit);
            }
        }
        Ok(targets)
    }
}

impl std::fmt::Debug for Reloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reloader")
            .field("units", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
