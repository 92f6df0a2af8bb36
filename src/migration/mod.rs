//! Index migration engine.
//!
//! Brings each tenant index up to the mapping the application currently
//! expects by writing every document into a freshly named successor index
//! and atomically repointing the tenant alias, never by mutating a mapping
//! in place. A crash at any point before the final alias swap leaves the
//! old generation fully authoritative.

use crate::error::Result;
use crate::mapping::{build_active_mappings, disable_unknown_fields, IndexMapping, SchemaRegistry};
use crate::store::{IndexInfo, IndexStore};
use crate::types::Document;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Schema-version upgrade function supplied by the surrounding application;
/// applied to every document exactly once per migration run.
pub type DocTransformer = Arc<dyn Fn(Document) -> Result<Document> + Send + Sync>;

/// Transformer for runs where no schema-version upgrade is needed.
pub fn identity_transformer() -> DocTransformer {
    Arc::new(|doc| Ok(doc))
}

#[derive(Clone)]
pub struct MigrationConfig {
    pub batch_size: usize,
    pub scroll_duration_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            batch_size: 100,
            scroll_duration_secs: 300,
            poll_interval_ms: 2500,
        }
    }
}

impl MigrationConfig {
    pub fn from_env() -> Self {
        let defaults = MigrationConfig::default();
        MigrationConfig {
            batch_size: env::var("TENANTRY_MIGRATION_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_size),
            scroll_duration_secs: env::var("TENANTRY_MIGRATION_SCROLL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.scroll_duration_secs),
            poll_interval_ms: env::var("TENANTRY_MIGRATION_POLL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.poll_interval_ms),
        }
    }

    pub fn scroll_duration(&self) -> Duration {
        Duration::from_secs(self.scroll_duration_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything one migration run needs; owned by that run and discarded
/// after it terminates.
pub struct MigrationContext {
    pub alias: String,
    pub source: IndexInfo,
    pub dest: IndexInfo,
    pub batch_size: usize,
    pub scroll_duration: Duration,
    pub poll_interval: Duration,
    pub transformer: DocTransformer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// The tenant index does not exist; a brand-new tenant has no data yet.
    SkippedMissing,
    /// Alias-fronted and already at the target mapping; no new generation.
    UpToDate,
    Migrated {
        source: String,
        dest: String,
        docs_migrated: usize,
    },
}

static INDEX_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+$").unwrap());

/// Next-generation index name: numeric suffix of the current name plus one,
/// defaulting the generation to 0 when the suffix is absent or unparsable.
pub fn next_index_name(index_name: &str, alias: &str) -> String {
    let generation = INDEX_SUFFIX
        .find(index_name)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}_{}", alias, generation + 1)
}

/// Per-tenant migration driver. One instance may serve many tenants; each
/// `migrate` call is an independent sequential run.
pub struct Migrator {
    store: Arc<dyn IndexStore>,
    target_mapping: IndexMapping,
    config: MigrationConfig,
    transformer: DocTransformer,
}

impl Migrator {
    /// Plans the active mapping up front, so a schema conflict between
    /// registered types fails here rather than mid-run.
    pub fn new(
        store: Arc<dyn IndexStore>,
        registry: &SchemaRegistry,
        config: MigrationConfig,
        transformer: DocTransformer,
    ) -> Result<Self> {
        let target_mapping = build_active_mappings(registry)?;
        Ok(Migrator {
            store,
            target_mapping,
            config,
            transformer,
        })
    }

    /// Migrate one tenant index to the current schema.
    ///
    /// Callers must ensure at most one concurrent run per tenant index;
    /// generation numbering offers no protection against racing runs.
    /// Re-invoking after a failure is safe: the run always starts from
    /// current alias state and the alias only moves after every batch has
    /// committed.
    pub async fn migrate(&self, alias: &str) -> Result<MigrationOutcome> {
        let mut source = self.store.fetch_info(alias).await?;
        if !source.exists {
            tracing::info!("[MIGRATE {}] index does not exist, nothing to migrate", alias);
            return Ok(MigrationOutcome::SkippedMissing);
        }

        // Drift guard is computed against the mapping applied before this
        // run, including the plain-index case below.
        let target = disable_unknown_fields(&self.target_mapping, &source.mapping);

        if source.is_alias_backed(alias) && source.mapping == target {
            tracing::info!("[MIGRATE {}] already at target mapping, skipping", alias);
            return Ok(MigrationOutcome::UpToDate);
        }

        if !source.is_alias_backed(alias) {
            source = self.convert_to_alias(alias, source, &target).await?;
        }

        let dest_name = next_index_name(&source.index_name, alias);
        let context = MigrationContext {
            alias: alias.to_string(),
            source,
            dest: IndexInfo {
                index_name: dest_name,
                exists: false,
                aliases: IndexMap::new(),
                mapping: target,
            },
            batch_size: self.config.batch_size,
            scroll_duration: self.config.scroll_duration(),
            poll_interval: self.config.poll_interval(),
            transformer: Arc::clone(&self.transformer),
        };
        self.migrate_source_to_dest(context).await
    }

    /// Run every tenant in turn. A failing tenant is logged and left on its
    /// prior generation; it never aborts the remaining tenants.
    pub async fn migrate_all(&self, aliases: &[String]) -> Vec<(String, Result<MigrationOutcome>)> {
        let mut results = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let result = self.migrate(alias).await;
            if let Err(e) = &result {
                tracing::error!("[MIGRATE {}] failed: {}", alias, e);
            }
            results.push((alias.clone(), result));
        }
        results
    }

    /// Steps 4-5: create the destination, pump every batch through the
    /// transformer, then cut the alias over. The alias never moves before
    /// the last batch has committed.
    async fn migrate_source_to_dest(&self, context: MigrationContext) -> Result<MigrationOutcome> {
        let MigrationContext {
            alias,
            source,
            dest,
            batch_size,
            scroll_duration,
            poll_interval,
            transformer,
        } = context;

        tracing::info!(
            "[MIGRATE {}] migrating {} -> {}",
            alias,
            source.index_name,
            dest.index_name
        );
        self.ensure_index(&alias, &dest.index_name, &dest.mapping).await?;
        let docs_migrated = self
            .pump(
                &source.index_name,
                &dest.index_name,
                batch_size,
                scroll_duration,
                poll_interval,
                Some(&transformer),
            )
            .await?;
        self.store
            .swap_alias(&alias, Some(&source.index_name), &dest.index_name)
            .await?;

        tracing::info!(
            "[MIGRATE {}] done, {} documents now served from {}",
            alias,
            docs_migrated,
            dest.index_name
        );
        Ok(MigrationOutcome::Migrated {
            source: source.index_name,
            dest: dest.index_name,
            docs_migrated,
        })
    }

    /// Reindex-to-alias conversion for a plain index whose real name equals
    /// the tenant alias. Documents are copied verbatim into generation N+1,
    /// then the alias starts fronting it; the old physical index stays in
    /// place under its original name. Later steps require the source to be
    /// alias-addressable, which is exactly what this establishes.
    async fn convert_to_alias(
        &self,
        alias: &str,
        source: IndexInfo,
        target: &IndexMapping,
    ) -> Result<IndexInfo> {
        let converted_name = next_index_name(&source.index_name, alias);
        tracing::info!(
            "[MIGRATE {}] converting plain index {} to alias-fronted {}",
            alias,
            source.index_name,
            converted_name
        );
        self.ensure_index(alias, &converted_name, target).await?;
        self.pump(
            &source.index_name,
            &converted_name,
            self.config.batch_size,
            self.config.scroll_duration(),
            self.config.poll_interval(),
            None,
        )
        .await?;
        self.store.swap_alias(alias, None, &converted_name).await?;

        Ok(IndexInfo {
            index_name: converted_name,
            exists: true,
            aliases: source
                .aliases
                .into_iter()
                .chain(std::iter::once((alias.to_string(), true)))
                .collect(),
            mapping: source.mapping,
        })
    }

    /// A destination left behind by an interrupted earlier run is reused:
    /// the pump writes by document id, so re-filling it converges, and the
    /// alias still only moves at the end.
    async fn ensure_index(&self, alias: &str, name: &str, mapping: &IndexMapping) -> Result<()> {
        match self.store.create_index(name, mapping).await {
            Ok(()) => Ok(()),
            Err(crate::error::TenantryError::IndexAlreadyExists(_)) => {
                tracing::warn!(
                    "[MIGRATE {}] reusing {} left behind by an interrupted run",
                    alias,
                    name
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Scroll the source and bulk-write into the destination, one batch in
    /// memory at a time, until a read returns no documents. Retry policy for
    /// the individual reads and writes is the store collaborator's own.
    async fn pump(
        &self,
        from: &str,
        to: &str,
        batch_size: usize,
        scroll_duration: Duration,
        poll_interval: Duration,
        transformer: Option<&DocTransformer>,
    ) -> Result<usize> {
        let mut cursor = self
            .store
            .bulk_read(from, batch_size, scroll_duration, poll_interval)
            .await?;
        let mut total = 0usize;
        loop {
            let batch = cursor.next_batch().await?;
            if batch.is_empty() {
                return Ok(total);
            }
            tracing::debug!("[MIGRATE] {} -> {}: batch of {}", from, to, batch.len());
            let docs = match transformer {
                Some(transform) => batch
                    .into_iter()
                    .map(|doc| transform(doc))
                    .collect::<Result<Vec<Document>>>()?,
                None => batch,
            };
            total += docs.len();
            self.store.bulk_write(to, docs).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_generation_from_numeric_suffix() {
        assert_eq!(next_index_name("tenant_0", "tenant"), "tenant_1");
        assert_eq!(next_index_name("tenant_41", "tenant"), "tenant_42");
    }

    #[test]
    fn next_generation_defaults_to_zero() {
        assert_eq!(next_index_name("tenant", "tenant"), "tenant_1");
        assert_eq!(next_index_name("tenant_v2beta", "tenant"), "tenant_1");
    }

    #[test]
    fn generation_is_derived_from_index_name_not_alias() {
        assert_eq!(next_index_name("tenant_7", "other_alias"), "other_alias_8");
    }

    #[test]
    fn config_defaults() {
        let cfg = MigrationConfig::default();
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.scroll_duration(), Duration::from_secs(300));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(2500));
    }
}
