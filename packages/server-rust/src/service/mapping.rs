//! Named schemas and the mapping engine behind the HTTP binding layer.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::FixedOffset;
use dashmap::DashMap;
use gantry_core::{
    Compiled, CompileError, Compiler, ConditionMap, LocaleContext, MapOptions, Mapper,
    MappingFailure, Record, Registries, Schema, SchemaError,
};
use tracing::{debug, info};

use super::registry::{ManagedService, ServiceContext};
use crate::catalog::MessageCatalog;
use crate::config::MappingConfig;

/// Subdirectory of the schema directory holding `<language>.json` messages.
const MESSAGES_DIR: &str = "messages";

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("unknown schema `{0}`")]
    UnknownSchema(String),
    #[error(transparent)]
    Mapping(#[from] MappingFailure),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub struct MappingService {
    config: MappingConfig,
    registries: Arc<Registries>,
    catalog: Arc<MessageCatalog>,
    mapper: Mapper,
    compiler: Compiler,
    schemas: DashMap<String, Arc<Schema>>,
}

impl MappingService {
    /// Creates the service with the built-in types and ciphers registered.
    #[must_use]
    pub fn new(config: MappingConfig, catalog: Arc<MessageCatalog>) -> Self {
        Self::with_registries(config, catalog, Arc::new(Registries::with_builtins()))
    }

    #[must_use]
    pub fn with_registries(
        config: MappingConfig,
        catalog: Arc<MessageCatalog>,
        registries: Arc<Registries>,
    ) -> Self {
        let mapper = Mapper::new(Arc::clone(&registries))
            .with_catalog(catalog.clone())
            .with_max_depth(config.max_depth);
        let compiler = Compiler::new().with_max_depth(config.max_depth);
        Self {
            config,
            registries,
            catalog,
            mapper,
            compiler,
            schemas: DashMap::new(),
        }
    }

    #[must_use]
    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<MessageCatalog> {
        &self.catalog
    }

    #[must_use]
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Verifies and stores `schema` under `name`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// The schema names an unregistered type or cipher.
    pub fn register_schema(
        &self,
        name: impl Into<String>,
        schema: Schema,
    ) -> Result<(), SchemaError> {
        schema.verify(&self.registries)?;
        self.schemas.insert(name.into(), Arc::new(schema));
        Ok(())
    }

    #[must_use]
    pub fn schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered schema names, sorted.
    #[must_use]
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Locale for a request, falling back to the configured timezone.
    #[must_use]
    pub fn locale(&self, language: Option<String>, timezone: Option<FixedOffset>) -> LocaleContext {
        LocaleContext {
            language,
            timezone: timezone.or(self.config.default_timezone),
        }
    }

    /// Maps `input` through the named schema.
    ///
    /// # Errors
    ///
    /// [`BindError::UnknownSchema`], or the mapping failure.
    pub fn bind_with(
        &self,
        name: &str,
        input: &Record,
        options: MapOptions,
        locale: &LocaleContext,
    ) -> Result<Record, BindError> {
        let schema = self
            .schema(name)
            .ok_or_else(|| BindError::UnknownSchema(name.to_string()))?;
        let record = self.mapper.map_new(&schema, input, options, locale)?;
        debug!(schema = name, fields = record.len(), "arguments bound");
        Ok(record)
    }

    /// Strict binding of request arguments.
    ///
    /// # Errors
    ///
    /// See [`MappingService::bind_with`].
    pub fn bind(
        &self,
        name: &str,
        input: &Record,
        locale: &LocaleContext,
    ) -> Result<Record, BindError> {
        self.bind_with(name, input, MapOptions::strict(), locale)
    }

    /// Lenient shaping of a response record: failing fields are dropped.
    ///
    /// # Errors
    ///
    /// Only [`BindError::UnknownSchema`].
    pub fn shape(
        &self,
        name: &str,
        input: &Record,
        locale: &LocaleContext,
    ) -> Result<Record, BindError> {
        self.bind_with(name, input, MapOptions::lenient(), locale)
    }

    /// Binds `input` and compiles the result into an equality filter.
    ///
    /// # Errors
    ///
    /// See [`MappingService::bind_with`]; compilation fails only on depth.
    pub fn filter(
        &self,
        name: &str,
        input: &Record,
        locale: &LocaleContext,
    ) -> Result<Compiled, BindError> {
        let bound = self.bind_with(name, input, MapOptions::partial(), locale)?;
        Ok(self.compiler.compile(ConditionMap::from_record(&bound))?)
    }

    /// Loads every `*.json` schema document in `dir` (named by file stem) and
    /// every `messages/<language>.json` catalog.
    ///
    /// # Errors
    ///
    /// I/O failures and invalid documents, annotated with the file path.
    pub async fn load_dir(&self, dir: &Path) -> anyhow::Result<usize> {
        let mut loaded = 0;
        for path in json_files(dir).await? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let schema = Schema::from_json(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            self.register_schema(name, schema)
                .with_context(|| format!("verifying {}", path.display()))?;
            loaded += 1;
        }

        let messages = dir.join(MESSAGES_DIR);
        if tokio::fs::try_exists(&messages).await.unwrap_or(false) {
            for path in json_files(&messages).await? {
                let Some(language) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let count = self
                    .catalog
                    .load_json(language, &text)
                    .with_context(|| format!("parsing {}", path.display()))?;
                debug!(language, count, "messages loaded");
            }
        }
        Ok(loaded)
    }
}

/// `*.json` files directly inside `dir`, sorted by path.
async fn json_files(dir: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading directory {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl ManagedService for MappingService {
    fn name(&self) -> &'static str {
        "mapping"
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        if let Some(dir) = &self.config.schema_dir {
            let count = self.load_dir(dir).await?;
            info!(dir = %dir.display(), schemas = count, "schemas loaded");
        }
        Ok(())
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.schemas.clear();
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        info!(schemas = self.schemas.len(), "mapping service stopped");
        Ok(())
    }
}
