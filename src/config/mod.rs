//! Configuration for the pipeline.
//!
//! Values come from built-in defaults, an optional JSON file and `CNPJ_*`
//! environment variables, in increasing precedence. The binary applies its
//! command line flags last.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::schema::{EntityKind, EntitySchema};

/// Default remote directory holding the monthly dump
pub const DEFAULT_BASE_URL: &str =
    "https://arquivos.receitafederal.gov.br/dados/cnpj/dados_abertos_cnpj/2025-07/";

/// Rows per transform chunk
pub const DEFAULT_CHUNK_SIZE: usize = 8_000_000;

/// Rows per load batch
pub const DEFAULT_LOAD_BATCH_SIZE: usize = 32_768;

/// Settings specific to one source dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Remote archive prefix, e.g. `Socios` for `Socios3.zip`
    pub prefix: String,
    /// Local stem for the extracted files, e.g. `socios` for `socios3.csv`
    pub stem: String,
    /// Exact raw column count, rows of another width are skipped
    #[serde(default)]
    pub expected_columns: Option<usize>,
    /// Per-chunk sort key, empty for none
    #[serde(default)]
    pub sort_keys: Vec<String>,
    /// Source column overrides by output column name
    #[serde(default)]
    pub column_indices: BTreeMap<String, usize>,
}

impl DatasetConfig {
    /// Defaults for the registry layout of `kind`
    #[must_use]
    pub fn for_entity(kind: EntityKind) -> Self {
        let schema = EntitySchema::for_entity(kind);
        let sort_keys = match kind {
            EntityKind::Partner => vec!["partnership_start", "partner_name"],
            EntityKind::Branch => vec!["closing_date", "opening_date", "postal_code"],
            EntityKind::Company => vec![],
        };
        Self {
            prefix: kind.source_prefix().to_string(),
            stem: kind.source_prefix().to_lowercase(),
            expected_columns: schema.expected_columns,
            sort_keys: sort_keys.into_iter().map(String::from).collect(),
            column_indices: BTreeMap::new(),
        }
    }
}

/// Per-dataset settings for the three sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Datasets {
    pub companies: DatasetConfig,
    pub business: DatasetConfig,
    pub partners: DatasetConfig,
}

impl Default for Datasets {
    fn default() -> Self {
        Self {
            companies: DatasetConfig::for_entity(EntityKind::Company),
            business: DatasetConfig::for_entity(EntityKind::Branch),
            partners: DatasetConfig::for_entity(EntityKind::Partner),
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Remote directory, archives are fetched from `{base_url}{prefix}{i}.zip`
    pub base_url: String,
    /// Staging area for downloaded archives, removed after ingest
    pub tmp_dir: PathBuf,
    /// Extracted raw files, one sub-directory per dataset
    pub csv_dir: PathBuf,
    /// Columnar files, one per entity
    pub parquet_dir: PathBuf,
    /// Transactional store
    pub sqlite_path: PathBuf,
    /// Analytic mirror
    pub duckdb_path: PathBuf,
    /// Bulk-import CSV files of the partner graph
    pub graph_dir: PathBuf,
    /// Archive parts per dataset
    pub parts: usize,
    /// Rows per transform chunk
    pub chunk_size: usize,
    /// Rows per load batch
    pub load_batch_size: usize,
    /// Bytes buffered between the HTTP stream and disk
    pub download_buffer: usize,
    /// Copy buffer for archive extraction
    pub extract_buffer: usize,
    /// Capacity of the download to extraction work queue
    pub queue_capacity: usize,
    /// Globally sort and recompress columnar files after transform
    pub rematerialize: bool,
    /// Compact the analytic store after mirroring
    pub vacuum_analytic: bool,
    /// Turn on foreign key enforcement while loading
    pub enforce_foreign_keys: bool,
    /// Rebuild the transactional store even if it exists
    pub rebuild_store: bool,
    /// Lifetime of cached statistics
    pub stats_ttl_secs: u64,
    /// Draw progress bars
    pub show_progress: bool,
    pub datasets: Datasets,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut config = Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            tmp_dir: PathBuf::new(),
            csv_dir: PathBuf::new(),
            parquet_dir: PathBuf::new(),
            sqlite_path: PathBuf::new(),
            duckdb_path: PathBuf::new(),
            graph_dir: PathBuf::new(),
            parts: 10,
            chunk_size: DEFAULT_CHUNK_SIZE,
            load_batch_size: DEFAULT_LOAD_BATCH_SIZE,
            download_buffer: 512 * 1024,
            extract_buffer: 1024 * 1024,
            queue_capacity: 64,
            rematerialize: false,
            vacuum_analytic: true,
            enforce_foreign_keys: false,
            rebuild_store: false,
            stats_ttl_secs: 3600,
            show_progress: true,
            datasets: Datasets::default(),
        };
        config.set_data_dir(Path::new("data"));
        config
    }
}

impl PipelineConfig {
    /// Defaults with every working path placed under `dir`
    #[must_use]
    pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
        let mut config = Self::default();
        config.set_data_dir(dir.as_ref());
        config
    }

    /// Point every working path at a layout under `dir`
    pub fn set_data_dir(&mut self, dir: &Path) {
        self.tmp_dir = dir.join("tmp");
        self.csv_dir = dir.join("csv");
        self.parquet_dir = dir.join("parquet");
        self.sqlite_path = dir.join("sqlite").join("rfb.sqlite3");
        self.duckdb_path = dir.join("duckdb").join("rfb.duckdb");
        self.graph_dir = dir.join("graph");
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = crate::error::util::safe_open_file(path, "pipeline configuration")?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    /// Apply `CNPJ_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var("CNPJ_DATA_DIR") {
            self.set_data_dir(Path::new(&dir));
        }
        if let Some(url) = var("CNPJ_BASE_URL") {
            self.base_url = url;
        }
        if let Some(parts) = parse_var(&var, "CNPJ_PARTS")? {
            self.parts = parts;
        }
        if let Some(size) = parse_var(&var, "CNPJ_CHUNK_SIZE")? {
            self.chunk_size = size;
        }
        if let Some(size) = parse_var(&var, "CNPJ_LOAD_BATCH_SIZE")? {
            self.load_batch_size = size;
        }
        if let Some(ttl) = parse_var(&var, "CNPJ_STATS_TTL_SECS")? {
            self.stats_ttl_secs = ttl;
        }
        Ok(())
    }

    /// Reject settings that would make a stage loop forever or do nothing
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::Config("base_url is empty".into()));
        }
        for (name, value) in [
            ("parts", self.parts),
            ("chunk_size", self.chunk_size),
            ("load_batch_size", self.load_batch_size),
            ("download_buffer", self.download_buffer),
            ("extract_buffer", self.extract_buffer),
            ("queue_capacity", self.queue_capacity),
        ] {
            if value == 0 {
                return Err(PipelineError::Config(format!("{name} must be positive")));
            }
        }
        for kind in EntityKind::TRANSFORM_ORDER {
            self.entity_schema(kind)?;
        }
        Ok(())
    }

    /// Settings of one dataset
    #[must_use]
    pub const fn dataset(&self, kind: EntityKind) -> &DatasetConfig {
        match kind {
            EntityKind::Company => &self.datasets.companies,
            EntityKind::Branch => &self.datasets.business,
            EntityKind::Partner => &self.datasets.partners,
        }
    }

    /// Projection plan with the configured overrides applied
    pub fn entity_schema(&self, kind: EntityKind) -> Result<EntitySchema> {
        let dataset = self.dataset(kind);
        let schema = EntitySchema::for_entity(kind)
            .with_indices(&dataset.column_indices)?
            .with_expected_columns(dataset.expected_columns);
        for key in &dataset.sort_keys {
            if schema.field(key).is_none() {
                return Err(PipelineError::Config(format!(
                    "sort key '{key}' is not a column of {kind}"
                )));
            }
        }
        Ok(schema)
    }

    /// Remote URL of archive part `index`
    #[must_use]
    pub fn archive_url(&self, kind: EntityKind, index: usize) -> String {
        format!("{}{}{index}.zip", self.base_url, self.dataset(kind).prefix)
    }

    /// Staging path of archive part `index`
    #[must_use]
    pub fn archive_path(&self, kind: EntityKind, index: usize) -> PathBuf {
        self.tmp_dir
            .join(format!("{}{index}.zip", self.dataset(kind).prefix))
    }

    /// Directory holding the extracted raw files of a dataset
    #[must_use]
    pub fn raw_dir(&self, kind: EntityKind) -> PathBuf {
        self.csv_dir.join(&self.dataset(kind).stem)
    }

    /// Extracted raw file of part `index`
    #[must_use]
    pub fn raw_path(&self, kind: EntityKind, index: usize) -> PathBuf {
        let stem = &self.dataset(kind).stem;
        self.raw_dir(kind).join(format!("{stem}{index}.csv"))
    }

    /// Extracted raw files that exist, in part order
    ///
    /// Parts that failed to download leave gaps and are simply absent.
    #[must_use]
    pub fn raw_files(&self, kind: EntityKind) -> Vec<PathBuf> {
        (0..self.parts)
            .map(|i| self.raw_path(kind, i))
            .filter(|p| p.is_file())
            .collect()
    }

    /// Columnar output of an entity
    #[must_use]
    pub fn parquet_path(&self, kind: EntityKind) -> PathBuf {
        self.parquet_dir.join(format!("{}.parquet", kind.table_name()))
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| PipelineError::Config(format!("{key}='{raw}' is not a valid number")))
        })
        .transpose()
}
