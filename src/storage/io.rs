//! Parquet IO and id allocation for entity tables.
//!
//! Each table lives in a single `<table>.parquet` file next to a
//! `<table>.meta.json` sidecar holding the id high-water mark. Rewrites go
//! through a temp file and an atomic rename so a failed write never leaves a
//! half-written table behind.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use tracing::debug;

use super::Store;

impl Store {
    pub(crate) fn table_file(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.parquet", table))
    }

    pub(crate) fn meta_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.meta.json", table))
    }

    /// Read a whole table. A missing file is an empty table, not an error.
    pub(crate) fn read_table(&self, table: &str) -> Result<Option<DataFrame>> {
        let path = self.table_file(table);
        if !path.exists() {
            return Ok(None);
        }
        let file = fs::File::open(&path)
            .with_context(|| format!("open table file {}", path.display()))?;
        let df = ParquetReader::new(file).finish()?;
        Ok(Some(df))
    }

    /// Rewrite a whole table atomically (temp file + rename).
    pub(crate) fn write_table(&self, table: &str, mut df: DataFrame) -> Result<()> {
        let path = self.table_file(table);
        let tmp = self.root.join(format!("{}.parquet.tmp", table));
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("create temp table file {}", tmp.display()))?;
            ParquetWriter::new(&mut f).finish(&mut df)?;
        }
        fs::rename(&tmp, &path)
            .with_context(|| format!("commit table file {}", path.display()))?;
        debug!(target: "quillpress::storage", "write_table: table='{}' rows={}", table, df.height());
        Ok(())
    }

    /// Allocate the next id for a table, persisting the high-water mark so
    /// ids stay monotonic and are never reused after deletes. Ids start at 1.
    pub(crate) fn allocate_id(&self, table: &str) -> Result<i64> {
        let path = self.meta_path(table);
        let next = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read table meta {}", path.display()))?;
            let meta: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("parse table meta {}", path.display()))?;
            meta.get("next_id")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| anyhow!("table meta {} missing next_id", path.display()))?
        } else {
            1
        };
        let meta = serde_json::json!({ "next_id": next + 1 });
        fs::write(&path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("write table meta {}", path.display()))?;
        Ok(next)
    }
}
