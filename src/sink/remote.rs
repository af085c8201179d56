//! Parquet datasets below an object-store prefix
//!
//! Object stores cannot rename, so the commit copies staged objects into the
//! dataset prefix. The old `_SUCCESS` marker is deleted before anything else
//! and the new one is copied last: a dataset with a marker is always complete.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use rayon::prelude::*;
use tokio::runtime::Runtime;

use super::{
    Layout, SUCCESS_MARKER, Sink, WriteReport, encode_part, plan_layout, staging_name,
    staging_prefix,
};
use crate::config::{SinkConfig, StorageCredentials};
use crate::error::{PipelineError, Result};
use crate::table::Table;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Requests in flight at once during upload, copy and delete
const MAX_CONCURRENT_REQUESTS: usize = 8;

/// Sink writing Parquet datasets to object storage
#[derive(Debug)]
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    /// Root as configured, used in reports and logs
    url: String,
    /// Key prefix below the bucket
    prefix: ObjectPath,
    config: SinkConfig,
    runtime: Runtime,
}

/// Split `scheme://bucket/key/prefix` into its parts
fn split_url(url: &str) -> Result<(&str, &str, &str)> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| PipelineError::UnsupportedStorage(format!("{url}: not a URL")))?;
    let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(PipelineError::Config(format!("{url}: missing bucket name")));
    }
    Ok((scheme, bucket, prefix.trim_matches('/')))
}

/// Append already-escaped segments to `base`
fn join<'a>(base: &'a ObjectPath, segments: impl IntoIterator<Item = &'a str>) -> Result<ObjectPath> {
    let joined = std::iter::once(base.as_ref())
        .filter(|s| !s.is_empty())
        .chain(segments)
        .collect::<Vec<_>>()
        .join("/");
    Ok(ObjectPath::parse(joined).map_err(object_store::Error::from)?)
}

impl ObjectStoreSink {
    /// Create a sink writing below `root` in `store`
    ///
    /// Only the key prefix of `root` is used for addressing; the store must
    /// already point at the right bucket.
    pub fn new(store: Arc<dyn ObjectStore>, root: &str, config: SinkConfig) -> Result<Self> {
        if config.max_rows_per_file == 0 {
            return Err(PipelineError::Config(
                "sink.max_rows_per_file must be greater than zero".to_string(),
            ));
        }
        let (_, _, prefix) = split_url(root)?;
        let prefix = ObjectPath::parse(prefix).map_err(object_store::Error::from)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PipelineError::io(root, e))?;

        Ok(Self {
            store,
            url: root.trim_end_matches('/').to_string(),
            prefix,
            config,
            runtime,
        })
    }

    /// Create an S3 sink for an `s3://` or `s3a://` root
    ///
    /// Credentials are passed to the client as given; without them the client
    /// falls back to its own provider chain (instance metadata and the like).
    pub fn for_url(
        url: &str,
        credentials: Option<&StorageCredentials>,
        config: SinkConfig,
    ) -> Result<Self> {
        let scheme = url.split_once("://").map_or(url, |(scheme, _)| scheme);
        if !matches!(scheme, "s3" | "s3a") {
            return Err(PipelineError::UnsupportedStorage(format!(
                "{url}: scheme {scheme} has no backend, use s3:// or a local directory"
            )));
        }
        let (_, bucket, _) = split_url(url)?;

        let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);
        if let Some(credentials) = credentials {
            builder = builder
                .with_access_key_id(&credentials.access_key_id)
                .with_secret_access_key(&credentials.secret_access_key);
            if let Some(region) = &credentials.region {
                builder = builder.with_region(region);
            }
        }
        log::debug!("Opening S3 bucket {bucket} for {url}");
        Self::new(Arc::new(builder.build()?), url, config)
    }

    /// Object prefix a table is written to
    pub fn table_prefix(&self, table_name: &str) -> Result<ObjectPath> {
        join(&self.prefix, [format!("{table_name}.parquet").as_str()])
    }

    async fn list(&self, prefix: &ObjectPath) -> Result<Vec<ObjectPath>> {
        Ok(self
            .store
            .list(Some(prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?)
    }

    async fn delete_all(&self, locations: Vec<ObjectPath>) -> Result<()> {
        futures::stream::iter(locations)
            .map(|location| async move { self.store.delete(&location).await })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    /// Remove staging prefixes left behind by interrupted runs
    async fn sweep_staging(&self, table_name: &str) -> Result<()> {
        let stale = staging_prefix(table_name);
        let listing = self.store.list_with_delimiter(Some(&self.prefix)).await?;
        for dir in listing.common_prefixes {
            if dir.filename().is_some_and(|name| name.starts_with(&stale)) {
                log::warn!("Removing stale staging prefix: {dir}");
                let objects = self.list(&dir).await?;
                self.delete_all(objects).await?;
            }
        }
        Ok(())
    }

    async fn upload(&self, staging: &ObjectPath, layout: &Layout) -> Result<()> {
        let encoded = layout
            .parts
            .par_iter()
            .map(|part| {
                let location = join(staging, part.segments())?;
                let bytes = encode_part(Vec::new(), &part.batch, &self.config)?;
                Ok((location, bytes))
            })
            .collect::<Result<Vec<_>>>()?;

        futures::stream::iter(encoded)
            .map(|(location, bytes)| async move {
                self.store.put(&location, PutPayload::from(bytes)).await
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .try_collect::<Vec<_>>()
            .await?;

        let marker = join(staging, [SUCCESS_MARKER])?;
        self.store.put(&marker, PutPayload::from_static(b"")).await?;
        Ok(())
    }

    /// Replace the objects under `target` with the staged ones
    async fn commit(&self, staging: &ObjectPath, target: &ObjectPath) -> Result<()> {
        let marker = join(target, [SUCCESS_MARKER])?;
        let old = self.list(target).await?;
        if old.contains(&marker) {
            self.store.delete(&marker).await?;
        }
        self.delete_all(old.into_iter().filter(|l| *l != marker).collect())
            .await?;

        let staged = self.list(staging).await?;
        let staged_marker = join(staging, [SUCCESS_MARKER])?;
        let copies: Vec<(ObjectPath, ObjectPath)> = staged
            .iter()
            .filter(|location| **location != staged_marker)
            .filter_map(|location| {
                let relative = location.prefix_match(staging)?;
                Some((location.clone(), relative.fold(target.clone(), |p, part| p.child(part))))
            })
            .collect();
        futures::stream::iter(copies)
            .map(|(from, to)| async move { self.store.copy(&from, &to).await })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .try_collect::<Vec<()>>()
            .await?;

        self.store.copy(&staged_marker, &marker).await?;
        self.delete_all(staged).await
    }

    async fn write_async(&self, table_name: &str, layout: &Layout) -> Result<()> {
        self.sweep_staging(table_name).await?;

        let staging = join(&self.prefix, [staging_name(table_name).as_str()])?;
        let target = self.table_prefix(table_name)?;
        let written = match self.upload(&staging, layout).await {
            Ok(()) => self.commit(&staging, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let leftovers = self.list(&staging).await.unwrap_or_default();
            if self.delete_all(leftovers).await.is_err() {
                log::warn!("Could not remove staging prefix: {staging}");
            }
            return Err(e);
        }
        Ok(())
    }
}

impl Sink for ObjectStoreSink {
    fn write(&self, table: &Table, table_name: &str, partition_by: &[&str]) -> Result<WriteReport> {
        let start = Instant::now();
        let target = PathBuf::from(format!("{}/{table_name}.parquet", self.url));
        log_operation_start("Writing table to", &target);

        let layout = plan_layout(table, partition_by, &self.config)?;
        self.runtime.block_on(self.write_async(table_name, &layout))?;

        log_operation_complete("wrote", &target, table.num_rows(), Some(start.elapsed()));
        Ok(WriteReport {
            path: target,
            rows: table.num_rows(),
            files: layout.parts.len(),
            partitions: layout.partitions,
        })
    }
}
