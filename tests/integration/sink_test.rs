use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use i94_elt::config::{CompressionCodec, SinkConfig, StorageCredentials};
use i94_elt::sink::open;
use i94_elt::{ObjectStoreSink, ParquetSink, PipelineError, Sink, Table};
use object_store::ObjectStore;
use object_store::memory::InMemory;

use crate::utils::{dataset_rows, entry_names};

fn ports() -> anyhow::Result<Table> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("country", DataType::Utf8, true),
        Field::new("state_cd", DataType::Utf8, true),
        Field::new("visits", DataType::Int64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["US", "US", "US", "CA"])),
            Arc::new(StringArray::from(vec![Some("TX"), Some("N/A"), Some("TX"), None])),
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
        ],
    )?;
    Ok(Table::new("ports", batch))
}

/// Partition columns nest in order and values are escaped
#[test]
fn test_nested_escaped_partitions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = open(dir.path().to_str().unwrap(), None, SinkConfig::default())?;

    let report = sink.write(&ports()?, "ports", &["country", "state_cd"])?;
    assert_eq!(report.rows, 4);
    assert_eq!(report.partitions, 3);

    assert_eq!(
        entry_names(&report.path)?,
        vec!["_SUCCESS", "country=CA", "country=US"]
    );
    assert_eq!(
        entry_names(&report.path.join("country=US"))?,
        vec!["state_cd=N%2FA", "state_cd=TX"]
    );
    assert_eq!(
        entry_names(&report.path.join("country=CA"))?,
        vec!["state_cd=__HIVE_DEFAULT_PARTITION__"]
    );
    assert_eq!(dataset_rows(&report.path)?, 4);
    Ok(())
}

#[test]
fn test_zstd_part_names() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = SinkConfig {
        compression: CompressionCodec::Zstd,
        max_rows_per_file: 3,
    };
    let sink = ParquetSink::new(dir.path().to_str().unwrap(), config)?;

    let report = sink.write(&ports()?, "ports", &[])?;
    assert_eq!(report.files, 2);
    assert_eq!(
        entry_names(&report.path)?,
        vec!["_SUCCESS", "part-00000.zstd.parquet", "part-00001.zstd.parquet"]
    );
    Ok(())
}

/// S3 roots open an object-store sink; other schemes have no backend
#[test]
fn test_url_roots_select_backend() {
    let credentials = StorageCredentials {
        access_key_id: "id".to_string(),
        secret_access_key: "secret".to_string(),
        region: None,
    };
    for root in ["s3a://bucket/output", "s3://bucket"] {
        assert!(open(root, Some(&credentials), SinkConfig::default()).is_ok(), "{root}");
    }
    for root in ["gs://bucket/x", "file:///tmp/x"] {
        let err = open(root, Some(&credentials), SinkConfig::default()).err();
        assert!(matches!(err, Some(PipelineError::UnsupportedStorage(_))), "{root}");
    }
}

/// The object-store backend lays datasets out exactly like the local one
#[test]
fn test_object_store_matches_local_layout() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let local = ParquetSink::new(dir.path().to_str().unwrap(), SinkConfig::default())?;
    let local_report = local.write(&ports()?, "ports", &["country", "state_cd"])?;

    let store = Arc::new(InMemory::new());
    let remote = ObjectStoreSink::new(store.clone(), "s3a://bucket/out", SinkConfig::default())?;
    let remote_report = remote.write(&ports()?, "ports", &["country", "state_cd"])?;
    assert_eq!(remote_report.rows, local_report.rows);
    assert_eq!(remote_report.files, local_report.files);
    assert_eq!(remote_report.partitions, local_report.partitions);

    let mut keys: Vec<String> = futures::executor::block_on(
        store
            .list(None)
            .map_ok(|meta| meta.location.to_string())
            .try_collect::<Vec<_>>(),
    )?;
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "out/ports.parquet/_SUCCESS",
            "out/ports.parquet/country=CA/state_cd=__HIVE_DEFAULT_PARTITION__/part-00000.snappy.parquet",
            "out/ports.parquet/country=US/state_cd=N%2FA/part-00000.snappy.parquet",
            "out/ports.parquet/country=US/state_cd=TX/part-00000.snappy.parquet",
        ]
    );
    assert!(local_report.path.join("country=US").join("state_cd=N%2FA").is_dir());
    Ok(())
}
