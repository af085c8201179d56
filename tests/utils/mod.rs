use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use i94_elt::config::{PipelineConfig, SinkConfig, SourcePaths};
use i94_elt::utils::read_parquet;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use serde_arrow::schema::{SchemaLike, TracingOptions};
use tempfile::TempDir;

/// One pre-parsed immigration record, as stored in the `sas_data` parquet files
#[derive(Debug, Clone, Serialize)]
pub struct ImmigrationRecord {
    pub cicid: f64,
    pub i94yr: f64,
    pub i94mon: f64,
    pub i94cit: f64,
    pub i94res: f64,
    pub i94port: String,
    pub arrdate: Option<f64>,
    pub i94mode: Option<f64>,
    pub i94addr: Option<String>,
    pub depdate: Option<f64>,
    pub i94bir: Option<f64>,
    pub i94visa: f64,
    pub count: f64,
    pub visapost: Option<String>,
    pub dtaddto: Option<String>,
    pub gender: Option<String>,
    pub insnum: Option<String>,
    pub airline: Option<String>,
    pub admnum: f64,
    pub fltno: Option<String>,
    pub visatype: String,
}

impl ImmigrationRecord {
    /// A typical April 2016 arrival
    #[must_use]
    pub fn sample(cicid: f64, state: Option<&str>) -> Self {
        Self {
            cicid,
            i94yr: 2016.0,
            i94mon: 4.0,
            i94cit: 209.0,
            i94res: 209.0,
            i94port: "HHW".to_string(),
            arrdate: Some(20566.0),
            i94mode: Some(1.0),
            i94addr: state.map(str::to_string),
            depdate: Some(20573.0),
            i94bir: Some(61.0),
            i94visa: 2.0,
            count: 1.0,
            visapost: Some("TKY".to_string()),
            dtaddto: Some("07202016".to_string()),
            gender: Some("F".to_string()),
            insnum: Some("3468".to_string()),
            airline: Some("JL".to_string()),
            admnum: 56_582_674_633.0,
            fltno: Some("00782".to_string()),
            visatype: "WT".to_string(),
        }
    }
}

/// Trace arrow fields from sample rows
pub fn trace_fields<T: Serialize>(rows: &[T]) -> anyhow::Result<Vec<FieldRef>> {
    Ok(Vec::<FieldRef>::from_samples(
        rows,
        TracingOptions::default().allow_null_fields(true),
    )?)
}

/// Build a record batch from serializable rows
pub fn to_batch<T: Serialize>(rows: &[T]) -> anyhow::Result<RecordBatch> {
    let fields = trace_fields(rows)?;
    Ok(serde_arrow::to_record_batch(&fields, &rows)?)
}

/// Write a batch as a single parquet file
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Write a delimited text file from a header and rows
pub fn write_csv(path: &Path, delimiter: char, header: &[&str], rows: &[Vec<&str>]) -> anyhow::Result<()> {
    let sep = delimiter.to_string();
    let mut text = header.join(&sep);
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(&sep));
        text.push('\n');
    }
    fs::write(path, text)?;
    Ok(())
}

pub const DEMOGRAPHICS_HEADER: [&str; 12] = [
    "City",
    "State",
    "Median Age",
    "Male Population",
    "Female Population",
    "Total Population",
    "Number of Veterans",
    "Foreign-born",
    "Average Household Size",
    "State Code",
    "Race",
    "Count",
];

pub const TEMPERATURE_HEADER: [&str; 7] = [
    "dt",
    "AverageTemperature",
    "AverageTemperatureUncertainty",
    "City",
    "Country",
    "Latitude",
    "Longitude",
];

/// A complete set of source files in a temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub config: PipelineConfig,
}

impl Fixture {
    /// Source files that pass every quality check
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        let sources = SourcePaths {
            countries: root.join("i94_countries.csv"),
            cities: root.join("i94_cities.csv"),
            states: root.join("i94_states.csv"),
            visas: root.join("i94_visas.csv"),
            demographics: root.join("us-cities-demographics.csv"),
            temperature: root.join("GlobalLandTemperaturesByCity.csv"),
            immigration: root.join("sas_data"),
        };

        write_csv(
            &sources.countries,
            ',',
            &["country_cd", "country_name"],
            &[
                vec!["209", "JAPAN"],
                vec!["582", "MEXICO Air Sea, and Not Reported (I-94, no land arrivals)"],
                vec!["209", "JAPAN"],
            ],
        )?;
        write_csv(
            &sources.cities,
            ',',
            &["city_cd", "city_name"],
            &[vec!["HHW", "HONOLULU, HI"], vec!["NYC", "NEW YORK, NY"]],
        )?;
        write_csv(
            &sources.states,
            ',',
            &["state_cd", "state_name"],
            &[vec!["HI", "HAWAII"], vec!["TX", "TEXAS"]],
        )?;
        write_csv(
            &sources.visas,
            ',',
            &["visa_cd", "visa_desc"],
            &[vec!["1", "Business"], vec!["2", "Pleasure"], vec!["3", "Student"]],
        )?;

        write_csv(
            &sources.demographics,
            ';',
            &DEMOGRAPHICS_HEADER,
            &[
                vec!["Austin", "Texas", "32.1", "470", "460", "930", "30", "140", "2.5", "TX", "White", "700"],
                vec!["Austin", "Texas", "32.1", "470", "460", "930", "30", "140", "2.5", "TX", "Asian", "80"],
                vec!["Honolulu", "Hawaii", "41.4", "176", "176", "352", "23", "101", "2.69", "HI", "Asian", "240"],
                vec!["Hilo", "Hawaii", "40.0", "20", "21", "41", "3", "5", "2.8", "HI", "White", "10"],
            ],
        )?;

        write_csv(
            &sources.temperature,
            ',',
            &TEMPERATURE_HEADER,
            &[
                vec!["2013-07-01", "30.0", "0.2", "Austin", "United States", "29.74N", "97.85W"],
                vec!["2013-08-01", "", "0.2", "Austin", "United States", "29.74N", "97.85W"],
                vec!["2013-01-01", "20.0", "0.2", "Austin", "United States", "29.74N", "97.85W"],
                vec!["2012-07-01", "40.0", "0.2", "Austin", "United States", "29.74N", "97.85W"],
                vec!["2013-07-01", "25.0", "0.3", "Honolulu", "United States", "21.70N", "158.09W"],
                vec!["2013-07-01", "10.0", "0.3", "Austin", "Canada", "49.03N", "122.50W"],
            ],
        )?;

        fs::create_dir_all(&sources.immigration)?;
        let records = vec![
            ImmigrationRecord::sample(1.0, Some("HI")),
            ImmigrationRecord::sample(1.0, Some("HI")),
            ImmigrationRecord::sample(2.0, Some("TX")),
            ImmigrationRecord {
                depdate: None,
                ..ImmigrationRecord::sample(3.0, None)
            },
        ];
        // Both files share one schema, traced from every record
        let fields = trace_fields(&records)?;
        write_parquet(
            &sources.immigration.join("part-00000.parquet"),
            &serde_arrow::to_record_batch(&fields, &&records[..2])?,
        )?;
        write_parquet(
            &sources.immigration.join("part-00001.parquet"),
            &serde_arrow::to_record_batch(&fields, &&records[2..])?,
        )?;

        let config = PipelineConfig {
            sources,
            output: i94_elt::config::OutputConfig {
                root: root.join("output").to_string_lossy().into_owned(),
            },
            sink: SinkConfig::default(),
            ..PipelineConfig::default()
        };

        Ok(Self { dir, config })
    }

    /// Dataset directory of an output table
    #[must_use]
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        Path::new(&self.config.output.root).join(format!("{table_name}.parquet"))
    }
}

/// All part files below a dataset directory, in path order
pub fn part_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(part_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "parquet") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Total rows stored in a dataset directory
pub fn dataset_rows(dir: &Path) -> anyhow::Result<usize> {
    let mut rows = 0;
    for file in part_files(dir)? {
        let (_, batches) = read_parquet(&file, 1024)?;
        rows += batches.iter().map(RecordBatch::num_rows).sum::<usize>();
    }
    Ok(rows)
}

/// Sorted names of the entries directly inside a directory
pub fn entry_names(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|e| Ok(e?.file_name().to_string_lossy().into_owned()))
        .collect::<anyhow::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}
