use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::cluster::ClusterSpan;
use super::error::DatasetWriterError;
use super::process::FileReport;

const REPORT_SUFFIX: &str = "_report.yml";
const CLUSTERS_SUFFIX: &str = "_clusters.yml";

/// The files written for one log
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFiles {
    pub dataset: PathBuf,
    pub report: PathBuf,
    pub clusters: PathBuf,
}

/// Writes finished FileReports into an output directory.
///
/// For a log `device.log` the writer creates
///
/// ```text
/// device.csv           - one row per merged record
/// device_report.yml    - the run statistics
/// device_clusters.yml  - start, end and record count of every cluster, by parameter
/// ```
#[derive(Debug)]
pub struct DatasetWriter {
    output_dir: PathBuf,
}

impl DatasetWriter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Work out the output paths for a given log file
    pub fn output_paths(&self, log_path: &Path) -> Result<WrittenFiles, DatasetWriterError> {
        let stem = log_path
            .file_stem()
            .ok_or_else(|| DatasetWriterError::BadFileName(log_path.to_path_buf()))?
            .to_string_lossy();
        Ok(WrittenFiles {
            dataset: self.output_dir.join(format!("{stem}.csv")),
            report: self.output_dir.join(format!("{stem}{REPORT_SUFFIX}")),
            clusters: self.output_dir.join(format!("{stem}{CLUSTERS_SUFFIX}")),
        })
    }

    pub fn write(&self, report: &FileReport) -> Result<WrittenFiles, DatasetWriterError> {
        let paths = self.output_paths(&report.path)?;

        let mut csv_writer = csv::Writer::from_path(&paths.dataset)?;
        for row in report.dataset.iter().map(|r| r.to_row()) {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;

        let mut report_file = File::create(&paths.report)?;
        report_file.write_all(serde_yaml::to_string(&report.stats)?.as_bytes())?;

        let spans: BTreeMap<&str, Vec<ClusterSpan>> = report
            .clusters
            .iter()
            .map(|p| {
                (
                    p.canonical_name.as_str(),
                    p.clusters.iter().map(|c| c.summary()).collect(),
                )
            })
            .collect();
        let mut clusters_file = File::create(&paths.clusters)?;
        clusters_file.write_all(serde_yaml::to_string(&spans)?.as_bytes())?;

        spdlog::info!(
            "Wrote {} rows to {}",
            report.dataset.len(),
            paths.dataset.display()
        );
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::cluster::{cluster_by_parameter, AdaptiveGapPolicy};
    use crate::parameter::ParameterDefinition;
    use crate::record::CanonicalRecord;
    use crate::statistics::RunStatistics;
    use std::sync::Arc;
    use time::macros::datetime;

    fn report() -> FileReport {
        let def = Arc::new(ParameterDefinition::new(
            "Magnetron Flow",
            "L/min",
            Category::Cooling,
            vec![String::from("magnetronFlow")],
            None,
        ));
        let dataset: Vec<CanonicalRecord> = [
            datetime!(2024-03-01 12:00:05),
            datetime!(2024-03-01 12:01:05),
        ]
        .into_iter()
        .map(|timestamp| CanonicalRecord {
            parameter: def.clone(),
            timestamp,
            count: 15,
            min: 1.0,
            max: 2.0,
            average: 1.5,
            sources: vec![String::from("magnetronFlow")],
        })
        .collect();
        let clusters = cluster_by_parameter(&dataset, &AdaptiveGapPolicy::default()).unwrap();
        let mut stats = RunStatistics::new(0);
        stats.valid_records = 2;
        FileReport {
            path: PathBuf::from("/var/log/linac/device.log"),
            dataset,
            clusters,
            stats,
        }
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path());
        let paths = writer.write(&report()).unwrap();
        assert_eq!(paths.dataset, dir.path().join("device.csv"));

        let csv_text = std::fs::read_to_string(&paths.dataset).unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next(),
            Some("canonical_name,unit,category,timestamp,count,min,max,average,quality,sources")
        );
        assert_eq!(
            lines.next(),
            Some("Magnetron Flow,L/min,cooling,2024-03-01 12:00:05,15,1.0,2.0,1.5,fair,magnetronFlow")
        );
        assert_eq!(lines.count(), 1);

        let report_text = std::fs::read_to_string(&paths.report).unwrap();
        assert!(report_text.contains("valid_records: 2"));

        let clusters_text = std::fs::read_to_string(&paths.clusters).unwrap();
        assert!(clusters_text.contains("Magnetron Flow:"));
        assert!(clusters_text.contains("2024-03-01 12:01:05"));
        assert!(clusters_text.contains("count: 2"));
    }

    #[test]
    fn test_bad_file_name() {
        let writer = DatasetWriter::new(Path::new("/tmp"));
        assert!(matches!(
            writer.output_paths(Path::new("/")),
            Err(DatasetWriterError::BadFileName(_))
        ));
    }
}
