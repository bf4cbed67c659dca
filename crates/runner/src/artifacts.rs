//! Result files written to the output directory

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{RunError, RunResult};
use crate::reporter::{Column, Reporter};
use crate::results::ResultModel;

/// Stem shared by every result file of a run.
pub const TEST_RESULT_FILE_PREFIX: &str = "lightning-test-result";

const REPORT_COLUMNS: [Column; 2] = [Column::new("format", "Format"), Column::new("file", "File")];

/// Create the output directory. An existing directory is fine.
pub async fn prepare_output_dir(dir: &Path) -> RunResult<()> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(source) => Err(RunError::OutputDirectory {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

pub fn junit_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}-junit.xml", TEST_RESULT_FILE_PREFIX))
}

pub fn json_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}.json", TEST_RESULT_FILE_PREFIX))
}

/// Write the JUnit and JSON files for `model`, then list them through the
/// reporter. Returns the `[format, file]` rows.
pub async fn write_artifacts(
    dir: &Path,
    model: &ResultModel,
    reporter: &mut dyn Reporter,
) -> RunResult<Vec<Vec<String>>> {
    let junit = junit_path(dir);
    write(&junit, model.generate_junit()).await?;

    let json = json_path(dir);
    write(&json, model.to_json_string()?).await?;

    let rows = vec![
        vec!["JUnit".to_string(), junit.display().to_string()],
        vec!["JSON".to_string(), json.display().to_string()],
    ];
    reporter.log_table("Test Reports", &rows, &REPORT_COLUMNS);
    Ok(rows)
}

async fn write(path: &Path, contents: String) -> RunResult<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| RunError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Results written to: {}", path.display());
    Ok(())
}
