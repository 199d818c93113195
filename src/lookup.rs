use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::domain::FileId;
use crate::download::{BundleDownloader, BundleTransfer};
use crate::error::ValidatorError;
use crate::gdc::{Endpoint, GdcClient, SearchQuery};

const SAMPLE_FIELD: &str = "samples.submitter_id";
const FILE_NAME_FIELD: &str = "file_name";

/// A GDC data file together with the matrix sample it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleFile {
    pub sample: String,
    pub file_id: FileId,
    pub file_name: String,
}

/// Names of the files of the given samples' cases whose name contains
/// `marker`, in first-seen order.
pub fn find_file_names<C: GdcClient>(
    client: &C,
    config: &ResolvedConfig,
    samples: &[String],
    marker: &str,
) -> Result<Vec<String>, ValidatorError> {
    let query = SearchQuery::new(SAMPLE_FIELD, samples.to_vec())
        .fields(["files.file_name"])
        .size(config.page_sizes.cases);
    let hits = client.search(Endpoint::Cases, &query)?;

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for hit in &hits {
        let Some(files) = hit.get("files").and_then(Value::as_array) else {
            continue;
        };
        for name in files
            .iter()
            .filter_map(|file| file.get(FILE_NAME_FIELD).and_then(Value::as_str))
        {
            if name.contains(marker) && seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }
    }
    tracing::debug!(marker, files = names.len(), "matching file names");
    Ok(names)
}

/// Resolves file names to file ids and pairs each file with the first of
/// its samples present in `samples`. One file per sample is kept.
pub fn resolve_sample_files<C: GdcClient>(
    client: &C,
    config: &ResolvedConfig,
    file_names: &[String],
    samples: &[String],
) -> Result<Vec<SampleFile>, ValidatorError> {
    if file_names.is_empty() {
        return Ok(Vec::new());
    }
    let query = SearchQuery::new(FILE_NAME_FIELD, file_names.to_vec())
        .fields(["file_id", "file_name", "cases.samples.submitter_id"])
        .size(config.page_sizes.files.max(file_names.len()));
    let hits = client.search(Endpoint::Files, &query)?;

    let wanted = samples.iter().map(String::as_str).collect::<HashSet<_>>();
    let mut claimed = HashSet::new();
    let mut files = Vec::new();
    for hit in &hits {
        let Some(raw_id) = hit.get("file_id").and_then(Value::as_str) else {
            continue;
        };
        let file_id = raw_id.parse::<FileId>()?;
        let file_name = hit
            .get(FILE_NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let sample = file_samples(hit)
            .into_iter()
            .find(|sample| wanted.contains(sample.as_str()));
        match sample {
            Some(sample) if claimed.insert(sample.clone()) => files.push(SampleFile {
                sample,
                file_id,
                file_name,
            }),
            Some(sample) => {
                tracing::debug!(sample = %sample, file = %file_id, "sample already has a file");
            }
            None => tracing::debug!(file = %file_id, "file belongs to no matrix sample"),
        }
    }
    Ok(files)
}

/// Downloads every resolved file in one bundle.
pub fn download_sample_files(
    transfer: &dyn BundleTransfer,
    config: &ResolvedConfig,
    files: &[SampleFile],
) -> Result<(), ValidatorError> {
    let mut ids = files
        .iter()
        .map(|file| file.file_id.clone())
        .collect::<Vec<FileId>>();
    ids.sort();
    ids.dedup();
    BundleDownloader::new(transfer, &config.download_dir, &config.manifest_file).download(&ids)
}

fn file_samples(hit: &Value) -> Vec<String> {
    hit.get("cases")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|case| case.get("samples").and_then(Value::as_array))
        .flatten()
        .filter_map(|sample| sample.get("submitter_id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}
