#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;

use xena_gdc_validator::config::ResolvedConfig;
use xena_gdc_validator::domain::FileId;
use xena_gdc_validator::error::ValidatorError;
use xena_gdc_validator::gdc::{Endpoint, GdcClient};

/// Canned GDC answers keyed on endpoint and filter field. When several
/// answers share a key they are handed out in order, the last one repeating.
#[derive(Default)]
pub struct MockGdc {
    responses: Mutex<Vec<(Endpoint, String, Value)>>,
    bundle: Vec<(String, Vec<u8>)>,
    pub requests: Mutex<Vec<(Endpoint, Value)>>,
    pub downloads: Mutex<Vec<Vec<FileId>>>,
}

impl MockGdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, endpoint: Endpoint, field: &str, response: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((endpoint, field.to_string(), response));
        self
    }

    pub fn respond_fixture(self, endpoint: Endpoint, field: &str, name: &str) -> Self {
        self.respond(endpoint, field, fixture_json(name))
    }

    /// Adds a file to the tarball `download_data` serves.
    pub fn with_bundle_file(mut self, path: &str, contents: &str) -> Self {
        self.bundle.push((path.to_string(), contents.as_bytes().to_vec()));
        self
    }

    pub fn requests_to(&self, endpoint: Endpoint) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == endpoint)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

impl GdcClient for MockGdc {
    fn post_json(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ValidatorError> {
        self.requests.lock().unwrap().push((endpoint, body.clone()));
        let field = body["filters"]["content"]["field"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let mut responses = self.responses.lock().unwrap();
        let matching = responses
            .iter()
            .enumerate()
            .filter(|(_, (target, key, _))| *target == endpoint && *key == field)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        match matching.as_slice() {
            [] => Err(ValidatorError::GdcStatus {
                status: 404,
                message: format!("no mock response for {} {field}", endpoint.path()),
            }),
            [only] => Ok(responses[*only].2.clone()),
            [first, ..] => Ok(responses.remove(*first).2),
        }
    }

    fn download_data(&self, ids: &[FileId], destination: &Path) -> Result<(), ValidatorError> {
        self.downloads.lock().unwrap().push(ids.to_vec());
        write_tar_gz(destination, &self.bundle);
        Ok(())
    }
}

pub fn write_tar_gz(destination: &Path, files: &[(String, Vec<u8>)]) {
    let file = File::create(destination).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_slice())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture_json(name: &str) -> Value {
    let content = fs::read_to_string(fixture_path(name)).unwrap();
    serde_json::from_str(&content).unwrap()
}

pub fn write_matrix(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Defaults with downloads and the manifest kept inside `dir`.
pub fn test_config(dir: &Path) -> ResolvedConfig {
    let root = Utf8PathBuf::from_path_buf(dir.to_path_buf()).unwrap();
    ResolvedConfig {
        download_dir: root.join("gdc_download"),
        manifest_file: root.join("request.txt"),
        max_retries: 0,
        ..ResolvedConfig::default()
    }
}
