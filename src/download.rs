use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8Path;
use flate2::read::GzDecoder;
use tar::Archive;

use crate::domain::FileId;
use crate::error::ValidatorError;
use crate::gdc::{GdcClient, manifest_body};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAR_MAGIC_OFFSET: u64 = 257;
const TAR_MAGIC: &[u8; 5] = b"ustar";

/// Moves a bundle of GDC files described by a manifest onto local disk.
pub trait BundleTransfer {
    fn fetch(
        &self,
        ids: &[FileId],
        manifest_path: &Path,
        archive_path: &Path,
    ) -> Result<(), ValidatorError>;
}

/// POSTs the manifest to `/data` through the shared GDC client.
pub struct HttpTransfer<'a, C: GdcClient> {
    client: &'a C,
}

impl<'a, C: GdcClient> HttpTransfer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

impl<C: GdcClient> BundleTransfer for HttpTransfer<'_, C> {
    fn fetch(
        &self,
        ids: &[FileId],
        _manifest_path: &Path,
        archive_path: &Path,
    ) -> Result<(), ValidatorError> {
        self.client.download_data(ids, archive_path)
    }
}

/// Shells out to `curl`, posting the manifest file as the request body.
#[derive(Clone)]
pub struct CurlTransfer {
    curl: Option<PathBuf>,
    data_url: String,
}

impl CurlTransfer {
    pub fn new(api_base: &str) -> Self {
        Self {
            curl: find_in_path("curl"),
            data_url: format!("{}/data", api_base.trim_end_matches('/')),
        }
    }
}

impl BundleTransfer for CurlTransfer {
    fn fetch(
        &self,
        _ids: &[FileId],
        manifest_path: &Path,
        archive_path: &Path,
    ) -> Result<(), ValidatorError> {
        let curl = self
            .curl
            .as_ref()
            .ok_or_else(|| ValidatorError::MissingTool("curl".to_string()))?;
        let args = vec![
            "--silent".to_string(),
            "--show-error".to_string(),
            "--fail".to_string(),
            "-o".to_string(),
            archive_path.to_string_lossy().to_string(),
            "--request".to_string(),
            "POST".to_string(),
            "--header".to_string(),
            "Content-Type: application/json".to_string(),
            "--data".to_string(),
            format!("@{}", manifest_path.to_string_lossy()),
            self.data_url.clone(),
        ];
        let output = Command::new(curl)
            .args(&args)
            .output()
            .map_err(|err| ValidatorError::Transfer(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", curl.display())
        } else {
            stderr
        };
        Err(ValidatorError::Transfer(message))
    }
}

pub struct BundleDownloader<'a> {
    transfer: &'a dyn BundleTransfer,
    download_dir: &'a Utf8Path,
    manifest_path: &'a Utf8Path,
}

impl<'a> BundleDownloader<'a> {
    pub fn new(
        transfer: &'a dyn BundleTransfer,
        download_dir: &'a Utf8Path,
        manifest_path: &'a Utf8Path,
    ) -> Self {
        Self {
            transfer,
            download_dir,
            manifest_path,
        }
    }

    /// Writes the manifest, fetches the bundle and unpacks it so that each
    /// file lands under `<download_dir>/<file id>/`.
    pub fn download(&self, ids: &[FileId]) -> Result<(), ValidatorError> {
        if ids.is_empty() {
            return Err(ValidatorError::Bundle("no file ids to download".to_string()));
        }
        write_manifest(self.manifest_path.as_std_path(), ids)?;
        fs::create_dir_all(self.download_dir.as_std_path())
            .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;

        let archive = tempfile::Builder::new()
            .prefix("gdc_download")
            .suffix(".bundle")
            .tempfile()
            .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;

        tracing::info!(files = ids.len(), "downloading GDC bundle");
        let start = std::time::Instant::now();
        self.transfer
            .fetch(ids, self.manifest_path.as_std_path(), archive.path())?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "bundle downloaded"
        );

        extract_bundle(archive.path(), self.download_dir.as_std_path(), ids)
    }
}

pub fn write_manifest(path: &Path, ids: &[FileId]) -> Result<(), ValidatorError> {
    let bytes = serde_json::to_vec(&manifest_body(ids))
        .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
        }
    }
    fs::write(path, bytes).map_err(|err| ValidatorError::Filesystem(err.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BundleFormat {
    GzipTar,
    Tar,
    Raw,
}

fn sniff_format(file: &mut File) -> Result<BundleFormat, ValidatorError> {
    let mut magic = [0u8; 2];
    let read = file
        .read(&mut magic)
        .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
    if read == 2 && magic == GZIP_MAGIC {
        file.seek(SeekFrom::Start(0))
            .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
        return Ok(BundleFormat::GzipTar);
    }

    let mut tar_magic = [0u8; 5];
    let is_tar = file.seek(SeekFrom::Start(TAR_MAGIC_OFFSET)).is_ok()
        && file.read_exact(&mut tar_magic).is_ok()
        && &tar_magic == TAR_MAGIC;
    file.seek(SeekFrom::Start(0))
        .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
    Ok(if is_tar {
        BundleFormat::Tar
    } else {
        BundleFormat::Raw
    })
}

/// Unpacks a downloaded bundle. The GDC answers a multi-file request with a
/// gzipped tarball and a single-file request with the file itself.
pub fn extract_bundle(
    archive_path: &Path,
    target_dir: &Path,
    ids: &[FileId],
) -> Result<(), ValidatorError> {
    fs::create_dir_all(target_dir).map_err(|err| {
        ValidatorError::Filesystem(format!("create {}: {err}", target_dir.display()))
    })?;
    let mut file = File::open(archive_path).map_err(|err| {
        ValidatorError::Filesystem(format!("open bundle {}: {err}", archive_path.display()))
    })?;
    match sniff_format(&mut file)? {
        BundleFormat::GzipTar => unpack(Archive::new(GzDecoder::new(BufReader::new(file))), target_dir),
        BundleFormat::Tar => unpack(Archive::new(BufReader::new(file)), target_dir),
        BundleFormat::Raw => {
            let [id] = ids else {
                return Err(ValidatorError::Bundle(
                    "bundle is neither a tarball nor a single file".to_string(),
                ));
            };
            let dir = target_dir.join(id.as_str());
            fs::create_dir_all(&dir).map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
            let mut out = File::create(dir.join(id.as_str()))
                .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
            io::copy(&mut file, &mut out)
                .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
            Ok(())
        }
    }
}

fn unpack<R: Read>(mut archive: Archive<R>, target_dir: &Path) -> Result<(), ValidatorError> {
    let entries = archive
        .entries()
        .map_err(|err| ValidatorError::Bundle(err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| ValidatorError::Bundle(err.to_string()))?;
        let unpacked = entry
            .unpack_in(target_dir)
            .map_err(|err| ValidatorError::Bundle(err.to_string()))?;
        if !unpacked {
            return Err(ValidatorError::Bundle(
                "tar entry path traversal detected".to_string(),
            ));
        }
    }
    Ok(())
}

/// First regular file (by name) inside `<download_dir>/<id>/`.
pub fn locate_file(download_dir: &Path, id: &FileId) -> Result<PathBuf, ValidatorError> {
    let dir = download_dir.join(id.as_str());
    let entries = fs::read_dir(&dir).map_err(|err| {
        ValidatorError::Bundle(format!("missing bundle directory {}: {err}", dir.display()))
    })?;
    let mut files = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();
    files
        .into_iter()
        .next()
        .ok_or_else(|| ValidatorError::Bundle(format!("no file for {id} in {}", dir.display())))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
