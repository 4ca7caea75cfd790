//! Management of installed `solc` compiler binaries.
//!
//! Releases are fetched from [binaries.soliditylang.org](https://binaries.soliditylang.org).
//! Every download is verified against both the SHA-256 and the Keccak-256 digest published in
//! the release list before it is moved into the local compiler cache, which lives under
//! `~/.solbuild/compilers` (falling back to the platform data dir).

use crate::{
    error::{Result, SolcError},
    version::Version,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tiny_keccak::{Hasher, Keccak};
use tokio::io::AsyncWriteExt;

/// The base URL all release lists and binaries are served from.
pub const BINARIES_URL: &str = "https://binaries.soliditylang.org";

/// The file name the release list is cached under.
const CATALOG_FILE: &str = "solc.json";

fn platform() -> Result<&'static str> {
    #[cfg(target_os = "linux")]
    return Ok("linux-amd64");
    #[cfg(target_os = "macos")]
    return Ok("macosx-amd64");
    #[cfg(target_os = "windows")]
    return Ok("windows-amd64");
    #[allow(unreachable_code)]
    Err(SolcError::msg("no solc binaries are published for this platform"))
}

/// Descriptor of a single released compiler binary, as listed in the platform's `list.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolcBuild {
    pub path: String,
    pub version: Version,
    pub build: String,
    pub long_version: Version,
    pub keccak256: String,
    pub sha256: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// The platform release list: all known builds plus the canonical release file per version.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolcBuilds {
    pub builds: Vec<SolcBuild>,
    pub releases: BTreeMap<Version, String>,
    pub latest_release: String,
}

impl SolcBuilds {
    /// The lowest version released for this platform.
    pub fn minimal_version(&self) -> Option<&Version> {
        self.releases.keys().next()
    }

    /// The canonical build descriptor for an exact version.
    pub fn build_for(&self, version: &Version) -> Option<&SolcBuild> {
        let filename = self.releases.get(version)?;
        self.builds.iter().find(|b| &b.path == filename)
    }
}

/// Installs, removes and locates `solc` compiler binaries.
#[derive(Debug)]
pub struct SolcVersionManager {
    platform: &'static str,
    compilers_dir: PathBuf,
    list_url: String,
    client: reqwest::Client,
    builds: tokio::sync::OnceCell<SolcBuilds>,
    /// serializes installs so concurrent requests for one version download only once
    install_lock: tokio::sync::Mutex<()>,
}

impl SolcVersionManager {
    /// Creates a manager rooted at the default compiler cache directory.
    pub fn new() -> Result<Self> {
        let home = home::home_dir()
            .map(|dir| dir.join(".solbuild"))
            .or_else(|| dirs::data_dir().map(|dir| dir.join("solbuild")))
            .ok_or_else(|| SolcError::msg("could not detect a home directory"))?;
        Self::with_dir(home.join("compilers"))
    }

    /// Creates a manager rooted at the given directory.
    pub fn with_dir(compilers_dir: impl Into<PathBuf>) -> Result<Self> {
        let platform = platform()?;
        let compilers_dir = compilers_dir.into();
        fs::create_dir_all(&compilers_dir)
            .map_err(|err| SolcError::io(err, &compilers_dir))?;
        Ok(Self {
            platform,
            list_url: format!("{BINARIES_URL}/{platform}/list.json"),
            compilers_dir,
            client: reqwest::Client::new(),
            builds: tokio::sync::OnceCell::new(),
            install_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// The directory all compiler versions are installed under.
    pub fn compilers_dir(&self) -> &Path {
        &self.compilers_dir
    }

    /// Returns the release list, fetching it on first use.
    ///
    /// On network failure the previously cached copy is used; only when neither is available
    /// the catalog counts as unavailable.
    pub async fn builds(&self) -> Result<&SolcBuilds> {
        self.builds
            .get_or_try_init(|| async {
                let cache_path = self.compilers_dir.join(CATALOG_FILE);
                let fetched = self
                    .client
                    .get(&self.list_url)
                    .timeout(Duration::from_secs(5))
                    .send()
                    .await;
                match fetched {
                    Ok(response) => match response.error_for_status() {
                        Ok(response) => {
                            let bytes = response.bytes().await?;
                            let builds: SolcBuilds = serde_json::from_slice(&bytes)?;
                            if let Err(err) = fs::write(&cache_path, &bytes) {
                                debug!("failed to cache solc release list: {err}");
                            }
                            Ok(builds)
                        }
                        Err(err) => self.cached_builds(&cache_path, err.into()),
                    },
                    Err(err) => self.cached_builds(&cache_path, err.into()),
                }
            })
            .await
    }

    fn cached_builds(&self, cache_path: &Path, err: SolcError) -> Result<SolcBuilds> {
        warn!("failed to fetch solc release list, using the cached copy: {err}");
        if cache_path.is_file() {
            crate::utils::read_json_file(cache_path)
                .map_err(|_| SolcError::CompilerCatalogUnavailable(self.list_url.clone()))
        } else {
            Err(SolcError::CompilerCatalogUnavailable(self.list_url.clone()))
        }
    }

    /// All versions released for this platform, ascending.
    pub async fn list_all(&self) -> Result<Vec<Version>> {
        Ok(self.builds().await?.releases.keys().cloned().collect())
    }

    /// All versions currently installed, ascending.
    pub fn installed(&self) -> Vec<Version> {
        let Ok(entries) = fs::read_dir(&self.compilers_dir) else { return Vec::new() };
        let mut versions: Vec<Version> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                // directories are named after the release file, e.g.
                // `solc-linux-amd64-v0.8.13+commit.abee5f2e`
                name.split_once("-v").and_then(|(_, version)| version.parse().ok())
            })
            .collect();
        versions.sort();
        versions.dedup();
        versions
    }

    /// Locates an installed binary without consulting the release list, for offline use.
    pub fn installed_path(&self, version: &Version) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.compilers_dir).ok()?;
        for entry in entries.filter_map(std::result::Result::ok) {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let installed = name.split_once("-v").and_then(|(_, v)| v.parse::<Version>().ok());
            if installed.as_ref() == Some(version) {
                #[cfg(windows)]
                let candidate = dir.join(format!("{name}.exe"));
                #[cfg(not(windows))]
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// The path the given version's binary lives at when installed.
    pub async fn version_path(&self, version: &Version) -> Result<PathBuf> {
        let builds = self.builds().await?;
        self.check_supported(builds, version)?;
        let filename = builds
            .releases
            .get(version)
            .ok_or_else(|| SolcError::UnknownCompilerVersion(version.clone()))?;
        Ok(self.binary_path(filename))
    }

    fn binary_path(&self, filename: &str) -> PathBuf {
        let dirname = filename.trim_end_matches(".exe").trim_end_matches(".zip");
        let mut filename = filename.to_string();
        // zipped Windows releases unpack into a plain exe
        if let Some(stripped) = filename.strip_suffix(".zip") {
            filename = format!("{stripped}.exe");
        }
        self.compilers_dir.join(dirname).join(filename)
    }

    fn check_supported(&self, builds: &SolcBuilds, version: &Version) -> Result<()> {
        if let Some(minimum) = builds.minimal_version() {
            if version < minimum {
                return Err(SolcError::UnsupportedCompilerVersion {
                    requested: version.clone(),
                    minimum: minimum.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns the path of the given version, installing it first if necessary.
    pub async fn ensure_installed(&self, version: &Version) -> Result<PathBuf> {
        let path = self.version_path(version).await?;
        if path.is_file() {
            return Ok(path);
        }
        self.install(version).await
    }

    /// Downloads, verifies and installs the given compiler version.
    ///
    /// The binary is staged next to its final location and only moved into place after both
    /// digests check out, so a failed install never leaves a usable-looking binary behind.
    pub async fn install(&self, version: &Version) -> Result<PathBuf> {
        let _guard = self.install_lock.lock().await;

        let builds = self.builds().await?;
        self.check_supported(builds, version)?;
        let build = builds
            .build_for(version)
            .ok_or_else(|| SolcError::UnknownCompilerVersion(version.clone()))?;

        let final_path = self.binary_path(&build.path);
        if final_path.is_file() {
            // another task finished the install while we waited for the lock
            return Ok(final_path);
        }

        let url = format!("{BINARIES_URL}/{}/{}", self.platform, build.path);
        let download_path = final_path
            .parent()
            .expect("binary path has a parent")
            .join(format!("{}.tmp", build.path));
        crate::utils::create_parent_dir_all(&download_path)?;

        debug!("downloading solc {version} from {url}");
        self.download_file(&url, &download_path).await?;

        self.verify_checksums(&download_path, build)?;

        #[cfg(windows)]
        let download_path = unzip_release(&download_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&download_path, fs::Permissions::from_mode(0o755))
                .map_err(|err| SolcError::io(err, &download_path))?;
        }

        fs::rename(&download_path, &final_path)
            .map_err(|err| SolcError::io(err, &final_path))?;
        debug!("installed solc {version} to \"{}\"", final_path.display());
        Ok(final_path)
    }

    /// Removes an installed version.
    pub async fn remove(&self, version: &Version) -> Result<()> {
        let path = self.version_path(version).await?;
        let dir = path.parent().expect("binary path has a parent");
        if !dir.is_dir() {
            return Err(SolcError::msg(format!(
                "solc version `{version}` is not installed, cannot remove"
            )));
        }
        fs::remove_dir_all(dir).map_err(|err| SolcError::io(err, dir))?;
        Ok(())
    }

    async fn download_file(&self, url: &str, path: &Path) -> Result<()> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let total = response.content_length();
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|err| SolcError::io(err, path))?;

        let mut downloaded = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(|err| SolcError::io(err, path))?;
            downloaded += chunk.len() as u64;
            if let Some(total) = total {
                trace!("downloaded {downloaded}/{total} bytes");
            }
        }
        file.flush().await.map_err(|err| SolcError::io(err, path))?;
        Ok(())
    }

    /// Verifies the downloaded file against the SHA-256 and Keccak-256 digests published in
    /// the release list. On mismatch the file is deleted so the next install starts fresh.
    fn verify_checksums(&self, path: &Path, build: &SolcBuild) -> Result<()> {
        let content = fs::read(path).map_err(|err| SolcError::io(err, path))?;

        let expected_sha256 = build.sha256.trim_start_matches("0x").to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(&content);
        let found_sha256 = hex::encode(hasher.finalize());

        if found_sha256 != expected_sha256 {
            let _ = fs::remove_file(path);
            return Err(SolcError::ChecksumMismatch {
                version: build.version.clone(),
                expected: expected_sha256,
                detected: found_sha256,
                file: path.to_path_buf(),
            });
        }

        let expected_keccak = build.keccak256.trim_start_matches("0x").to_lowercase();
        let mut keccak = Keccak::v256();
        keccak.update(&content);
        let mut found = [0u8; 32];
        keccak.finalize(&mut found);
        let found_keccak = hex::encode(found);

        if found_keccak != expected_keccak {
            let _ = fs::remove_file(path);
            return Err(SolcError::ChecksumMismatch {
                version: build.version.clone(),
                expected: expected_keccak,
                detected: found_keccak,
                file: path.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// Unpacks a zipped Windows release: `solc.exe` is renamed to the long release name, DLLs are
/// extracted next to it and `soltest.exe` is skipped. The zip file itself is removed.
#[cfg(windows)]
fn unzip_release(zip_path: &Path) -> Result<PathBuf> {
    let base = zip_path.parent().expect("zip path has a parent");
    let file = fs::File::open(zip_path).map_err(|err| SolcError::io(err, zip_path))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| SolcError::msg(err.to_string()))?;

    let stem = zip_path
        .file_name()
        .and_then(|n| n.to_str())
        .expect("zip file name is valid utf-8")
        .trim_end_matches(".tmp")
        .trim_end_matches(".zip");
    let solc_path = base.join(format!("{stem}.exe.tmp"));

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|err| SolcError::msg(err.to_string()))?;
        let name = entry.name().to_string();
        if name == "soltest.exe" {
            continue;
        }
        let out_path =
            if name == "solc.exe" { solc_path.clone() } else { base.join(&name) };
        let mut out = fs::File::create(&out_path).map_err(|err| SolcError::io(err, &out_path))?;
        std::io::copy(&mut entry, &mut out).map_err(|err| SolcError::io(err, &out_path))?;
    }
    fs::remove_file(zip_path).map_err(|err| SolcError::io(err, zip_path))?;
    Ok(solc_path)
}
