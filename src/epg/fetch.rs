//! Source downloader
//!
//! Fetches the XMLTV files named in the source registry into a local
//! directory. Each source succeeds or fails on its own.

use crate::config::{CompressionHint, SourceEntry, SourceRegistry};
use crate::epg::parser::GZIP_MAGIC;
use crate::error::FetchError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Download configuration
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum attempts per source
    pub max_retries: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds
    pub read_timeout_secs: u64,
    /// Chunk size for reading (bytes)
    pub chunk_size: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            connect_timeout_secs: 30,
            read_timeout_secs: 300,
            chunk_size: 64 * 1024, // 64KB chunks
            user_agent: format!("xmltv-merger/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// What happened to one registered source
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Stored at its destination; size after decompression
    Downloaded { bytes: u64, decompressed: bool },
    /// Destination already existed and the run was not forced
    Skipped,
    Failed(FetchError),
}

/// One registry entry and its outcome
#[derive(Debug)]
pub struct SourceDownload {
    pub file: String,
    pub path: PathBuf,
    pub outcome: DownloadOutcome,
}

impl SourceDownload {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Failed(_))
    }
}

/// EPG downloader with HTTPS support
pub struct EpgDownloader;

impl EpgDownloader {
    /// Create a configured ureq agent
    fn create_agent(config: &DownloadConfig) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.read_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent()
    }

    /// Download every registered source into `dir`.
    ///
    /// Existing files are kept unless `force` is set. Failures are reported
    /// per source and never stop the remaining downloads.
    pub fn download_sources(
        registry: &SourceRegistry,
        dir: &Path,
        force: bool,
        config: &DownloadConfig,
    ) -> Result<Vec<SourceDownload>, FetchError> {
        if registry.is_empty() {
            info!("No source configurations found, skipping downloads");
            return Ok(Vec::new());
        }

        fs::create_dir_all(dir)?;
        info!(
            "Downloading {} EPG sources (force_download={})",
            registry.len(),
            force
        );

        let agent = Self::create_agent(config);
        let mut results = Vec::with_capacity(registry.len());

        for (file, entry) in registry.iter() {
            let path = dir.join(file);
            let outcome = match safe_file_name(file) {
                None => {
                    warn!("Refusing to download to unsafe file name '{}'", file);
                    DownloadOutcome::Failed(FetchError::UnsafeName(file.clone()))
                }
                Some(_) if entry.url.trim().is_empty() => {
                    warn!("No URL configured for {}, skipping", file);
                    DownloadOutcome::Failed(FetchError::Request("no URL configured".to_string()))
                }
                Some(_) if path.exists() && !force => {
                    info!(
                        "{} already exists, skipping (use --force-download to override)",
                        file
                    );
                    DownloadOutcome::Skipped
                }
                Some(_) => {
                    info!("Downloading {} from {}", file, entry.url);
                    match Self::download_source(&agent, entry, &path, config) {
                        Ok((bytes, decompressed)) => {
                            info!(
                                "Stored {} ({} bytes{})",
                                file,
                                bytes,
                                if decompressed { ", decompressed" } else { "" }
                            );
                            DownloadOutcome::Downloaded {
                                bytes,
                                decompressed,
                            }
                        }
                        Err(e) => {
                            warn!("Error downloading {}: {}", file, e);
                            DownloadOutcome::Failed(e)
                        }
                    }
                }
            };

            results.push(SourceDownload {
                file: file.clone(),
                path,
                outcome,
            });
        }

        let failed = results.iter().filter(|r| r.is_failure()).count();
        info!(
            "Download completed: {} ok, {} failed",
            results.len() - failed,
            failed
        );
        Ok(results)
    }

    /// Fetch one source to `dest`, gunzipping gzip payloads.
    /// Returns the stored size and whether it was decompressed.
    fn download_source(
        agent: &ureq::Agent,
        entry: &SourceEntry,
        dest: &Path,
        config: &DownloadConfig,
    ) -> Result<(u64, bool), FetchError> {
        let download = sibling(dest, "download");
        let part = sibling(dest, "part");

        let result = Self::download_with_retries(agent, &entry.url, &download, config)
            .and_then(|_| {
                let head = read_head(&download)?;
                let expected_gzip = match entry.compression {
                    CompressionHint::Gzip => true,
                    CompressionHint::Plain => false,
                    CompressionHint::Auto => entry.url.to_lowercase().ends_with(".gz"),
                };
                let decompress = should_decompress(entry.compression, &head);
                if expected_gzip && !decompress {
                    warn!("{} is not gzip data, storing as is", entry.url);
                }

                let bytes = if decompress {
                    let bytes = gunzip_file(&download, &part)?;
                    fs::remove_file(&download)?;
                    fs::rename(&part, dest)?;
                    bytes
                } else {
                    let bytes = fs::metadata(&download)?.len();
                    fs::rename(&download, dest)?;
                    bytes
                };
                Ok((bytes, decompress))
            });

        if result.is_err() {
            let _ = fs::remove_file(&download);
            let _ = fs::remove_file(&part);
        }
        result
    }

    /// Download a URL to a file with retry support (supports HTTP and HTTPS)
    fn download_with_retries(
        agent: &ureq::Agent,
        url: &str,
        output_path: &Path,
        config: &DownloadConfig,
    ) -> Result<u64, FetchError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match Self::try_download(agent, url, output_path, config) {
                Ok(total) => return Ok(total),
                Err(e) => {
                    if attempts >= config.max_retries.max(1) {
                        return Err(FetchError::Exhausted {
                            attempts,
                            last: e.to_string(),
                        });
                    }
                    warn!("Attempt {} for {} failed: {}", attempts, url, e);

                    // Wait before retry
                    std::thread::sleep(Duration::from_millis(config.retry_delay_ms));
                }
            }
        }
    }

    fn try_download(
        agent: &ureq::Agent,
        url: &str,
        output_path: &Path,
        config: &DownloadConfig,
    ) -> Result<u64, FetchError> {
        let response = agent
            .get(url)
            .header("User-Agent", &config.user_agent)
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => FetchError::Status(code),
                other => FetchError::Request(other.to_string()),
            })?;

        let status = response.status().as_u16();
        if status != 200 && status != 206 {
            return Err(FetchError::Status(status));
        }

        let mut file = File::create(output_path)?;

        // Stream the response body
        let mut reader = response.into_body().into_reader();
        let mut buffer = vec![0u8; config.chunk_size.max(1)];
        let mut downloaded: u64 = 0;

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break, // EOF
                Ok(n) => {
                    file.write_all(&buffer[..n])?;
                    downloaded += n as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        file.flush()?;
        Ok(downloaded)
    }
}

/// Decompress unless the source is declared plain; magic bytes decide
pub(crate) fn should_decompress(hint: CompressionHint, head: &[u8]) -> bool {
    hint != CompressionHint::Plain && head.starts_with(&GZIP_MAGIC)
}

/// Registry keys must be bare file names
fn safe_file_name(file: &str) -> Option<&str> {
    let path = Path::new(file);
    let name = path.file_name()?.to_str()?;
    (name == file && name != "..").then_some(name)
}

fn sibling(dest: &Path, suffix: &str) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}", suffix));
    dest.with_file_name(name)
}

fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(GZIP_MAGIC.len());
    File::open(path)?
        .take(GZIP_MAGIC.len() as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}

fn gunzip_file(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));
    let mut out = File::create(dest)?;
    let bytes = io::copy(&mut decoder, &mut out)?;
    out.flush()?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn quick_config() -> DownloadConfig {
        DownloadConfig {
            max_retries: 1,
            retry_delay_ms: 0,
            connect_timeout_secs: 1,
            read_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_should_decompress() {
        assert!(should_decompress(CompressionHint::Auto, &[0x1f, 0x8b]));
        assert!(should_decompress(CompressionHint::Gzip, &[0x1f, 0x8b, 0x08]));
        assert!(!should_decompress(CompressionHint::Plain, &[0x1f, 0x8b]));
        assert!(!should_decompress(CompressionHint::Gzip, b"<?"));
        assert!(!should_decompress(CompressionHint::Auto, &[]));
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("uk.xml"), Some("uk.xml"));
        assert_eq!(safe_file_name("../uk.xml"), None);
        assert_eq!(safe_file_name("sub/uk.xml"), None);
        assert_eq!(safe_file_name(".."), None);
        assert_eq!(safe_file_name(""), None);
    }

    #[test]
    fn test_gunzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.gz");
        let dest = dir.path().join("out.xml");

        let mut encoder = GzEncoder::new(File::create(&src).unwrap(), Compression::default());
        encoder.write_all(b"<tv></tv>").unwrap();
        encoder.finish().unwrap();

        assert_eq!(read_head(&src).unwrap(), GZIP_MAGIC.to_vec());
        assert_eq!(gunzip_file(&src, &dest).unwrap(), 9);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "<tv></tv>");
    }

    #[test]
    fn test_existing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("uk.xml"), "<tv/>").unwrap();

        let mut registry = SourceRegistry::default();
        registry.insert(
            "uk.xml",
            SourceEntry {
                url: "http://127.0.0.1:9/uk.xml".to_string(),
                compression: CompressionHint::Auto,
            },
        );

        let results =
            EpgDownloader::download_sources(&registry, dir.path(), false, &quick_config()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].outcome, DownloadOutcome::Skipped));
        assert_eq!(fs::read_to_string(dir.path().join("uk.xml")).unwrap(), "<tv/>");
    }

    /// Answers `connections` GET requests on loopback from `files`, one per
    /// connection, then stops. Returns the base URL.
    fn serve(
        files: Vec<(&'static str, Vec<u8>)>,
        connections: usize,
    ) -> (String, std::thread::JoinHandle<()>) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            for _ in 0..connections {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut byte = [0u8; 1];
                while !request.ends_with(b"\r\n\r\n") && stream.read(&mut byte).unwrap() == 1 {
                    request.push(byte[0]);
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                match files.iter().find(|(name, _)| path == format!("/{}", name)) {
                    Some((_, body)) => {
                        let head = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        );
                        stream.write_all(head.as_bytes()).unwrap();
                        stream.write_all(body).unwrap();
                    }
                    None => stream
                        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                        .unwrap(),
                }
            }
        });
        (base, handle)
    }

    #[test]
    fn test_download_sources_stores_and_decompresses() {
        let xml = b"<tv><channel id=\"a\"/></tv>".to_vec();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&xml).unwrap();
        let packed = encoder.finish().unwrap();

        let (base, server) = serve(
            vec![
                ("plain.xml", xml.clone()),
                ("packed.xml.gz", packed),
                ("labelled.xml.gz", xml.clone()),
            ],
            3,
        );

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kept.xml"), "old").unwrap();

        let mut registry = SourceRegistry::default();
        for (file, remote) in [
            ("plain.xml", "plain.xml"),
            ("packed.xml", "packed.xml.gz"),
            ("labelled.xml", "labelled.xml.gz"),
            ("kept.xml", "kept.xml"),
        ] {
            registry.insert(
                file,
                SourceEntry {
                    url: format!("{}/{}", base, remote),
                    compression: CompressionHint::Auto,
                },
            );
        }

        let results =
            EpgDownloader::download_sources(&registry, dir.path(), false, &quick_config()).unwrap();
        server.join().unwrap();

        let outcome = |file: &str| &results.iter().find(|r| r.file == file).unwrap().outcome;
        let xml_len = xml.len() as u64;
        assert!(matches!(
            outcome("plain.xml"),
            DownloadOutcome::Downloaded { bytes, decompressed: false } if *bytes == xml_len
        ));
        assert!(matches!(
            outcome("packed.xml"),
            DownloadOutcome::Downloaded { bytes, decompressed: true } if *bytes == xml_len
        ));
        // .gz URL without gzip magic is stored as is
        assert!(matches!(
            outcome("labelled.xml"),
            DownloadOutcome::Downloaded { decompressed: false, .. }
        ));
        assert!(matches!(outcome("kept.xml"), DownloadOutcome::Skipped));

        for file in ["plain.xml", "packed.xml", "labelled.xml"] {
            assert_eq!(fs::read(dir.path().join(file)).unwrap(), xml);
        }
        assert_eq!(fs::read_to_string(dir.path().join("kept.xml")).unwrap(), "old");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".download") || name.ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_failures_are_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = SourceRegistry::default();
        registry.insert(
            "a.xml",
            SourceEntry {
                url: "not a url".to_string(),
                compression: CompressionHint::Auto,
            },
        );
        registry.insert(
            "../escape.xml",
            SourceEntry {
                url: "http://127.0.0.1:9/x.xml".to_string(),
                compression: CompressionHint::Auto,
            },
        );
        registry.insert(
            "b.xml",
            SourceEntry {
                url: String::new(),
                compression: CompressionHint::Plain,
            },
        );

        let results =
            EpgDownloader::download_sources(&registry, dir.path(), true, &quick_config()).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(SourceDownload::is_failure));
        let escape = results.iter().find(|r| r.file == "../escape.xml").unwrap();
        assert!(matches!(
            &escape.outcome,
            DownloadOutcome::Failed(FetchError::UnsafeName(name)) if name == "../escape.xml"
        ));
        assert!(!dir.path().join("a.xml").exists());
        assert!(!dir.path().join("a.xml.download").exists());
    }

    #[test]
    fn test_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("xml");
        let results =
            EpgDownloader::download_sources(&SourceRegistry::default(), &target, true, &quick_config())
                .unwrap();
        assert!(results.is_empty());
        assert!(!target.exists());
    }
}
