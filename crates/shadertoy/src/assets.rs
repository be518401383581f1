//! Mirrors the media referenced by a descriptor into `media/` and annotates
//! each input with the local path(s) it resolved to.
//!
//! A local file is reused when its size matches the advertised content length
//! and, if an integrity record exists for it, the record's ETag and SHA-256
//! still agree with the remote headers and the bytes on disk. Records are
//! written after every download, so a second run never needs the body to
//! decide. Any failed transfer aborts the whole synchronization.
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::{ensure_dir, partial_path, sha256_file, CacheLayout};
use crate::descriptor::{ChannelType, LocalSource, RenderInput, ShaderDescriptor, MEDIA_PREFIX};
use crate::error::CacheError;
use crate::remote::{RemoteAsset, RemoteSource};

/// Suffixes appended to a cubemap's base name, in face order.
pub const CUBE_FACE_SUFFIXES: [&str; 6] = ["", "_1", "_2", "_3", "_4", "_5"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Current,
    /// The file was reused, but its integrity record had to be written.
    Backfilled,
    Downloaded,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: usize,
    pub reused: usize,
    pub backfilled: usize,
}

impl SyncReport {
    fn record(&mut self, status: AssetStatus) {
        match status {
            AssetStatus::Current => self.reused += 1,
            AssetStatus::Backfilled => self.backfilled += 1,
            AssetStatus::Downloaded => self.downloaded += 1,
        }
    }
}

/// Integrity record kept beside each downloaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub len: u64,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// File names of the six cubemap faces for a remote base name: `tex.png`
/// yields `tex.png`, `tex_1.png`, ... `tex_5.png`.
pub fn cubemap_face_names(file_name: &str) -> [String; 6] {
    let (stem, ext) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    };
    CUBE_FACE_SUFFIXES.map(|suffix| format!("{stem}{suffix}{ext}"))
}

pub struct AssetSynchronizer<'a> {
    remote: &'a dyn RemoteSource,
    layout: &'a CacheLayout,
}

impl<'a> AssetSynchronizer<'a> {
    pub fn new(remote: &'a dyn RemoteSource, layout: &'a CacheLayout) -> Self {
        Self { remote, layout }
    }

    pub fn sync(&self, descriptor: &mut ShaderDescriptor) -> Result<SyncReport, CacheError> {
        ensure_dir(&self.layout.media_dir())?;
        let mut report = SyncReport::default();
        for pass in &mut descriptor.shader.render_passes {
            for input in &mut pass.inputs {
                let local = self.sync_input(input, &mut report)?;
                input.local_src = Some(local);
            }
        }
        Ok(report)
    }

    fn sync_input(
        &self,
        input: &RenderInput,
        report: &mut SyncReport,
    ) -> Result<LocalSource, CacheError> {
        let file_name = input.media_file_name()?;
        match input.channel_type() {
            Some(ChannelType::Cubemap) => {
                let faces = cubemap_face_names(file_name);
                for face in &faces {
                    report.record(self.sync_file(face)?);
                }
                Ok(LocalSource::CubeFaces(
                    faces.map(|face| self.layout.media_relative(&face)),
                ))
            }
            Some(ChannelType::Texture | ChannelType::Music) => {
                report.record(self.sync_file(file_name)?);
                Ok(LocalSource::Single(self.layout.media_relative(file_name)))
            }
            None => Err(CacheError::validation(format!(
                "channel {} has unsupported input type '{}'",
                input.channel, input.ctype
            ))),
        }
    }

    /// Brings `media/<file_name>` up to date with the remote copy.
    pub fn sync_file(&self, file_name: &str) -> Result<AssetStatus, CacheError> {
        let destination = self.layout.media_dir().join(file_name);
        let record_path = self.layout.record_path(file_name);
        let asset = self.remote.open_media(&format!("{MEDIA_PREFIX}{file_name}"))?;

        if let Some(status) = reusable(&destination, &record_path, &asset)? {
            debug!(path = %destination.display(), "exists; skipping");
            return Ok(status);
        }

        let record = download(asset, &destination)?;
        write_record(&record_path, &record)?;
        info!(path = %destination.display(), bytes = record.len, "saved");
        Ok(AssetStatus::Downloaded)
    }
}

/// `None` when the local copy must be fetched again.
fn reusable(
    destination: &Path,
    record_path: &Path,
    asset: &RemoteAsset,
) -> Result<Option<AssetStatus>, CacheError> {
    let Ok(metadata) = fs::metadata(destination) else {
        return Ok(None);
    };
    if asset.content_length != Some(metadata.len()) {
        debug!(
            path = %destination.display(),
            local = metadata.len(),
            remote = ?asset.content_length,
            "size differs from remote"
        );
        return Ok(None);
    }

    let local_hash = sha256_file(destination)
        .map_err(|err| CacheError::io("hashing", destination, err))?;
    match read_record(record_path) {
        Some(record) => {
            if record.etag.is_some() && asset.etag.is_some() && record.etag != asset.etag {
                debug!(path = %destination.display(), "remote etag changed");
                return Ok(None);
            }
            if record.sha256 != local_hash || record.len != metadata.len() {
                warn!(path = %destination.display(), "local file does not match its record");
                return Ok(None);
            }
            Ok(Some(AssetStatus::Current))
        }
        None => {
            // Files cached before records existed are trusted on size and
            // get a record so later runs can verify them.
            let record = AssetRecord {
                len: metadata.len(),
                sha256: local_hash,
                etag: asset.etag.clone(),
            };
            write_record(record_path, &record)?;
            Ok(Some(AssetStatus::Backfilled))
        }
    }
}

fn read_record(path: &Path) -> Option<AssetRecord> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable asset record");
            None
        }
    }
}

fn write_record(path: &Path, record: &AssetRecord) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string(record).map_err(|err| CacheError::Io {
        context: format!("serializing {}", path.display()),
        source: err.into(),
    })?;
    fs::write(path, json).map_err(|err| CacheError::io("writing", path, err))
}

/// Streams the body into a sibling file while hashing it, then renames it over
/// `destination`.
fn download(asset: RemoteAsset, destination: &Path) -> Result<AssetRecord, CacheError> {
    let RemoteAsset {
        url,
        content_length,
        etag,
        mut body,
    } = asset;
    if let Some(parent) = destination.parent() {
        ensure_dir(parent)?;
    }
    let staging = partial_path(destination);
    let file = File::create(&staging).map_err(|err| CacheError::io("creating", &staging, err))?;
    let mut writer = HashingWriter {
        inner: BufWriter::new(file),
        hasher: Sha256::new(),
    };

    let copied = io::copy(&mut body, &mut writer)
        .map_err(|err| CacheError::transport(url.as_str(), err))
        .and_then(|copied| {
            writer
                .flush()
                .map(|()| copied)
                .map_err(|err| CacheError::io("writing", &staging, err))
        });
    let HashingWriter { inner, hasher } = writer;
    drop(inner);

    let copied = match copied {
        Ok(copied) if content_length.map_or(true, |expected| expected == copied) => copied,
        Ok(copied) => {
            let _ = fs::remove_file(&staging);
            return Err(CacheError::transport(
                url,
                format!(
                    "expected {} bytes but received {copied}",
                    content_length.unwrap_or_default()
                ),
            ));
        }
        Err(err) => {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
    };

    let sha256 = format!("{:x}", hasher.finalize());
    fs::rename(&staging, destination)
        .map_err(|err| CacheError::io("replacing", destination, err))?;
    Ok(AssetRecord {
        len: copied,
        sha256,
        etag,
    })
}

struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::sha256_hex;
    use crate::test_support::FakeRemote;

    #[test]
    fn cubemap_faces_follow_suffix_order() {
        assert_eq!(
            cubemap_face_names("tex.png"),
            ["tex.png", "tex_1.png", "tex_2.png", "tex_3.png", "tex_4.png", "tex_5.png"]
        );
        assert_eq!(cubemap_face_names("sky")[5], "sky_5");
    }

    #[test]
    fn downloads_missing_file_and_writes_record() {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(temp.path());
        let remote = FakeRemote::default().with_media("tex.png", b"pixels");
        let sync = AssetSynchronizer::new(&remote, &layout);

        assert_eq!(sync.sync_file("tex.png").unwrap(), AssetStatus::Downloaded);
        assert_eq!(fs::read(layout.media_dir().join("tex.png")).unwrap(), b"pixels");
        let record = read_record(&layout.record_path("tex.png")).unwrap();
        assert_eq!(record.len, 6);
        assert_eq!(record.sha256, sha256_hex(b"pixels"));

        assert_eq!(sync.sync_file("tex.png").unwrap(), AssetStatus::Current);
        assert_eq!(remote.downloads(), vec!["/media/a/tex.png".to_string()]);
    }

    #[test]
    fn overwrites_file_when_size_differs() {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(temp.path());
        fs::create_dir_all(layout.media_dir()).unwrap();
        fs::write(layout.media_dir().join("tex.png"), b"old").unwrap();
        let remote = FakeRemote::default().with_media("tex.png", b"newer bytes");

        let status = AssetSynchronizer::new(&remote, &layout)
            .sync_file("tex.png")
            .unwrap();
        assert_eq!(status, AssetStatus::Downloaded);
        assert_eq!(
            fs::read(layout.media_dir().join("tex.png")).unwrap(),
            b"newer bytes"
        );
    }

    #[test]
    fn trusts_size_match_without_record_and_backfills_it() {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(temp.path());
        fs::create_dir_all(layout.media_dir()).unwrap();
        fs::write(layout.media_dir().join("tex.png"), b"abc").unwrap();
        let remote = FakeRemote::default().with_media("tex.png", b"xyz");

        let sync = AssetSynchronizer::new(&remote, &layout);
        assert_eq!(sync.sync_file("tex.png").unwrap(), AssetStatus::Backfilled);
        assert!(remote.downloads().is_empty());
        assert_eq!(fs::read(layout.media_dir().join("tex.png")).unwrap(), b"abc");
        assert_eq!(
            read_record(&layout.record_path("tex.png")).unwrap().sha256,
            sha256_hex(b"abc")
        );
        assert_eq!(sync.sync_file("tex.png").unwrap(), AssetStatus::Current);
    }

    #[test]
    fn media_named_like_the_records_dir_does_not_collide() {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(temp.path());
        let remote = FakeRemote::default()
            .with_media(".records", b"odd name")
            .with_media("tex.png", b"pixels");
        let sync = AssetSynchronizer::new(&remote, &layout);

        assert_eq!(sync.sync_file(".records").unwrap(), AssetStatus::Downloaded);
        assert_eq!(sync.sync_file("tex.png").unwrap(), AssetStatus::Downloaded);
        assert_eq!(
            fs::read(layout.media_dir().join(".records")).unwrap(),
            b"odd name"
        );
        assert!(layout.record_path(".records").is_file());
        assert!(layout.record_path("tex.png").is_file());
        assert_eq!(sync.sync_file(".records").unwrap(), AssetStatus::Current);
    }

    #[test]
    fn refetches_when_local_bytes_drift_from_record() {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(temp.path());
        let remote = FakeRemote::default().with_media("tex.png", b"abc");
        let sync = AssetSynchronizer::new(&remote, &layout);
        sync.sync_file("tex.png").unwrap();

        // Same size, different content: a corrupted copy.
        fs::write(layout.media_dir().join("tex.png"), b"abd").unwrap();
        assert_eq!(sync.sync_file("tex.png").unwrap(), AssetStatus::Downloaded);
        assert_eq!(fs::read(layout.media_dir().join("tex.png")).unwrap(), b"abc");
    }

    #[test]
    fn refetches_when_remote_etag_changes() {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(temp.path());
        let first = FakeRemote::default().with_media_etag("tex.png", b"abc", "\"v1\"");
        AssetSynchronizer::new(&first, &layout)
            .sync_file("tex.png")
            .unwrap();

        let second = FakeRemote::default().with_media_etag("tex.png", b"xyz", "\"v2\"");
        let status = AssetSynchronizer::new(&second, &layout)
            .sync_file("tex.png")
            .unwrap();
        assert_eq!(status, AssetStatus::Downloaded);
        assert_eq!(fs::read(layout.media_dir().join("tex.png")).unwrap(), b"xyz");
    }

    #[test]
    fn truncated_body_is_a_transport_error() {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(temp.path());
        let remote = FakeRemote::default().with_media_length("tex.png", b"abc", 10);

        let err = AssetSynchronizer::new(&remote, &layout)
            .sync_file("tex.png")
            .unwrap_err();
        assert!(matches!(err, CacheError::Transport { .. }));
        assert!(!layout.media_dir().join("tex.png").exists());
        assert!(!partial_path(&layout.media_dir().join("tex.png")).exists());
    }
}
