//! Self-extracting payload appended to the launcher executable.
//!
//! Layout of a bundled executable:
//!
//! ```text
//! [launcher bytes][payload: tar.zst][sha256(payload): 32][payload len: u64 LE][MAGIC: 8]
//! ```
//!
//! The trailer sits at the very end so a launcher can find it by reading
//! its own executable backwards. A plain launcher has no trailer.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 8] = b"DCALPKG1";
const CHECKSUM_LEN: u64 = 32;
/// checksum + length + magic
pub const TRAILER_LEN: u64 = CHECKSUM_LEN + 8 + 8;

/// zstd level used for the payload.
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Byte offset of the payload within the file.
    pub payload_offset: u64,
    pub payload_len: u64,
    pub checksum: [u8; 32],
}

/// Pack `files` as `(archive name, source path)` into a tar.zst buffer.
pub fn pack_payload(files: &[(String, PathBuf)]) -> Result<Vec<u8>> {
    let encoder = zstd::stream::Encoder::new(Vec::new(), COMPRESSION_LEVEL)
        .context("creating payload encoder")?;
    let mut builder = tar::Builder::new(encoder);

    for (name, path) in files {
        let mut f =
            File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
        let md = f
            .metadata()
            .with_context(|| format!("reading metadata of '{}'", path.display()))?;
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(md.len());
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            header.set_mode(md.permissions().mode());
        }
        #[cfg(not(unix))]
        {
            header.set_mode(0o755);
        }
        header.set_cksum();
        builder
            .append_data(&mut header, name, &mut f)
            .with_context(|| format!("adding '{}' to payload", name))?;
    }

    let encoder = builder.into_inner().context("finalizing payload archive")?;
    encoder.finish().context("finishing payload compression")
}

/// Write `launcher` followed by `payload` and its trailer to `out`.
pub fn write_bundle(launcher: &Path, payload: &[u8], out: &Path) -> Result<u64> {
    let stub = fs::read(launcher)
        .with_context(|| format!("reading launcher '{}'", launcher.display()))?;
    if read_trailer_bytes(&stub)?.is_some() {
        bail!(
            "launcher '{}' already carries a payload",
            launcher.display()
        );
    }

    let checksum = sha256(payload);
    let mut f = File::create(out).with_context(|| format!("creating '{}'", out.display()))?;
    f.write_all(&stub)?;
    f.write_all(payload)?;
    f.write_all(&checksum)?;
    f.write_all(&(payload.len() as u64).to_le_bytes())?;
    f.write_all(MAGIC)?;
    f.flush()?;

    set_executable(out)?;
    Ok(stub.len() as u64 + payload.len() as u64 + TRAILER_LEN)
}

/// Read the trailer at the end of `path`, if there is one.
pub fn read_trailer(path: &Path) -> Result<Option<Trailer>> {
    let mut f = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let len = f
        .metadata()
        .with_context(|| format!("reading metadata of '{}'", path.display()))?
        .len();
    if len < TRAILER_LEN {
        return Ok(None);
    }
    f.seek(SeekFrom::Start(len - TRAILER_LEN))?;
    let mut tail = [0u8; TRAILER_LEN as usize];
    f.read_exact(&mut tail)
        .with_context(|| format!("reading trailer of '{}'", path.display()))?;
    parse_trailer(&tail, len).with_context(|| format!("inspecting '{}'", path.display()))
}

fn read_trailer_bytes(bytes: &[u8]) -> Result<Option<Trailer>> {
    let len = bytes.len() as u64;
    if len < TRAILER_LEN {
        return Ok(None);
    }
    parse_trailer(&bytes[(len - TRAILER_LEN) as usize..], len)
}

fn parse_trailer(tail: &[u8], file_len: u64) -> Result<Option<Trailer>> {
    let magic_at = (CHECKSUM_LEN + 8) as usize;
    if &tail[magic_at..] != MAGIC {
        return Ok(None);
    }
    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(&tail[..CHECKSUM_LEN as usize]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&tail[CHECKSUM_LEN as usize..magic_at]);
    let payload_len = u64::from_le_bytes(len_bytes);

    if payload_len > file_len - TRAILER_LEN {
        bail!(
            "payload length {} exceeds file size {}",
            payload_len,
            file_len
        );
    }
    Ok(Some(Trailer {
        payload_offset: file_len - TRAILER_LEN - payload_len,
        payload_len,
        checksum,
    }))
}

/// Verify the payload described by `trailer` and unpack it into `dest`.
pub fn extract_payload(path: &Path, trailer: &Trailer, dest: &Path) -> Result<()> {
    let mut f = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    f.seek(SeekFrom::Start(trailer.payload_offset))?;
    let mut payload = vec![0u8; trailer.payload_len as usize];
    f.read_exact(&mut payload)
        .with_context(|| format!("reading payload of '{}'", path.display()))?;

    let actual = sha256(&payload);
    if actual != trailer.checksum {
        bail!("payload checksum mismatch in '{}'", path.display());
    }

    fs::create_dir_all(dest).with_context(|| format!("creating '{}'", dest.display()))?;
    let decoder = zstd::stream::Decoder::new(payload.as_slice())
        .context("creating payload decoder")?;
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest)
        .with_context(|| format!("unpacking payload into '{}'", dest.display()))
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("marking '{}' executable", path.display()))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_bundle(temp: &TempDir) -> PathBuf {
        let launcher = temp.path().join("launcher");
        fs::write(&launcher, b"\x7fELF fake launcher").unwrap();
        let jar = temp.path().join("CalendarApp.jar");
        fs::write(&jar, "PK jar bytes").unwrap();
        let config = temp.path().join("config.json");
        fs::write(&config, "{}\n").unwrap();

        let payload = pack_payload(&[
            ("CalendarApp.jar".to_string(), jar),
            ("desktop_calendar_config.json".to_string(), config),
        ])
        .unwrap();
        let out = temp.path().join("DesktopCalendar.exe");
        write_bundle(&launcher, &payload, &out).unwrap();
        out
    }

    #[test]
    fn test_plain_launcher_has_no_trailer() {
        let temp = TempDir::new().unwrap();
        let launcher = temp.path().join("launcher");
        fs::write(&launcher, vec![0u8; 4096]).unwrap();
        assert_eq!(read_trailer(&launcher).unwrap(), None);

        let tiny = temp.path().join("tiny");
        fs::write(&tiny, b"MZ").unwrap();
        assert_eq!(read_trailer(&tiny).unwrap(), None);
    }

    #[test]
    fn test_bundle_extracts_files() {
        let temp = TempDir::new().unwrap();
        let bundle = sample_bundle(&temp);

        let trailer = read_trailer(&bundle).unwrap().unwrap();
        assert_eq!(trailer.payload_offset, b"\x7fELF fake launcher".len() as u64);

        let dest = temp.path().join("extracted");
        extract_payload(&bundle, &trailer, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("CalendarApp.jar")).unwrap(),
            "PK jar bytes"
        );
        assert!(dest.join("desktop_calendar_config.json").is_file());
    }

    #[test]
    fn test_corrupt_payload_is_rejected() {
        let temp = TempDir::new().unwrap();
        let bundle = sample_bundle(&temp);
        let trailer = read_trailer(&bundle).unwrap().unwrap();

        let mut bytes = fs::read(&bundle).unwrap();
        bytes[trailer.payload_offset as usize] ^= 0xff;
        fs::write(&bundle, bytes).unwrap();

        let err = extract_payload(&bundle, &trailer, &temp.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_bad_length_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken");
        let mut bytes = vec![0u8; 32];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(MAGIC);
        fs::write(&path, bytes).unwrap();
        assert!(read_trailer(&path).is_err());
    }

    #[test]
    fn test_refuses_to_nest_bundles() {
        let temp = TempDir::new().unwrap();
        let bundle = sample_bundle(&temp);
        let err = write_bundle(&bundle, b"payload", &temp.path().join("nested")).unwrap_err();
        assert!(err.to_string().contains("already carries a payload"));
    }
}
