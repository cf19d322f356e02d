use crate::Container;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::{File, create_dir_all};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::instrument;

impl Container {
    /// Extract every member of the container at `archive` into `dest`.
    ///
    /// Returns the number of regular files written. Members whose names
    /// would land outside of `dest` (absolute paths, `..` components) are
    /// skipped with a warning. Directory entries are created but not counted.
    ///
    /// Extraction is all-or-nothing from the caller's point of view: on error
    /// `dest` may be half-populated, and it's the caller's job to throw it
    /// away.
    #[instrument(skip_all, fields(format = %self, archive = %archive.as_ref().display(), members))]
    pub fn extract(&self, archive: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
        let (archive, dest) = (archive.as_ref(), dest.as_ref());
        create_dir_all(dest).or_raise(|| ErrorKind::Io)?;
        let file = BufReader::new(File::open(archive).or_raise(|| ErrorKind::Io)?);
        let members = match self {
            Container::Zip => extract_zip(file, dest)?,
            Container::Tar(compression) => extract_tar(compression.decoder(file)?, dest)?,
        };
        tracing::Span::current().record("members", members);
        Ok(members)
    }
}

fn extract_zip<R: Read + std::io::Seek>(reader: R, dest: &Path) -> Result<u64> {
    let mut archive = zip::ZipArchive::new(reader).or_raise(|| ErrorKind::InvalidData)?;
    let mut members = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).or_raise(|| ErrorKind::InvalidData)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(name = entry.name(), "Skipping zip member with unsafe path");
            continue;
        };
        let outpath = dest.join(relative);
        if entry.is_dir() {
            create_dir_all(&outpath).or_raise(|| ErrorKind::Io)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
        }
        let mut outfile = File::create(&outpath).or_raise(|| ErrorKind::Io)?;
        // Decompression failures (bad CRC, encrypted member) surface as I/O
        // errors from the entry reader; they mean the archive is unusable.
        std::io::copy(&mut entry, &mut outfile).or_raise(|| ErrorKind::InvalidData)?;
        members += 1;
    }
    Ok(members)
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<u64> {
    let mut archive = tar::Archive::new(reader);
    // Members are data to be hashed, not software to be installed.
    archive.set_preserve_permissions(false);
    archive.set_unpack_xattrs(false);
    let mut members = 0;
    for entry in archive.entries().or_raise(|| ErrorKind::InvalidData)? {
        let mut entry = entry.or_raise(|| ErrorKind::InvalidData)?;
        let is_file = entry.header().entry_type().is_file();
        let unpacked = entry.unpack_in(dest).or_raise(|| ErrorKind::InvalidData)?;
        if !unpacked {
            let name = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
            tracing::warn!(name = %name, "Skipping tar member with unsafe path");
            continue;
        }
        if is_file {
            members += 1;
        }
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use crate::{Compression, Container};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &std::path::Path, members: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn write_tar_gz(path: &std::path::Path, members: &[(&str, &[u8])]) {
        let encoder = flate2::write::GzEncoder::new(std::fs::File::create(path).unwrap(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("sample.zip");
        write_zip(&archive, &[("a.txt", &b"alpha"[..]), ("nested/b.txt", &b"bravo"[..])]);
        assert_eq!(Container::detect(&archive).unwrap(), Some(Container::Zip));

        let dest = dir.path().join("out");
        assert_eq!(Container::Zip.extract(&archive, &dest).unwrap(), 2);
        assert_eq!(std::fs::read(dest.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(dest.join("nested/b.txt")).unwrap(), b"bravo");
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("sample.tar.gz");
        write_tar_gz(&archive, &[("one.bin", &b"one"[..]), ("sub/two.bin", &b"two"[..])]);
        let container = Container::detect(&archive).unwrap().unwrap();
        assert_eq!(container, Container::Tar(Compression::Gzip));

        let dest = dir.path().join("out");
        assert_eq!(container.extract(&archive, &dest).unwrap(), 2);
        assert_eq!(std::fs::read(dest.join("sub/two.bin")).unwrap(), b"two");
    }

    #[test]
    fn test_extract_corrupt_zip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        std::fs::write(&archive, b"PK\x03\x04 this is definitely not a zip file").unwrap();
        assert!(Container::Zip.extract(&archive, dir.path().join("out")).is_err());
    }
}
