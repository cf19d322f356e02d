use crate::error::{ErrorKind, Result};
use crate::{Compression, Container, PeekableReader};
use exn::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const ZIP_MAGIC: [&[u8; 4]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
// POSIX and GNU tar both put "ustar" at offset 257 of the first header block.
const TAR_MAGIC: &[u8; 5] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;
const HEAD_SIZE: usize = 512;

fn is_tar_header(head: &[u8]) -> bool {
    head.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()) == Some(TAR_MAGIC)
}

impl Container {
    /// Detect an *uncompressed* container from the first bytes of a file.
    ///
    /// Pass at least 512 bytes if you want TAR archives recognized; the TAR
    /// signature lives at offset 257. Compressed TARs need a decoder, see
    /// [`Container::detect_reader`].
    #[must_use]
    pub fn from_magic_bytes(head: &[u8]) -> Option<Self> {
        if ZIP_MAGIC.iter().any(|magic| head.starts_with(*magic)) {
            return Some(Container::Zip);
        }
        if is_tar_header(head) {
            return Some(Container::Tar(Compression::None));
        }
        None
    }

    /// Detect a container by sniffing the head of `reader`.
    ///
    /// A compressed stream is only a container if what comes out of the
    /// decoder starts with a TAR header. Corrupt compressed data is reported
    /// as "not a container" rather than an error: the file is still a file,
    /// and the scanner will digest it as one.
    pub fn detect_reader<R: Read>(reader: R) -> Result<Option<Self>> {
        let mut peekable = PeekableReader::new(reader);
        let head = peekable.peek(HEAD_SIZE).or_raise(|| ErrorKind::Io)?;
        if let Some(container) = Self::from_magic_bytes(head) {
            return Ok(Some(container));
        }
        let compression = Compression::sniff(head);
        if compression == Compression::None {
            return Ok(None);
        }
        let mut decoded = PeekableReader::new(compression.decoder(peekable.rewind())?);
        match decoded.peek(HEAD_SIZE) {
            Ok(head) if is_tar_header(head) => Ok(Some(Container::Tar(compression))),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::debug!(format = %compression, error = ?e, "Compressed stream could not be decoded; treating as plain file");
                Ok(None)
            },
        }
    }

    /// Detect whether the file at `path` is a container.
    pub fn detect(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let file = File::open(path.as_ref()).or_raise(|| ErrorKind::Io)?;
        Self::detect_reader(BufReader::new(file))
    }
}
