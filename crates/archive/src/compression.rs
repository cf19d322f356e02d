use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::read::BzDecoder;
#[cfg(feature = "zstd")]
use exn::ResultExt;
use flate2::read::GzDecoder;
use std::io::Read;
#[cfg(feature = "xz")]
use xz2::read::XzDecoder;
#[cfg(feature = "zstd")]
use zstd::stream::read::Decoder as ZstdDecoder;

/// Stream signatures, checked in order.
const SIGNATURES: &[(&[u8], Compression)] = &[
    (b"BZh", Compression::Bzip2),
    (&[0x1F, 0x8B], Compression::Gzip),
    #[cfg(feature = "xz")]
    (&[0xFD, b'7', b'z', b'X', b'Z', 0x00], Compression::Xz),
    #[cfg(feature = "zstd")]
    (&[0x28, 0xB5, 0x2F, 0xFD], Compression::Zstd),
];

impl Compression {
    /// The compression layer `head` starts with, if any.
    #[must_use]
    pub fn sniff(head: &[u8]) -> Self {
        SIGNATURES
            .iter()
            .find(|(signature, _)| head.starts_with(signature))
            .map_or(Compression::None, |(_, compression)| *compression)
    }

    /// `reader`, with this compression layer peeled off.
    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> Result<Box<dyn Read + 'a>> {
        let decoder: Box<dyn Read + 'a> = match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Decoder)?),
        };
        Ok(decoder)
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;
    use std::io::{Read, Write};

    #[rstest]
    #[case::tar_header(b"ustar", Compression::None)]
    #[case::empty(b"", Compression::None)]
    #[case::truncated_gzip(&[0x1F], Compression::None)]
    #[case::bzip2(b"BZh91AY", Compression::Bzip2)]
    #[case::gzip(&[0x1F, 0x8B, 0x08, 0x00], Compression::Gzip)]
    #[cfg_attr(feature = "xz", case::xz(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00], Compression::Xz))]
    #[cfg_attr(feature = "zstd", case::zstd(&[0x28, 0xB5, 0x2F, 0xFD], Compression::Zstd))]
    fn test_sniff(#[case] head: &[u8], #[case] expected: Compression) {
        assert_eq!(Compression::sniff(head), expected);
    }

    #[test]
    fn test_bzip2_decoder() {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::fast());
        encoder.write_all(b"X5O!P%@AP").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(Compression::sniff(&compressed), Compression::Bzip2);

        let mut decoded = String::new();
        Compression::Bzip2.decoder(compressed.as_slice()).unwrap().read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "X5O!P%@AP");
    }

    #[test]
    fn test_plain_passthrough() {
        let mut decoded = Vec::new();
        Compression::None.decoder(&b"plain"[..]).unwrap().read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, b"plain");
    }
}
