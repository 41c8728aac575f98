//! MSBL firmware image format.
//!
//! MSBL is the container Maxim ships sensor-hub firmware in. The payload is
//! encrypted and authenticated per page; this module only splits the file into
//! the pieces the bootloader protocol needs.
//!
//! ## Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! offset  size  field
//! 0       4     magic ("msbl")
//! 4       4     format version (u32)
//! 8       16    target (ASCII, NUL-padded)
//! 24      16    encryption type (ASCII, NUL-padded)
//! 40      11    nonce / IV
//! 51      1     reserved
//! 52      16    auth tag
//! 68      2     page count (u16)
//! 70      2     page size (u16)
//! 72      1     CRC size (u8)
//! 73      3     reserved
//! ---------------------------------------------
//! 76            page[0..numPages], each pageSize + 16 bytes
//! EOF-4   4     CRC32 (u32)
//! ```

use crate::error::{ParseError, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Expected magic bytes.
pub const MSBL_MAGIC: [u8; 4] = *b"msbl";

/// Header size in bytes.
pub const HEADER_SIZE: usize = 76;

/// Size of the nonce (IV) field.
pub const NONCE_SIZE: usize = 11;

/// Size of the authentication tag field.
pub const AUTH_SIZE: usize = 16;

/// Size of the target and encryption-type name fields.
pub const NAME_SIZE: usize = 16;

/// Per-page suffix appended to the declared page size (check bytes).
pub const PAGE_OVERHEAD: usize = 16;

/// Size of the trailing CRC32.
pub const TRAILER_SIZE: usize = 4;

/// Offset of the trailing CRC32 relative to the end of the file.
const TRAILER_OFFSET: i64 = -4;

/// MSBL file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsblHeader {
    /// Magic bytes.
    pub magic: [u8; 4],
    /// Format version.
    pub format_version: u32,
    /// Target device name, NUL-padded.
    pub target: [u8; NAME_SIZE],
    /// Encryption type, NUL-padded.
    pub enc_type: [u8; NAME_SIZE],
    /// Initialization vector for the device's decryption step.
    pub nonce: [u8; NONCE_SIZE],
    /// Reserved byte after the nonce.
    pub resv0: u8,
    /// Authentication tag for the device's verification step.
    pub auth: [u8; AUTH_SIZE],
    /// Number of pages in the file.
    pub num_pages: u16,
    /// Declared page size, excluding the per-page check bytes.
    pub page_size: u16,
    /// CRC size.
    pub crc_size: u8,
    /// Trailing reserved bytes.
    pub resv1: [u8; 3],
}

impl MsblHeader {
    /// Decode a header from exactly [`HEADER_SIZE`] bytes.
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: array(&bytes[0..4]),
            format_version: LittleEndian::read_u32(&bytes[4..8]),
            target: array(&bytes[8..24]),
            enc_type: array(&bytes[24..40]),
            nonce: array(&bytes[40..51]),
            resv0: bytes[51],
            auth: array(&bytes[52..68]),
            num_pages: LittleEndian::read_u16(&bytes[68..70]),
            page_size: LittleEndian::read_u16(&bytes[70..72]),
            crc_size: bytes[72],
            resv1: array(&bytes[73..76]),
        }
    }

    /// Serialize the header back into its on-disk layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic);
        LittleEndian::write_u32(&mut out[4..8], self.format_version);
        out[8..24].copy_from_slice(&self.target);
        out[24..40].copy_from_slice(&self.enc_type);
        out[40..51].copy_from_slice(&self.nonce);
        out[51] = self.resv0;
        out[52..68].copy_from_slice(&self.auth);
        LittleEndian::write_u16(&mut out[68..70], self.num_pages);
        LittleEndian::write_u16(&mut out[70..72], self.page_size);
        out[72] = self.crc_size;
        out[73..76].copy_from_slice(&self.resv1);
        out
    }

    /// Check for the standard `msbl` magic.
    pub fn has_standard_magic(&self) -> bool {
        self.magic == MSBL_MAGIC
    }

    /// Magic bytes as text.
    pub fn magic_str(&self) -> String {
        ascii_field(&self.magic)
    }

    /// Target device name.
    pub fn target_name(&self) -> String {
        ascii_field(&self.target)
    }

    /// Encryption type name.
    pub fn encryption_type(&self) -> String {
        ascii_field(&self.enc_type)
    }

    /// Bytes written to the device for each page.
    pub fn page_payload_len(&self) -> usize {
        usize::from(self.page_size) + PAGE_OVERHEAD
    }
}

/// Copy a fixed-width field out of the header buffer.
fn array<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(src);
    out
}

/// Decode a NUL-padded ASCII field.
fn ascii_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

/// Parsed MSBL image.
///
/// Pages are owned by the image; nothing is shared between instances.
#[derive(Clone)]
pub struct MsblImage {
    header: MsblHeader,
    pages: Vec<Vec<u8>>,
    trailer_crc32: u32,
}

impl MsblImage {
    /// Load an MSBL image from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading MSBL from: {}", path.display());

        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file))?)
    }

    /// Parse an MSBL image from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> std::result::Result<Self, ParseError> {
        Self::from_reader(Cursor::new(data))
    }

    /// Parse an MSBL image from a seekable source.
    pub fn from_reader<R: Read + Seek>(mut reader: R) -> std::result::Result<Self, ParseError> {
        let mut raw_header = [0u8; HEADER_SIZE];
        let got = read_full(&mut reader, &mut raw_header)?;
        if got < HEADER_SIZE {
            return Err(ParseError::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: got,
            });
        }
        let header = MsblHeader::parse(&raw_header);

        if !header.has_standard_magic() {
            warn!(
                "Unexpected MSBL magic {:02X?} ({:?}), continuing anyway",
                header.magic,
                header.magic_str()
            );
        }

        debug!(
            "MSBL header: target {}, {} pages of {} bytes, format v{}",
            header.target_name(),
            header.num_pages,
            header.page_size,
            header.format_version
        );

        let block_len = header.page_payload_len();
        let mut pages = Vec::with_capacity(usize::from(header.num_pages));
        loop {
            let mut block = vec![0u8; block_len];
            if read_full(&mut reader, &mut block)? < block_len {
                break;
            }
            pages.push(block);
        }

        if pages.len() != usize::from(header.num_pages) {
            return Err(ParseError::PageCountMismatch {
                expected: usize::from(header.num_pages),
                actual: pages.len(),
            });
        }

        // The trailer is located from the end of the file, not from where the
        // page loop stopped.
        reader
            .seek(SeekFrom::End(TRAILER_OFFSET))
            .map_err(|_| ParseError::TruncatedTrailer)?;
        let trailer_crc32 = reader.read_u32::<LittleEndian>().map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ParseError::TruncatedTrailer
            } else {
                ParseError::Io(e)
            }
        })?;

        debug!("MSBL trailer CRC32: {trailer_crc32:#010X}");

        Ok(Self {
            header,
            pages,
            trailer_crc32,
        })
    }

    /// File header.
    pub fn header(&self) -> &MsblHeader {
        &self.header
    }

    /// Pages in flashing order, each `page_size + 16` bytes.
    pub fn pages(&self) -> &[Vec<u8>] {
        &self.pages
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Declared page size.
    pub fn page_size(&self) -> u16 {
        self.header.page_size
    }

    /// Bytes written to the device for each page.
    pub fn payload_len(&self) -> usize {
        self.header.page_payload_len()
    }

    /// Nonce / IV bytes.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.header.nonce
    }

    /// Authentication tag bytes.
    pub fn auth(&self) -> &[u8; AUTH_SIZE] {
        &self.header.auth
    }

    /// CRC32 stored in the last four bytes of the file.
    pub fn trailer_crc32(&self) -> u32 {
        self.trailer_crc32
    }

    /// Human-readable summary of the header fields.
    pub fn describe(&self) -> String {
        let h = &self.header;
        let mut out = String::new();
        let _ = writeln!(out, "Magic: {}", h.magic_str());
        let _ = writeln!(out, "Format Version: {}", h.format_version);
        let _ = writeln!(out, "Target: {}", h.target_name());
        let _ = writeln!(out, "Encoding Type: {}", h.encryption_type());
        let _ = writeln!(out, "Num Pages: {}", h.num_pages);
        let _ = writeln!(out, "Page Size: {}", h.page_size);
        let _ = writeln!(out, "CRC Size: {}", h.crc_size);
        let _ = writeln!(out, "Size of header: {HEADER_SIZE}");
        let _ = write!(out, "CRC32: {:#x}", self.trailer_crc32);
        out
    }
}

impl std::fmt::Debug for MsblImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsblImage")
            .field("header", &self.header)
            .field("pages", &self.pages.len())
            .field("trailer_crc32", &self.trailer_crc32)
            .finish()
    }
}

/// Fill `buf` as far as the source allows; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Render bytes as concatenated uppercase hex, the form `set_iv` and
/// `set_auth` expect.
pub fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}
