//! The line-based manifest format shared by scan and verify.
//!
//! ```text
//! # Checksum for <root>
//! # ===================================
//! <relative path>|<hex digest>|<size in bytes>
//! # ===================================
//! # Done <N> files in <HH:MM:SS:mmm>.
//! ```
//!
//! Lines starting with `#` are comments and never contribute records. Record
//! lines are split from the right, so a `|` inside a path survives a round
//! trip. Files are UTF-8 without a byte-order mark.

use crate::digest::DigestAlgorithm;
use crate::util::elapsed::format_elapsed;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const COMMENT_PREFIX: char = '#';
const FIELD_SEPARATOR: char = '|';
const SEPARATOR_LINE: &str = "# ===================================";
const ALGORITHM_PREFIX: &str = "# Algorithm:";
const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Manifest is not valid UTF-8: {0}")]
    InvalidUtf8(PathBuf),
    #[error("Malformed record on line {line_number}: {line:?}")]
    MalformedRecord { line_number: usize, line: String },
    #[error("Path cannot be stored in a manifest: {0:?}")]
    InvalidRecordPath(String),
}

/// One file's entry in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    relative_path: String,
    digest: String,
    size: u64,
}

impl ManifestRecord {
    /// Creates a record, rejecting paths the line format cannot represent
    /// (empty, starting with `#`, containing line breaks) and paths that do not
    /// stay below the scan root (absolute, or with empty, `.` or `..` parts).
    pub fn new(
        relative_path: impl Into<String>,
        digest: impl Into<String>,
        size: u64,
    ) -> Result<Self, ManifestError> {
        let relative_path = relative_path.into();
        validate_relative_path(&relative_path)?;

        Ok(ManifestRecord {
            relative_path,
            digest: digest.into(),
            size,
        })
    }

    /// Forward-slash separated path relative to the scan root.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl fmt::Display for ManifestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.relative_path, self.digest, self.size
        )
    }
}

pub fn validate_relative_path(relative_path: &str) -> Result<(), ManifestError> {
    if relative_path.is_empty()
        || relative_path.starts_with(COMMENT_PREFIX)
        || relative_path.contains(['\n', '\r'])
        || relative_path
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(ManifestError::InvalidRecordPath(relative_path.to_string()));
    }
    Ok(())
}

/// What a single manifest line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    Comment(String),
    Blank,
    Record(ManifestRecord),
}

/// Parses one line. `line_number` is 1-based and only used for error reporting.
pub fn parse_line(line: &str, line_number: usize) -> Result<ManifestLine, ManifestError> {
    if line.starts_with(COMMENT_PREFIX) {
        return Ok(ManifestLine::Comment(line.to_string()));
    }
    if line.is_empty() {
        return Ok(ManifestLine::Blank);
    }

    let malformed = || ManifestError::MalformedRecord {
        line_number,
        line: line.to_string(),
    };

    let mut fields = line.rsplitn(3, FIELD_SEPARATOR);
    let (Some(size), Some(digest), Some(relative_path)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed());
    };

    if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let size: u64 = size.parse().map_err(|_| malformed())?;

    let record = ManifestRecord::new(relative_path, digest, size).map_err(|_| malformed())?;
    Ok(ManifestLine::Record(record))
}

/// Which operation produced a manifest; decides the header title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Checksum,
    Verification,
}

impl ManifestKind {
    fn title(self) -> &'static str {
        match self {
            ManifestKind::Checksum => "Checksum",
            ManifestKind::Verification => "Verification",
        }
    }
}

/// Header comment lines, each newline terminated.
///
/// The default algorithm produces exactly a title line and a separator line.
/// Any other algorithm additionally records itself so verification can warn
/// about a mismatch.
pub fn serialize_header(kind: ManifestKind, root: &Path, algorithm: DigestAlgorithm) -> String {
    let mut header = format!("{COMMENT_PREFIX} {} for {}\n", kind.title(), root.display());
    if algorithm != DigestAlgorithm::default() {
        header.push_str(&format!("{ALGORITHM_PREFIX} {algorithm}\n"));
    }
    header.push_str(SEPARATOR_LINE);
    header.push('\n');
    header
}

pub fn serialize_record(record: &ManifestRecord) -> String {
    record.to_string()
}

pub fn serialize_footer(count: usize, elapsed: Duration) -> String {
    format!(
        "{SEPARATOR_LINE}\n{COMMENT_PREFIX} Done {count} files in {}.\n",
        format_elapsed(elapsed)
    )
}

/// A parsed manifest: its records in file order plus the optional algorithm
/// header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub records: Vec<ManifestRecord>,
    /// Algorithm named by an `# Algorithm:` header, if present and known.
    pub algorithm: Option<DigestAlgorithm>,
}

impl Manifest {
    /// Parses manifest text. Fails on the first malformed record line.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let content = content.strip_prefix(BYTE_ORDER_MARK).unwrap_or(content);

        let mut records = Vec::new();
        let mut algorithm = None;

        for (index, line) in content.lines().enumerate() {
            match parse_line(line, index + 1)? {
                ManifestLine::Record(record) => records.push(record),
                ManifestLine::Comment(comment) => {
                    if let Some(name) = comment.strip_prefix(ALGORITHM_PREFIX) {
                        algorithm = DigestAlgorithm::from_name(name);
                    }
                }
                ManifestLine::Blank => {}
            }
        }

        Ok(Manifest { records, algorithm })
    }

    /// Load a manifest from the filesystem
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                ManifestError::PermissionDenied(path.to_path_buf())
            }
            std::io::ErrorKind::InvalidData => ManifestError::InvalidUtf8(path.to_path_buf()),
            _ => ManifestError::Io(e),
        })?;

        Self::parse(&content)
    }
}

/// Accumulates manifest text: header, body lines, footer.
pub struct ManifestBuilder {
    content: String,
}

impl ManifestBuilder {
    pub fn new(kind: ManifestKind, root: &Path, algorithm: DigestAlgorithm) -> Self {
        ManifestBuilder {
            content: serialize_header(kind, root, algorithm),
        }
    }

    pub fn push_record(&mut self, record: &ManifestRecord) {
        self.content.push_str(&serialize_record(record));
        self.content.push('\n');
    }

    /// Adds a bare path line, used for files that no longer exist.
    pub fn push_missing(&mut self, relative_path: &str) {
        self.content.push_str(relative_path);
        self.content.push('\n');
    }

    pub fn finish(mut self, count: usize, elapsed: Duration) -> String {
        self.content.push_str(&serialize_footer(count, elapsed));
        self.content
    }
}

/// Write manifest text to the filesystem atomically, replacing any existing file.
///
/// Writes to a temporary file, fsyncs it, then atomically renames it into place.
/// The text is written as-is: UTF-8, no byte-order mark.
pub fn write_manifest(path: &Path, content: &str) -> Result<(), ManifestError> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ManifestError::PermissionDenied(parent.to_path_buf())
        } else {
            ManifestError::Io(e)
        }
    })?;

    temp_file.write_all(content.as_bytes()).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ManifestError::PermissionDenied(path.to_path_buf())
        } else {
            ManifestError::Io(e)
        }
    })?;

    temp_file.as_file().sync_all().map_err(ManifestError::Io)?;

    temp_file.persist(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::PermissionDenied {
            ManifestError::PermissionDenied(path.to_path_buf())
        } else {
            ManifestError::Io(e.error)
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str, digest: &str, size: u64) -> ManifestRecord {
        ManifestRecord::new(path, digest, size).unwrap()
    }

    #[test]
    fn test_serialize_record() {
        assert_eq!(
            serialize_record(&record("sub/b.bin", "00000000", 0)),
            "sub/b.bin|00000000|0"
        );
    }

    #[test]
    fn test_header_for_default_algorithm_has_two_lines() {
        let header = serialize_header(
            ManifestKind::Checksum,
            Path::new("/data/photos"),
            DigestAlgorithm::Crc32c,
        );
        assert_eq!(
            header,
            "# Checksum for /data/photos\n# ===================================\n"
        );
    }

    #[test]
    fn test_header_records_non_default_algorithm() {
        let header = serialize_header(
            ManifestKind::Verification,
            Path::new("/data"),
            DigestAlgorithm::Sha256,
        );
        assert_eq!(
            header,
            "# Verification for /data\n# Algorithm: sha256\n# ===================================\n"
        );
    }

    #[test]
    fn test_footer() {
        let footer = serialize_footer(2, Duration::from_millis(61_005));
        assert_eq!(
            footer,
            "# ===================================\n# Done 2 files in 00:01:01:005.\n"
        );
    }

    #[test]
    fn test_parse_record_line() {
        let line = parse_line("a.txt|92C80A31|4", 3).unwrap();
        assert_eq!(line, ManifestLine::Record(record("a.txt", "92C80A31", 4)));
    }

    #[test]
    fn test_parse_comment_line() {
        let line = parse_line("# Done 2 files in 00:00:00:001.", 1).unwrap();
        assert!(matches!(line, ManifestLine::Comment(_)));

        // Only the first character decides.
        let line = parse_line("#a|B|1", 1).unwrap();
        assert!(matches!(line, ManifestLine::Comment(_)));
    }

    #[test]
    fn test_parse_path_containing_separator() {
        let line = parse_line("odd|name.txt|92C80A31|4", 1).unwrap();
        match line {
            ManifestLine::Record(record) => {
                assert_eq!(record.relative_path(), "odd|name.txt");
                assert_eq!(record.digest(), "92C80A31");
                assert_eq!(record.size(), 4);
            }
            other => panic!("Expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_too_few_fields_is_malformed() {
        for (line_number, line) in [(5, "just-a-path"), (6, "a.txt|92C80A31")] {
            match parse_line(line, line_number) {
                Err(ManifestError::MalformedRecord {
                    line_number: reported,
                    line: text,
                }) => {
                    assert_eq!(reported, line_number);
                    assert_eq!(text, line);
                }
                other => panic!("Expected MalformedRecord, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_rejects_bad_fields() {
        for line in [
            "a.txt|92C80A31|four",
            "a.txt|92C80A31|-4",
            "a.txt|92C80A31|",
            "a.txt||4",
            "a.txt|not-hex|4",
            "|92C80A31|4",
            "a.txt|92C80A31|4 ",
        ] {
            assert!(
                matches!(
                    parse_line(line, 1),
                    Err(ManifestError::MalformedRecord { .. })
                ),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_record_rejects_unrepresentable_paths() {
        for path in ["", "#notes.txt", "a\nb", "a\rb"] {
            assert!(matches!(
                ManifestRecord::new(path, "00000000", 0),
                Err(ManifestError::InvalidRecordPath(_))
            ));
        }
        // A '#' later in the path is fine.
        assert!(ManifestRecord::new("dir/#notes.txt", "00000000", 0).is_ok());
    }

    #[test]
    fn test_record_rejects_paths_leaving_the_root() {
        for path in [
            "../outside.txt",
            "sub/../../outside.txt",
            "/etc/hostname",
            "./a.txt",
            "sub//b.bin",
            "sub/",
        ] {
            assert!(
                matches!(
                    ManifestRecord::new(path, "00000000", 0),
                    Err(ManifestError::InvalidRecordPath(_))
                ),
                "{path:?} should be rejected"
            );
        }
        assert!(ManifestRecord::new("..hidden/a.txt", "00000000", 0).is_ok());
    }

    #[test]
    fn test_parse_path_leaving_the_root_is_malformed() {
        for line in ["../outside.txt|92C80A31|4", "/etc/hostname|00000000|0"] {
            assert!(
                matches!(
                    parse_line(line, 7),
                    Err(ManifestError::MalformedRecord { line_number: 7, .. })
                ),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_manifest_skips_comments_and_blank_lines() {
        let content = "\
# Checksum for /data
# ===================================
a.txt|92C80A31|4

sub/b.bin|00000000|0
# ===================================
# Done 2 files in 00:00:00:001.
";
        let manifest = Manifest::parse(content).unwrap();
        assert_eq!(
            manifest.records,
            vec![record("a.txt", "92C80A31", 4), record("sub/b.bin", "00000000", 0)]
        );
        assert_eq!(manifest.algorithm, None);
    }

    #[test]
    fn test_parse_manifest_reads_algorithm_header() {
        let content = "# Checksum for /data\n# Algorithm: xxh32\n# ===\n";
        let manifest = Manifest::parse(content).unwrap();
        assert_eq!(manifest.algorithm, Some(DigestAlgorithm::Xxh32));
        assert!(manifest.records.is_empty());
    }

    #[test]
    fn test_parse_manifest_accepts_crlf_and_bom() {
        let content = "\u{feff}# Checksum for C:\\data\r\na.txt|92C80A31|4\r\n";
        let manifest = Manifest::parse(content).unwrap();
        assert_eq!(manifest.records, vec![record("a.txt", "92C80A31", 4)]);
    }

    #[test]
    fn test_parse_manifest_reports_line_number() {
        let content = "# header\na.txt|92C80A31|4\nbroken\n";
        match Manifest::parse(content) {
            Err(ManifestError::MalformedRecord { line_number, .. }) => {
                assert_eq!(line_number, 3)
            }
            other => panic!("Expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_reserialized_records_are_byte_identical() {
        let body = [
            "a.txt|92C80A31|4",
            "sub/b.bin|00000000|0",
            "odd|name|EF688C50|123456789012",
            "spaces in name.txt|0A0B0C0D|7",
        ];
        let content = format!("# header\n{}\n# footer\n", body.join("\n"));

        let manifest = Manifest::parse(&content).unwrap();
        let reserialized: Vec<String> = manifest.records.iter().map(serialize_record).collect();

        assert_eq!(reserialized, body);
    }

    #[test]
    fn test_builder_output() {
        let mut builder =
            ManifestBuilder::new(ManifestKind::Verification, Path::new("/r"), DigestAlgorithm::Crc32c);
        builder.push_record(&record("a.txt", "EF688C50", 4));
        builder.push_missing("sub/b.bin");
        let content = builder.finish(2, Duration::from_millis(7));

        assert_eq!(
            content,
            "\
# Verification for /r
# ===================================
a.txt|EF688C50|4
sub/b.bin
# ===================================
# Done 2 files in 00:00:00:007.
"
        );
    }

    #[test]
    fn test_write_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checksum.txt");

        let mut builder =
            ManifestBuilder::new(ManifestKind::Checksum, temp.path(), DigestAlgorithm::Sha256);
        builder.push_record(&record("Ünïcode.txt", "AB", 2));
        write_manifest(&path, &builder.finish(1, Duration::ZERO)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(!bytes.starts_with(&[0xEF, 0xBB, 0xBF]), "no BOM expected");

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded.records, vec![record("Ünïcode.txt", "AB", 2)]);
        assert_eq!(loaded.algorithm, Some(DigestAlgorithm::Sha256));
    }

    #[test]
    fn test_write_overwrites_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checksum.txt");
        std::fs::write(&path, "old content that is much longer than the new one").unwrap();

        write_manifest(&path, "# new\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# new\n");
    }

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checksum.txt");
        std::fs::write(&path, [b'a', 0xFF, b'|', b'0', b'|', b'1']).unwrap();

        assert!(matches!(
            Manifest::load(&path),
            Err(ManifestError::InvalidUtf8(_))
        ));
    }
}
