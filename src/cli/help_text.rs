pub(super) const ROOT_LONG_ABOUT: &str = "\
Checksum a tree of files into a manifest, or verify a tree against one

Treesum records a checksum and size for every regular file under a directory in a
plain text manifest, and later re-checks the tree against that manifest. Files that
changed or disappeared are written to a residual manifest so they can be dealt with.

CORE CONCEPTS:

  Manifest:
    A UTF-8 text file with one line per file:

      <relative path>|<checksum>|<size in bytes>

    Paths use '/' as separator on every platform. Lines starting with '#' are
    comments: a header naming the scanned directory and a footer with the file
    count and elapsed time (HH:MM:SS:mmm).

  Verification outcomes:
    - OK:   the file exists and both checksum and size match
    - DIFF: the file exists but its checksum and/or size changed
    - NONE: the file no longer exists

  Residual manifest:
    Verification writes VERIFY_<FILE> to the current directory. It lists one
    '<path>|<checksum>|<size>' line per DIFF file (with the *new* checksum and
    size) and one bare '<path>' line per NONE file. OK files are not listed.
    The footer counts every record that was checked.

TYPICAL WORKFLOW:

  1. Record the state of a tree:
     $ treesum --scan --path /data/photos --file photos.txt

  2. Later, check it:
     $ treesum --verify --path /data/photos --file photos.txt

  3. Inspect VERIFY_photos.txt for anything that changed or went missing.

CHECKSUM ALGORITHMS:

  crc32c (default)
    CRC-32C (Castagnoli), 8 hex characters. Fast; detects accidental corruption.

  sha256
    SHA-256, 64 hex characters.

  xxh32
    xxHash32, 8 hex characters.

  The baseline manifest format does not say which algorithm produced it, so
  scan and verify must be run with the same --algorithm. Manifests written with
  a non-default algorithm carry an extra '# Algorithm: <name>' header line and
  verification warns when it does not match.
";

pub(super) const ROOT_AFTER_LONG_HELP: &str = "\
EXIT CODES:

  0    Scan finished, or verification found every file OK
  1    Verification finished and found DIFF or NONE files
  2    Neither or both of --scan and --verify were given
  255  Any other error (directory or manifest not found, malformed manifest
       line, unreadable file, ...). No output file is written in that case.

NOTES:

  - Re-running verification with a manifest of the same file name overwrites
    the previous VERIFY_<FILE>.
  - When the manifest is written inside the scanned directory it is not
    recorded in itself.
  - Symlinks are neither followed nor recorded.
";
