// Roster file decoding and member export

use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;
use log::warn;

use rostersync_recon::MemberRecord;

const DELIMITER_CANDIDATES: [u8; 4] = [b'\t', b';', b',', b'|'];

fn split_line(line: &str, delim: u8) -> Vec<String> {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map(|r| r.iter().map(|f| f.trim().to_string()).collect())
        .unwrap_or_default()
}

/// Pick the field delimiter of a roster file.
///
/// A candidate (tab, semicolon, comma, pipe) that splits the header row into
/// all of `expected_headers` wins outright. Otherwise the candidate with the
/// most consistent field count over the first ten lines wins (more columns
/// break ties). Falls back to `;`.
pub fn sniff_delimiter(content: &str, expected_headers: &[&str]) -> u8 {
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    let sample_lines: Vec<&str> = content.lines().take(10).collect();
    let Some(header) = sample_lines.first() else {
        return b';';
    };

    if !expected_headers.is_empty() {
        for delim in DELIMITER_CANDIDATES {
            let fields = split_line(header, delim);
            if expected_headers.iter().all(|h| fields.iter().any(|f| f == h)) {
                return delim;
            }
        }
    }

    let mut best = b';';
    let mut best_score = 0usize;

    for delim in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| split_line(line, delim).len().max(1))
            .collect();

        // A single-column header means the candidate never occurs there.
        let target = counts[0];
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count();
        let score = consistent * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Look up a WHATWG encoding label ("utf-8", "windows-1252", "latin1", ...).
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, String> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| format!("unknown encoding \"{label}\""))
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let bytes = read_bytes(path)?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Read file in the given encoding. A "utf-8" label keeps the Windows-1252
/// fallback of [`read_file_as_utf8`]; any other label decodes strictly and
/// only warns about replaced bytes.
pub fn read_file_with_encoding(path: &Path, label: &str) -> Result<String, String> {
    let encoding = resolve_encoding(label)?;
    if encoding == encoding_rs::UTF_8 {
        return read_file_as_utf8(path);
    }

    let bytes = read_bytes(path)?;
    let (decoded, used, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(
            "{}: malformed {} sequences replaced with U+FFFD",
            path.display(),
            used.name()
        );
    }
    Ok(decoded.into_owned())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, String> {
    let mut file = std::fs::File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
    Ok(bytes)
}

/// Column order of exported directories; the roster columns first so an
/// export can be fed back into an import.
pub const EXPORT_HEADERS: [&str; 14] = [
    "accountType",
    "studentId",
    "teacherAcronym",
    "firstname",
    "lastname",
    "email",
    "ahv",
    "notice",
    "initialPassword",
    "name",
    "username",
    "disable",
    "dateAdded",
    "tstamp",
];

/// Write member records as delimited text.
pub fn export_members(records: &[MemberRecord], path: &Path, delimiter: u8) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    writer.write_record(EXPORT_HEADERS).map_err(|e| e.to_string())?;

    for r in records {
        let disable = if r.disable { "1" } else { "" };
        let date_added = r.date_added.to_string();
        let tstamp = r.tstamp.to_string();
        writer
            .write_record([
                r.account_type.as_str(),
                r.student_id.as_str(),
                r.teacher_acronym.as_str(),
                r.firstname.as_str(),
                r.lastname.as_str(),
                r.email.as_str(),
                r.ahv.as_str(),
                r.notice.as_str(),
                r.initial_password.as_str(),
                r.name.as_str(),
                r.username.as_deref().unwrap_or(""),
                disable,
                date_added.as_str(),
                tstamp.as_str(),
            ])
            .map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}
