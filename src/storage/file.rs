use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::contracts::{CounterStore, Counters, StoreError};

/// Directory under the user's home holding the counters file.
const STORE_DIR: &str = ".idgenerator";
/// File name of the counters file.
const STORE_FILE: &str = "counters.properties";
/// Comment written on the first line of every saved file.
const HEADER: &str = "# Id Generator Counters - DO NOT EDIT MANUALLY";

/// Counter store backed by a flat `key=value` text file.
///
/// Saves go through a temporary file in the same directory that is
/// renamed over the target, so the file is always either the previous
/// or the new mapping.
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    /// Creates a store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at `<home>/.idgenerator/counters.properties`.
    pub fn default_location() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or_else(|| {
            StoreError::StorageUnavailable("could not determine home directory".into())
        })?;
        Ok(Self::new(home.join(STORE_DIR).join(STORE_FILE)))
    }

    fn ensure_parent_dir(&self) -> Result<&Path, StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| {
            StoreError::StorageUnavailable(format!(
                "could not create directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(dir)
    }
}

impl CounterStore for FileCounterStore {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<Counters, StoreError> {
        if !self.exists() {
            return Ok(Counters::new());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Io(format!("{}: {}", self.path.display(), e)))?;
        parse(&contents)
    }

    fn save(&self, counters: &Counters) -> Result<(), StoreError> {
        let dir = self.ensure_parent_dir()?;
        let unavailable = |e: std::io::Error| {
            StoreError::StorageUnavailable(format!("{}: {}", self.path.display(), e))
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(unavailable)?;
        temp.write_all(render(counters).as_bytes()).map_err(unavailable)?;
        temp.as_file().sync_all().map_err(unavailable)?;
        temp.persist(&self.path).map_err(|e| unavailable(e.error))?;

        // The rename is only durable once the directory entry is flushed
        #[cfg(unix)]
        fs::File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(unavailable)?;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Renders the mapping as a header line followed by one `key=value` line
/// per namespace.
pub(crate) fn render(counters: &Counters) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + counters.len() * 16);
    out.push_str(HEADER);
    out.push('\n');
    for (key, value) in counters {
        escape_key(key, &mut out);
        out.push('=');
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out
}

/// Parses the text format written by [`render`]. Comment lines (`#` or `!`)
/// and blank lines are skipped.
pub(crate) fn parse(contents: &str) -> Result<Counters, StoreError> {
    let mut counters = Counters::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim_start_matches(is_blank);
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = split_entry(line).map_err(|reason| StoreError::CorruptData {
            line: idx + 1,
            reason: format!("{} in {:?}", reason, raw),
        })?;
        let value = value.trim_matches(is_blank);
        let parsed = value.parse::<i64>().map_err(|e| StoreError::CorruptData {
            line: idx + 1,
            reason: format!("value {:?} for {:?} is not an integer: {}", value, key, e),
        })?;
        counters.insert(key, parsed);
    }
    Ok(counters)
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn escape_key(key: &str, out: &mut String) {
    for c in key.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0c' => out.push_str("\\f"),
            '\\' | '=' | ':' | '#' | '!' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
}

/// Splits a line into its unescaped key and the raw value text.
///
/// The key ends at the first unescaped `=`, `:` or blank. Blanks after the
/// key may be followed by one `=` or `:`. Key escapes include `\uXXXX`,
/// with surrogate pairs for characters outside the BMP.
fn split_entry(line: &str) -> Result<(String, &str), String> {
    let mut key = String::new();
    let mut chars = line.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next().ok_or("dangling escape")?;
                key.push(match escaped {
                    'u' => decode_unicode_escape(&mut chars)?,
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    'f' => '\x0c',
                    other => other,
                });
            }
            '=' | ':' => return Ok((key, &line[idx + 1..])),
            c if is_blank(c) => {
                let rest = line[idx..].trim_start_matches(is_blank);
                let rest = rest.strip_prefix(|c: char| c == '=' || c == ':').unwrap_or(rest);
                return Ok((key, rest));
            }
            _ => key.push(c),
        }
    }
    Err("missing separator".into())
}

/// Decodes the `XXXX` of a `\uXXXX` escape, consuming a second escape
/// when the first one is a high surrogate.
fn decode_unicode_escape(
    chars: &mut impl Iterator<Item = (usize, char)>,
) -> Result<char, String> {
    let unit = read_hex4(chars)?;
    if !(0xD800..0xDC00).contains(&unit) {
        return char::from_u32(u32::from(unit))
            .ok_or_else(|| format!("unpaired surrogate \\u{:04X}", unit));
    }
    match (chars.next(), chars.next()) {
        (Some((_, '\\')), Some((_, 'u'))) => {}
        _ => return Err(format!("unpaired surrogate \\u{:04X}", unit)),
    }
    let low = read_hex4(chars)?;
    char::decode_utf16([unit, low])
        .next()
        .and_then(|decoded| decoded.ok())
        .ok_or_else(|| format!("invalid surrogate pair \\u{:04X}\\u{:04X}", unit, low))
}

fn read_hex4(chars: &mut impl Iterator<Item = (usize, char)>) -> Result<u16, String> {
    let mut unit: u16 = 0;
    for _ in 0..4 {
        let (_, c) = chars.next().ok_or("truncated \\u escape")?;
        let digit = c
            .to_digit(16)
            .ok_or_else(|| format!("invalid hex digit {:?} in \\u escape", c))?;
        unit = unit * 16 + digit as u16;
    }
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(entries: &[(&str, i64)]) -> Counters {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCounterStore::new(dir.path().join("counters.properties"));

        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_returns_same_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCounterStore::new(dir.path().join("counters.properties"));
        let saved = counters(&[("default", 5), ("USER", 10), ("ORDER", 3)]);

        store.save(&saved).unwrap();

        assert!(store.exists());
        assert_eq!(store.load().unwrap(), saved);
    }

    #[test]
    fn save_overwrites_previous_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCounterStore::new(dir.path().join("counters.properties"));

        store.save(&counters(&[("USER", 5), ("STALE", 1)])).unwrap();
        store.save(&counters(&[("USER", 10), ("ORDER", 3)])).unwrap();

        assert_eq!(
            store.load().unwrap(),
            counters(&[("USER", 10), ("ORDER", 3)])
        );
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("counters.properties");
        let store = FileCounterStore::new(&path);

        store.save(&counters(&[("default", 0)])).unwrap();

        assert!(path.is_file());
    }

    #[test]
    fn save_leaves_no_temporary_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCounterStore::new(dir.path().join("counters.properties"));

        for i in 0..5 {
            store.save(&counters(&[("USER", i)])).unwrap();
        }

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn save_fails_when_directory_cannot_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = FileCounterStore::new(blocker.join("counters.properties"));

        let err = store.save(&counters(&[("USER", 1)])).unwrap_err();

        assert!(matches!(err, StoreError::StorageUnavailable(_)), "{err}");
    }

    #[test]
    fn saved_file_has_header_and_sorted_lines() {
        let text = render(&counters(&[("USER", 1), ("ORDER", 0), ("default", -1)]));

        assert_eq!(text, format!("{HEADER}\nORDER=0\nUSER=1\ndefault=-1\n"));
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let text = "#Id Generator Counters\n! legacy comment\n\n  USER = 7\nORDER:2\n";

        assert_eq!(parse(text).unwrap(), counters(&[("USER", 7), ("ORDER", 2)]));
    }

    #[test]
    fn parse_rejects_non_integer_value() {
        let err = parse("# header\nUSER=abc\n").unwrap_err();

        match err {
            StoreError::CorruptData { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_rejects_line_without_separator() {
        let err = parse("USER\n").unwrap_err();

        assert!(matches!(err, StoreError::CorruptData { line: 1, .. }));
    }

    #[test]
    fn parse_decodes_unicode_escapes() {
        let text = "#Id Generator Counters\nCAF\\u00C9=3\n\\u65e5\\u672c=1\nEMOJI\\uD83D\\uDE00=2\n";

        let parsed = parse(text).unwrap();

        assert_eq!(
            parsed,
            counters(&[("CAF\u{c9}", 3), ("\u{65e5}\u{672c}", 1), ("EMOJI\u{1f600}", 2)])
        );
    }

    #[test]
    fn parse_rejects_malformed_unicode_escapes() {
        for text in [
            "BAD\\u00G1=1\n",
            "SHORT\\u00=1\n",
            "LONE\\uD83D=1\n",
            "LOW\\uDE00=1\n",
            "PAIR\\uD83D\\u0041=1\n",
        ] {
            let err = parse(text).unwrap_err();
            assert!(matches!(err, StoreError::CorruptData { line: 1, .. }), "{text:?}: {err}");
        }
    }

    #[test]
    fn parse_accepts_whitespace_separator() {
        let text = "USER 7\nORDER\t\t2\nINVOICE   :  9\nKEY\\ WITH\\ SPACE 4\n";

        assert_eq!(
            parse(text).unwrap(),
            counters(&[("USER", 7), ("ORDER", 2), ("INVOICE", 9), ("KEY WITH SPACE", 4)])
        );
    }

    #[test]
    fn parse_rejects_out_of_range_value() {
        let err = parse("USER=99999999999999999999\n").unwrap_err();

        assert!(matches!(err, StoreError::CorruptData { .. }));
    }

    #[test]
    fn special_characters_in_keys_round_trip() {
        let original = counters(&[
            ("USER_ADMIN", 5),
            ("ORDER-2024", 10),
            ("PRODUCT.V2", 3),
            ("a=b:c", 1),
            ("#hash", 2),
            (" padded ", 4),
            ("back\\slash", 6),
            ("multi\nline\r\ttab", 7),
        ]);

        assert_eq!(parse(&render(&original)).unwrap(), original);
    }

    #[test]
    fn extreme_values_round_trip() {
        let original = counters(&[("MAX", i64::MAX), ("MIN", i64::MIN), ("ZERO", 0)]);

        assert_eq!(parse(&render(&original)).unwrap(), original);
    }
}
