//! Script units and the delimiter-driven reader that produces them

use std::io::{self, BufRead};

/// Default unit delimiter line
pub const DEFAULT_DELIMITER: &str = "GO";

/// One statement block of the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    index: u64,
    text: String,
}

impl Unit {
    pub fn new(index: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Zero-based position of the unit in the script
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Raw unit body, delimiter line excluded
    pub fn text(&self) -> &str {
        &self.text
    }

    /// A unit made only of whitespace still counts and is checkpointed, but
    /// contributes nothing to the combined SQL.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Join the non-blank unit texts of a batch into one SQL blob
pub fn combine_units(units: &[Unit]) -> String {
    units
        .iter()
        .filter(|u| !u.is_blank())
        .map(|u| u.text())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads delimiter-separated units from a line-oriented script.
///
/// A line ends a unit when, trimmed and lowercased, it equals the trimmed
/// lowercased delimiter. Each kept line is terminated with `\n` in the
/// returned text regardless of the source line ending.
pub struct UnitReader<R> {
    reader: R,
    delimiter: String,
    include_delimiter: bool,
    line: String,
}

impl<R: BufRead> UnitReader<R> {
    pub fn new(reader: R, delimiter: &str) -> Self {
        Self {
            reader,
            delimiter: delimiter.trim().to_lowercase(),
            include_delimiter: false,
            line: String::new(),
        }
    }

    /// Keep the delimiter line at the end of each unit's text
    pub fn with_delimiter_included(mut self, include: bool) -> Self {
        self.include_delimiter = include;
        self
    }

    /// Read the next unit.
    ///
    /// Returns `Ok(None)` only when the input is exhausted and no line was
    /// read; a unit of blank lines (or a delimiter directly following the
    /// previous one) is `Ok(Some(..))`.
    pub fn read_unit(&mut self) -> io::Result<Option<String>> {
        let mut unit = String::new();
        let mut read_any = false;

        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                break;
            }
            read_any = true;

            let line = self
                .line
                .strip_suffix('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l))
                .unwrap_or(&self.line);

            if line.trim().to_lowercase() == self.delimiter {
                if self.include_delimiter {
                    unit.push_str(line);
                    unit.push('\n');
                }
                return Ok(Some(unit));
            }

            unit.push_str(line);
            unit.push('\n');
        }

        if !read_any && unit.is_empty() {
            return Ok(None);
        }
        Ok(Some(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(script: &str, delimiter: &str) -> Vec<String> {
        let mut reader = UnitReader::new(Cursor::new(script), delimiter);
        let mut units = Vec::new();
        while let Some(unit) = reader.read_unit().expect("in-memory read cannot fail") {
            units.push(unit);
        }
        units
    }

    #[test]
    fn test_splits_on_delimiter_line() {
        let units = read_all("INSERT 1;\nGO\nINSERT 2;\nGO\nINSERT 3;\nGO\n", "GO");
        assert_eq!(units, vec!["INSERT 1;\n", "INSERT 2;\n", "INSERT 3;\n"]);
    }

    #[test]
    fn test_delimiter_is_trimmed_and_case_insensitive() {
        let units = read_all("a\n   go  \nb\r\nGo\r\nc", " GO ");
        assert_eq!(units, vec!["a\n", "b\n", "c\n"]);
    }

    #[test]
    fn test_delimiter_must_match_whole_line() {
        let units = read_all("SELECT 'GO';\nGOTO x\nGO\n", "GO");
        assert_eq!(units, vec!["SELECT 'GO';\nGOTO x\n"]);
    }

    #[test]
    fn test_empty_unit_is_not_end_of_input() {
        let mut reader = UnitReader::new(Cursor::new("GO\n\n\nGO\n"), "GO");
        assert_eq!(reader.read_unit().expect("read"), Some(String::new()));
        assert_eq!(reader.read_unit().expect("read"), Some("\n\n".to_string()));
        assert_eq!(reader.read_unit().expect("read"), None);
        assert_eq!(reader.read_unit().expect("read"), None);
    }

    #[test]
    fn test_trailing_text_without_delimiter() {
        let units = read_all("a\nGO\nb\nc", "GO");
        assert_eq!(units, vec!["a\n", "b\nc\n"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(read_all("", "GO").is_empty());
    }

    #[test]
    fn test_include_delimiter() {
        let mut reader = UnitReader::new(Cursor::new("a\n go\n"), "GO").with_delimiter_included(true);
        assert_eq!(reader.read_unit().expect("read"), Some("a\n go\n".to_string()));
    }

    #[test]
    fn test_combine_skips_blank_units() {
        let units = vec![
            Unit::new(0, "INSERT 1;\n"),
            Unit::new(1, "  \n\n"),
            Unit::new(2, "INSERT 2;\n"),
        ];
        assert_eq!(combine_units(&units), "INSERT 1;\n\nINSERT 2;\n");
        assert!(units[1].is_blank());
        assert_eq!(combine_units(&units[1..2]), "");
    }
}
