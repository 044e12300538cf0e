//! Input list loading.
//!
//! Two list shapes are supported: plain line lists (`list.txt`, one URL or
//! video ID per line) and CSV lists (`links.csv`) with a header row. Both are
//! read lazily, one entry at a time.

use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::error::{BatchError, BatchResult};

/// A raw entry read from an input list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEntry {
    /// URL or video ID exactly as written (trimmed)
    pub raw: String,

    /// 1-based line number in the source file
    pub line: usize,

    /// Playlist/category name supplied by the list itself (CSV only)
    pub group: Option<String>,
}

impl InputEntry {
    pub fn new(raw: impl Into<String>, line: usize) -> Self {
        Self {
            raw: raw.into(),
            line,
            group: None,
        }
    }
}

/// Column selection for CSV lists
#[derive(Debug, Clone)]
pub struct CsvColumns {
    /// Header of the column holding the URL or ID
    pub url: String,

    /// Header of the optional playlist/category column
    pub group: Option<String>,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            url: "url".to_string(),
            group: Some("playlist".to_string()),
        }
    }
}

/// Opens input lists and picks the reader from the file extension
pub struct InputLoader {
    columns: CsvColumns,
}

impl InputLoader {
    pub fn new(columns: CsvColumns) -> Self {
        Self { columns }
    }

    /// Open a list file, returning a lazy sequence of entries
    pub fn open(&self, path: &Path) -> BatchResult<InputEntries> {
        if !path.exists() {
            return Err(BatchError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        if !path.is_file() {
            return Err(BatchError::Input {
                line: 0,
                reason: format!("{} is not a regular file", path.display()),
            });
        }

        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        tracing::debug!("Opening input list {} (csv: {})", path.display(), is_csv);

        if is_csv {
            CsvEntries::open(path, &self.columns).map(InputEntries::Csv)
        } else {
            LineEntries::open(path).map(InputEntries::Lines)
        }
    }
}

impl Default for InputLoader {
    fn default() -> Self {
        Self::new(CsvColumns::default())
    }
}

/// Lazy iterator over the entries of an input list
pub enum InputEntries {
    Lines(LineEntries),
    Csv(CsvEntries),
}

impl Iterator for InputEntries {
    type Item = BatchResult<InputEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            InputEntries::Lines(lines) => lines.next(),
            InputEntries::Csv(rows) => rows.next(),
        }
    }
}

/// Entries of a plain line list
pub struct LineEntries {
    lines: Lines<BufReader<fs_err::File>>,
    line: usize,
    /// Set after an unrecoverable read error
    done: bool,
}

impl LineEntries {
    fn open(path: &Path) -> BatchResult<Self> {
        let file = fs_err::File::open(path).map_err(|e| BatchError::Input {
            line: 0,
            reason: e.to_string(),
        })?;

        Ok(Self {
            lines: BufReader::new(file).lines(),
            line: 0,
            done: false,
        })
    }
}

impl Iterator for LineEntries {
    type Item = BatchResult<InputEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let next = self.lines.next()?;
            self.line += 1;

            match next {
                Ok(text) => match meaningful_line(&text) {
                    Some(raw) => return Some(Ok(InputEntry::new(raw, self.line))),
                    None => continue,
                },
                Err(e) => {
                    // Invalid UTF-8 only spoils one line; other read errors repeat forever
                    if e.kind() != std::io::ErrorKind::InvalidData {
                        self.done = true;
                    }
                    return Some(Err(BatchError::Input {
                        line: self.line,
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }
}

/// Entries of a CSV list with a header row
pub struct CsvEntries {
    records: csv::StringRecordsIntoIter<fs_err::File>,
    url_index: usize,
    group_index: Option<usize>,
}

impl CsvEntries {
    fn open(path: &Path, columns: &CsvColumns) -> BatchResult<Self> {
        let file = fs_err::File::open(path).map_err(|e| BatchError::Input {
            line: 0,
            reason: e.to_string(),
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| BatchError::Input {
                line: 1,
                reason: e.to_string(),
            })?
            .clone();

        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(name))
        };

        let url_index = find(&columns.url).unwrap_or_else(|| {
            tracing::warn!(
                "CSV column '{}' not found in {}, using the first column",
                columns.url,
                path.display()
            );
            0
        });
        let group_index = columns.group.as_deref().and_then(find);

        Ok(Self {
            records: reader.into_records(),
            url_index,
            group_index,
        })
    }
}

impl Iterator for CsvEntries {
    type Item = BatchResult<InputEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                    return Some(Err(BatchError::Input {
                        line,
                        reason: e.to_string(),
                    }));
                }
            };

            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
            let Some(raw) = record.get(self.url_index).and_then(meaningful_line) else {
                continue;
            };

            let group = self
                .group_index
                .and_then(|index| record.get(index))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);

            return Some(Ok(InputEntry {
                raw: raw.to_string(),
                line,
                group,
            }));
        }
    }
}

/// Trimmed content of a line, or `None` for blank and `#` comment lines
fn meaningful_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        None
    } else {
        Some(trimmed)
    }
}

/// Read every meaningful line of a plain list into memory
pub fn read_line_list(path: &Path) -> BatchResult<Vec<String>> {
    LineEntries::open(path)?
        .map(|entry| entry.map(|entry| entry.raw))
        .collect()
}
