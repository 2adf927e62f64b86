use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::error::EngineError;

/// Document input, either already in memory or on disk.
#[derive(Debug, Clone)]
pub enum Source {
    Text(Arc<str>),
    File(PathBuf),
}

/// Size figures used for mode selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub bytes: u64,
    /// Same count `str::lines` would give.
    pub lines: usize,
}

impl Source {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Source::Text(text.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    fn open(path: &Path) -> Result<File, EngineError> {
        File::open(path).map_err(|source| EngineError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Counts bytes and lines, reading files in `batch` sized pieces.
    pub fn measure(&self, batch: usize) -> Result<SourceStats, EngineError> {
        match self {
            Source::Text(text) => Ok(SourceStats {
                bytes: text.len() as u64,
                lines: text.lines().count(),
            }),
            Source::File(path) => {
                let mut file = Self::open(path)?;
                let mut buf = vec![0u8; batch.max(1)];
                let mut stats = SourceStats::default();
                let mut last = None;
                loop {
                    let n = file.read(&mut buf).map_err(|source| EngineError::Read {
                        path: path.clone(),
                        source,
                    })?;
                    if n == 0 {
                        break;
                    }
                    stats.bytes += n as u64;
                    stats.lines += buf[..n].iter().filter(|&&b| b == b'\n').count();
                    last = Some(buf[n - 1]);
                }
                if last.is_some_and(|b| b != b'\n') {
                    stats.lines += 1;
                }
                Ok(stats)
            }
        }
    }

    /// The whole document as one string.
    pub fn read_all(&self) -> Result<Arc<str>, EngineError> {
        match self {
            Source::Text(text) => Ok(Arc::clone(text)),
            Source::File(path) => std::fs::read_to_string(path)
                .map(Arc::from)
                .map_err(|source| EngineError::Read {
                    path: path.clone(),
                    source,
                }),
        }
    }

    /// Lazily yields lines starting at zero-based line `start`.
    pub fn lines_from(&self, start: usize, batch: usize) -> Result<LineReader, EngineError> {
        let mut reader = match self {
            Source::Text(text) => LineReader {
                inner: Inner::Text {
                    text: Arc::clone(text),
                    pos: 0,
                },
            },
            Source::File(path) => LineReader {
                inner: Inner::File {
                    path: path.clone(),
                    reader: BufReader::with_capacity(batch.max(1), Self::open(path)?),
                    buf: String::new(),
                },
            },
        };
        for _ in 0..start {
            match reader.next() {
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err),
                None => break,
            }
        }
        Ok(reader)
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Source::Text(text.into())
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source::Text(text.into())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::File(path)
    }
}

/// Line iterator over a [`Source`], splitting like `str::lines`.
#[derive(Debug)]
pub struct LineReader {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Text { text: Arc<str>, pos: usize },
    File {
        path: PathBuf,
        reader: BufReader<File>,
        buf: String,
    },
}

fn strip_eol(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(line) => line.strip_suffix('\r').unwrap_or(line),
        None => line,
    }
}

impl Iterator for LineReader {
    type Item = Result<String, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Text { text, pos } => {
                if *pos >= text.len() {
                    return None;
                }
                let rest = &text[*pos..];
                let end = rest.find('\n').map_or(rest.len(), |i| i + 1);
                *pos += end;
                Some(Ok(strip_eol(&rest[..end]).to_string()))
            }
            Inner::File { path, reader, buf } => {
                buf.clear();
                match reader.read_line(buf) {
                    Ok(0) => None,
                    Ok(_) => Some(Ok(strip_eol(buf).to_string())),
                    Err(source) => Some(Err(EngineError::Read {
                        path: path.clone(),
                        source,
                    })),
                }
            }
        }
    }
}
