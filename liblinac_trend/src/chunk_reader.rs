use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::error::{ChunkDecodeError, ChunkReaderError};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A run of whole lines from a log file, decoded as text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub first_line: u64, // 1-based number of the first line in the chunk
    pub n_lines: u64,
    pub n_bytes: u64,
    pub text: String,
}

/// ChunkReader walks a log file in line-aligned chunks.
///
/// A chunk is closed at the first line break after `chunk_size_bytes` have been read, so a
/// line is never split between two chunks. The chunk size bounds how much of the file is
/// resident at once.
#[derive(Debug)]
pub struct ChunkReader {
    reader: BufReader<File>,
    path: PathBuf,
    chunk_size_bytes: usize,
    next_line: u64,
    next_index: usize,
    bytes_read: u64,
    total_size_bytes: u64,
    is_ended: bool,
}

impl ChunkReader {
    /// Open a log file for chunked reading
    pub fn new(path: &Path, chunk_size_bytes: usize) -> Result<Self, ChunkReaderError> {
        if !path.exists() {
            return Err(ChunkReaderError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let total_size_bytes = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            path: path.to_path_buf(),
            chunk_size_bytes: chunk_size_bytes.max(1),
            next_line: 1,
            next_index: 0,
            bytes_read: 0,
            total_size_bytes,
            is_ended: false,
        })
    }

    /// Get the next chunk in the file
    ///
    /// Returns a `Result<Option<Chunk>>`. The Option is None once the file is exhausted.
    pub fn get_next_chunk(&mut self) -> Result<Option<Chunk>, ChunkReaderError> {
        if self.is_ended {
            return Ok(None);
        }

        let mut buffer: Vec<u8> = Vec::with_capacity(self.chunk_size_bytes);
        let mut n_lines: u64 = 0;
        loop {
            let n = self.reader.read_until(b'\n', &mut buffer)?;
            if n == 0 {
                self.is_ended = true;
                break;
            }
            n_lines += 1;
            if buffer.len() >= self.chunk_size_bytes {
                break;
            }
        }

        if n_lines == 0 {
            return Ok(None);
        }

        let first_line = self.next_line;
        let n_bytes = buffer.len() as u64;
        self.next_line += n_lines;
        self.bytes_read += n_bytes;

        let text = String::from_utf8(buffer).map_err(|e| ChunkDecodeError {
            first_line,
            source: e.utf8_error(),
        })?;

        let chunk = Chunk {
            index: self.next_index,
            first_line,
            n_lines,
            n_bytes,
            text,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    /// Size of the file on disk
    pub fn get_total_data_size(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn get_lines_read(&self) -> u64 {
        self.next_line - 1
    }

    pub fn is_ended(&self) -> bool {
        self.is_ended
    }
}
