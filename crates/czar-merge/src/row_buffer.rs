//! Lazy row-byte source over one result envelope
//!
//! The engine's bulk loader pulls bytes as if from a file. A
//! [`RowBuffer`] owns the rows of one envelope and renders them on
//! demand in the loader's text format: tab-separated cells, `\N` for
//! NULL, newline-terminated rows, with tab, newline and backslash
//! escaped inside cells.

use czar_core::Row;
use czar_proto::ResultEnvelope;

/// Pull-style byte source over the rows of one result envelope.
#[derive(Debug)]
pub struct RowBuffer {
    rows: std::vec::IntoIter<Row>,
    pending: Vec<u8>,
    pos: usize,
}

impl RowBuffer {
    /// Take ownership of an envelope's rows.
    pub fn new(envelope: ResultEnvelope) -> Self {
        Self {
            rows: envelope.rows.into_iter(),
            pending: Vec::new(),
            pos: 0,
        }
    }

    /// Fill `dst` with the next row bytes; returns the number of bytes
    /// written, 0 once the buffer is exhausted.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut written = 0;
        while written < dst.len() {
            if self.pos == self.pending.len() {
                match self.rows.next() {
                    Some(row) => {
                        self.pending.clear();
                        self.pos = 0;
                        encode_row(&row, &mut self.pending);
                    }
                    None => break,
                }
            }
            let n = (dst.len() - written).min(self.pending.len() - self.pos);
            dst[written..written + n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }
        written
    }

    /// Drain the remaining bytes; used by engines that materialize the
    /// virtual file instead of streaming it.
    pub fn read_to_end(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = self.read(&mut chunk);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }
}

fn encode_row(row: &Row, out: &mut Vec<u8>) {
    for (i, cell) in row.cells().iter().enumerate() {
        if i > 0 {
            out.push(b'\t');
        }
        match cell {
            None => out.extend_from_slice(b"\\N"),
            Some(bytes) => {
                for &b in bytes {
                    match b {
                        b'\t' => out.extend_from_slice(b"\\\t"),
                        b'\n' => out.extend_from_slice(b"\\\n"),
                        b'\\' => out.extend_from_slice(b"\\\\"),
                        _ => out.push(b),
                    }
                }
            }
        }
    }
    out.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use czar_core::{ColumnSchema, RowSchema, SessionId};

    fn envelope(rows: Vec<Row>) -> ResultEnvelope {
        let schema = RowSchema::new(vec![
            ColumnSchema::new("id", "INT"),
            ColumnSchema::new("v", "DOUBLE"),
        ]);
        ResultEnvelope::new(SessionId::new(), schema, rows)
    }

    #[test]
    fn test_rows_render_in_order() {
        let mut buffer = RowBuffer::new(envelope(vec![
            Row::from_text(&[Some("1"), Some("1.5")]),
            Row::from_text(&[Some("2"), Some("2.5")]),
        ]));
        assert_eq!(buffer.read_to_end(), b"1\t1.5\n2\t2.5\n");
    }

    #[test]
    fn test_null_renders_as_escape() {
        let mut buffer = RowBuffer::new(envelope(vec![Row::from_text(&[None, Some("2.5")])]));
        assert_eq!(buffer.read_to_end(), b"\\N\t2.5\n");
    }

    #[test]
    fn test_special_bytes_escaped() {
        let mut buffer = RowBuffer::new(envelope(vec![Row::new(vec![
            Some(b"a\tb".to_vec()),
            Some(b"c\\d\ne".to_vec()),
        ])]));
        assert_eq!(buffer.read_to_end(), b"a\\\tb\tc\\\\d\\\ne\n");
    }

    #[test]
    fn test_small_destination_windows() {
        let mut buffer = RowBuffer::new(envelope(vec![
            Row::from_text(&[Some("1"), Some("1.5")]),
            Row::from_text(&[Some("2"), Some("2.5")]),
        ]));
        let mut out = Vec::new();
        let mut dst = [0u8; 3];
        loop {
            let n = buffer.read(&mut dst);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&dst[..n]);
        }
        assert_eq!(out, b"1\t1.5\n2\t2.5\n");
    }

    #[test]
    fn test_exhausted_buffer_reads_zero() {
        let mut buffer = RowBuffer::new(envelope(vec![]));
        let mut dst = [0u8; 16];
        assert_eq!(buffer.read(&mut dst), 0);
        assert_eq!(buffer.read(&mut dst), 0);
    }
}
