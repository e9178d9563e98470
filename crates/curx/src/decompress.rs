//! 🫁 Streaming Decompressor: gzip bytes in, CSV lines out, one chunk at a time.
//!
//! 🎬 COLD OPEN. EXT. S3 BUCKET. NIGHT.
//!
//! The report is 4 GB uncompressed. The Lambda-sized box we run on has opinions
//! about 4 GB. So we never hold the whole thing: we pull a small compressed chunk,
//! inflate it, carve off every complete line we can find, and keep the leftover
//! half-line around until the next chunk finishes its sentence.
//!
//! 🧠 Knowledge graph:
//! - Source: any `AsyncRead` (the S3 `ByteStream`, an in-memory slice in tests)
//! - Decoder: `flate2::write::GzDecoder<Vec<u8>>` fed chunk by chunk, output drained into `pending`
//! - Cursor: `take_line()` answers `Line` or `NeedMoreData`. No exceptions-as-control-flow here.
//! - Consumers: `orchestrator` via `next_line()`, the bench via `into_lines()`
//!
//! ⚠️ A delimiter split across two chunks is the normal case, not an edge case. 🦆

use std::io::Write;

use flate2::write::GzDecoder;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{trace, warn};

/// 📏 Compressed bytes pulled from the source per refill.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

const LINE_DELIMITER: u8 = b'\n';

/// 💀 Everything that can go wrong between "bytes" and "lines".
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not gzip, corrupt deflate data, or the stream ended before the gzip trailer.
    #[error("report payload is not valid gzip (or was truncated)")]
    Gzip {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read the compressed report stream")]
    Read {
        #[source]
        source: std::io::Error,
    },
    #[error("line {line_number} of the report is not valid UTF-8")]
    Utf8 {
        line_number: u64,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("report is empty: expected a CSV header line")]
    MissingHeader,
}

/// 🎯 The answer to "got a line for me?"
enum Cursor {
    Line(Vec<u8>),
    NeedMoreData,
}

/// 📖 Lazily inflates a gzip report and hands out lines.
///
/// The header line is read eagerly by [`ReportLineReader::open`]. After that the
/// reader is forward-only and single-pass. It ends when the source is exhausted
/// and nothing is left buffered.
pub struct ReportLineReader<R> {
    source: R,
    // 🫁 `None` once the gzip trailer has been verified
    decoder: Option<GzDecoder<Vec<u8>>>,
    // 📦 inflated bytes; everything before `pending_start` was already handed out
    pending: Vec<u8>,
    pending_start: usize,
    chunk: Vec<u8>,
    header_line: String,
    lines_read: u64,
    compressed_bytes_read: u64,
}

impl<R> std::fmt::Debug for ReportLineReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportLineReader")
            .field("header_line", &self.header_line)
            .field("lines_read", &self.lines_read)
            .field("compressed_bytes_read", &self.compressed_bytes_read)
            .finish()
    }
}

impl<R: AsyncRead + Unpin> ReportLineReader<R> {
    /// 🚀 Wrap `source` and read the header line, with `/` rewritten to `_`.
    pub async fn open(source: R) -> Result<Self, DecodeError> {
        Self::with_chunk_size(source, DEFAULT_CHUNK_SIZE).await
    }

    /// 🔧 Same as [`open`](Self::open) with a custom refill size. Tests use 1 byte to be mean.
    pub async fn with_chunk_size(source: R, chunk_size: usize) -> Result<Self, DecodeError> {
        let mut reader = Self {
            source,
            decoder: Some(GzDecoder::new(Vec::new())),
            pending: Vec::new(),
            pending_start: 0,
            chunk: vec![0u8; chunk_size.max(1)],
            header_line: String::new(),
            lines_read: 0,
            compressed_bytes_read: 0,
        };

        let raw_header = reader
            .next_line()
            .await?
            .ok_or(DecodeError::MissingHeader)?;
        reader.header_line = raw_header.replace('/', "_");
        Ok(reader)
    }

    /// 🏷️ The normalized header line, still comma-joined.
    pub fn header_line(&self) -> &str {
        &self.header_line
    }

    pub fn compressed_bytes_read(&self) -> u64 {
        self.compressed_bytes_read
    }

    /// 📄 The next line without its delimiter, or `None` when the report is done.
    pub async fn next_line(&mut self) -> Result<Option<String>, DecodeError> {
        loop {
            if let Cursor::Line(bytes) = self.take_line() {
                return self.decode_line(bytes).map(Some);
            }

            if self.decoder.is_none() {
                // 🏁 source drained, gzip trailer checked: whatever's left is the last line
                if self.pending_start == self.pending.len() {
                    return Ok(None);
                }
                let last_line = self.pending.split_off(self.pending_start);
                self.pending.clear();
                self.pending_start = 0;
                return self.decode_line(last_line).map(Some);
            }

            self.pull_chunk().await?;
        }
    }

    /// 🌊 Turn the remaining lines into a `Stream`. Consumes the reader.
    pub fn into_lines(self) -> impl Stream<Item = Result<String, DecodeError>> {
        futures::stream::try_unfold(self, |mut reader| async move {
            Ok(reader.next_line().await?.map(|line| (line, reader)))
        })
    }

    fn take_line(&mut self) -> Cursor {
        let unread = &self.pending[self.pending_start..];
        match memchr::memchr(LINE_DELIMITER, unread) {
            Some(delimiter_at) => {
                let line = unread[..delimiter_at].to_vec();
                self.pending_start += delimiter_at + 1;
                Cursor::Line(line)
            }
            None => Cursor::NeedMoreData,
        }
    }

    /// 🪣 Pull one compressed chunk, inflate it, append whatever comes out to `pending`.
    async fn pull_chunk(&mut self) -> Result<(), DecodeError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(());
        };

        // 🧹 compact once per refill, not once per line
        if self.pending_start > 0 {
            self.pending.drain(..self.pending_start);
            self.pending_start = 0;
        }

        let bytes_read = self
            .source
            .read(&mut self.chunk)
            .await
            .map_err(|source| DecodeError::Read { source })?;

        if bytes_read == 0 {
            // -- 🔚 end of source. try_finish verifies the CRC trailer, so a truncated
            // -- upload fails here instead of quietly losing its last rows
            decoder
                .try_finish()
                .map_err(|source| DecodeError::Gzip { source })?;
            self.pending.append(decoder.get_mut());
            self.decoder = None;
            trace!(
                "🏁 report stream drained after {} compressed bytes",
                self.compressed_bytes_read
            );
            return Ok(());
        }

        self.compressed_bytes_read += bytes_read as u64;
        let mut input = &self.chunk[..bytes_read];
        while !input.is_empty() {
            let consumed = decoder
                .write(input)
                .map_err(|source| DecodeError::Gzip { source })?;
            if consumed == 0 {
                // 🗑️ bytes after the gzip trailer. zlib ignores them, so do we.
                warn!(
                    "🗑️ ignoring {} trailing bytes after the end of the gzip stream",
                    input.len()
                );
                break;
            }
            input = &input[consumed..];
        }
        decoder
            .flush()
            .map_err(|source| DecodeError::Gzip { source })?;
        self.pending.append(decoder.get_mut());
        Ok(())
    }

    fn decode_line(&mut self, mut bytes: Vec<u8>) -> Result<String, DecodeError> {
        self.lines_read += 1;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8(bytes).map_err(|source| DecodeError::Utf8 {
            line_number: self.lines_read,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use futures::TryStreamExt;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(text.as_bytes())
            .expect("💀 writing into a Vec cannot fail, and yet here we are");
        encoder.finish().expect("💀 gzip encoder refused to finish")
    }

    async fn every_line(compressed: &[u8], chunk_size: usize) -> Result<Vec<String>, DecodeError> {
        let reader = ReportLineReader::with_chunk_size(compressed, chunk_size).await?;
        let mut the_lines = vec![reader.header_line().to_string()];
        let rest: Vec<String> = reader.into_lines().try_collect().await?;
        the_lines.extend(rest);
        Ok(the_lines)
    }

    #[tokio::test]
    async fn the_one_where_chunk_boundaries_never_change_the_story() -> Result<(), DecodeError> {
        let the_text = "id,cost,description\n1,0.5,\"short\"\n2,1.25,a much longer line that will straddle many tiny chunks\n\n3,,last line without a newline";
        let the_compressed = gzip(the_text);
        let the_expected: Vec<String> = the_text.lines().map(String::from).collect();

        for chunk_size in [1, 2, 3, 5, 7, 11, 16, 64, 1024, 1 << 20] {
            let the_lines = every_line(&the_compressed, chunk_size).await?;
            assert_eq!(the_lines, the_expected, "chunk size {chunk_size} told a different story");
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_delimiter_gets_split_across_every_possible_boundary(
    ) -> Result<(), DecodeError> {
        // 🔪 compressed byte size varies, so sweep every chunk size up to the whole payload
        let the_text = "h1,h2\r\na,b\r\nc,d\r\n";
        let the_compressed = gzip(the_text);
        for chunk_size in 1..=the_compressed.len() {
            let the_lines = every_line(&the_compressed, chunk_size).await?;
            assert_eq!(the_lines, vec!["h1,h2", "a,b", "c,d"]);
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_big_report_inflates_past_the_decoder_buffer() -> Result<(), DecodeError> {
        // 🎈 highly compressible: a 1 KiB chunk inflates to way more than one decoder buffer
        let mut the_text = String::from("a,b,c\n");
        for i in 0..20_000 {
            the_text.push_str(&format!("{i},same-old-value,same-old-value\n"));
        }
        let the_lines = every_line(&gzip(&the_text), DEFAULT_CHUNK_SIZE).await?;
        assert_eq!(the_lines.len(), 20_001);
        assert_eq!(the_lines[20_000], "19999,same-old-value,same-old-value");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_many_lines_share_one_refill() -> Result<(), DecodeError> {
        // 🧹 one huge chunk holds every line, so lines come out of the buffer without a refill
        let the_text = "h\nalpha\nbeta\n\ngamma\ndelta";
        let the_compressed = gzip(the_text);
        let mut reader = ReportLineReader::with_chunk_size(&the_compressed[..], 1 << 20).await?;
        assert_eq!(reader.next_line().await?.as_deref(), Some("alpha"));
        assert_eq!(reader.next_line().await?.as_deref(), Some("beta"));
        assert_eq!(reader.next_line().await?.as_deref(), Some(""));
        assert_eq!(reader.next_line().await?.as_deref(), Some("gamma"));
        assert_eq!(reader.next_line().await?.as_deref(), Some("delta"));
        assert_eq!(reader.next_line().await?, None);
        assert_eq!(reader.next_line().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_header_slashes_become_underscores() -> Result<(), DecodeError> {
        let the_compressed = gzip("identity/LineItemId,lineItem/UnblendedCost\nx,1\n");
        let reader = ReportLineReader::open(&the_compressed[..]).await?;
        assert_eq!(reader.header_line(), "identity_LineItemId,lineItem_UnblendedCost");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_plain_text_pretending_to_be_gzip_gets_caught() {
        let the_plain_text = b"identity/LineItemId,lineItem/UnblendedCost\nx,1\n";
        let the_result = ReportLineReader::open(&the_plain_text[..]).await;
        assert!(matches!(the_result, Err(DecodeError::Gzip { .. })));
    }

    #[tokio::test]
    async fn the_one_where_a_truncated_upload_fails_loudly() {
        let mut the_text = String::from("a,b\n");
        for i in 0..500 {
            the_text.push_str(&format!("{i},{}\n", i * 7));
        }
        let mut the_compressed = gzip(&the_text);
        the_compressed.truncate(the_compressed.len() - 12);

        let the_result = every_line(&the_compressed, 64).await;
        assert!(
            matches!(the_result, Err(DecodeError::Gzip { .. })),
            "truncated gzip must not quietly produce a shorter report: {the_result:?}"
        );
    }

    #[tokio::test]
    async fn the_one_where_an_empty_report_has_no_header() {
        let the_empty = gzip("");
        let the_result = ReportLineReader::open(&the_empty[..]).await;
        assert!(matches!(the_result, Err(DecodeError::MissingHeader)));
    }

    #[tokio::test]
    async fn the_one_where_invalid_utf8_is_its_own_failure() {
        let mut the_encoder = GzEncoder::new(Vec::new(), Compression::default());
        the_encoder.write_all(b"a,b\n\xff\xfe,1\n").expect("💀 vec write");
        let the_compressed = the_encoder.finish().expect("💀 gzip finish");

        let the_result = every_line(&the_compressed, 8).await;
        assert!(matches!(the_result, Err(DecodeError::Utf8 { line_number: 2, .. })));
    }
}
