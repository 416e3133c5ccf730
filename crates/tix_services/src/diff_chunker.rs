//! Splits unified diffs into bounded chunks for embedding

use tix_domain::Chunk;
use tracing::debug;

/// A chunk is always cut once it holds this many lines.
pub const MAX_LINES_PER_CHUNK: usize = 800;

/// A chunk is cut at a file boundary only once it holds this many lines, so
/// diffs touching many small files do not explode into tiny chunks.
pub const MIN_LINES_PER_CHUNK: usize = 100;

const FILE_HEADER: &str = "diff --git";
const NEW_FILE_MARKER: &str = "+++ b/";

/// Split `diff` into chunks whose contents concatenate back to `diff`.
///
/// Whitespace-only chunks are dropped and an empty diff yields no chunks.
pub fn chunk_diff(diff: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut line_count = 0;
    let mut file_path = String::new();
    let mut total_lines = 0;

    let mut lines = diff.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        if let Some(path) = line.strip_prefix(NEW_FILE_MARKER) {
            file_path = path.trim_end().to_string();
        }

        buffer.push_str(line);
        line_count += 1;
        total_lines += 1;

        let next_is_file_header = lines.peek().is_some_and(|next| next.starts_with(FILE_HEADER));
        if line_count >= MAX_LINES_PER_CHUNK
            || (next_is_file_header && line_count >= MIN_LINES_PER_CHUNK)
        {
            push_chunk(&mut chunks, std::mem::take(&mut buffer), &file_path, line_count);
            line_count = 0;
        }
    }

    if !buffer.is_empty() {
        push_chunk(&mut chunks, buffer, &file_path, line_count);
    }

    debug!(total_chunks = chunks.len(), total_lines, "Chunked diff");
    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, content: String, file_path: &str, line_count: usize) {
    if content.trim().is_empty() {
        return;
    }
    chunks.push(Chunk { content, index: chunks.len(), file_path: file_path.to_string(), line_count });
}
