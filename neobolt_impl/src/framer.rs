//! The chunked message framer (spec.md §4.2): splits/reassembles Bolt messages into
//! ≤65535-byte chunks, each prefixed by a 2-byte big-endian length, terminated by an empty chunk.

const MAX_CHUNK_SIZE: usize = 65_535;

/// Splits an already-`PackStream`-encoded message buffer into length-prefixed chunks and
/// appends the zero-length terminator.
#[must_use]
pub fn encode_chunks(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / MAX_CHUNK_SIZE * 2 + 4);
    if message.is_empty() {
        // a message with no bytes is still framed as a single empty-payload chunk
        // followed by the terminator would be indistinguishable from "no message"; Bolt
        // never sends a zero-field message this way (every message has at least a marker
        // byte), so this path only matters for the degenerate single-chunk-is-empty case.
        out.extend_from_slice(&[0x00, 0x00]);
        return out;
    }
    for chunk in message.chunks(MAX_CHUNK_SIZE) {
        out.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
        out.extend_from_slice(chunk);
    }
    out.extend_from_slice(&[0x00, 0x00]);
    out
}

/// A streaming chunk reassembler fed arbitrary byte slices as they arrive off the wire.
///
/// Holds only what's needed to reassemble the message currently in flight: the length still
/// expected for the chunk being collected, if any, and the bytes of the message collected from
/// completed chunks so far. A single call to [`ChunkDecoder::push_bytes`] may complete zero,
/// one, or several whole messages, since one TCP segment can span arbitrary chunk/message
/// boundaries.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    awaiting: Option<u16>,
    chunk_partial: Vec<u8>,
    pending: Vec<u8>,
    header_partial: Vec<u8>,
}

impl ChunkDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds newly-arrived bytes into the reassembler, returning the bodies of every message
    /// completed as a result (in arrival order).
    pub fn push_bytes(&mut self, mut bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut completed = Vec::new();
        while !bytes.is_empty() {
            match self.awaiting {
                None => {
                    // collecting the 2-byte length header
                    let need = 2 - self.header_partial.len();
                    let take = need.min(bytes.len());
                    self.header_partial.extend_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];
                    if self.header_partial.len() < 2 {
                        continue;
                    }
                    let len = u16::from_be_bytes([self.header_partial[0], self.header_partial[1]]);
                    self.header_partial.clear();
                    if len == 0 {
                        completed.push(std::mem::take(&mut self.pending));
                    } else {
                        self.awaiting = Some(len);
                        self.chunk_partial.clear();
                    }
                }
                Some(len) => {
                    let need = len as usize - self.chunk_partial.len();
                    let take = need.min(bytes.len());
                    self.chunk_partial.extend_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];
                    if self.chunk_partial.len() == len as usize {
                        self.pending.append(&mut self.chunk_partial);
                        self.awaiting = None;
                    }
                }
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_just_the_terminator() {
        assert_eq!(encode_chunks(&[]), vec![0x00, 0x00]);
    }

    #[test]
    fn single_chunk_round_trips() {
        let msg = vec![1, 2, 3, 4, 5];
        let framed = encode_chunks(&msg);
        assert_eq!(framed, vec![0x00, 0x05, 1, 2, 3, 4, 5, 0x00, 0x00]);
        let mut decoder = ChunkDecoder::new();
        let completed = decoder.push_bytes(&framed);
        assert_eq!(completed, vec![msg]);
    }

    #[test]
    fn message_crossing_64kib_splits_per_spec_s5() {
        let msg = vec![0xAB; 70_000];
        let framed = encode_chunks(&msg);
        // chunk(65535) + chunk(4465) + terminator
        assert_eq!(&framed[0..2], &[0xFF, 0xFF]);
        let second_header_at = 2 + 65_535;
        assert_eq!(
            &framed[second_header_at..second_header_at + 2],
            &(4465u16).to_be_bytes()
        );
        assert_eq!(&framed[framed.len() - 2..], &[0x00, 0x00]);

        let mut decoder = ChunkDecoder::new();
        let completed = decoder.push_bytes(&framed);
        assert_eq!(completed, vec![msg]);
    }

    #[test]
    fn chunk_count_matches_invariant_4() {
        for len in [0usize, 1, 65_535, 65_536, 131_070, 131_071] {
            let msg = vec![0u8; len];
            let framed = encode_chunks(&msg);
            let expected_chunks = (len.max(1)).div_ceil(MAX_CHUNK_SIZE) + 1;
            // count length headers: walk the framed buffer counting non-final headers + 1 terminator
            let mut count = 0;
            let mut i = 0;
            while i < framed.len() {
                let l = u16::from_be_bytes([framed[i], framed[i + 1]]);
                count += 1;
                i += 2 + l as usize;
            }
            assert_eq!(count, expected_chunks, "len={len}");
        }
    }

    #[test]
    fn handles_arbitrary_fragmentation_across_pushes() {
        let msg = vec![9u8; 200_000];
        let framed = encode_chunks(&msg);
        let mut decoder = ChunkDecoder::new();
        let mut completed = Vec::new();
        for byte_chunk in framed.chunks(7) {
            completed.extend(decoder.push_bytes(byte_chunk));
        }
        assert_eq!(completed, vec![msg]);
    }

    #[test]
    fn multiple_messages_in_one_push() {
        let a = encode_chunks(b"first");
        let b = encode_chunks(b"second");
        let mut combined = a.clone();
        combined.extend_from_slice(&b);
        let mut decoder = ChunkDecoder::new();
        let completed = decoder.push_bytes(&combined);
        assert_eq!(completed, vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
