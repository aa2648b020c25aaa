//! The pre-Bolt handshake (spec.md §4.4, §6): a 4-byte magic preamble followed by four 4-byte
//! version proposals, newest first.

/// `0x60 0x60 0xB0 0x17` — the fixed preamble that precedes version negotiation on every
/// Bolt connection.
pub const MAGIC_PREAMBLE: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// A Bolt protocol version, as negotiated during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BoltVersion {
    pub major: u8,
    pub minor: u8,
}

impl BoltVersion {
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

/// Encodes one 4-byte version-proposal slot: `{reserved=0, range, minor, major}`, where `range`
/// lets a single slot advertise a contiguous span of minor versions the server may pick from,
/// newest first (spec.md §4.4, §6; and REDESIGN FLAGS / Open Question (c)).
#[must_use]
pub fn encode_version_range(major: u8, newest_minor: u8, range: u8) -> [u8; 4] {
    [0, range, newest_minor, major]
}

/// Builds the 16-byte version-negotiation block: up to four proposal slots, newest first.
/// Unused trailing slots are all-zero, which the server treats as "no further proposal".
#[must_use]
pub fn build_negotiation_block(proposals: &[[u8; 4]]) -> [u8; 16] {
    let mut block = [0u8; 16];
    for (i, proposal) in proposals.iter().take(4).enumerate() {
        block[i * 4..i * 4 + 4].copy_from_slice(proposal);
    }
    block
}

/// Parses the server's 4-byte reply into the agreed version, or `None` if the server replied
/// with all zeros (no compatible version).
#[must_use]
pub fn parse_agreed_version(reply: [u8; 4]) -> Option<BoltVersion> {
    if reply == [0, 0, 0, 0] {
        return None;
    }
    // reply mirrors a proposal slot: {reserved, range(unused in reply), minor, major}
    Some(BoltVersion::new(reply[3], reply[2]))
}

/// This driver's default proposal: Bolt v5.4 down through v5.0 in a single ranged slot
/// (spec.md's "at least Bolt v5" requirement), matching the single-slot shape spec.md §9's
/// Open Question (c) flags as worth confirming against real server builds.
#[must_use]
pub fn default_proposals() -> [[u8; 4]; 4] {
    [
        encode_version_range(5, 4, 4),
        [0, 0, 0, 0],
        [0, 0, 0, 0],
        [0, 0, 0, 0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_reply_means_no_match() {
        assert_eq!(parse_agreed_version([0, 0, 0, 0]), None);
    }

    #[test]
    fn reply_parses_major_minor() {
        assert_eq!(
            parse_agreed_version([0, 0, 3, 5]),
            Some(BoltVersion::new(5, 3))
        );
    }

    #[test]
    fn negotiation_block_is_16_bytes_newest_first() {
        let block = build_negotiation_block(&default_proposals());
        assert_eq!(block.len(), 16);
        assert_eq!(&block[0..4], &[0, 4, 4, 5]);
        assert_eq!(&block[4..8], &[0, 0, 0, 0]);
    }
}
