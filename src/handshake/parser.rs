// ServerHello parser - Decodes the raw handshake bytes captured from the
// external client's -msg trace.
//
// The trace interleaves log lines with hex dumps. The hex following the
// "ServerHello" record marker is the TLS handshake payload; everything here
// works on that reconstructed byte string.

use super::{Extension, KeyShare, ServerHello};
use crate::constants::{
    HANDSHAKE_TYPE_SERVER_HELLO, MARKER_SERVER_HELLO, SERVER_HELLO_RANDOM_LEN,
    TRACE_ARROW_PREFIXES,
};
use crate::error::ProbeError;

/// Decode a full client trace into a ServerHello.
///
/// Fails with a structural error when no ServerHello hex was captured or the
/// bytes do not form a valid handshake message. Structural failures are fatal
/// for the single attempt only, never for the whole probe run.
pub fn parse_trace(trace: &str) -> Result<ServerHello, ProbeError> {
    let hex_payload = extract_server_hello_hex(trace).ok_or_else(|| ProbeError::HandshakeParse {
        details: "no ServerHello found in trace".to_string(),
    })?;
    let bytes = hex::decode(&hex_payload)?;
    parse_server_hello(&bytes)
}

/// Collect the ServerHello hex dump out of an interleaved trace.
///
/// Scans for the "ServerHello" record marker, then concatenates all
/// subsequent non-arrow lines (whitespace stripped) until the next
/// inbound/outbound record marker. Lines that are not pure hex after
/// stripping (interleaved stderr noise) are skipped rather than poisoning
/// the capture.
pub fn extract_server_hello_hex(trace: &str) -> Option<String> {
    let mut lines = trace.lines();

    lines.by_ref().find(|line| line.contains(MARKER_SERVER_HELLO))?;

    let mut hex_payload = String::new();
    for line in lines {
        let trimmed = line.trim_start();
        if TRACE_ARROW_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            break;
        }
        let stripped: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        hex_payload.push_str(&stripped);
    }

    if hex_payload.is_empty() {
        None
    } else {
        Some(hex_payload)
    }
}

/// Decode a raw TLS handshake payload into a ServerHello.
///
/// Fixed fields are parsed strictly; the extension block is parsed
/// tolerantly (a truncated trailing extension ends the scan with whatever
/// was already decoded, preserving diagnostic value).
pub fn parse_server_hello(bytes: &[u8]) -> Result<ServerHello, ProbeError> {
    let mut cur = Cursor::new(bytes);

    let handshake_type = cur.u8("handshake type")?;
    if handshake_type != HANDSHAKE_TYPE_SERVER_HELLO {
        return Err(ProbeError::HandshakeParse {
            details: format!(
                "handshake type 0x{:02x} is not ServerHello (0x02)",
                handshake_type
            ),
        });
    }

    let body_len = cur.u24("handshake length")? as usize;
    if body_len != bytes.len().saturating_sub(4) {
        return Err(ProbeError::HandshakeParse {
            details: format!(
                "handshake length field {} does not match payload size {}",
                body_len,
                bytes.len().saturating_sub(4)
            ),
        });
    }

    let version = cur.u16("version")?;

    let mut random = [0u8; SERVER_HELLO_RANDOM_LEN];
    random.copy_from_slice(cur.take(SERVER_HELLO_RANDOM_LEN, "random")?);

    let session_id_len = cur.u8("session id length")? as usize;
    let session_id = cur.take(session_id_len, "session id")?.to_vec();

    let cipher_suite = cur.u16("cipher suite")?;

    let compression_len = cur.u8("compression method count")? as usize;
    let compression_methods = cur.take(compression_len, "compression methods")?.to_vec();

    let extensions_len = cur.u16("extensions length")? as usize;
    let extensions_end = cur.pos().saturating_add(extensions_len).min(bytes.len());

    let mut extensions = Vec::new();
    while cur.pos() + 4 <= extensions_end {
        let extension_type = cur.u16("extension type")?;
        let data_len = cur.u16("extension length")? as usize;
        if cur.pos() + data_len > extensions_end {
            // Truncated trailing extension: keep what decoded so far.
            let data = cur.take_remaining().to_vec();
            extensions.push(Extension {
                extension_type,
                data,
            });
            break;
        }
        let data = cur.take(data_len, "extension data")?.to_vec();
        extensions.push(Extension {
            extension_type,
            data,
        });
    }

    Ok(ServerHello {
        version,
        random,
        session_id,
        cipher_suite,
        compression_methods,
        extensions,
        body_len,
    })
}

/// Decode handshake bytes straight to a key_share, never failing.
///
/// Structural errors collapse into an absent key_share carrying the error
/// text as diagnostic. Used where a partial trace must still yield maximum
/// diagnostic value (timeouts mid-handshake, truncated captures).
pub fn best_effort_key_share(bytes: &[u8]) -> KeyShare {
    match parse_server_hello(bytes) {
        Ok(hello) => hello.key_share(),
        Err(err) => KeyShare {
            diagnostic: Some(err.to_string()),
            ..KeyShare::default()
        },
    }
}

/// Bounds-checked big-endian reader over the handshake payload
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], ProbeError> {
        if self.pos + n > self.buf.len() {
            return Err(ProbeError::HandshakeParse {
                details: format!(
                    "truncated at {}: need {} bytes, {} remain",
                    what,
                    n,
                    self.buf.len() - self.pos
                ),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_remaining(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    fn u8(&mut self, what: &str) -> Result<u8, ProbeError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16, ProbeError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self, what: &str) -> Result<u32, ProbeError> {
        let b = self.take(3, what)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }
}

/// Test helper: build a syntactically valid ServerHello handshake payload
#[cfg(test)]
pub(crate) mod testutil {
    pub(crate) fn build_server_hello(extensions: &[(u16, Vec<u8>)]) -> Vec<u8> {
        let mut ext_block = Vec::new();
        for (ext_type, data) in extensions {
            ext_block.extend_from_slice(&ext_type.to_be_bytes());
            ext_block.extend_from_slice(&(data.len() as u16).to_be_bytes());
            ext_block.extend_from_slice(data);
        }

        let mut body = Vec::new();
        body.extend_from_slice(&0x0303u16.to_be_bytes()); // version
        body.extend_from_slice(&[0xAB; 32]); // random
        body.push(0); // empty session id
        body.extend_from_slice(&0x1301u16.to_be_bytes()); // cipher suite
        body.push(1); // one compression method
        body.push(0); // null compression
        body.extend_from_slice(&(ext_block.len() as u16).to_be_bytes());
        body.extend_from_slice(&ext_block);

        let mut msg = vec![0x02];
        msg.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        msg.extend_from_slice(&body);
        msg
    }
}
