// Handshake module - ServerHello reconstruction from client traces

pub mod parser;

pub use parser::{best_effort_key_share, extract_server_hello_hex, parse_server_hello, parse_trace};

use crate::constants::{EXTENSION_TYPE_KEY_SHARE, SERVER_HELLO_OVERLONG_THRESHOLD};
use serde::{Deserialize, Serialize};

/// One raw TLS extension from the ServerHello, in wire order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub extension_type: u16,
    pub data: Vec<u8>,
}

/// Decoded ServerHello handshake message.
///
/// Constructed once per probe attempt from a single captured trace and
/// discarded after classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerHello {
    pub version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: u16,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
    /// Length of the handshake body as declared by the 3-byte length field
    pub body_len: usize,
}

impl ServerHello {
    /// Extract the key_share extension, best-effort.
    ///
    /// Inner decode errors never abort the result; whatever fields were
    /// filled are returned together with a diagnostic note. Servers send at
    /// most one key_share, so scanning stops at the first match.
    pub fn key_share(&self) -> KeyShare {
        let mut share = KeyShare {
            server_hello_overlong: self.body_len > SERVER_HELLO_OVERLONG_THRESHOLD,
            ..KeyShare::default()
        };

        let Some(ext) = self
            .extensions
            .iter()
            .find(|e| e.extension_type == EXTENSION_TYPE_KEY_SHARE)
        else {
            return share;
        };

        share.is_present = true;

        if ext.data.len() < 2 {
            share.diagnostic = Some(format!(
                "key_share extension too short for a group id ({} bytes)",
                ext.data.len()
            ));
            return share;
        }

        share.group_id = u16::from_be_bytes([ext.data[0], ext.data[1]]);
        share.group_id_hex = format!("0x{:04X}", share.group_id);

        // Some ServerHello variants (HelloRetryRequest) carry only the group
        // id; key material is optional.
        if ext.data.len() >= 4 {
            share.key_share_length = u16::from_be_bytes([ext.data[2], ext.data[3]]);
            let declared = share.key_share_length as usize;
            let available = ext.data.len() - 4;
            if declared > available {
                share.diagnostic = Some(format!(
                    "key material truncated: {} bytes declared, {} available",
                    declared, available
                ));
                share.key_material = ext.data[4..].to_vec();
            } else {
                share.key_material = ext.data[4..4 + declared].to_vec();
            }
        }

        share
    }
}

/// key_share extraction result, possibly partial.
///
/// `is_present` is the authoritative "the server sent a key_share" signal;
/// `server_hello_overlong` flags ambiguous long hellos that yielded nothing,
/// worth separate logging but never a success/failure signal by itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyShare {
    pub group_id: u16,
    pub group_id_hex: String,
    pub key_share_length: u16,
    pub key_material: Vec<u8>,
    pub is_present: bool,
    pub server_hello_overlong: bool,
    pub diagnostic: Option<String>,
}
