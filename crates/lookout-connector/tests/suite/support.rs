use std::net::{IpAddr, Ipv4Addr};

use lookout_gate::PasswordHash;
use lookout_proto::{
    ClientHello, DiagnosticPacket, RequestInfo, ResponseFrame, ResponseHead, CLIENT_HEADER,
    RESPONSE_HEADER,
};
use lookout_storage::{PostponeStorage, StorageError};

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// A request from an inspection client with no credentials.
pub fn client_request(session: &str) -> RequestInfo {
    RequestInfo::new()
        .with_header(CLIENT_HEADER, ClientHello::new(session).encode().unwrap())
        .with_remote_addr(LOCALHOST)
}

/// A request from a client that knows the connector password.
pub fn authed_request(session: &str, password: &PasswordHash) -> RequestInfo {
    let hello = ClientHello::new(session).with_auth("nonce-1", password.client_token("nonce-1"));
    RequestInfo::new()
        .with_header(CLIENT_HEADER, hello.encode().unwrap())
        .with_remote_addr(LOCALHOST)
}

pub fn frame_of(response: &ResponseHead) -> ResponseFrame {
    let header = response
        .header(RESPONSE_HEADER)
        .expect("response should carry a frame");
    ResponseFrame::decode(header).expect("frame should decode")
}

/// Text of every string `ValueDump` in `packets`, in order.
pub fn dumped_strings(packets: &[DiagnosticPacket]) -> Vec<String> {
    packets
        .iter()
        .filter_map(|packet| match packet {
            DiagnosticPacket::ValueDump(dump) => dump.value.as_str().map(str::to_owned),
            _ => None,
        })
        .collect()
}

/// Storage backend that is always unreachable.
pub struct UnavailableStorage;

impl PostponeStorage for UnavailableStorage {
    fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("backend offline".into()))
    }

    fn take_and_clear(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(StorageError::Unavailable("backend offline".into()))
    }
}
