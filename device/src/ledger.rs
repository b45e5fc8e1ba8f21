//! HTTP ledger client.
//!
//! Talks to the shared ledger's record intake endpoint with a minimal raw
//! HTTP/1.1 POST over a tokio TCP stream — one endpoint, one verb, no
//! redirects, no TLS termination on-device. In a real deployment, swap this
//! for a proper HTTP client.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use tessera_protocol::codec;
use tessera_protocol::crypto::DevicePublicKey;
use tessera_protocol::record::TransferRecord;
use tessera_protocol::sync::{LedgerClient, LedgerError};

/// Pushes records to `POST /records` on a `host:port` ledger endpoint.
///
/// The request body is the exact QR payload encoding — the ledger receives
/// the same self-contained record-plus-key document a scanning device would,
/// and can verify the signature the same way.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    addr: String,
}

impl HttpLedgerClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn post(&self, body: &str) -> Result<u16, LedgerError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| LedgerError::Transport(format!("connect {}: {}", self.addr, e)))?;

        let request = format!(
            "POST /records HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.addr,
            body.len(),
            body,
        );
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| LedgerError::Transport(format!("write: {}", e)))?;
        stream
            .shutdown()
            .await
            .map_err(|e| LedgerError::Transport(format!("shutdown: {}", e)))?;

        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .await
            .map_err(|e| LedgerError::Transport(format!("read: {}", e)))?;

        parse_status(&String::from_utf8_lossy(&response))
    }
}

/// Extracts the status code from an HTTP/1.1 status line.
fn parse_status(response: &str) -> Result<u16, LedgerError> {
    response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| LedgerError::Transport("malformed HTTP response".into()))
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn push(
        &self,
        record: &TransferRecord,
        public_key: &DevicePublicKey,
    ) -> Result<(), LedgerError> {
        let body = codec::encode(record, public_key);
        match self.post(&body).await? {
            code if (200..300).contains(&code) => Ok(()),
            code if (400..500).contains(&code) => {
                Err(LedgerError::Rejected(format!("HTTP {}", code)))
            }
            code => Err(LedgerError::Transport(format!("HTTP {}", code))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_protocol::crypto::DeviceKeypair;
    use tessera_protocol::record::{Amount, RecordFactory};
    use tokio::net::TcpListener;

    /// Serves exactly one connection with a canned status line, returning
    /// the request it received.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            socket.read_to_end(&mut request).await.unwrap();
            socket
                .write_all(format!("{}\r\nContent-Length: 0\r\n\r\n", status_line).as_bytes())
                .await
                .unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (addr, handle)
    }

    fn signed_record(keypair: &DeviceKeypair) -> TransferRecord {
        RecordFactory::new("alice")
            .create(Amount::from_major(9).unwrap(), "bob", None, keypair)
            .unwrap()
    }

    #[tokio::test]
    async fn push_delivers_the_payload_encoding() {
        let keypair = DeviceKeypair::generate();
        let record = signed_record(&keypair);
        let (addr, server) = one_shot_server("HTTP/1.1 200 OK").await;

        HttpLedgerClient::new(addr)
            .push(&record, &keypair.public_key())
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /records HTTP/1.1"));
        let body = request.split("\r\n\r\n").nth(1).unwrap();
        let (decoded, _) = codec::decode_verified(body).unwrap();
        assert_eq!(decoded.id, record.id);
    }

    #[tokio::test]
    async fn client_error_maps_to_rejected() {
        let keypair = DeviceKeypair::generate();
        let record = signed_record(&keypair);
        let (addr, _server) = one_shot_server("HTTP/1.1 422 Unprocessable Entity").await;

        let err = HttpLedgerClient::new(addr)
            .push(&record, &keypair.public_key())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_transport() {
        let keypair = DeviceKeypair::generate();
        let record = signed_record(&keypair);
        let (addr, _server) = one_shot_server("HTTP/1.1 503 Service Unavailable").await;

        let err = HttpLedgerClient::new(addr)
            .push(&record, &keypair.public_key())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_transport() {
        let keypair = DeviceKeypair::generate();
        let record = signed_record(&keypair);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = HttpLedgerClient::new(addr)
            .push(&record, &keypair.public_key())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status("HTTP/1.1 200 OK\r\n").unwrap(), 200);
        assert_eq!(parse_status("HTTP/1.1 404 Not Found\r\n").unwrap(), 404);
        assert!(parse_status("garbage").is_err());
    }
}
