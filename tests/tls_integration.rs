//! Integration tests against a live ManageSieve server
//!
//! These tests need a reachable server and are ignored by default.
//!
//! ```bash
//! export SIEVE_TEST_URL="sieve://mail.example.com:4190"
//! export SIEVE_TEST_CA_CERT="/path/to/ca.crt"  # Optional: custom CA cert
//! export SIEVE_TEST_WS_URL="sieve://mail.example.com:443/sieve"  # Optional: WebSocket endpoint
//!
//! cargo test --test tls_integration -- --ignored --nocapture
//! ```

#[cfg(test)]
mod tls_integration {
    use sieve_transport::{
        SieveTransport, StreamTransport, TlsConfig, TransportConfig, WebSocketTransport,
    };
    use std::env;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(10);

    fn get_config() -> Option<TransportConfig> {
        let mut tls = TlsConfig::builder();
        if let Ok(path) = env::var("SIEVE_TEST_CA_CERT") {
            tls = tls.ca_cert_path(path);
        }
        let tls = match tls.build() {
            Ok(tls) => tls,
            Err(e) => {
                eprintln!("Failed to build TLS config: {}", e);
                return None;
            }
        };
        Some(
            TransportConfig::builder()
                .connect_timeout(WAIT)
                .upgrade_timeout(WAIT)
                .tls(tls)
                .build(),
        )
    }

    #[tokio::test]
    #[ignore] // Requires a ManageSieve server offering STARTTLS
    async fn test_starttls_upgrade() {
        let url = match env::var("SIEVE_TEST_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("Skipping test: SIEVE_TEST_URL not set");
                return;
            }
        };
        let Some(config) = get_config() else { return };

        let mut transport = StreamTransport::new(config);
        transport.connect(&url, true).await.unwrap();

        // Greeting: capability list ending in OK
        assert!(timeout(WAIT, transport.process_event()).await.unwrap());

        transport.start_tls().await.unwrap();
        assert!(transport.is_secured());
        assert!(transport.channel_binding().is_some());

        transport.on_send(b"LOGOUT\r\n").await.unwrap();
        transport.disconnect(None).await;
    }

    #[tokio::test]
    #[ignore] // Requires a ManageSieve server behind a wss:// endpoint
    async fn test_websocket_secured_on_open() {
        let url = match env::var("SIEVE_TEST_WS_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("Skipping test: SIEVE_TEST_WS_URL not set");
                return;
            }
        };
        let Some(config) = get_config() else { return };

        let mut transport = WebSocketTransport::new(config);
        transport.connect(&url, true).await.unwrap();
        assert!(timeout(WAIT, transport.process_event()).await.unwrap());
        assert!(transport.is_secured());
        assert!(transport.start_tls().await.is_err());

        transport.disconnect(Some("test complete")).await;
        assert!(!transport.is_secured());
    }
}
