//! Demo HTTPS server wiring CertBus into a real TLS listener. Ported from
//! `pkg/cbexampleserver/example.go`: loads the consumer's key-encryption
//! key, runs the synchronizer alongside the listener, and resolves
//! certificates dynamically from the event-sourced store on every
//! handshake. Listens on `:8443` rather than `:443` so the demo runs without
//! root (SPEC_FULL.md §6).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use certbus_core::store::Store;
use certbus_log::EventLog;
use certbus_tls::{CertBusResolver, CertificateSource, DecryptedStore, Synchronizer};

const LISTEN_ADDR: &str = "0.0.0.0:8443";
const CLIENT_KEY_PATH: &str = "certbus-client.key";

pub async fn run(log: Arc<dyn EventLog>) -> Result<()> {
    let private_key_pem = tokio::fs::read_to_string(CLIENT_KEY_PATH)
        .await
        .with_context(|| format!("reading {CLIENT_KEY_PATH}"))?;

    let store = Arc::new(Store::new());
    certbus_log::load_until_realtime(log.as_ref(), &store)
        .await
        .context("initial synchronization from the event log")?;

    let source: Arc<dyn CertificateSource> = store.clone();
    let decrypted = Arc::new(
        DecryptedStore::new(source, &private_key_pem).context("loading consumer key-encryption key")?,
    );
    let resolver = Arc::new(CertBusResolver::new(decrypted));

    let (synchronizer, cancel) = Synchronizer::new(log, store);
    let sync_handle = tokio::spawn(async move { synchronizer.run().await });

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(resolver);
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));

    let listener = TcpListener::bind(LISTEN_ADDR)
        .await
        .with_context(|| format!("binding {LISTEN_ADDR}"))?;
    tracing::info!(addr = LISTEN_ADDR, "example server listening");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down example server");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let acceptor = acceptor.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(acceptor, stream, peer).await {
                                tracing::warn!(%peer, error = %e, "connection failed");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }
        }
    }

    cancel.cancel();
    sync_handle.await.context("synchronizer task panicked")?;
    Ok(())
}

/// A deliberately minimal HTTP/1.1 response: this server exists to
/// demonstrate certificate resolution, not to be a web framework.
async fn serve_connection(acceptor: TlsAcceptor, stream: TcpStream, peer: SocketAddr) -> Result<()> {
    let mut tls_stream = acceptor.accept(stream).await.context("tls handshake")?;

    let mut buf = [0u8; 4096];
    let n = tls_stream.read(&mut buf).await.context("reading request")?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let body = format!("greetings from {path}\n");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    tls_stream
        .write_all(response.as_bytes())
        .await
        .context("writing response")?;
    let _ = tls_stream.shutdown().await;
    tracing::debug!(%peer, %path, "served request");
    Ok(())
}
