//! TLS setup shared by the HTTP and WebSocket clients.

use std::sync::Once;

static INSTALL: Once = Once::new();

/// Install the ring crypto provider as the process-wide rustls default.
///
/// reqwest and tokio-tungstenite both build rustls configs from the process
/// default; it has to exist before the first TLS handshake. Safe to call
/// repeatedly, and a provider installed by the application wins.
pub fn install_crypto_provider() {
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}
