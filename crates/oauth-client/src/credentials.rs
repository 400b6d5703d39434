//! Confidential client registration

use common::Secret;

/// Client registration at the identity provider.
///
/// Built once at startup from configuration and shared by reference; nothing
/// below this type reads the environment.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Callback URL registered with the provider
    pub redirect_uri: String,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
        }
    }
}
