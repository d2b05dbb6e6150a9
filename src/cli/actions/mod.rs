pub mod server;

use secrecy::SecretString;

/// What the CLI resolved to do.
pub enum Action {
    Server {
        port: u16,
        base_url: String,
        access_secret: SecretString,
        refresh_secret: SecretString,
        google_client_id: Option<String>,
    },
}
