// ── Device connection configuration ──
//
// Describes *how* to reach the telemetry data source. Field-wise
// equality drives drift detection in the session manager: a changed
// config triggers `change_configuration` instead of a teardown.

use secrecy::{ExposeSecret, SecretString};

/// Connection parameters for one telemetry data source.
#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    /// Device address (IP or hostname).
    pub address: String,
    /// gRPC port.
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Reference to the client certificate presented to the device.
    pub client_certificate: Option<String>,
}

impl PartialEq for DataSourceConfig {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.port == other.port
            && self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
            && self.client_certificate == other.client_certificate
    }
}

impl Eq for DataSourceConfig {}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: 9339,
            username: String::new(),
            password: SecretString::from(String::new()),
            client_certificate: None,
        }
    }
}
