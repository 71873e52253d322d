use crate::constants;
use serde::{Deserialize, Serialize};

// The single persisted configuration record. One JSON document on disk,
// mutated only through the admin surface, swapped as a whole for readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,
    #[serde(default)]
    pub upstream_api_key: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "generate_local_api_key")]
    pub local_api_key: String,
    // Either a bcrypt hash or, before the first successful login, the
    // plaintext bootstrap value (rehashed on first use).
    #[serde(default = "default_admin_secret")]
    pub admin_secret: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_upstream_base_url() -> String {
    constants::DEFAULT_UPSTREAM_BASE_URL.to_string()
}

fn default_model() -> String {
    constants::DEFAULT_MODEL.to_string()
}

fn default_admin_secret() -> String {
    "admin".to_string()
}

fn default_schema_version() -> String {
    "1".to_string()
}

fn default_port() -> u16 {
    constants::DEFAULT_PORT
}

fn default_body_limit() -> usize {
    constants::DEFAULT_BODY_LIMIT_BYTES
}

pub fn generate_local_api_key() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; constants::LOCAL_API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self {
            upstream_base_url: default_upstream_base_url(),
            upstream_api_key: String::new(),
            default_model: default_model(),
            local_api_key: generate_local_api_key(),
            admin_secret: default_admin_secret(),
            schema_version: default_schema_version(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }

    // Bootstrap plaintext secrets never start with the bcrypt prefix.
    pub fn admin_secret_is_hashed(&self) -> bool {
        self.admin_secret.starts_with("$2")
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}
