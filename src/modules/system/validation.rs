use crate::models::GatewayConfig;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_gateway_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.upstream_base_url) {
        Ok(url) => {
            if url.scheme() != "https" {
                errors.push(ValidationError {
                    field: "upstream_base_url",
                    message: format!("scheme must be https, got {}", url.scheme()),
                });
            }
        }
        Err(e) => errors.push(ValidationError {
            field: "upstream_base_url",
            message: format!("not a valid absolute URL: {}", e),
        }),
    }

    if config.default_model.trim().is_empty() {
        errors.push(ValidationError {
            field: "default_model",
            message: "must not be empty".to_string(),
        });
    }

    if config.local_api_key.trim().is_empty() {
        errors.push(ValidationError {
            field: "local_api_key",
            message: "must not be empty".to_string(),
        });
    }

    if config.admin_secret.trim().is_empty() {
        errors.push(ValidationError {
            field: "admin_secret",
            message: "must not be empty".to_string(),
        });
    }

    if config.port == 0 {
        errors.push(ValidationError {
            field: "port",
            message: "must be non-zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
