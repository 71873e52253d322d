use std::fs;
use std::path::PathBuf;

use crate::models::GatewayConfig;

const CONFIG_FILE: &str = "config.json";

pub fn get_data_dir() -> Result<PathBuf, String> {
    let dir = match std::env::var("TRESTLE_DATA_DIR") {
        Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
        _ => {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_err(|_| "failed_to_resolve_home_directory".to_string())?;
            PathBuf::from(home).join(".trestle")
        }
    };

    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| format!("failed_to_create_data_dir: {}", e))?;
    }

    Ok(dir)
}

pub fn load_gateway_config() -> Result<GatewayConfig, String> {
    let data_dir = get_data_dir()?;
    let config_path = data_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        let config = GatewayConfig::new();
        save_gateway_config(&config)?;
        return Ok(config);
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| format!("failed_to_read_config_file: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("failed_to_parse_config_file: {}", e))
}

// Write-temp-then-rename so readers never observe a torn document.
pub fn save_gateway_config(config: &GatewayConfig) -> Result<(), String> {
    let data_dir = get_data_dir()?;
    let config_path = data_dir.join(CONFIG_FILE);
    let tmp_path = data_dir.join(format!("{}.tmp", CONFIG_FILE));

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("failed_to_serialize_config: {}", e))?;

    fs::write(&tmp_path, content).map_err(|e| format!("failed_to_write_config_temp: {}", e))?;
    fs::rename(&tmp_path, &config_path).map_err(|e| format!("failed_to_commit_config: {}", e))
}
