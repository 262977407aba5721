use log::{debug, info, warn};

use crate::api::ApiClient;
use crate::app::ConfigFile;
use crate::error::{AdminError, Result};
use crate::notify::Notification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub api_url: String,
    pub message: String,
}

/// Checks the backend answers, then persists the URL and admin secret.
/// Credentials are saved when the server cannot be reached, but never when it rejects the secret.
pub async fn connect(server: &str, secret: &str) -> Result<(LoginResult, Notification)> {
    let url = crate::utils::normalize_url(server);
    if server.trim().is_empty() || secret.trim().is_empty() {
        return Err(AdminError::validation("Please enter the API URL and admin secret."));
    }

    let client = ApiClient::with_base(&url, secret)?;
    let message = match client.ping().await {
        Ok(status @ (401 | 403)) => {
            warn!("Server at {url} rejected the admin secret ({status})");
            return Err(AdminError::Api { status, message: "The server rejected the admin secret".into() });
        }
        Ok(status) if status < 500 => "Connected".to_string(),
        Ok(status) => format!("Saved (server answered {status})"),
        Err(e) => {
            debug!("Server check failed: {e}");
            "Saved (server unreachable)".to_string()
        }
    };
    info!("Server check: {url} - {message}");

    let mut file = ConfigFile::load();
    file.api_url = Some(url.clone());
    file.admin_secret = Some(secret.trim().to_string());
    let note = match file.save() {
        Ok(path) => {
            debug!("Saved settings to {}", path.display());
            if message == "Connected" { Notification::success(message.clone()) } else { Notification::warning(message.clone()) }
        }
        Err(e) => Notification::error(format!("Failed to save settings: {e}")),
    };
    Ok((LoginResult { api_url: url, message }, note))
}
