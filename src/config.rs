use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Catálogo (client-credentials)
    pub catalog_client_id: String,
    pub catalog_client_secret: String,
    pub catalog_auth_url: String,
    pub catalog_api_url: String,

    // Paths
    pub data_dir: PathBuf,

    // Presentación
    pub queue_page_size: usize,

    // Red
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            catalog_client_id: std::env::var("CATALOG_CLIENT_ID").unwrap_or_default(),
            catalog_client_secret: std::env::var("CATALOG_CLIENT_SECRET").unwrap_or_default(),
            catalog_auth_url: std::env::var("CATALOG_AUTH_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com/api/token".to_string()),
            catalog_api_url: std::env::var("CATALOG_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),

            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            queue_page_size: std::env::var("QUEUE_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Chequeos de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.catalog_client_id.is_empty() || self.catalog_client_secret.is_empty() {
            anyhow::bail!("CATALOG_CLIENT_ID o CATALOG_CLIENT_SECRET vacíos");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("El tamaño de página de la cola debe ser mayor a 0");
        }

        if self.http_timeout_secs == 0 {
            anyhow::bail!("El timeout HTTP debe ser mayor a 0");
        }

        Ok(())
    }

    /// Resumen apto para loguear, sin credenciales.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Catálogo: {} (auth {})\n  \
            Datos: {}\n  \
            Página de cola: {} items, timeout HTTP {}s",
            self.catalog_api_url,
            self.catalog_auth_url,
            self.data_dir.display(),
            self.queue_page_size,
            self.http_timeout_secs,
        )
    }
}

/// Valores por defecto, usados como base en tests y cuando no hay entorno.
impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_client_id: String::new(),
            catalog_client_secret: String::new(),
            catalog_auth_url: "https://accounts.spotify.com/api/token".to_string(),
            catalog_api_url: "https://api.spotify.com/v1".to_string(),
            data_dir: "./data".into(),
            queue_page_size: 10,
            http_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rechaza_credenciales_vacias() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            catalog_client_id: "id".to_string(),
            catalog_client_secret: "secret".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn el_resumen_no_filtra_el_secreto() {
        let config = Config {
            catalog_client_id: "id-visible".to_string(),
            catalog_client_secret: "super-secreto".to_string(),
            ..Config::default()
        };
        assert!(!config.summary().contains("super-secreto"));
    }
}
