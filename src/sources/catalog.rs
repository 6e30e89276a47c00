use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{CatalogProvider, CatalogTrack};
use crate::config::Config;
use crate::error::PlayerError;

/// Host de los links de catálogo que este cliente entiende.
pub const CATALOG_HOST: &str = "open.spotify.com";

/// Margen antes de la expiración real a partir del cual se renueva el token.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Cliente del catálogo de música externo.
///
/// Hace el intercambio client-credentials contra el endpoint de auth, cachea
/// el token hasta poco antes de su expiración y resuelve links de pista,
/// álbum y playlist a pares (artista, título). Las playlists largas se
/// recorren siguiendo la URL de continuación que devuelve la API.
pub struct CatalogClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    api_url: String,
    link_re: Regex,
    token: tokio::sync::Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    name: String,
    artists: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    // `track` viene null para entradas borradas o regionalmente bloqueadas
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct AlbumTracks {
    items: Vec<ApiTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Track,
    Playlist,
    Album,
}

impl CatalogClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("no se pudo crear el cliente HTTP del catálogo")?;

        Ok(Self {
            http,
            client_id: config.catalog_client_id.clone(),
            client_secret: config.catalog_client_secret.clone(),
            auth_url: config.catalog_auth_url.clone(),
            api_url: config.catalog_api_url.clone(),
            link_re: Regex::new(r"/(track|playlist|album)/([A-Za-z0-9]+)")
                .expect("regex de links de catálogo inválida"),
            token: tokio::sync::Mutex::new(None),
        })
    }

    /// Token de acceso vigente, renovándolo si expiró o está por expirar.
    async fn token(&self) -> Result<String, PlayerError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("🔑 renovando token de catálogo");
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response: TokenResponse = self
            .http
            .post(&self.auth_url)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let expires_at = Utc::now()
            + chrono::Duration::seconds((response.expires_in - TOKEN_REFRESH_MARGIN_SECS).max(0));
        let access_token = response.access_token.clone();
        *guard = Some(CachedToken {
            access_token: response.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    fn parse_link(&self, url: &str) -> Result<(LinkKind, String), PlayerError> {
        let captures = self
            .link_re
            .captures(url)
            .ok_or_else(|| PlayerError::InvalidCatalogLink(url.to_string()))?;
        let kind = match &captures[1] {
            "track" => LinkKind::Track,
            "playlist" => LinkKind::Playlist,
            "album" => LinkKind::Album,
            _ => unreachable!("la regex solo captura esos tres subtipos"),
        };
        Ok((kind, captures[2].to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, PlayerError> {
        let value = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }

    async fn fetch_track(&self, id: &str, token: &str) -> Result<Vec<CatalogTrack>, PlayerError> {
        let track: ApiTrack = self
            .get_json(&format!("{}/tracks/{}", self.api_url, id), token)
            .await?;
        Ok(vec![to_catalog_track(track)])
    }

    async fn fetch_album(&self, id: &str, token: &str) -> Result<Vec<CatalogTrack>, PlayerError> {
        let album: AlbumTracks = self
            .get_json(&format!("{}/albums/{}/tracks", self.api_url, id), token)
            .await?;
        Ok(album.items.into_iter().map(to_catalog_track).collect())
    }

    async fn fetch_playlist(
        &self,
        id: &str,
        token: &str,
    ) -> Result<Vec<CatalogTrack>, PlayerError> {
        let mut tracks = Vec::new();
        let mut next = Some(format!("{}/playlists/{}/tracks", self.api_url, id));

        // las playlists grandes llegan paginadas; `next` es la continuación
        while let Some(page_url) = next {
            let page: PlaylistPage = self.get_json(&page_url, token).await?;
            tracks.extend(page.items.into_iter().filter_map(|item| item.track).map(to_catalog_track));
            next = page.next;
        }

        Ok(tracks)
    }
}

fn to_catalog_track(track: ApiTrack) -> CatalogTrack {
    // se toma el nombre del primer artista
    let artist = track
        .artists
        .into_iter()
        .next()
        .map(|a| a.name)
        .unwrap_or_default();
    CatalogTrack {
        artist,
        title: track.name,
    }
}

#[async_trait]
impl CatalogProvider for CatalogClient {
    fn matches(&self, url: &Url) -> bool {
        url.host_str() == Some(CATALOG_HOST)
    }

    async fn lookup(&self, url: &str) -> Result<Vec<CatalogTrack>, PlayerError> {
        let (kind, id) = self.parse_link(url)?;
        let token = self.token().await?;

        let tracks = match kind {
            LinkKind::Track => self.fetch_track(&id, &token).await?,
            LinkKind::Album => self.fetch_album(&id, &token).await?,
            LinkKind::Playlist => self.fetch_playlist(&id, &token).await?,
        };
        info!("🎼 catálogo devolvió {} pistas para {}", tracks.len(), url);
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> CatalogClient {
        CatalogClient::new(&Config::default()).unwrap()
    }

    #[test]
    fn reconoce_los_tres_subtipos_de_link() {
        let c = client();
        let (kind, id) = c
            .parse_link("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
            .unwrap();
        assert_eq!(kind, LinkKind::Track);
        assert_eq!(id, "4uLU6hMCjMI75M1A2tKUQC");

        let (kind, _) = c
            .parse_link("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M")
            .unwrap();
        assert_eq!(kind, LinkKind::Playlist);

        let (kind, _) = c
            .parse_link("https://open.spotify.com/album/6tpszgfcdxGestgUdMGUMM")
            .unwrap();
        assert_eq!(kind, LinkKind::Album);
    }

    #[test]
    fn link_sin_subtipo_conocido_es_invalido() {
        let c = client();
        let err = c
            .parse_link("https://open.spotify.com/artist/1Mxqyy3pSjf8kZZL4QVxS0")
            .unwrap_err();
        assert!(matches!(err, PlayerError::InvalidCatalogLink(_)));
    }

    #[test]
    fn matches_solo_acepta_el_host_del_catalogo() {
        let c = client();
        let catalog = Url::parse("https://open.spotify.com/track/abc").unwrap();
        let other = Url::parse("https://example.com/track/abc").unwrap();
        assert!(c.matches(&catalog));
        assert!(!c.matches(&other));
    }

    #[test]
    fn el_primer_artista_define_el_par() {
        let track = ApiTrack {
            name: "Paranoid".to_string(),
            artists: vec![
                ApiArtist {
                    name: "Black Sabbath".to_string(),
                },
                ApiArtist {
                    name: "Otro".to_string(),
                },
            ],
        };
        let entry = to_catalog_track(track);
        assert_eq!(entry.artist, "Black Sabbath");
        assert_eq!(entry.search_query(), "Black Sabbath, Paranoid");
    }
}
