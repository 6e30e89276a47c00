//! # Sources Module
//!
//! Track model and request resolution for Open Jukebox.
//!
//! This module defines what a queued track *is* and how a raw user request
//! (a direct link, free text, a playlist link or a catalog link) becomes one
//! or more of them:
//!
//! ### [`resolver`] - Request Resolution
//! - Classifies a request by URL shape, once, into a [`Provenance`] tag
//! - Expands playlists and catalog collections into individual tracks
//! - Performs the lazy second pass that binds a playable handle right
//!   before playback
//!
//! ### [`catalog`] - Catalog Client
//! - Client-credentials token exchange with cached refresh
//! - Track / playlist / album metadata lookups with page continuation
//!
//! The concrete search and media-extraction backends live behind the
//! [`SearchProvider`], [`PlaylistProvider`] and [`MediaExtractor`] traits;
//! the crate never shells out or scrapes by itself.

pub mod catalog;
pub mod resolver;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::PlayerError;

/// Cómo se obtuvo el `source_ref` de una pista y qué falta para reproducirla.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Link genérico directamente reproducible.
    DirectUrl,
    /// Primer resultado de una búsqueda de texto libre.
    SearchResult,
    /// Entrada de una playlist expandida.
    PlaylistEntry,
    /// Metadata de catálogo; `source_ref` es una consulta de búsqueda, no un
    /// link reproducible, y se resuelve recién al reproducir.
    CatalogEntry,
}

impl Provenance {
    /// Las entradas de catálogo necesitan una segunda pasada texto → URL.
    pub fn needs_search(&self) -> bool {
        matches!(self, Provenance::CatalogEntry)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::DirectUrl => "direct",
            Provenance::SearchResult => "search",
            Provenance::PlaylistEntry => "playlist",
            Provenance::CatalogEntry => "catalog",
        }
    }
}

/// Una pista encolada, resuelta lo suficiente para entrar a la cola.
///
/// Inmutable una vez construida: la re-resolución produce un
/// [`PlayableHandle`] transitorio nuevo, nunca muta la pista.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    source_ref: String,
    provenance: Provenance,
    requested_by: String,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        source_ref: impl Into<String>,
        provenance: Provenance,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            source_ref: source_ref.into(),
            provenance,
            requested_by: requested_by.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }
}

/// Resultado de una búsqueda texto → URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Entrada de una playlist expandida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
}

/// Par (artista, título) devuelto por el catálogo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub artist: String,
    pub title: String,
}

impl CatalogTrack {
    /// Consulta sintética con la que se busca la pista al reproducirla.
    pub fn search_query(&self) -> String {
        format!("{}, {}", self.artist, self.title)
    }
}

/// Recurso reproducible ligado en el momento de iniciar la reproducción.
///
/// `local_path` apunta al archivo temporal descargado, si lo hay; el
/// scheduler lo libera cuando la pista termina.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableHandle {
    pub media_url: String,
    pub duration: Option<Duration>,
    pub local_path: Option<PathBuf>,
}

impl PlayableHandle {
    pub fn new(media_url: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
            duration: None,
            local_path: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_local_path(mut self, path: PathBuf) -> Self {
        self.local_path = Some(path);
        self
    }
}

/// Búsqueda de texto libre contra el proveedor externo.
///
/// El resolver solo consume el primer resultado; `limit` existe para que la
/// capa de comandos pueda mostrar un selector con varios.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Expansión de un link de playlist en sus entradas ordenadas.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    /// Puede fallar con [`PlayerError::InvalidPlaylistLink`] si el link no
    /// apunta a una playlist del proveedor.
    async fn expand(&self, url: &str) -> Result<Vec<PlaylistEntry>, PlayerError>;
}

/// Lookup de metadata en el catálogo de música externo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Decide si la URL pertenece al catálogo.
    fn matches(&self, url: &Url) -> bool;

    /// Devuelve los pares (artista, título) del link, sea una pista suelta,
    /// un álbum o una playlist paginada.
    async fn lookup(&self, url: &str) -> Result<Vec<CatalogTrack>, PlayerError>;
}

/// Extracción del recurso de audio final a partir de un locator concreto.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Falla con [`PlayerError::UnplayableSource`] para fuentes rechazadas,
    /// por ejemplo livestreams.
    async fn extract(&self, url: &str) -> Result<PlayableHandle, PlayerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn catalog_track_arma_la_consulta_sintetica() {
        let entry = CatalogTrack {
            artist: "Mastodon".to_string(),
            title: "Oblivion".to_string(),
        };
        assert_eq!(entry.search_query(), "Mastodon, Oblivion");
    }

    #[test]
    fn solo_las_entradas_de_catalogo_requieren_busqueda() {
        assert!(Provenance::CatalogEntry.needs_search());
        assert!(!Provenance::DirectUrl.needs_search());
        assert!(!Provenance::SearchResult.needs_search());
        assert!(!Provenance::PlaylistEntry.needs_search());
    }
}
