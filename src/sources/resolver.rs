use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::{
    CatalogProvider, MediaExtractor, PlayableHandle, PlaylistProvider, Provenance, SearchHit,
    SearchProvider, Track,
};
use crate::error::PlayerError;

/// Títulos centinela con los que las playlists marcan entradas no disponibles.
const UNAVAILABLE_TITLES: [&str; 2] = ["[Private video]", "[Deleted video]"];

/// Clasificación de un request ya normalizado a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Catalog,
    Playlist,
    Direct,
}

/// Convierte un request crudo (URL, texto libre, link de playlist o de
/// catálogo) en cero o más [`Track`] listos para encolar.
///
/// La clasificación se hace una sola vez y queda grabada en la
/// [`Provenance`] de cada pista; el resto del pipeline nunca vuelve a mirar
/// la forma de la URL. La resolución cara (texto → URL reproducible,
/// extracción de audio) se difiere a [`TrackResolver::resolve_playable`],
/// que el scheduler invoca recién antes de reproducir.
pub struct TrackResolver {
    search: Arc<dyn SearchProvider>,
    playlists: Arc<dyn PlaylistProvider>,
    catalog: Arc<dyn CatalogProvider>,
    extractor: Arc<dyn MediaExtractor>,
}

impl TrackResolver {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        playlists: Arc<dyn PlaylistProvider>,
        catalog: Arc<dyn CatalogProvider>,
        extractor: Arc<dyn MediaExtractor>,
    ) -> Self {
        Self {
            search,
            playlists,
            catalog,
            extractor,
        }
    }

    /// Resuelve un request en pistas encolables. No muta ninguna cola; el
    /// que llama decide qué hacer con el resultado.
    pub async fn resolve(
        &self,
        request: &str,
        requested_by: &str,
    ) -> Result<Vec<Track>, PlayerError> {
        let (url, search_hit) = match parse_absolute_url(request) {
            Some(url) => (url, None),
            None => {
                // no es una URL: se usa el primer resultado de búsqueda
                let hit = self.first_hit(request).await?;
                let url = parse_absolute_url(&hit.url).ok_or_else(|| {
                    PlayerError::Upstream(anyhow::anyhow!(
                        "el proveedor de búsqueda devolvió una URL inválida: {}",
                        hit.url
                    ))
                })?;
                info!("🔍 `{}` resuelto a {}", request, hit.url);
                (url, Some(hit))
            }
        };

        match self.classify(&url) {
            RequestKind::Catalog => {
                let entries = self.catalog.lookup(url.as_str()).await?;
                debug!("link de catálogo expandido en {} pistas", entries.len());
                Ok(entries
                    .into_iter()
                    .map(|entry| {
                        let query = entry.search_query();
                        Track::new(query.clone(), query, Provenance::CatalogEntry, requested_by)
                    })
                    .collect())
            }
            RequestKind::Playlist => {
                let entries = self.playlists.expand(url.as_str()).await?;
                let tracks: Vec<Track> = entries
                    .into_iter()
                    .filter(|entry| !UNAVAILABLE_TITLES.contains(&entry.title.as_str()))
                    .map(|entry| {
                        Track::new(entry.title, entry.url, Provenance::PlaylistEntry, requested_by)
                    })
                    .collect();
                debug!("playlist expandida en {} pistas disponibles", tracks.len());
                Ok(tracks)
            }
            RequestKind::Direct => match search_hit {
                Some(hit) => Ok(vec![Track::new(
                    hit.title,
                    hit.url,
                    Provenance::SearchResult,
                    requested_by,
                )]),
                // el request original se conserva tal cual como source_ref
                None => Ok(vec![Track::new(
                    request,
                    request,
                    Provenance::DirectUrl,
                    requested_by,
                )]),
            },
        }
    }

    /// Segunda fase, perezosa: obtiene el recurso reproducible de una pista.
    ///
    /// Para las entradas de catálogo el `source_ref` es una consulta de
    /// texto y primero se busca un locator concreto; después, para todas las
    /// provenances, el extractor externo liga el handle de audio.
    pub async fn resolve_playable(&self, track: &Track) -> Result<PlayableHandle, PlayerError> {
        let url = if track.provenance().needs_search() {
            let hit = self.first_hit(track.source_ref()).await?;
            debug!("`{}` resuelto a {}", track.source_ref(), hit.url);
            hit.url
        } else {
            track.source_ref().to_string()
        };

        self.extractor.extract(&url).await
    }

    /// Búsqueda de varios resultados para el selector de la capa de comandos.
    pub async fn search_page(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, PlayerError> {
        let hits = self
            .search
            .search(query, limit)
            .await
            .map_err(PlayerError::Upstream)?;
        if hits.is_empty() {
            return Err(PlayerError::NoSearchResults(query.to_string()));
        }
        Ok(hits)
    }

    async fn first_hit(&self, query: &str) -> Result<SearchHit, PlayerError> {
        self.search
            .search(query, 1)
            .await
            .map_err(PlayerError::Upstream)?
            .into_iter()
            .next()
            .ok_or_else(|| PlayerError::NoSearchResults(query.to_string()))
    }

    // prioridad: catálogo → playlist → link genérico
    fn classify(&self, url: &Url) -> RequestKind {
        if self.catalog.matches(url) {
            return RequestKind::Catalog;
        }
        let has_list_param = url.query_pairs().any(|(key, _)| key == "list");
        if has_list_param || url.path().contains("/playlist") {
            return RequestKind::Playlist;
        }
        RequestKind::Direct
    }
}

fn parse_absolute_url(request: &str) -> Option<Url> {
    match Url::parse(request) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        _ => None,
    }
}
