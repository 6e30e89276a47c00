//! Typed error taxonomy for the playback core.
//!
//! `PlayerError` covers the spec.md §7 expected conditions; the `Display`
//! string of each variant is the single human-readable message for that kind.
//! Opaque upstream failures are carried through [`PlayerError::Upstream`],
//! which wraps an [`anyhow::Error`].

use thiserror::Error;

/// Expected, typed failure conditions of the playback core.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// No hay pistas en la cola.
    #[error("La cola está vacía.")]
    EmptyQueue,

    /// Un índice de cola fuera de rango.
    #[error("Índice {index} fuera de rango (la cola tiene {len}).")]
    IndexOutOfRange { index: usize, len: usize },

    /// La pista ya está en la cabeza de la cola.
    #[error("**{0}** ya está en la cabeza de la cola.")]
    AlreadyAtTop(String),

    /// El link de catálogo no es válido.
    #[error("Link de catálogo inválido: {0}")]
    InvalidCatalogLink(String),

    /// El link de playlist no es válido.
    #[error("Link de playlist inválido: {0}")]
    InvalidPlaylistLink(String),

    /// La búsqueda no devolvió resultados.
    #[error("Sin resultados para: {0}")]
    NoSearchResults(String),

    /// La fuente no se puede reproducir.
    #[error("Fuente no reproducible: {0}")]
    UnplayableSource(String),

    /// La petición no resuelve a una única pista.
    #[error("La petición no corresponde a una sola pista.")]
    NotASingleTrack,

    /// No hay nada reproduciéndose.
    #[error("No hay nada reproduciéndose.")]
    NothingPlaying,

    /// La reproducción ya está en pausa.
    #[error("La reproducción ya está en pausa.")]
    AlreadyPaused,

    /// La reproducción no está en pausa.
    #[error("La reproducción no está en pausa.")]
    NotPaused,

    /// El alias de jukebox ya existe.
    #[error("Ya existe una entrada de jukebox con el alias **{0}**.")]
    JukeboxDuplicate(String),

    /// No existe ese alias de jukebox.
    #[error("No existe ninguna entrada de jukebox con el alias **{0}**.")]
    JukeboxMissing(String),

    /// El jukebox alcanzó su capacidad máxima.
    #[error("El jukebox está lleno (máximo {0}).")]
    JukeboxFull(usize),

    /// Fallo opaco de un colaborador externo.
    #[error("{0}")]
    Upstream(#[from] anyhow::Error),
}

impl PlayerError {
    /// Mensaje legible para el usuario final (la propia cadena `Display`).
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        PlayerError::Upstream(err.into())
    }
}
