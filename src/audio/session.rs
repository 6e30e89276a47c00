use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::queue::MusicQueue;
use crate::sources::{PlayableHandle, Track};

/// Id numérico del servidor al que pertenece una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GuildId {
    fn from(id: u64) -> Self {
        GuildId(id)
    }
}

/// Estado de reproducción de una sesión.
///
/// `Loading` cubre la ventana en la que una pista ya salió de la cola pero
/// su resolución sigue en vuelo; para `advance` cuenta como ocupado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// La pista sonando ahora, con su recurso ligado al iniciar la reproducción.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub track: Track,
    pub handle: PlayableHandle,
    pub started_at: DateTime<Utc>,
}

/// Estado mutable de una sesión, siempre detrás del lock de la sesión.
#[derive(Debug)]
pub struct SessionState {
    pub queue: MusicQueue,
    pub now_playing: Option<NowPlaying>,
    pub playback: PlaybackState,
    pub loop_enabled: bool,
    pub voice_connected: bool,
    /// Contador de generación: se incrementa en cada intento de avance y en
    /// cada stop. Los resultados de resoluciones y los eventos de
    /// finalización que lleguen con una generación vieja se descartan.
    pub generation: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            queue: MusicQueue::new(),
            now_playing: None,
            playback: PlaybackState::Idle,
            loop_enabled: false,
            voice_connected: false,
            generation: 0,
        }
    }
}

/// Contexto de reproducción aislado de un servidor.
///
/// Todo el estado mutable vive detrás de un `parking_lot::Mutex`, que no se
/// puede retener a través de un `await`: los pasos que suspenden (resolución,
/// extracción) corren sin el lock y recomprueban la generación al volver.
pub struct GuildSession {
    id: GuildId,
    pub(crate) state: Mutex<SessionState>,
}

impl GuildSession {
    pub fn new(id: GuildId) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn id(&self) -> GuildId {
        self.id
    }

    pub fn loop_enabled(&self) -> bool {
        self.state.lock().loop_enabled
    }

    pub fn playback(&self) -> PlaybackState {
        self.state.lock().playback
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.state.lock().now_playing.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

/// Mapa global de sesiones, una por servidor activo.
///
/// Las entradas se crean al primer toque y solo se quitan explícitamente
/// cuando el bot deja el servidor.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Devuelve la sesión del servidor, creándola si no existe. El segundo
    /// componente indica si la entrada es nueva; la creación concurrente
    /// desde varios eventos del mismo servidor produce una sola sesión.
    pub fn get_or_create(&self, id: GuildId) -> (Arc<GuildSession>, bool) {
        let mut created = false;
        let session = self
            .sessions
            .entry(id)
            .or_insert_with(|| {
                created = true;
                info!("🆕 sesión creada para guild {}", id);
                Arc::new(GuildSession::new(id))
            })
            .clone();
        (session, created)
    }

    pub fn get(&self, id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    /// Quita la sesión al dejar el servidor.
    pub fn remove(&self, id: GuildId) -> Option<Arc<GuildSession>> {
        let removed = self.sessions.remove(&id).map(|(_, session)| session);
        if removed.is_some() {
            debug!("sesión de guild {} eliminada", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_or_create_devuelve_siempre_la_misma_sesion() {
        let registry = SessionRegistry::new();
        let (first, created) = registry.get_or_create(GuildId(1));
        assert!(created);
        let (second, created) = registry.get_or_create(GuildId(1));
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn el_primer_toque_concurrente_crea_una_sola_sesion() {
        let registry = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_or_create(GuildId(7)).0)
            })
            .collect();

        let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_solo_borra_la_sesion_pedida() {
        let registry = SessionRegistry::new();
        registry.get_or_create(GuildId(1));
        registry.get_or_create(GuildId(2));

        assert!(registry.remove(GuildId(1)).is_some());
        assert!(registry.remove(GuildId(1)).is_none());
        assert!(registry.get(GuildId(2)).is_some());
        assert_eq!(registry.len(), 1);
    }
}
