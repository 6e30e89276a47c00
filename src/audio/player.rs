use chrono::Utc;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::QueuePage,
        session::{GuildId, GuildSession, NowPlaying, PlaybackState, SessionRegistry},
    },
    config::Config,
    error::PlayerError,
    sources::{resolver::TrackResolver, PlayableHandle, Track},
    storage::JsonStorage,
    voice::{CompletionToken, Notifier, TrackEndEvent, VoiceClient},
};

/// Scheduler de reproducción: una máquina de estados por sesión que encadena
/// pista tras pista sin superposición.
///
/// Cada operación que afecta la reproducción (avanzar, completar, pausar,
/// parar) toma el lock de estado de la sesión solo para leer o escribir el
/// estado, nunca durante la resolución de red. Un stop que llega mientras
/// una resolución está en vuelo incrementa la generación de la sesión; el
/// resultado tardío se descarta al recomprobar la generación antes del
/// commit.
///
/// Los eventos de finalización de la capa de voz entran por un canal y se
/// procesan en una tarea propia, de modo que el callback externo nunca toca
/// el estado de la sesión directamente.
pub struct Player {
    config: Arc<Config>,
    sessions: SessionRegistry,
    resolver: Arc<TrackResolver>,
    voice: Arc<dyn VoiceClient>,
    notifier: Arc<dyn Notifier>,
    storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    completions: UnboundedSender<TrackEndEvent>,
}

impl Player {
    /// Crea el scheduler y arranca la tarea que drena los eventos de
    /// finalización. Debe llamarse dentro de un runtime de tokio.
    pub fn new(
        config: Arc<Config>,
        resolver: Arc<TrackResolver>,
        voice: Arc<dyn VoiceClient>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Arc::new(Self {
            config,
            sessions: SessionRegistry::new(),
            resolver,
            voice,
            notifier,
            storage,
            completions: tx,
        });
        tokio::spawn(Self::completion_loop(Arc::downgrade(&player), rx));
        player
    }

    async fn completion_loop(player: Weak<Player>, mut rx: UnboundedReceiver<TrackEndEvent>) {
        while let Some(event) = rx.recv().await {
            let Some(player) = player.upgrade() else { break };
            player.handle_track_end(event).await;
        }
        debug!("canal de finalizaciones cerrado");
    }

    /// Sesión del servidor, creándola al primer toque. Los ajustes
    /// persistidos (flag de loop) se cargan solo en la creación.
    pub async fn session(&self, guild: GuildId) -> Arc<GuildSession> {
        let (session, created) = self.sessions.get_or_create(guild);
        if created {
            match self.storage.lock().await.server_settings(guild).await {
                Ok(settings) => session.state.lock().loop_enabled = settings.loop_enabled,
                Err(e) => warn!("no se pudieron cargar los ajustes de {}: {}", guild, e),
            }
        }
        session
    }

    fn existing(&self, guild: GuildId) -> Result<Arc<GuildSession>, PlayerError> {
        self.sessions.get(guild).ok_or(PlayerError::NothingPlaying)
    }

    /// Resuelve un request y encola el resultado. Si la sesión estaba
    /// ociosa, dispara el avance. Devuelve cuántas pistas entraron.
    pub async fn enqueue_request(
        &self,
        guild: GuildId,
        request: &str,
        requested_by: &str,
    ) -> Result<usize, PlayerError> {
        let session = self.session(guild).await;
        let tracks = self.resolver.resolve(request, requested_by).await?;

        let (count, should_advance) = {
            let mut st = session.state.lock();
            for track in &tracks {
                st.queue.enqueue(track.clone());
            }
            (tracks.len(), st.playback == PlaybackState::Idle)
        };
        info!("➕ {} pistas encoladas en guild {}", count, guild);

        if should_advance {
            self.advance(guild).await;
        }
        Ok(count)
    }

    /// Variante de `enqueue_request` que deja la pista al principio de la
    /// cola. Solo acepta requests que resuelvan a una única pista.
    pub async fn enqueue_request_next(
        &self,
        guild: GuildId,
        request: &str,
        requested_by: &str,
    ) -> Result<usize, PlayerError> {
        let session = self.session(guild).await;
        let tracks = self.resolver.resolve(request, requested_by).await?;
        if tracks.len() != 1 {
            return Err(PlayerError::NotASingleTrack);
        }
        let track = tracks.into_iter().next().expect("longitud ya chequeada");

        let should_advance = {
            let mut st = session.state.lock();
            let new_len = st.queue.enqueue(track);
            if new_len > 1 {
                st.queue.promote(new_len - 1)?;
            }
            st.playback == PlaybackState::Idle
        };

        if should_advance {
            self.advance(guild).await;
        }
        Ok(1)
    }

    /// Paso de avance: saca la próxima pista, la termina de resolver y
    /// arranca su reproducción. Solo actúa con la sesión ociosa; llamado
    /// durante una reproducción es un no-op.
    ///
    /// Los fallos de resolución descartan esa pista, se reportan una vez y
    /// se reintenta con la siguiente, acotado por la longitud que tenía la
    /// cola al entrar.
    pub async fn advance(&self, guild: GuildId) {
        let session = self.session(guild).await;
        let mut budget = session.queue_len().max(1);

        loop {
            let (track, generation) = {
                let mut st = session.state.lock();
                if st.playback != PlaybackState::Idle {
                    debug!("advance ignorado en {}: estado {:?}", guild, st.playback);
                    return;
                }
                match st.queue.dequeue_next() {
                    None => {
                        st.now_playing = None;
                        debug!("📭 cola vacía en guild {}", guild);
                        return;
                    }
                    Some(track) => {
                        st.generation += 1;
                        st.playback = PlaybackState::Loading;
                        (track, st.generation)
                    }
                }
            };

            // la resolución corre sin el lock; un stop concurrente invalida
            // la generación y el resultado se descarta al volver
            match self.resolver.resolve_playable(&track).await {
                Ok(handle) => {
                    if self.commit_playback(&session, &track, handle, generation) {
                        return;
                    }
                    let mut st = session.state.lock();
                    if st.generation != generation {
                        return;
                    }
                    st.playback = PlaybackState::Idle;
                }
                Err(err) => {
                    warn!("⚠️ no se pudo resolver `{}`: {}", track.source_ref(), err);
                    self.notifier.notify(
                        guild,
                        format!("Saltando **{}**: {}", track.title(), err.user_message()),
                    );
                    let mut st = session.state.lock();
                    if st.generation != generation {
                        return;
                    }
                    st.playback = PlaybackState::Idle;
                }
            }

            budget -= 1;
            if budget == 0 {
                return;
            }
        }
    }

    /// Commit del avance: con el lock tomado de nuevo, recomprueba que nadie
    /// paró la sesión durante la resolución y arranca la reproducción.
    /// Devuelve `true` si la pista quedó sonando.
    fn commit_playback(
        &self,
        session: &GuildSession,
        track: &Track,
        handle: PlayableHandle,
        generation: u64,
    ) -> bool {
        let guild = session.id();
        let started = {
            let mut st = session.state.lock();
            if st.generation != generation || st.playback != PlaybackState::Loading {
                info!("🛑 resolución obsoleta descartada en guild {}", guild);
                drop(st);
                self.discard_handle(handle);
                return true; // nada más que hacer en este avance
            }

            let token = CompletionToken::new(guild, generation, self.completions.clone());
            match self.voice.start(guild, &handle, token) {
                Ok(()) => {
                    st.now_playing = Some(NowPlaying {
                        track: track.clone(),
                        handle: handle.clone(),
                        started_at: Utc::now(),
                    });
                    st.playback = PlaybackState::Playing;
                    st.voice_connected = true;
                    true
                }
                Err(e) => {
                    warn!("❌ la capa de voz no pudo iniciar `{}`: {}", track.title(), e);
                    false
                }
            }
        };

        if started {
            let length = handle
                .duration
                .map(|d| format!(" ({})", humantime::format_duration(d)))
                .unwrap_or_default();
            self.notifier
                .notify(guild, format!("Reproduciendo: **{}**{}", track.title(), length));
            info!("🎵 reproduciendo `{}` en guild {}", track.title(), guild);
        } else {
            self.discard_handle(handle);
            self.notifier.notify(
                guild,
                format!("Error al iniciar **{}**; se salta.", track.title()),
            );
        }
        started
    }

    /// Procesa el final de una pista: libera el recurso transitorio,
    /// re-encola una copia fresca si el loop está activo y encadena el
    /// siguiente avance. Los eventos con generación vieja (la sesión fue
    /// parada después de iniciarse esa pista) se ignoran.
    pub async fn handle_track_end(&self, event: TrackEndEvent) {
        let Some(session) = self.sessions.get(event.guild) else {
            return;
        };

        let finished = {
            let mut st = session.state.lock();
            if st.generation != event.generation {
                debug!(
                    "evento de finalización obsoleto en {} (gen {} actual {})",
                    event.guild, event.generation, st.generation
                );
                return;
            }
            let finished = st.now_playing.take();
            st.playback = PlaybackState::Idle;
            if st.loop_enabled {
                if let Some(np) = finished.as_ref() {
                    // copia fresca al final: se vuelve a resolver al sonar
                    st.queue.enqueue(np.track.clone());
                }
            }
            finished
        };

        if let Some(err) = event.error {
            warn!("error de reproducción en {}: {}", event.guild, err);
            self.notifier
                .notify(event.guild, format!("Error de reproducción: {err}"));
        }
        if let Some(np) = finished {
            self.discard_handle(np.handle);
        }

        self.advance(event.guild).await;
    }

    /// Pausa la reproducción en curso.
    pub fn pause(&self, guild: GuildId) -> Result<(), PlayerError> {
        let session = self.existing(guild)?;
        let mut st = session.state.lock();
        match st.playback {
            PlaybackState::Playing => {
                self.voice.pause(guild).map_err(PlayerError::Upstream)?;
                st.playback = PlaybackState::Paused;
                info!("⏸️ pausa en guild {}", guild);
                Ok(())
            }
            PlaybackState::Paused => Err(PlayerError::AlreadyPaused),
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    /// Reanuda una reproducción pausada.
    pub fn resume(&self, guild: GuildId) -> Result<(), PlayerError> {
        let session = self.existing(guild)?;
        let mut st = session.state.lock();
        match st.playback {
            PlaybackState::Paused => {
                self.voice.resume(guild).map_err(PlayerError::Upstream)?;
                st.playback = PlaybackState::Playing;
                info!("▶️ reanudado en guild {}", guild);
                Ok(())
            }
            PlaybackState::Playing => Err(PlayerError::NotPaused),
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    /// Salta la pista actual pidiendo el stop a la capa de voz. El avance lo
    /// dispara el evento de finalización que ese stop produce; saltar no
    /// avanza directo, para no avanzar dos veces.
    pub fn skip(&self, guild: GuildId) -> Result<String, PlayerError> {
        let session = self.existing(guild)?;
        let st = session.state.lock();
        match st.playback {
            PlaybackState::Playing | PlaybackState::Paused => {
                let title = st
                    .now_playing
                    .as_ref()
                    .map(|np| np.track.title().to_string())
                    .unwrap_or_default();
                self.voice.stop(guild).map_err(PlayerError::Upstream)?;
                info!("⏭️ saltando `{}` en guild {}", title, guild);
                Ok(title)
            }
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    /// Para todo: vacía la cola, descarta la pista actual y desconecta la
    /// voz. Invalida además cualquier resolución en vuelo. Devuelve cuántas
    /// pistas encoladas se descartaron.
    pub async fn stop(&self, guild: GuildId) -> Result<usize, PlayerError> {
        let session = self.existing(guild)?;

        let (cleared, finished) = {
            let mut st = session.state.lock();
            st.generation += 1;
            let cleared = st.queue.remove_all();
            let finished = st.now_playing.take();
            st.playback = PlaybackState::Idle;
            st.voice_connected = false;
            (cleared, finished)
        };

        if let Err(e) = self.voice.stop(guild) {
            warn!("fallo al parar la voz en {}: {}", guild, e);
        }
        if let Err(e) = self.voice.disconnect(guild) {
            warn!("fallo al desconectar la voz en {}: {}", guild, e);
        }
        if let Some(np) = finished {
            self.discard_handle(np.handle);
        }

        info!("⏹️ reproducción parada en guild {} ({} descartadas)", guild, cleared);
        Ok(cleared)
    }

    /// La capa de voz reporta que el canal quedó sin humanos: equivale a un
    /// stop.
    pub async fn handle_channel_empty(&self, guild: GuildId) {
        if self.sessions.get(guild).is_some() {
            info!("👋 canal vacío en guild {}, parando", guild);
            let _ = self.stop(guild).await;
        }
    }

    /// El bot dejó el servidor: para la sesión y la elimina del registro.
    pub async fn handle_guild_leave(&self, guild: GuildId) {
        let _ = self.stop(guild).await;
        self.sessions.remove(guild);
    }

    /// Activa o desactiva el loop de la cola y persiste el flag.
    pub async fn toggle_loop(&self, guild: GuildId) -> bool {
        let session = self.session(guild).await;
        let enabled = {
            let mut st = session.state.lock();
            st.loop_enabled = !st.loop_enabled;
            st.loop_enabled
        };
        if let Err(e) = self.storage.lock().await.set_loop_enabled(guild, enabled).await {
            warn!("no se pudo persistir el loop de {}: {}", guild, e);
        }
        enabled
    }

    // Operaciones de cola expuestas 1:1 a la capa de comandos; sin sesión,
    // la cola cuenta como vacía

    pub fn remove_at(&self, guild: GuildId, index: usize) -> Result<Track, PlayerError> {
        let Some(session) = self.sessions.get(guild) else {
            return Err(PlayerError::IndexOutOfRange { index, len: 0 });
        };
        let mut st = session.state.lock();
        st.queue.remove_at(index)
    }

    pub fn clear_queue(&self, guild: GuildId) -> Result<usize, PlayerError> {
        let Some(session) = self.sessions.get(guild) else {
            return Ok(0);
        };
        let mut st = session.state.lock();
        Ok(st.queue.remove_all())
    }

    pub fn promote(&self, guild: GuildId, index: usize) -> Result<Track, PlayerError> {
        let Some(session) = self.sessions.get(guild) else {
            return Err(PlayerError::EmptyQueue);
        };
        let mut st = session.state.lock();
        st.queue.promote(index).map(Track::clone)
    }

    pub fn shuffle(&self, guild: GuildId) -> Result<(), PlayerError> {
        let Some(session) = self.sessions.get(guild) else {
            return Err(PlayerError::EmptyQueue);
        };
        let mut st = session.state.lock();
        st.queue.shuffle()
    }

    pub fn list_queue(&self, guild: GuildId, page: usize) -> QueuePage {
        match self.sessions.get(guild) {
            Some(session) => {
                let st = session.state.lock();
                st.queue.page(page, self.config.queue_page_size)
            }
            None => QueuePage::empty(),
        }
    }

    pub fn now_playing(&self, guild: GuildId) -> Option<NowPlaying> {
        self.sessions.get(guild).and_then(|s| s.now_playing())
    }

    // Jukebox: playlists guardadas del servidor

    pub async fn jukebox_add(
        &self,
        guild: GuildId,
        alias: &str,
        url: &str,
    ) -> Result<(), PlayerError> {
        self.storage.lock().await.jukebox_add(guild, alias, url).await
    }

    pub async fn jukebox_remove(&self, guild: GuildId, alias: &str) -> Result<(), PlayerError> {
        self.storage.lock().await.jukebox_remove(guild, alias).await
    }

    pub async fn jukebox_list(&self, guild: GuildId) -> Result<Vec<(String, String)>, PlayerError> {
        self.storage
            .lock()
            .await
            .jukebox_list(guild)
            .await
            .map_err(PlayerError::Upstream)
    }

    /// Borra en background el archivo temporal de un handle, si lo hay. Los
    /// fallos se loguean y nunca frenan el avance al siguiente tema.
    fn discard_handle(&self, handle: PlayableHandle) {
        if let Some(path) = handle.local_path {
            tokio::spawn(async move {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("🗑️ no se pudo borrar {}: {}", path.display(), e);
                }
            });
        }
    }
}
