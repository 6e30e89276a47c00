use tokio::sync::mpsc::UnboundedSender;

use crate::audio::session::GuildId;
use crate::sources::PlayableHandle;

/// Evento de finalización de pista que la capa de voz devuelve al scheduler.
///
/// Llega exactamente una vez por pista iniciada: al terminar natural, al
/// cortarla un stop explícito o al fallar la reproducción.
#[derive(Debug, Clone)]
pub struct TrackEndEvent {
    pub guild: GuildId,
    pub generation: u64,
    pub error: Option<String>,
}

/// Token que el scheduler entrega junto con cada pista iniciada.
///
/// La capa de voz lo consume llamando [`CompletionToken::complete`] cuando
/// la pista termina; el evento viaja por canal hasta el contexto de la
/// sesión dueña, etiquetado con la generación con la que se inició.
#[derive(Debug)]
pub struct CompletionToken {
    guild: GuildId,
    generation: u64,
    sender: UnboundedSender<TrackEndEvent>,
}

impl CompletionToken {
    pub fn new(guild: GuildId, generation: u64, sender: UnboundedSender<TrackEndEvent>) -> Self {
        Self {
            guild,
            generation,
            sender,
        }
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Notifica el final de la pista. `error` lleva el mensaje si la
    /// reproducción falló. Si el scheduler ya no existe, el envío se pierde
    /// sin más.
    pub fn complete(self, error: Option<String>) {
        let _ = self.sender.send(TrackEndEvent {
            guild: self.guild,
            generation: self.generation,
            error,
        });
    }
}

/// Control de la conexión de voz externa.
///
/// Las llamadas son de control puro y deben volver rápido; el streaming de
/// audio en sí corre del lado del implementador. `start` recibe el token de
/// finalización que debe completarse exactamente una vez.
#[cfg_attr(test, mockall::automock)]
pub trait VoiceClient: Send + Sync {
    fn start(
        &self,
        guild: GuildId,
        handle: &PlayableHandle,
        on_end: CompletionToken,
    ) -> anyhow::Result<()>;

    fn pause(&self, guild: GuildId) -> anyhow::Result<()>;

    fn resume(&self, guild: GuildId) -> anyhow::Result<()>;

    fn stop(&self, guild: GuildId) -> anyhow::Result<()>;

    fn disconnect(&self, guild: GuildId) -> anyhow::Result<()>;

    fn is_playing(&self, guild: GuildId) -> bool;

    fn is_paused(&self, guild: GuildId) -> bool;
}

/// Feedback de texto hacia el usuario, fire-and-forget desde el scheduler.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, guild: GuildId, message: String);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn el_token_entrega_el_evento_con_su_generacion() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let token = CompletionToken::new(GuildId(9), 42, tx);

        token.complete(Some("se cayó el stream".to_string()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.guild, GuildId(9));
        assert_eq!(event.generation, 42);
        assert_eq!(event.error.as_deref(), Some("se cayó el stream"));
    }

    #[test]
    fn completar_sin_receptor_no_explota() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        CompletionToken::new(GuildId(1), 1, tx).complete(None);
    }
}
