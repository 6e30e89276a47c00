use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::audio::session::GuildId;
use crate::error::PlayerError;

/// Máximo de playlists guardadas por servidor.
pub const JUKEBOX_CAPACITY: usize = 9;

/// Ajustes de un servidor que sobreviven a los reinicios.
///
/// Solo persisten el flag de loop y el jukebox (alias → URL de playlist
/// guardada); la cola de reproducción nunca se escribe a disco.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub guild_id: u64,
    pub loop_enabled: bool,
    #[serde(default)]
    pub jukebox: BTreeMap<String, String>,
}

impl ServerSettings {
    fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            loop_enabled: false,
            jukebox: BTreeMap::new(),
        }
    }
}

/// Almacenamiento de ajustes basado en archivos JSON, uno por servidor.
pub struct JsonStorage {
    data_dir: PathBuf,
    servers_cache: HashMap<u64, ServerSettings>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;

        let servers_dir = data_dir.join("servers");
        fs::create_dir_all(&servers_dir).await?;

        info!("📁 storage inicializado en {}", data_dir.display());

        let mut storage = Self {
            data_dir,
            servers_cache: HashMap::new(),
        };
        storage.load_all_servers().await?;

        Ok(storage)
    }

    /// Ajustes de un servidor, creando el archivo por defecto si no existe.
    pub async fn server_settings(&mut self, guild: GuildId) -> Result<ServerSettings> {
        if let Some(settings) = self.servers_cache.get(&guild.0) {
            return Ok(settings.clone());
        }

        match self.load_server(guild.0).await {
            Ok(settings) => {
                self.servers_cache.insert(guild.0, settings.clone());
                Ok(settings)
            }
            Err(_) => {
                let settings = ServerSettings::new(guild.0);
                self.save_server(&settings).await?;
                self.servers_cache.insert(guild.0, settings.clone());
                info!("📝 ajustes por defecto creados para guild {}", guild);
                Ok(settings)
            }
        }
    }

    pub async fn set_loop_enabled(&mut self, guild: GuildId, enabled: bool) -> Result<()> {
        let mut settings = self.server_settings(guild).await?;
        settings.loop_enabled = enabled;
        self.update_server(settings).await
    }

    /// Guarda una playlist en el jukebox del servidor.
    pub async fn jukebox_add(
        &mut self,
        guild: GuildId,
        alias: &str,
        url: &str,
    ) -> Result<(), PlayerError> {
        let mut settings = self
            .server_settings(guild)
            .await
            .map_err(PlayerError::Upstream)?;

        if settings.jukebox.contains_key(alias) {
            return Err(PlayerError::JukeboxDuplicate(alias.to_string()));
        }
        if settings.jukebox.len() >= JUKEBOX_CAPACITY {
            return Err(PlayerError::JukeboxFull(JUKEBOX_CAPACITY));
        }

        settings.jukebox.insert(alias.to_string(), url.to_string());
        self.update_server(settings)
            .await
            .map_err(PlayerError::Upstream)
    }

    pub async fn jukebox_remove(&mut self, guild: GuildId, alias: &str) -> Result<(), PlayerError> {
        let mut settings = self
            .server_settings(guild)
            .await
            .map_err(PlayerError::Upstream)?;

        if settings.jukebox.remove(alias).is_none() {
            return Err(PlayerError::JukeboxMissing(alias.to_string()));
        }
        self.update_server(settings)
            .await
            .map_err(PlayerError::Upstream)
    }

    pub async fn jukebox_list(&mut self, guild: GuildId) -> Result<Vec<(String, String)>> {
        let settings = self.server_settings(guild).await?;
        Ok(settings.jukebox.into_iter().collect())
    }

    // Métodos privados

    async fn update_server(&mut self, settings: ServerSettings) -> Result<()> {
        self.save_server(&settings).await?;
        self.servers_cache.insert(settings.guild_id, settings);
        Ok(())
    }

    async fn load_server(&self, guild_id: u64) -> Result<ServerSettings> {
        let content = fs::read_to_string(self.server_file_path(guild_id)).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_server(&self, settings: &ServerSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(self.server_file_path(settings.guild_id), content).await?;
        Ok(())
    }

    async fn load_all_servers(&mut self) -> Result<()> {
        let servers_dir = self.data_dir.join("servers");
        let mut files = fs::read_dir(&servers_dir).await?;
        let mut loaded = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let guild_id = path
                    .file_stem()
                    .and_then(|name| name.to_str())
                    .and_then(|name| name.strip_prefix("guild_"))
                    .and_then(|id| id.parse::<u64>().ok());
                if let Some(guild_id) = guild_id {
                    match self.load_server(guild_id).await {
                        Ok(settings) => {
                            self.servers_cache.insert(guild_id, settings);
                            loaded += 1;
                        }
                        Err(e) => {
                            warn!("error cargando ajustes de guild {}: {}", guild_id, e);
                        }
                    }
                }
            }
        }

        if loaded > 0 {
            info!("📂 cargados ajustes de {} servidores", loaded);
        }
        Ok(())
    }

    fn server_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir
            .join("servers")
            .join(format!("guild_{guild_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn storage(dir: &tempfile::TempDir) -> JsonStorage {
        JsonStorage::new(dir.path().to_path_buf()).await.unwrap()
    }

    #[tokio::test]
    async fn el_loop_persiste_entre_instancias() {
        let dir = tempfile::tempdir().unwrap();

        {
            let mut storage = storage(&dir).await;
            storage.set_loop_enabled(GuildId(5), true).await.unwrap();
        }

        let mut reloaded = storage(&dir).await;
        let settings = reloaded.server_settings(GuildId(5)).await.unwrap();
        assert!(settings.loop_enabled);
    }

    #[tokio::test]
    async fn la_cola_no_se_persiste_solo_ajustes() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(&dir).await;
        storage.set_loop_enabled(GuildId(5), true).await.unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("servers").join("guild_5.json")).unwrap();
        assert!(content.contains("loop_enabled"));
        assert!(!content.contains("queue"));
    }

    #[tokio::test]
    async fn el_jukebox_respeta_duplicados_y_capacidad() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(&dir).await;
        let guild = GuildId(1);

        storage
            .jukebox_add(guild, "metal", "https://example.com/pl1")
            .await
            .unwrap();

        let err = storage
            .jukebox_add(guild, "metal", "https://example.com/pl2")
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::JukeboxDuplicate(_)));

        for i in 1..JUKEBOX_CAPACITY {
            storage
                .jukebox_add(guild, &format!("pl{i}"), "https://example.com/x")
                .await
                .unwrap();
        }
        let err = storage
            .jukebox_add(guild, "desborde", "https://example.com/x")
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::JukeboxFull(JUKEBOX_CAPACITY)));
    }

    #[tokio::test]
    async fn quitar_un_alias_inexistente_falla() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(&dir).await;

        let err = storage
            .jukebox_remove(GuildId(1), "nada")
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::JukeboxMissing(_)));
    }

    #[tokio::test]
    async fn listar_devuelve_los_alias_ordenados() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(&dir).await;
        let guild = GuildId(2);

        storage.jukebox_add(guild, "zz", "https://example.com/z").await.unwrap();
        storage.jukebox_add(guild, "aa", "https://example.com/a").await.unwrap();

        let list = storage.jukebox_list(guild).await.unwrap();
        let aliases: Vec<&str> = list.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(aliases, vec!["aa", "zz"]);
    }
}
