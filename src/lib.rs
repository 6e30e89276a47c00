//! # Open Jukebox
//!
//! Per-guild queue, resolution and playback scheduling core for music bots.
//!
//! The crate owns three things and delegates the rest:
//!
//! - **Queue + sessions** ([`audio`]): an ordered play queue per guild, with
//!   enqueue/remove/promote/shuffle, behind one serialized session context.
//! - **Resolution** ([`sources`]): classifying a raw request (direct link,
//!   free text, playlist link, catalog link) into tracks, deferring the
//!   expensive playable-URL binding until right before playback.
//! - **Scheduling** ([`audio::player`]): the completion-driven state machine
//!   that starts the next track when the previous one ends or is skipped.
//!
//! Transport (the actual voice streaming), command parsing and the concrete
//! search/extraction backends are collaborators behind the traits in
//! [`voice`] and [`sources`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use open_jukebox::{
//!     audio::{player::Player, session::GuildId},
//!     config::Config,
//!     sources::{catalog::CatalogClient, resolver::TrackResolver},
//!     storage::JsonStorage,
//! };
//!
//! # async fn example(
//! #     search: Arc<dyn open_jukebox::sources::SearchProvider>,
//! #     playlists: Arc<dyn open_jukebox::sources::PlaylistProvider>,
//! #     extractor: Arc<dyn open_jukebox::sources::MediaExtractor>,
//! #     voice: Arc<dyn open_jukebox::voice::VoiceClient>,
//! #     notifier: Arc<dyn open_jukebox::voice::Notifier>,
//! # ) -> anyhow::Result<()> {
//! let config = Arc::new(Config::load()?);
//! let catalog = Arc::new(CatalogClient::new(&config)?);
//! let resolver = Arc::new(TrackResolver::new(search, playlists, catalog, extractor));
//! let storage = Arc::new(tokio::sync::Mutex::new(
//!     JsonStorage::new(config.data_dir.clone()).await?,
//! ));
//! let player = Player::new(config, resolver, voice, notifier, storage);
//!
//! let added = player
//!     .enqueue_request(GuildId(1), "https://example.com/a.mp3", "ana")
//!     .await?;
//! assert_eq!(added, 1);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod sources;
pub mod storage;
pub mod voice;

pub use audio::player::Player;
pub use audio::queue::{MusicQueue, QueuePage};
pub use audio::session::{GuildId, GuildSession, NowPlaying, PlaybackState, SessionRegistry};
pub use config::Config;
pub use error::PlayerError;
pub use sources::resolver::TrackResolver;
pub use sources::{PlayableHandle, Provenance, Track};
pub use storage::JsonStorage;
pub use voice::{CompletionToken, Notifier, TrackEndEvent, VoiceClient};
