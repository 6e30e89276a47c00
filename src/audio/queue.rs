use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::error::PlayerError;
use crate::sources::Track;

/// Cola de reproducción de una sesión.
///
/// El índice 0 es la próxima pista a reproducir. Todas las operaciones
/// indexadas son base cero; la capa de comandos traduce a base uno para
/// mostrar. Se asume que quien llama ya serializó el acceso a la sesión.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<Track>,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Agrega una pista al final. Sin límite de capacidad más allá de la
    /// memoria. Devuelve la longitud nueva.
    pub fn enqueue(&mut self, track: Track) -> usize {
        info!("➕ agregado a la cola: {}", track.title());
        self.items.push_back(track);
        self.items.len()
    }

    /// Saca y devuelve la próxima pista, si hay.
    pub fn dequeue_next(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(track) = &next {
            debug!("➡️ siguiente en cola: {}", track.title());
        }
        next
    }

    /// Quita la pista en `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<Track, PlayerError> {
        let len = self.items.len();
        let removed = self
            .items
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        debug!("❌ quitada de la cola: {}", removed.title());
        Ok(removed)
    }

    /// Vacía la cola entera y devuelve cuántas pistas se descartaron.
    pub fn remove_all(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        info!("🗑️ cola limpiada ({} pistas)", cleared);
        cleared
    }

    /// Mueve la pista en `index` al principio, conservando el orden relativo
    /// del resto. El índice 0 se rechaza como "ya está arriba".
    pub fn promote(&mut self, index: usize) -> Result<&Track, PlayerError> {
        if self.items.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        if index == 0 {
            return Err(PlayerError::AlreadyAtTop(self.items[0].title().to_string()));
        }
        let len = self.items.len();
        let promoted = self
            .items
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        self.items.push_front(promoted);
        debug!("📍 promovida al principio: {}", self.items[0].title());
        Ok(&self.items[0])
    }

    /// Permutación uniforme de toda la cola.
    pub fn shuffle(&mut self) -> Result<(), PlayerError> {
        if self.items.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        self.items.make_contiguous().shuffle(&mut rand::thread_rng());
        info!("🔀 cola mezclada ({} pistas)", self.items.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    /// Página base uno de la cola; fuera de rango devuelve la última página,
    /// igual que hace el comando `queue` al mostrar.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let total_items = self.items.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(per_page)
        };
        let current_page = page.clamp(1, total_pages);

        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(total_items);
        let items = if start < total_items {
            self.items.iter().skip(start).take(end - start).cloned().collect()
        } else {
            Vec::new()
        };

        QueuePage {
            items,
            current_page,
            total_pages,
            total_items,
        }
    }
}

/// Una página de la cola lista para mostrar.
#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl QueuePage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            current_page: 1,
            total_pages: 1,
            total_items: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Provenance;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(
            title,
            format!("https://example.com/{title}"),
            Provenance::DirectUrl,
            "tester",
        )
    }

    fn queue_of(titles: &[&str]) -> MusicQueue {
        let mut queue = MusicQueue::new();
        for title in titles {
            queue.enqueue(track(title));
        }
        queue
    }

    fn titles(queue: &MusicQueue) -> Vec<String> {
        queue.iter().map(|t| t.title().to_string()).collect()
    }

    #[test]
    fn enqueue_conserva_el_orden_de_llegada() {
        let mut queue = MusicQueue::new();
        assert_eq!(queue.enqueue(track("a")), 1);
        assert_eq!(queue.enqueue(track("b")), 2);
        assert_eq!(queue.enqueue(track("c")), 3);

        assert_eq!(titles(&queue), vec!["a", "b", "c"]);
        assert_eq!(queue.dequeue_next().unwrap().title(), "a");
        assert_eq!(queue.dequeue_next().unwrap().title(), "b");
        assert_eq!(queue.dequeue_next().unwrap().title(), "c");
        assert_eq!(queue.dequeue_next(), None);
    }

    #[test]
    fn promote_mueve_al_principio_conservando_el_resto() {
        let mut queue = queue_of(&["x", "y", "z"]);

        let promoted = queue.promote(1).unwrap();
        assert_eq!(promoted.title(), "y");
        assert_eq!(titles(&queue), vec!["y", "x", "z"]);

        // el nuevo tope ya está arriba
        let err = queue.promote(0).unwrap_err();
        assert!(matches!(err, PlayerError::AlreadyAtTop(t) if t == "y"));
    }

    #[test]
    fn promote_valida_indices_sin_mutar_la_cola() {
        let mut queue = queue_of(&["x", "y", "z"]);
        let err = queue.promote(3).unwrap_err();
        assert!(matches!(err, PlayerError::IndexOutOfRange { index: 3, len: 3 }));
        assert_eq!(titles(&queue), vec!["x", "y", "z"]);

        let mut empty = MusicQueue::new();
        assert!(matches!(empty.promote(1), Err(PlayerError::EmptyQueue)));
    }

    #[test]
    fn remove_at_valida_el_rango_al_momento_de_la_llamada() {
        let mut queue = queue_of(&["a", "b"]);
        let removed = queue.remove_at(1).unwrap();
        assert_eq!(removed.title(), "b");

        // la cola se achicó; el mismo índice ahora es inválido
        let err = queue.remove_at(1).unwrap_err();
        assert!(matches!(err, PlayerError::IndexOutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn remove_all_devuelve_cuantas_habia() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.remove_all(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.remove_all(), 0);
    }

    #[test]
    fn shuffle_permuta_sin_perder_ni_duplicar() {
        let names: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        let mut queue = MusicQueue::new();
        for name in &names {
            queue.enqueue(track(name));
        }

        queue.shuffle().unwrap();

        let mut after = titles(&queue);
        after.sort();
        let mut expected: Vec<String> = names.clone();
        expected.sort();
        assert_eq!(after, expected);
    }

    #[test]
    fn shuffle_con_cola_vacia_falla() {
        let mut queue = MusicQueue::new();
        assert!(matches!(queue.shuffle(), Err(PlayerError::EmptyQueue)));
    }

    #[test]
    fn la_paginacion_se_ajusta_al_rango() {
        let queue = queue_of(&["a", "b", "c", "d", "e"]);

        let first = queue.page(1, 2);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].title(), "a");

        // fuera de rango: cae en la última página
        let last = queue.page(99, 2);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].title(), "e");

        let empty = MusicQueue::new().page(4, 10);
        assert_eq!(empty.current_page, 1);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
