// Сессия доступа к приватным голосам
// Ключ хранится только в памяти: нет ни одного пути записи в постоянное хранилище

use parking_lot::RwLock;

#[derive(Debug, Default)]
struct SessionState {
    active_key: Option<String>,
    unlocked: Vec<String>,
}

/// Активный ключ и множество открытых им голосов
#[derive(Debug, Default)]
pub struct PrivateAccessSession {
    state: RwLock<SessionState>,
}

impl PrivateAccessSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_key(&self, key: Option<String>) {
        self.state.write().active_key = key;
    }

    pub fn active_key(&self) -> Option<String> {
        self.state.read().active_key.clone()
    }

    /// Объединение множеств; повторное добавление ничего не меняет
    pub fn add_unlocked_voices<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write();
        for id in ids {
            let id = id.into();
            if !state.unlocked.contains(&id) {
                state.unlocked.push(id);
            }
        }
    }

    /// Активировать ключ и добавить его голоса одним шагом
    pub(crate) fn unlock(&self, key: String, ids: Vec<String>) {
        let mut state = self.state.write();
        state.active_key = Some(key);
        for id in ids {
            if !state.unlocked.contains(&id) {
                state.unlocked.push(id);
            }
        }
    }

    /// Сбросить ключ и открытые голоса атомарно
    pub fn clear_session(&self) {
        let mut state = self.state.write();
        state.active_key = None;
        state.unlocked.clear();
    }

    pub fn is_voice_unlocked(&self, id: &str) -> bool {
        self.state.read().unlocked.iter().any(|v| v == id)
    }

    pub fn unlocked_ids(&self) -> Vec<String> {
        self.state.read().unlocked.clone()
    }

    pub fn unlocked_count(&self) -> usize {
        self.state.read().unlocked.len()
    }
}
