use crate::search::SearchCache;

/// Shell-wide state threaded through builtins.
pub struct State {
    pub search_cache: SearchCache,
}

impl State {
    pub fn new() -> State {
        State { search_cache: SearchCache::new() }
    }
}

impl Default for State {
    fn default() -> State {
        State::new()
    }
}
