/// Game state — the single mutable, fully serializable progress snapshot.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A compiled, currently-offered choice: the id of the target scene and the
/// rendered title shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub title: String,
}

/// All mutable game progress. Plain data with no embedded callables; it
/// round-trips losslessly through text serialization.
///
/// The offered choice list is part of the state, not a derived cache:
/// exporting and restoring it verbatim is what keeps a restored game from
/// re-rolling frequency-weighted selections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub scene_id: Option<String>,
    pub root_scene_id: String,
    pub turn: u32,
    pub game_over: bool,
    pub visits: FxHashMap<String, u32>,
    pub qualities: FxHashMap<String, f64>,
    pub choices: Option<Vec<Choice>>,
}

impl GameState {
    /// Fresh state rooted at the given scene, as produced by `begin_game`.
    pub fn new(root_scene_id: String) -> GameState {
        GameState {
            scene_id: None,
            root_scene_id,
            turn: 0,
            game_over: false,
            visits: FxHashMap::default(),
            qualities: FxHashMap::default(),
            choices: None,
        }
    }

    pub fn quality(&self, id: &str) -> Option<f64> {
        self.qualities.get(id).copied()
    }

    pub fn quality_or(&self, id: &str, default: f64) -> f64 {
        self.quality(id).unwrap_or(default)
    }

    pub fn visit_count(&self, id: &str) -> u32 {
        self.visits.get(id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state() {
        let state = GameState::new("root".to_string());
        assert_eq!(state.scene_id, None);
        assert_eq!(state.root_scene_id, "root");
        assert_eq!(state.turn, 0);
        assert!(!state.game_over);
        assert!(state.qualities.is_empty());
        assert!(state.choices.is_none());
    }

    #[test]
    fn quality_accessors() {
        let mut state = GameState::new("root".to_string());
        state.qualities.insert("nerve".to_string(), 7.0);
        assert_eq!(state.quality("nerve"), Some(7.0));
        assert_eq!(state.quality("missing"), None);
        assert_eq!(state.quality_or("missing", 3.0), 3.0);
    }

    #[test]
    fn ron_round_trip() {
        let mut state = GameState::new("root".to_string());
        state.scene_id = Some("cavern".to_string());
        state.turn = 4;
        state.visits.insert("cavern".to_string(), 2);
        state.qualities.insert("nerve".to_string(), 12.5);
        state.choices = Some(vec![Choice {
            id: "ledge".to_string(),
            title: "Climb to the ledge".to_string(),
        }]);

        let serialized = ron::to_string(&state).unwrap();
        let restored: GameState = ron::from_str(&serialized).unwrap();
        assert_eq!(restored, state);
    }
}
