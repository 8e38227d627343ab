/// Quality mutation — clamping, validity gating, and change signals.
///
/// All writes to player qualities flow through [`set_quality`], whether they
/// come from initial values, authored actions, or the engine itself. This is
/// the single place where bounds, validity predicates, and change signals
/// are applied.
use crate::core::signals;
use crate::display::DisplaySurface;
use crate::schema::callable::{run_predicate, CallableFault};
use crate::schema::game::Game;
use crate::schema::state::GameState;

/// Set a quality, honoring its declaration.
///
/// A failing `is_valid` predicate removes the stored value entirely (it can
/// un-set a previously valid value). Otherwise the value is clamped to the
/// declared bounds and stored. A changed value emits a quality-change
/// signal, including the undefined-to-defined transition; writing the value
/// already stored emits nothing.
pub(crate) fn set_quality(
    game: &Game,
    state: &mut GameState,
    surface: &mut dyn DisplaySurface,
    faults: &mut Vec<CallableFault>,
    id: &str,
    value: f64,
) {
    let mut new = Some(value);
    if let Some(def) = game.qualities.get(id) {
        if let Some(is_valid) = &def.is_valid {
            let context = format!("is-valid for quality '{}'", id);
            if !run_predicate(Some(is_valid), true, state, &context, faults) {
                new = None;
            }
        }
        if let Some(v) = new.as_mut() {
            if let Some(min) = def.min {
                *v = v.max(min);
            }
            if let Some(max) = def.max {
                *v = v.min(max);
            }
        }
    }

    let was = state.qualities.get(id).copied();
    match new {
        Some(v) => {
            if was == Some(v) {
                return;
            }
            state.qualities.insert(id.to_string(), v);
            signals::emit_quality(game, surface, id, v, was);
        }
        None => {
            state.qualities.remove(id);
        }
    }
}

/// Apply declared initial values at game start. Only qualities with no
/// stored value are touched; initial values still pass through clamping and
/// validity. Iteration is sorted so signal order is deterministic.
pub(crate) fn apply_initial_qualities(
    game: &Game,
    state: &mut GameState,
    surface: &mut dyn DisplaySurface,
    faults: &mut Vec<CallableFault>,
) {
    let mut ids: Vec<&String> = game.qualities.keys().collect();
    ids.sort();
    for id in ids {
        if state.qualities.contains_key(id.as_str()) {
            continue;
        }
        if let Some(initial) = game.qualities[id.as_str()].initial {
            set_quality(game, state, surface, faults, id, initial);
        }
    }
}

/// The accessor handed to action callables: reads over the live state plus
/// quality writes that go through the clamping and signalling path.
pub struct QualityAccess<'a> {
    game: &'a Game,
    state: &'a mut GameState,
    surface: &'a mut dyn DisplaySurface,
    faults: &'a mut Vec<CallableFault>,
}

impl<'a> QualityAccess<'a> {
    pub(crate) fn new(
        game: &'a Game,
        state: &'a mut GameState,
        surface: &'a mut dyn DisplaySurface,
        faults: &'a mut Vec<CallableFault>,
    ) -> QualityAccess<'a> {
        QualityAccess {
            game,
            state,
            surface,
            faults,
        }
    }

    /// Read-only view of the whole game state.
    pub fn state(&self) -> &GameState {
        self.state
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.state.quality(id)
    }

    pub fn get_or(&self, id: &str, default: f64) -> f64 {
        self.state.quality_or(id, default)
    }

    pub fn set(&mut self, id: &str, value: f64) {
        set_quality(self.game, self.state, self.surface, self.faults, id, value);
    }

    /// Add to a quality, treating an unset value as zero.
    pub fn add(&mut self, id: &str, delta: f64) {
        let current = self.get_or(id, 0.0);
        self.set(id, current + delta);
    }

    pub(crate) fn record_fault(&mut self, fault: CallableFault) {
        self.faults.push(fault);
    }
}
