/// The scene engine — traversal state machine orchestrating qualities,
/// signals, choice compilation, and content display.
use thiserror::Error;

use crate::core::choices;
use crate::core::compiler;
use crate::core::qualities::{self, QualityAccess};
use crate::core::random::RandomSource;
use crate::core::signals::{self, SignalEvent};
use crate::display::DisplaySurface;
use crate::schema::callable::{run_actions, run_predicate, CallableFault};
use crate::schema::content::RenderedBlock;
use crate::schema::game::{Game, Scene};
use crate::schema::state::{Choice, GameState};

/// Ceiling on chained go-to hops in a single transition. An authored graph
/// that exceeds it is cycling without offering a choice.
const MAX_GOTO_HOPS: u32 = 64;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A scene id was referenced that the game does not define.
    #[error("unknown scene id '{0}'")]
    UnknownScene(String),
    /// `choose` called with an index outside the offered range.
    #[error("no choice at index {index}, only {available} choices are available")]
    ChoiceIndex { index: usize, available: usize },
    /// `choose` called while no choice list is on offer.
    #[error("no choices are currently offered")]
    NoActiveChoices,
    /// The engine has no current scene; `begin_game` has not run.
    #[error("the game has not been started")]
    NotStarted,
    /// A go-to chain exceeded the hop ceiling without offering a choice.
    #[error("no progress after {0} chained go-to transitions")]
    NoProgress(u32),
}

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    InScene,
    AwaitingChoice,
    GameOver,
}

/// Drives one game: owns the current [`GameState`], walks the scene graph,
/// and pushes results to the display surface it owns.
pub struct SceneEngine<D: DisplaySurface> {
    game: Game,
    surface: D,
    state: GameState,
    phase: Phase,
    random: RandomSource,
    faults: Vec<CallableFault>,
}

impl<D: DisplaySurface> SceneEngine<D> {
    pub fn new(game: Game, surface: D) -> SceneEngine<D> {
        SceneEngine::with_random(game, surface, RandomSource::from_time())
    }

    /// Engine with an explicit random source, for reproducible runs.
    pub fn with_random(game: Game, surface: D, random: RandomSource) -> SceneEngine<D> {
        let root = game.root_scene_id();
        SceneEngine {
            game,
            surface,
            state: GameState::new(root),
            phase: Phase::Uninitialized,
            random,
            faults: Vec::new(),
        }
    }

    /// Start a fresh game: reset state, apply initial quality values, and
    /// enter the first scene.
    pub fn begin_game(&mut self) -> Result<(), EngineError> {
        self.faults.clear();
        self.state = GameState::new(self.game.root_scene_id());
        self.phase = Phase::InScene;
        qualities::apply_initial_qualities(
            &self.game,
            &mut self.state,
            &mut self.surface,
            &mut self.faults,
        );
        let first = self.game.first_scene_id();
        self.go_to_scene(&first)
    }

    /// Move to a scene, running the full transition pipeline: departure,
    /// arrival, display, and then either game over, a chained go-to, or
    /// choice compilation.
    pub fn go_to_scene(&mut self, id: &str) -> Result<(), EngineError> {
        self.go_to_scene_inner(id, 0)
    }

    fn go_to_scene_inner(&mut self, id: &str, hops: u32) -> Result<(), EngineError> {
        if hops >= MAX_GOTO_HOPS {
            return Err(EngineError::NoProgress(hops));
        }
        if !self.game.scenes.contains_key(id) {
            return Err(EngineError::UnknownScene(id.to_string()));
        }

        // Record the visit, capped so state stays bounded.
        let cap = {
            let scene = &self.game.scenes[id];
            scene.count_visits_max.or(scene.max_visits)
        };
        let visits = self.state.visits.entry(id.to_string()).or_insert(0);
        *visits += 1;
        if let Some(cap) = cap {
            *visits = (*visits).min(cap);
        }

        // Departure from the previous scene, if it differs.
        let previous = self.state.scene_id.clone();
        if let Some(prev_id) = previous.as_deref() {
            if prev_id != id {
                if let Some(prev) = self.game.scenes.get(prev_id) {
                    signals::emit_scene(
                        &self.game,
                        prev,
                        &mut self.surface,
                        SignalEvent::SceneDeparture {
                            id: prev_id.to_string(),
                            to: id.to_string(),
                        },
                    );
                    let context = format!("on-departure for scene '{}'", prev_id);
                    let mut access = QualityAccess::new(
                        &self.game,
                        &mut self.state,
                        &mut self.surface,
                        &mut self.faults,
                    );
                    run_actions(&prev.on_departure, &mut access, &context);
                }
            }
        }

        self.state.scene_id = Some(id.to_string());
        {
            let scene = &self.game.scenes[id];
            if scene.set_root {
                // Sticky: persists through later navigation.
                self.state.root_scene_id = id.to_string();
            }
            signals::emit_scene(
                &self.game,
                scene,
                &mut self.surface,
                SignalEvent::SceneArrival {
                    id: id.to_string(),
                    from: previous,
                },
            );
            let context = format!("on-arrival for scene '{}'", id);
            let mut access = QualityAccess::new(
                &self.game,
                &mut self.state,
                &mut self.surface,
                &mut self.faults,
            );
            run_actions(&scene.on_arrival, &mut access, &context);
        }

        self.display_scene_content()?;

        // Decide what follows: terminal scene, chained go-to, or choices.
        enum Next {
            Finish,
            GoTo(String),
            Choices,
        }
        let next = {
            let scene = &self.game.scenes[id];
            if scene.game_over {
                Next::Finish
            } else {
                let mut matched = None;
                for clause in &scene.go_to {
                    let context = format!("go-to predicate in scene '{}'", id);
                    if run_predicate(
                        clause.predicate.as_ref(),
                        true,
                        &self.state,
                        &context,
                        &mut self.faults,
                    ) {
                        matched = Some(clause.target.clone());
                        break;
                    }
                }
                match matched {
                    Some(target) => Next::GoTo(target),
                    None => Next::Choices,
                }
            }
        };

        match next {
            Next::Finish => {
                self.finish_game();
                Ok(())
            }
            Next::GoTo(target) => self.go_to_scene_inner(&target, hops + 1),
            Next::Choices => {
                let compiled = {
                    let scene = &self.game.scenes[id];
                    choices::compile_choices(
                        &self.game,
                        &self.state,
                        scene,
                        &mut self.random,
                        &mut self.faults,
                    )?
                };
                match compiled {
                    Some(list) => {
                        self.surface.display_choices(&list);
                        self.state.choices = Some(list);
                        self.phase = Phase::AwaitingChoice;
                        Ok(())
                    }
                    None => {
                        self.finish_game();
                        Ok(())
                    }
                }
            }
        }
    }

    /// Commit one of the offered choices by index.
    pub fn choose(&mut self, index: usize) -> Result<(), EngineError> {
        if self.phase != Phase::AwaitingChoice {
            return Err(EngineError::NoActiveChoices);
        }
        let Some(offered) = self.state.choices.as_ref() else {
            return Err(EngineError::NoActiveChoices);
        };
        if index >= offered.len() {
            return Err(EngineError::ChoiceIndex {
                index,
                available: offered.len(),
            });
        }
        let target = offered[index].id.clone();

        self.state.choices = None;
        self.state.turn += 1;
        self.phase = Phase::InScene;
        self.go_to_scene(&target)
    }

    /// Push the current scene's content to the display surface. Re-invokable
    /// by hosts that need to redraw.
    pub fn display_scene_content(&mut self) -> Result<(), EngineError> {
        let Some(id) = self.state.scene_id.clone() else {
            return Err(EngineError::NotStarted);
        };
        let scene = self
            .game
            .scenes
            .get(&id)
            .ok_or_else(|| EngineError::UnknownScene(id.clone()))?;

        if scene.new_page {
            self.surface.new_page();
        }
        self.surface.remove_choices();

        let context = format!("on-display for scene '{}'", id);
        let mut access = QualityAccess::new(
            &self.game,
            &mut self.state,
            &mut self.surface,
            &mut self.faults,
        );
        run_actions(&scene.on_display, &mut access, &context);

        signals::emit_scene(
            &self.game,
            scene,
            &mut self.surface,
            SignalEvent::SceneDisplay { id },
        );

        if let Some(content) = &scene.content {
            let blocks = compiler::compile(content, &self.state, &mut self.faults);
            self.surface.display_content(&blocks);
        }
        Ok(())
    }

    /// Explicitly end the game.
    pub fn game_over(&mut self) {
        self.finish_game();
    }

    fn finish_game(&mut self) {
        self.state.game_over = true;
        self.phase = Phase::GameOver;
        self.surface
            .display_content(&[RenderedBlock::paragraph("Game Over")]);
    }

    pub fn is_game_over(&self) -> bool {
        self.state.game_over
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.state
            .scene_id
            .as_deref()
            .and_then(|id| self.game.scenes.get(id))
    }

    /// The currently offered choices, if the engine is awaiting one.
    pub fn current_choices(&self) -> Option<&[Choice]> {
        self.state.choices.as_deref()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// A snapshot of the current state, suitable for text serialization.
    pub fn export_state(&self) -> GameState {
        self.state.clone()
    }

    /// Replace the whole game state with a restored snapshot. The stored
    /// choice list is taken verbatim; arrival actions are not re-run and
    /// choices are not re-sampled, so a restored game cannot diverge from
    /// what was shown when it was saved.
    pub fn set_state(&mut self, state: GameState) -> Result<(), EngineError> {
        if let Some(id) = state.scene_id.as_deref() {
            if !self.game.scenes.contains_key(id) {
                return Err(EngineError::UnknownScene(id.to_string()));
            }
        }
        self.phase = if state.game_over {
            Phase::GameOver
        } else {
            Phase::AwaitingChoice
        };
        self.state = state;
        Ok(())
    }

    /// Drain the buffered non-fatal callable faults.
    pub fn take_faults(&mut self) -> Vec<CallableFault> {
        std::mem::take(&mut self.faults)
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut D {
        &mut self.surface
    }

    pub fn game(&self) -> &Game {
        &self.game
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::NullDisplay;
    use crate::schema::game::{GoToClause, SceneOption};

    fn engine(game: Game) -> SceneEngine<NullDisplay> {
        SceneEngine::with_random(game, NullDisplay, RandomSource::from_seed(1))
    }

    #[test]
    fn starts_at_the_root_scene() {
        let mut root = Scene::new("root");
        root.options = vec![SceneOption::scene("foo").titled("Foo")];
        let game = Game::with_scenes(vec![root, Scene::new("foo")]);
        let mut e = engine(game);
        e.begin_game().unwrap();
        assert_eq!(e.current_scene().unwrap().id, "root");
        assert!(!e.is_game_over());
    }

    #[test]
    fn terminates_if_root_has_no_choices() {
        let game = Game::with_scenes(vec![Scene::new("root")]);
        let mut e = engine(game);
        e.begin_game().unwrap();
        assert!(e.is_game_over());
    }

    #[test]
    fn choose_out_of_range_reports_available_count() {
        let mut root = Scene::new("root");
        root.options = vec![SceneOption::scene("foo").titled("To the Foo")];
        let mut foo = Scene::new("foo");
        foo.options = vec![SceneOption::scene("root").titled("Back")];
        let game = Game::with_scenes(vec![root, foo]);
        let mut e = engine(game);
        e.begin_game().unwrap();
        let err = e.choose(1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no choice at index 1, only 1 choices are available"
        );
    }

    #[test]
    fn choose_outside_awaiting_choice_fails() {
        let game = Game::with_scenes(vec![Scene::new("root")]);
        let mut e = engine(game);
        assert!(matches!(e.choose(0), Err(EngineError::NoActiveChoices)));
    }

    #[test]
    fn unknown_scene_is_an_error() {
        let game = Game::with_scenes(vec![Scene::new("root")]);
        let mut e = engine(game);
        let err = e.go_to_scene("missing").unwrap_err();
        assert!(matches!(err, EngineError::UnknownScene(ref id) if id == "missing"));
    }

    #[test]
    fn unconditional_goto_cycle_raises_no_progress() {
        let mut root = Scene::new("root");
        root.go_to = vec![GoToClause::always("foo")];
        let mut foo = Scene::new("foo");
        foo.go_to = vec![GoToClause::always("root")];
        let game = Game::with_scenes(vec![root, foo]);
        let mut e = engine(game);
        let err = e.begin_game().unwrap_err();
        assert!(matches!(err, EngineError::NoProgress(_)));
    }

    #[test]
    fn visit_counts_are_capped() {
        let mut root = Scene::new("root");
        root.options = vec![SceneOption::scene("foo").titled("To the Foo")];
        let mut foo = Scene::new("foo");
        foo.max_visits = Some(10);
        foo.count_visits_max = Some(2);
        foo.options = vec![SceneOption::scene("root").titled("Back")];
        let game = Game::with_scenes(vec![root, foo]);
        let mut e = engine(game);
        e.begin_game().unwrap();
        for _ in 0..4 {
            e.choose(0).unwrap(); // to foo
            e.choose(0).unwrap(); // back to root
        }
        assert_eq!(e.state().visit_count("foo"), 2);
    }

    #[test]
    fn display_before_begin_is_an_error() {
        let game = Game::with_scenes(vec![Scene::new("root")]);
        let mut e = engine(game);
        assert!(matches!(
            e.display_scene_content(),
            Err(EngineError::NotStarted)
        ));
    }
}
