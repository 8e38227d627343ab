/// The immutable game definition the engine walks: scenes, qualities, and
/// the precomputed tag index. Produced by a loader or built in code; never
/// mutated by the engine.
use rustc_hash::{FxHashMap, FxHashSet};

use super::callable::{Action, Predicate};
use super::content::ContentSource;

/// How often a candidate is picked during frequency-weighted choice fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frequency {
    /// Always offered, outside the weighted draw.
    Unbounded,
    /// Relative sampling weight; zero is never chosen.
    Weight(f64),
}

impl Default for Frequency {
    fn default() -> Frequency {
        Frequency::Weight(1.0)
    }
}

/// An authored link from a scene to a candidate target, by literal id or by
/// tag. Optional fields override the target scene's own declarations.
#[derive(Default)]
pub struct SceneOption {
    pub target: OptionTarget,
    pub title: Option<ContentSource>,
    pub priority: Option<i64>,
    pub order: Option<i64>,
    pub frequency: Option<Frequency>,
    pub view_if: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionTarget {
    Scene(String),
    Tag(String),
}

impl Default for OptionTarget {
    fn default() -> OptionTarget {
        OptionTarget::Scene(String::new())
    }
}

impl SceneOption {
    pub fn scene(id: &str) -> SceneOption {
        SceneOption {
            target: OptionTarget::Scene(id.to_string()),
            ..SceneOption::default()
        }
    }

    pub fn tag(tag: &str) -> SceneOption {
        SceneOption {
            target: OptionTarget::Tag(tag.to_string()),
            ..SceneOption::default()
        }
    }

    pub fn titled(mut self, title: &str) -> SceneOption {
        self.title = Some(title.into());
        self
    }
}

/// A conditional transition clause; an absent predicate always matches.
pub struct GoToClause {
    pub target: String,
    pub predicate: Option<Predicate>,
}

impl GoToClause {
    pub fn always(target: &str) -> GoToClause {
        GoToClause {
            target: target.to_string(),
            predicate: None,
        }
    }

    pub fn when(target: &str, predicate: Predicate) -> GoToClause {
        GoToClause {
            target: target.to_string(),
            predicate: Some(predicate),
        }
    }
}

/// A node of the narrative graph.
#[derive(Default)]
pub struct Scene {
    pub id: String,
    pub title: Option<ContentSource>,
    pub content: Option<ContentSource>,
    pub options: Vec<SceneOption>,
    pub go_to: Vec<GoToClause>,
    pub game_over: bool,
    pub new_page: bool,
    pub set_root: bool,
    pub signal: Option<String>,
    /// Visits at or beyond this count exclude the scene from choices.
    pub max_visits: Option<u32>,
    /// Cap on the visit count recorded in state; defaults to `max_visits`.
    pub count_visits_max: Option<u32>,
    pub min_choices: Option<usize>,
    pub max_choices: Option<usize>,
    pub priority: Option<i64>,
    pub order: Option<i64>,
    pub frequency: Option<Frequency>,
    pub view_if: Option<Predicate>,
    pub on_arrival: Vec<Action>,
    pub on_display: Vec<Action>,
    pub on_departure: Vec<Action>,
}

impl Scene {
    pub fn new(id: &str) -> Scene {
        Scene {
            id: id.to_string(),
            ..Scene::default()
        }
    }
}

/// A numeric player-state variable declaration.
#[derive(Default)]
pub struct QualityDef {
    pub initial: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub is_valid: Option<Predicate>,
    pub signal: Option<String>,
}

/// The executable game definition: the full scene graph, quality
/// declarations, and the read-only tag index built by the loader.
#[derive(Default)]
pub struct Game {
    pub scenes: FxHashMap<String, Scene>,
    pub qualities: FxHashMap<String, QualityDef>,
    pub tag_lookup: FxHashMap<String, FxHashSet<String>>,
    pub first_scene: Option<String>,
    pub root_scene: Option<String>,
    /// Default signal name for scene lifecycle events.
    pub scene_signal: Option<String>,
    /// Default signal name for quality changes.
    pub quality_signal: Option<String>,
}

impl Game {
    /// Build a game from a list of scenes, indexing them by id.
    pub fn with_scenes(scenes: Vec<Scene>) -> Game {
        let mut game = Game::default();
        for scene in scenes {
            game.scenes.insert(scene.id.clone(), scene);
        }
        game
    }

    /// The effective root scene id: the declared root, else `"root"`.
    pub fn root_scene_id(&self) -> String {
        self.root_scene
            .clone()
            .unwrap_or_else(|| "root".to_string())
    }

    /// The scene a new game begins in: `first_scene`, else the root.
    pub fn first_scene_id(&self) -> String {
        self.first_scene
            .clone()
            .unwrap_or_else(|| self.root_scene_id())
    }
}
