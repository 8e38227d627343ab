/// Game definition loading — decodes a declarative RON description into an
/// executable [`Game`], resolving named callables through a host-supplied
/// registry and validating the scene graph.
///
/// Targets in option lists use a sigil prefix: `@id` links one scene, `#tag`
/// expands to every scene carrying that tag.
use std::path::Path;
use std::sync::Arc;

use ron::extensions::Extensions;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use crate::schema::callable::{Action, Predicate};
use crate::schema::game::{
    Frequency, Game, GoToClause, OptionTarget, QualityDef, Scene, SceneOption,
};

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read game definition: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse game definition: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("duplicate scene id '{0}'")]
    DuplicateScene(String),
    #[error("option target '{target}' in scene '{scene}' must start with '@' or '#'")]
    BadOptionTarget { target: String, scene: String },
    #[error("{context} references unknown scene '{id}'")]
    UnknownScene { id: String, context: String },
    #[error("{context} references unknown {kind} '{name}'")]
    UnknownCallable {
        kind: &'static str,
        name: String,
        context: String,
    },
    #[error(
        "scene '{scene}' caps recorded visits at {cap}, below max_visits {max_visits}; \
         the scene could never exhaust"
    )]
    VisitCapTooLow {
        scene: String,
        cap: u32,
        max_visits: u32,
    },
}

/// Named callables a definition file may reference. Game code registers its
/// predicates and actions here before decoding.
#[derive(Default)]
pub struct CallableRegistry {
    predicates: FxHashMap<String, Predicate>,
    actions: FxHashMap<String, Action>,
}

impl CallableRegistry {
    pub fn new() -> CallableRegistry {
        CallableRegistry::default()
    }

    pub fn register_predicate(&mut self, name: &str, predicate: Predicate) {
        self.predicates.insert(name.to_string(), predicate);
    }

    pub fn register_action(&mut self, name: &str, action: Action) {
        self.actions.insert(name.to_string(), action);
    }

    fn predicate(&self, name: &str, context: &str) -> Result<Predicate, DefinitionError> {
        self.predicates
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| DefinitionError::UnknownCallable {
                kind: "predicate",
                name: name.to_string(),
                context: context.to_string(),
            })
    }

    fn action(&self, name: &str, context: &str) -> Result<Action, DefinitionError> {
        self.actions
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| DefinitionError::UnknownCallable {
                kind: "action",
                name: name.to_string(),
                context: context.to_string(),
            })
    }

    fn actions(
        &self,
        names: &[String],
        context: &str,
    ) -> Result<Vec<Action>, DefinitionError> {
        names.iter().map(|n| self.action(n, context)).collect()
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct GameDef {
    first_scene: Option<String>,
    root_scene: Option<String>,
    scene_signal: Option<String>,
    quality_signal: Option<String>,
    qualities: FxHashMap<String, QualityRaw>,
    scenes: Vec<SceneDef>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct QualityRaw {
    initial: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    is_valid: Option<String>,
    signal: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct SceneDef {
    id: String,
    title: Option<String>,
    content: Option<String>,
    tags: Vec<String>,
    options: Vec<OptionDef>,
    go_to: Vec<GoToDef>,
    game_over: bool,
    new_page: bool,
    set_root: bool,
    signal: Option<String>,
    max_visits: Option<u32>,
    count_visits_max: Option<u32>,
    min_choices: Option<usize>,
    max_choices: Option<usize>,
    priority: Option<i64>,
    order: Option<i64>,
    frequency: Option<FreqDef>,
    view_if: Option<String>,
    on_arrival: Vec<String>,
    on_display: Vec<String>,
    on_departure: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct OptionDef {
    target: String,
    title: Option<String>,
    priority: Option<i64>,
    order: Option<i64>,
    frequency: Option<FreqDef>,
    view_if: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct GoToDef {
    target: String,
    when: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
enum FreqDef {
    Always,
    Weight(f64),
}

impl From<FreqDef> for Frequency {
    fn from(def: FreqDef) -> Frequency {
        match def {
            FreqDef::Always => Frequency::Unbounded,
            FreqDef::Weight(w) => Frequency::Weight(w),
        }
    }
}

fn parse_target(raw: &str, scene: &str) -> Result<OptionTarget, DefinitionError> {
    if let Some(id) = raw.strip_prefix('@').filter(|s| !s.is_empty()) {
        Ok(OptionTarget::Scene(id.to_string()))
    } else if let Some(tag) = raw.strip_prefix('#').filter(|s| !s.is_empty()) {
        Ok(OptionTarget::Tag(tag.to_string()))
    } else {
        Err(DefinitionError::BadOptionTarget {
            target: raw.to_string(),
            scene: scene.to_string(),
        })
    }
}

fn build_scene(
    def: SceneDef,
    registry: &CallableRegistry,
) -> Result<(Scene, Vec<String>), DefinitionError> {
    let context = format!("scene '{}'", def.id);
    let mut options = Vec::with_capacity(def.options.len());
    for opt in def.options {
        options.push(SceneOption {
            target: parse_target(&opt.target, &def.id)?,
            title: opt.title.map(Into::into),
            priority: opt.priority,
            order: opt.order,
            frequency: opt.frequency.map(Into::into),
            view_if: opt
                .view_if
                .map(|name| registry.predicate(&name, &context))
                .transpose()?,
        });
    }
    let mut go_to = Vec::with_capacity(def.go_to.len());
    for clause in def.go_to {
        go_to.push(GoToClause {
            target: clause.target,
            predicate: clause
                .when
                .map(|name| registry.predicate(&name, &context))
                .transpose()?,
        });
    }
    let scene = Scene {
        id: def.id,
        title: def.title.map(Into::into),
        content: def.content.map(Into::into),
        options,
        go_to,
        game_over: def.game_over,
        new_page: def.new_page,
        set_root: def.set_root,
        signal: def.signal,
        max_visits: def.max_visits,
        count_visits_max: def.count_visits_max,
        min_choices: def.min_choices,
        max_choices: def.max_choices,
        priority: def.priority,
        order: def.order,
        frequency: def.frequency.map(Into::into),
        view_if: def
            .view_if
            .map(|name| registry.predicate(&name, &context))
            .transpose()?,
        on_arrival: registry.actions(&def.on_arrival, &context)?,
        on_display: registry.actions(&def.on_display, &context)?,
        on_departure: registry.actions(&def.on_departure, &context)?,
    };
    Ok((scene, def.tags))
}

fn validate(game: &Game) -> Result<(), DefinitionError> {
    let known = |id: &str| game.scenes.contains_key(id);
    if let Some(id) = &game.first_scene {
        if !known(id) {
            return Err(DefinitionError::UnknownScene {
                id: id.clone(),
                context: "first-scene".to_string(),
            });
        }
    }
    if let Some(id) = &game.root_scene {
        if !known(id) {
            return Err(DefinitionError::UnknownScene {
                id: id.clone(),
                context: "root-scene".to_string(),
            });
        }
    }
    for scene in game.scenes.values() {
        let context = format!("scene '{}'", scene.id);
        for opt in &scene.options {
            if let OptionTarget::Scene(id) = &opt.target {
                if !known(id) {
                    return Err(DefinitionError::UnknownScene {
                        id: id.clone(),
                        context: context.clone(),
                    });
                }
            }
        }
        for clause in &scene.go_to {
            if !known(&clause.target) {
                return Err(DefinitionError::UnknownScene {
                    id: clause.target.clone(),
                    context: context.clone(),
                });
            }
        }
        if let (Some(cap), Some(max_visits)) = (scene.count_visits_max, scene.max_visits) {
            // A recorded count capped below max_visits can never exhaust.
            if cap < max_visits {
                return Err(DefinitionError::VisitCapTooLow {
                    scene: scene.id.clone(),
                    cap,
                    max_visits,
                });
            }
        }
    }
    Ok(())
}

/// Decode a RON game definition, resolving callable names through the
/// registry. Dangling scene references are reported here, not at play time.
pub fn decode_game(text: &str, registry: &CallableRegistry) -> Result<Game, DefinitionError> {
    // Definition files omit Some(..) around optional fields.
    let options =
        ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME);
    let def: GameDef = options.from_str(text)?;

    let mut game = Game {
        first_scene: def.first_scene,
        root_scene: def.root_scene,
        scene_signal: def.scene_signal,
        quality_signal: def.quality_signal,
        ..Game::default()
    };

    for (id, raw) in def.qualities {
        let context = format!("quality '{}'", id);
        let is_valid = raw
            .is_valid
            .map(|name| registry.predicate(&name, &context))
            .transpose()?;
        game.qualities.insert(
            id,
            QualityDef {
                initial: raw.initial,
                min: raw.min,
                max: raw.max,
                is_valid,
                signal: raw.signal,
            },
        );
    }

    for def in def.scenes {
        let (scene, tags) = build_scene(def, registry)?;
        if game.scenes.contains_key(&scene.id) {
            return Err(DefinitionError::DuplicateScene(scene.id));
        }
        for tag in tags {
            game.tag_lookup
                .entry(tag)
                .or_default()
                .insert(scene.id.clone());
        }
        game.scenes.insert(scene.id.clone(), scene);
    }

    validate(&game)?;
    Ok(game)
}

/// Read and decode a game definition file.
pub fn load_game(
    path: impl AsRef<Path>,
    registry: &CallableRegistry,
) -> Result<Game, DefinitionError> {
    let text = std::fs::read_to_string(path)?;
    decode_game(&text, registry)
}
