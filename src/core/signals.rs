/// Signal resolution and dispatch — lifecycle and quality-change events
/// routed to the host surface.
use serde::{Deserialize, Serialize};

use crate::display::DisplaySurface;
use crate::schema::game::{Game, Scene};

/// A named notification delivered through the display surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal: String,
    #[serde(flatten)]
    pub event: SignalEvent,
}

/// The lifecycle or state-change event a signal reports. Serialized field
/// names mirror the wire shape hosts historically consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SignalEvent {
    SceneArrival {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    SceneDisplay {
        id: String,
    },
    SceneDeparture {
        id: String,
        to: String,
    },
    QualityChange {
        id: String,
        now: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        was: Option<f64>,
    },
}

/// The effective signal name for a scene: the scene's own, else the game
/// default, else none (no emission).
pub(crate) fn scene_signal_name<'a>(game: &'a Game, scene: &'a Scene) -> Option<&'a str> {
    scene
        .signal
        .as_deref()
        .or(game.scene_signal.as_deref())
}

/// The effective signal name for a quality change.
pub(crate) fn quality_signal_name<'a>(game: &'a Game, quality_id: &str) -> Option<&'a str> {
    game.qualities
        .get(quality_id)
        .and_then(|def| def.signal.as_deref())
        .or(game.quality_signal.as_deref())
}

/// Emit a scene lifecycle event if the scene resolves to a signal name.
pub(crate) fn emit_scene(
    game: &Game,
    scene: &Scene,
    surface: &mut dyn DisplaySurface,
    event: SignalEvent,
) {
    if let Some(name) = scene_signal_name(game, scene) {
        surface.signal(&SignalRecord {
            signal: name.to_string(),
            event,
        });
    }
}

/// Emit a quality-change event if the quality resolves to a signal name.
pub(crate) fn emit_quality(
    game: &Game,
    surface: &mut dyn DisplaySurface,
    id: &str,
    now: f64,
    was: Option<f64>,
) {
    if let Some(name) = quality_signal_name(game, id) {
        surface.signal(&SignalRecord {
            signal: name.to_string(),
            event: SignalEvent::QualityChange {
                id: id.to_string(),
                now,
                was,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::game::QualityDef;

    #[test]
    fn scene_signal_prefers_scene_over_game() {
        let mut game = Game::default();
        game.scene_signal = Some("global-signal".to_string());
        let mut scene = Scene::new("foo");
        scene.signal = Some("foo-signal".to_string());
        assert_eq!(scene_signal_name(&game, &scene), Some("foo-signal"));

        let plain = Scene::new("bar");
        assert_eq!(scene_signal_name(&game, &plain), Some("global-signal"));
    }

    #[test]
    fn no_signal_without_any_name() {
        let game = Game::default();
        let scene = Scene::new("foo");
        assert_eq!(scene_signal_name(&game, &scene), None);
    }

    #[test]
    fn quality_signal_prefers_quality_over_game() {
        let mut game = Game::default();
        game.quality_signal = Some("global-signal".to_string());
        game.qualities.insert(
            "bar".to_string(),
            QualityDef {
                signal: Some("bar-signal".to_string()),
                ..QualityDef::default()
            },
        );
        game.qualities
            .insert("foo".to_string(), QualityDef::default());

        assert_eq!(quality_signal_name(&game, "bar"), Some("bar-signal"));
        assert_eq!(quality_signal_name(&game, "foo"), Some("global-signal"));
        assert_eq!(
            quality_signal_name(&game, "undeclared"),
            Some("global-signal")
        );
    }

    #[test]
    fn record_serializes_with_flattened_event() {
        let record = SignalRecord {
            signal: "root-signal".to_string(),
            event: SignalEvent::SceneDeparture {
                id: "root".to_string(),
                to: "foo".to_string(),
            },
        };
        let text = ron::to_string(&record).unwrap();
        assert!(text.contains("scene-departure"));
        assert!(text.contains("root-signal"));
    }
}
