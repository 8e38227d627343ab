/// Choice compilation — tag expansion, eligibility, priority tiers,
/// frequency-weighted sampling, and final ordering.
use std::collections::BTreeMap;

use crate::core::compiler;
use crate::core::engine::EngineError;
use crate::core::random::RandomSource;
use crate::schema::callable::{run_predicate, CallableFault};
use crate::schema::game::{Frequency, Game, OptionTarget, Scene, SceneOption};
use crate::schema::state::{Choice, GameState};

/// A candidate after gathering: the target id plus the option it came from.
struct Gathered<'a> {
    id: &'a str,
    option: &'a SceneOption,
}

/// A candidate with its effective attributes resolved.
struct Resolved {
    id: String,
    title: String,
    priority: i64,
    order: i64,
    frequency: Frequency,
}

/// Compile the offered choice set for a scene.
///
/// Returns `Ok(None)` when no choice can be offered at the root scene,
/// which ends the game. An option targeting an unregistered scene id is an
/// internal consistency fault.
pub(crate) fn compile_choices(
    game: &Game,
    state: &GameState,
    scene: &Scene,
    random: &mut RandomSource,
    faults: &mut Vec<CallableFault>,
) -> Result<Option<Vec<Choice>>, EngineError> {
    // 1. Candidate gathering. Literal references always win over tag
    // expansion, independent of list order; tag expansion is sorted so the
    // engine stays deterministic.
    let mut gathered: Vec<Gathered<'_>> = Vec::new();
    for option in &scene.options {
        match &option.target {
            OptionTarget::Scene(id) => {
                if let Some(existing) = gathered.iter_mut().find(|g| g.id == id.as_str()) {
                    existing.option = option;
                } else {
                    gathered.push(Gathered { id, option });
                }
            }
            OptionTarget::Tag(tag) => {
                let Some(ids) = game.tag_lookup.get(tag) else {
                    continue;
                };
                let mut ids: Vec<&String> = ids.iter().collect();
                ids.sort();
                for id in ids {
                    if !gathered.iter().any(|g| g.id == id.as_str()) {
                        gathered.push(Gathered { id, option });
                    }
                }
            }
        }
    }

    // 2. Eligibility: visit exhaustion and view-if checks.
    let mut eligible: Vec<(Gathered<'_>, &Scene)> = Vec::new();
    for g in gathered {
        let target = game
            .scenes
            .get(g.id)
            .ok_or_else(|| EngineError::UnknownScene(g.id.to_string()))?;
        if let Some(max_visits) = target.max_visits {
            if state.visit_count(g.id) >= max_visits {
                continue;
            }
        }
        let view_if = g.option.view_if.as_ref().or(target.view_if.as_ref());
        let context = format!("view-if for choice '{}'", g.id);
        if !run_predicate(view_if, true, state, &context, faults) {
            continue;
        }
        eligible.push((g, target));
    }

    // 3. Fallback: a lone "Scene Complete" link back to the root, or, at
    // the root itself, nothing (the game ends).
    if eligible.is_empty() {
        if state.scene_id.as_deref() == Some(state.root_scene_id.as_str()) {
            return Ok(None);
        }
        return Ok(Some(vec![Choice {
            id: state.root_scene_id.clone(),
            title: "Scene Complete".to_string(),
        }]));
    }

    // 4. Effective attributes and title resolution.
    let resolved: Vec<Resolved> = eligible
        .into_iter()
        .enumerate()
        .map(|(position, (g, target))| {
            let title_source = g.option.title.as_ref().or(target.title.as_ref());
            let title = match title_source {
                Some(source) => compiler::compile_title(source, state, faults),
                None => g.id.to_string(),
            };
            Resolved {
                id: g.id.to_string(),
                title,
                priority: g.option.priority.or(target.priority).unwrap_or(0),
                order: g.option.order.or(target.order).unwrap_or(position as i64),
                frequency: g
                    .option
                    .frequency
                    .or(target.frequency)
                    .unwrap_or_default(),
            }
        })
        .collect();

    // Unbounded-frequency candidates bypass tier gating entirely and never
    // count against min/max.
    let mut always: Vec<Resolved> = Vec::new();
    let mut tiers: BTreeMap<i64, Vec<Resolved>> = BTreeMap::new();
    for candidate in resolved {
        if candidate.frequency == Frequency::Unbounded {
            always.push(candidate);
        } else {
            tiers.entry(candidate.priority).or_default().push(candidate);
        }
    }

    // 5 & 6. Accumulate whole tiers from the highest priority down until
    // the minimum is met; when a tier would overflow the cap, switch to
    // weighted sampling without replacement over everything left. With no
    // explicit maximum the declared minimum is the cap; with neither set the
    // top tier is included wholesale.
    let min_choices = scene.min_choices.unwrap_or(1);
    let cap = scene.max_choices.or(scene.min_choices);
    let mut chosen: Vec<Resolved> = Vec::new();
    let mut tier_iter = tiers.into_iter().rev().map(|(_, tier)| tier);
    while let Some(tier) = tier_iter.next() {
        if chosen.len() >= min_choices {
            break;
        }
        if let Some(max) = cap {
            if chosen.len() + tier.len() > max {
                let mut pool: Vec<Resolved> = tier
                    .into_iter()
                    .chain(tier_iter.flatten())
                    .filter(|c| c.frequency != Frequency::Weight(0.0))
                    .collect();
                while chosen.len() < max && !pool.is_empty() {
                    let picked = draw_weighted(&mut pool, random);
                    chosen.push(picked);
                }
                break;
            }
        }
        chosen.extend(tier);
    }
    chosen.extend(always);

    // 7. Stable sort by effective order.
    chosen.sort_by_key(|c| c.order);

    Ok(Some(
        chosen
            .into_iter()
            .map(|c| Choice {
                id: c.id,
                title: c.title,
            })
            .collect(),
    ))
}

/// One weighted draw without replacement: a cumulative-weight scan over the
/// pool. Zero-weight candidates never enter the pool.
fn draw_weighted(pool: &mut Vec<Resolved>, random: &mut RandomSource) -> Resolved {
    let total: f64 = pool.iter().map(|c| weight_of(c)).sum();
    let mut target = random.random() * total;
    let mut index = pool.len() - 1;
    for (i, candidate) in pool.iter().enumerate() {
        target -= weight_of(candidate);
        if target < 0.0 {
            index = i;
            break;
        }
    }
    pool.remove(index)
}

fn weight_of(candidate: &Resolved) -> f64 {
    match candidate.frequency {
        Frequency::Weight(w) => w,
        // Unbounded candidates never reach the pool.
        Frequency::Unbounded => 0.0,
    }
}
