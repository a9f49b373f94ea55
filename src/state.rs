use crate::FitError;
use crate::holder::{DisabledEffects, Holder, HolderOf, HolderState};
use crate::link::{disable_affector, enable_affector};
use crate::modifier::{Affector, ModScope};
use bevy::prelude::{Entity, World};
use std::fmt;

/// Discrete activity level of a holder; the ordering is load bearing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    #[default]
    Offline,
    Online,
    Active,
    Overload,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Offline => write!(f, "offline"),
            State::Online => write!(f, "online"),
            State::Active => write!(f, "active"),
            State::Overload => write!(f, "overload"),
        }
    }
}

/// Moves a holder to `new`, enabling the modifiers whose state floor was
/// crossed upward and disabling those crossed downward.
pub fn set_state(world: &mut World, holder: Entity, new: State) -> Result<(), FitError> {
    let Some(h) = world.get::<Holder>(holder) else {
        return Err(FitError::NoSuchHolder(holder));
    };
    let item = h.item.clone();
    let max = item.max_state();
    if new > max {
        return Err(FitError::InvalidState {
            requested: new,
            max,
        });
    }

    let Some(old) = world.get::<HolderState>(holder).map(|s| s.0) else {
        return Err(FitError::NoSuchHolder(holder));
    };
    if old == new {
        return Ok(());
    }
    if let Some(mut state) = world.get_mut::<HolderState>(holder) {
        state.0 = new;
    }

    // Detached holders have no links to maintain.
    let Some(fit) = world.get::<HolderOf>(holder).map(|f| f.0) else {
        return Ok(());
    };
    let disabled = world
        .get::<DisabledEffects>(holder)
        .map(|d| d.0.clone())
        .unwrap_or_default();

    let raising = new > old;
    let (low, high) = if raising { (old, new) } else { (new, old) };

    for effect in &item.effects {
        if disabled.contains(&effect.id) {
            continue;
        }
        for modifier in &effect.modifiers {
            if modifier.scope != ModScope::Local {
                continue;
            }
            if modifier.state <= low || modifier.state > high {
                continue;
            }
            let affector = Affector::new(holder, modifier.clone());
            if raising {
                enable_affector(world, fit, affector);
            } else {
                disable_affector(world, fit, affector);
            }
        }
    }
    Ok(())
}

pub fn enable_effect(world: &mut World, holder: Entity, effect: crate::catalog::EffectId) -> Result<(), FitError> {
    toggle_effect(world, holder, effect, true)
}

/// Switches one of the holder's effects off, detaching its modifiers.
pub fn disable_effect(world: &mut World, holder: Entity, effect: crate::catalog::EffectId) -> Result<(), FitError> {
    toggle_effect(world, holder, effect, false)
}

fn toggle_effect(
    world: &mut World,
    holder: Entity,
    effect_id: crate::catalog::EffectId,
    enabled: bool,
) -> Result<(), FitError> {
    let Some(h) = world.get::<Holder>(holder) else {
        return Err(FitError::NoSuchHolder(holder));
    };
    let item = h.item.clone();
    let Some(effect) = item.effects.iter().find(|e| e.id == effect_id).cloned() else {
        return Err(FitError::UnknownEffect(effect_id));
    };

    let currently_disabled = world
        .get::<DisabledEffects>(holder)
        .map(|d| d.0.contains(&effect_id))
        .unwrap_or(false);
    if enabled != currently_disabled {
        // Already in the requested mode.
        return Ok(());
    }

    if enabled {
        if let Some(mut disabled) = world.get_mut::<DisabledEffects>(holder) {
            disabled.0.remove(&effect_id);
        }
    }

    let state = world
        .get::<HolderState>(holder)
        .map(|s| s.0)
        .unwrap_or_default();
    if let Some(fit) = world.get::<HolderOf>(holder).map(|f| f.0) {
        for modifier in &effect.modifiers {
            if modifier.scope != ModScope::Local || modifier.state > state {
                continue;
            }
            let affector = Affector::new(holder, modifier.clone());
            if enabled {
                enable_affector(world, fit, affector);
            } else {
                disable_affector(world, fit, affector);
            }
        }
    }

    if !enabled {
        if let Some(mut disabled) = world.get_mut::<DisabledEffects>(holder) {
            disabled.0.insert(effect_id);
        }
    }
    Ok(())
}
