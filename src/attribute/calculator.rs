use crate::AttributeError;
use crate::attribute::AttributeMap;
use crate::catalog::{AttributeDef, AttributeId, Catalog, CategoryId, categories};
use crate::holder::{Holder, HolderOf};
use crate::link::LinkRegister;
use crate::modifier::{Affector, ModOp, ModSrc};
use bevy::log::warn;
use bevy::platform::collections::HashSet;
use bevy::prelude::{Entity, World};
use std::sync::Arc;

/// Penalty base for non-stackable multiplicative modifiers: exp(-(1/2.67)^2).
pub const PENALTY_BASE: f64 = 0.869_119_980_800_397_5;

// Chain positions 0..=10 count; weaker entries past that are discarded.
const PENALTY_CHAIN: usize = 11;

/// Computes the modified value of one attribute, memoizing it and every
/// source attribute touched along the way.
pub fn attribute_value(
    world: &mut World,
    holder: Entity,
    attribute: AttributeId,
) -> Result<f64, AttributeError> {
    let mut guard = EvalGuard::default();
    resolve(world, holder, attribute, &mut guard)
}

/// In-progress set for one top-level evaluation. A re-entrant read is a
/// reference cycle; it yields the base value and contributes no modifier.
#[derive(Default)]
struct EvalGuard {
    pending: HashSet<(Entity, AttributeId)>,
}

impl EvalGuard {
    fn enter(&mut self, holder: Entity, attribute: AttributeId) -> bool {
        self.pending.insert((holder, attribute))
    }

    fn exit(&mut self, holder: Entity, attribute: AttributeId) {
        self.pending.remove(&(holder, attribute));
    }
}

fn resolve(
    world: &mut World,
    holder: Entity,
    attribute: AttributeId,
    guard: &mut EvalGuard,
) -> Result<f64, AttributeError> {
    if let Some(value) = world
        .get::<AttributeMap>(holder)
        .and_then(|map| map.cached(attribute))
    {
        return Ok(value);
    }

    let Some(h) = world.get::<Holder>(holder) else {
        return Err(AttributeError::NoSuchHolder(holder));
    };
    let item = h.item.clone();
    let base_raw = world
        .get::<AttributeMap>(holder)
        .and_then(|map| map.base_override(attribute))
        .or_else(|| item.base_attribute(attribute));

    let meta = world
        .get_resource::<Catalog>()
        .and_then(|catalog| catalog.attribute(attribute));
    let affectors = affectors_for(world, holder, attribute);
    if base_raw.is_none() && affectors.is_empty() {
        return Err(AttributeError::NotFound { holder, attribute });
    }
    let meta = meta.unwrap_or_else(|| {
        warn!("attribute {attribute} has no metadata, treated as plain stackable");
        Arc::new(AttributeDef::new(attribute, "unknown"))
    });
    let base = base_raw.unwrap_or(meta.default_value);

    if !guard.enter(holder, attribute) {
        return Ok(base);
    }

    let mut contributions = Vec::with_capacity(affectors.len());
    for affector in affectors {
        let modifier = &affector.modifier;
        let (magnitude, from_attribute) = match modifier.src {
            ModSrc::Value(value) => (value, false),
            ModSrc::Attribute(src_attr) => {
                match resolve(world, affector.source, src_attr, guard) {
                    Ok(value) => (value, true),
                    Err(err) => {
                        warn!("affector from {:?} dropped: {err}", affector.source);
                        continue;
                    }
                }
            }
        };
        let Some(category) = world
            .get::<Holder>(affector.source)
            .map(|source| source.item.category)
        else {
            warn!("affector from vanished holder {:?} dropped", affector.source);
            continue;
        };
        let penalized = !meta.stackable
            && from_attribute
            && is_multiplicative(modifier.op)
            && !penalty_exempt(category);
        contributions.push(normalize(modifier.op, magnitude, penalized));
    }

    let mut value = combine(base, meta.high_is_good, &contributions);

    if let Some(cap_attr) = meta.max_attribute {
        match resolve(world, holder, cap_attr, guard) {
            Ok(cap) => {
                value = value.min(cap);
                if let Some(mut map) = world.get_mut::<AttributeMap>(holder) {
                    map.record_cap(cap_attr, attribute);
                }
            }
            Err(err) => {
                warn!("cap attribute {cap_attr} unreadable, value left uncapped: {err}");
            }
        }
    }

    guard.exit(holder, attribute);
    let Some(mut map) = world.get_mut::<AttributeMap>(holder) else {
        return Err(AttributeError::NoSuchHolder(holder));
    };
    map.memoize(attribute, value);
    Ok(value)
}

fn affectors_for(world: &World, holder: Entity, attribute: AttributeId) -> Vec<Affector> {
    world
        .get::<HolderOf>(holder)
        .map(|fit| fit.0)
        .and_then(|fit| world.get::<LinkRegister>(fit))
        .map(|register| register.affectors_of(holder, attribute))
        .unwrap_or_default()
}

fn is_multiplicative(op: ModOp) -> bool {
    matches!(
        op,
        ModOp::PreMul | ModOp::PreDiv | ModOp::PostMul | ModOp::PostDiv | ModOp::PostPercent
    )
}

/// Sources in these categories never suffer the stacking penalty.
fn penalty_exempt(category: CategoryId) -> bool {
    category == categories::SHIP
        || category == categories::CHARGE
        || category == categories::SKILL
        || category == categories::IMPLANT
        || category == categories::SUBSYSTEM
}

// Application order is declaration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Bucket {
    PreAssign,
    PreMul,
    Add,
    PostMul,
    PostAssign,
}

#[derive(Copy, Clone, Debug)]
struct Contribution {
    bucket: Bucket,
    value: f64,
    penalized: bool,
}

fn normalize(op: ModOp, value: f64, penalized: bool) -> Contribution {
    let (bucket, value) = match op {
        ModOp::PreAssign => (Bucket::PreAssign, value),
        ModOp::PreMul => (Bucket::PreMul, value),
        ModOp::PreDiv => (Bucket::PreMul, 1.0 / value),
        ModOp::Add => (Bucket::Add, value),
        ModOp::Sub => (Bucket::Add, -value),
        ModOp::PostMul => (Bucket::PostMul, value),
        ModOp::PostDiv => (Bucket::PostMul, 1.0 / value),
        ModOp::PostPercent => (Bucket::PostMul, 1.0 + value / 100.0),
        ModOp::PostAssign => (Bucket::PostAssign, value),
    };
    Contribution {
        bucket,
        value,
        penalized: penalized && bucket != Bucket::Add,
    }
}

fn combine(base: f64, high_is_good: bool, contributions: &[Contribution]) -> f64 {
    let mut value = base;
    if let Some(assigned) = pick_assignment(contributions, Bucket::PreAssign, high_is_good) {
        value = assigned;
    }
    value *= bucket_factor(contributions, Bucket::PreMul);
    value += contributions
        .iter()
        .filter(|c| c.bucket == Bucket::Add)
        .map(|c| c.value)
        .sum::<f64>();
    value *= bucket_factor(contributions, Bucket::PostMul);
    if let Some(assigned) = pick_assignment(contributions, Bucket::PostAssign, high_is_good) {
        value = assigned;
    }
    value
}

fn pick_assignment(
    contributions: &[Contribution],
    bucket: Bucket,
    high_is_good: bool,
) -> Option<f64> {
    contributions
        .iter()
        .filter(|c| c.bucket == bucket)
        .map(|c| c.value)
        .reduce(|a, b| if high_is_good { a.max(b) } else { a.min(b) })
}

fn bucket_factor(contributions: &[Contribution], bucket: Bucket) -> f64 {
    let mut factor = 1.0;
    let mut penalized = Vec::new();
    for c in contributions.iter().filter(|c| c.bucket == bucket) {
        if c.penalized {
            penalized.push(c.value);
        } else {
            factor *= c.value;
        }
    }
    factor * penalty_product(penalized)
}

/// Per sign, strongest first, the i-th entry is damped by
/// `PENALTY_BASE ^ i²`. The sort is part of the contract.
fn penalty_product(multipliers: Vec<f64>) -> f64 {
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for m in multipliers {
        let v = m - 1.0;
        if v >= 0.0 {
            positives.push(v);
        } else {
            negatives.push(v);
        }
    }
    positives.sort_by(|a, b| b.total_cmp(a));
    negatives.sort_by(|a, b| a.total_cmp(b));
    penalty_chain(&positives) * penalty_chain(&negatives)
}

fn penalty_chain(values: &[f64]) -> f64 {
    values
        .iter()
        .take(PENALTY_CHAIN)
        .enumerate()
        .map(|(i, v)| 1.0 + v * PENALTY_BASE.powi((i * i) as i32))
        .product()
}
