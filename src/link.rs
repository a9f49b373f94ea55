use crate::attribute::invalidate::invalidate;
use crate::catalog::{AttributeId, ItemType, ItemTypeId};
use crate::holder::{DomainRoot, Holder, HolderKind, paired_with};
use crate::modifier::{Affector, Domain, ModFilter, ModSrc};
use bevy::log::warn;
use bevy::platform::collections::{HashMap, HashSet};
use bevy::prelude::{Component, Entity, World};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Incoming, Outgoing};

/// Index key for filtered targeting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum LinkKey {
    Domain(DomainRoot),
    DomainGroup(DomainRoot, crate::catalog::GroupId),
    DomainSkill(DomainRoot, ItemTypeId),
}

/// Root slot a direct affector waits on while the fit cannot resolve it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum PendingSlot {
    Ship,
    Character,
    Other(Entity),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum RoleSlot {
    Ship,
    Character,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Placement {
    Direct(Entity),
    Filtered(LinkKey),
    Pending(PendingSlot),
    // Structurally incapable of resolving; disable stays a no-op.
    Skipped,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct AffectorCtx {
    pub other: Option<Entity>,
    pub source_type: ItemTypeId,
}

/// Bidirectional index of live modification links inside one fit. One node
/// per holder, one edge per (affector, affectee) pair; the same graph serves
/// linking and dependency tracking.
#[derive(Component, Default)]
pub struct LinkRegister {
    graph: StableDiGraph<Entity, Affector>,
    nodes: HashMap<Entity, NodeIndex>,
    // Keys recorded at registration so unregistration never reads the holder.
    keys: HashMap<Entity, Vec<LinkKey>>,
    residents: HashMap<LinkKey, HashSet<Entity>>,
    filtered: HashMap<LinkKey, HashSet<Affector>>,
    awaiting: HashMap<PendingSlot, HashSet<Affector>>,
    placements: HashMap<Affector, Placement>,
    ship: Option<Entity>,
    character: Option<Entity>,
}

impl LinkRegister {
    /// Indexes `holder` and wires up the filtered affectors that match it.
    pub(crate) fn register_affectee(
        &mut self,
        holder: Entity,
        keys: Vec<LinkKey>,
    ) -> Vec<Affector> {
        let idx = self.graph.add_node(holder);
        self.nodes.insert(holder, idx);

        let mut linked = Vec::new();
        for key in &keys {
            self.residents.entry(*key).or_default().insert(holder);
            if let Some(affectors) = self.filtered.get(key) {
                linked.extend(affectors.iter().cloned());
            }
        }
        for affector in &linked {
            self.link(affector, holder);
        }
        self.keys.insert(holder, keys);
        linked
    }

    /// Reverses [`register_affectee`]; role and pairing links move back to
    /// the pending buffer.
    pub(crate) fn unregister_affectee(&mut self, holder: Entity) {
        let Some(idx) = self.nodes.remove(&holder) else {
            return;
        };

        let incoming: Vec<Affector> = self
            .graph
            .edges_directed(idx, Incoming)
            .map(|edge| edge.weight().clone())
            .collect();
        for affector in incoming {
            let slot = match affector.modifier.domain {
                Domain::Ship => Some(PendingSlot::Ship),
                Domain::Character => Some(PendingSlot::Character),
                Domain::Other => Some(PendingSlot::Other(affector.source)),
                Domain::SelfItem | Domain::Space => None,
            };
            if !matches!(
                self.placements.get(&affector),
                Some(Placement::Direct(target)) if *target == holder
            ) {
                continue;
            }
            match slot {
                Some(slot) => {
                    self.placements.insert(affector.clone(), Placement::Pending(slot));
                    self.awaiting.entry(slot).or_default().insert(affector);
                }
                None => {
                    self.placements.remove(&affector);
                }
            }
        }

        self.graph.remove_node(idx);
        if let Some(keys) = self.keys.remove(&holder) {
            for key in keys {
                if let Some(residents) = self.residents.get_mut(&key) {
                    residents.remove(&holder);
                }
            }
        }
    }

    /// Places one affector, returning the holders it got linked to.
    pub(crate) fn register_affector(
        &mut self,
        affector: Affector,
        ctx: AffectorCtx,
    ) -> Vec<Entity> {
        if self.placements.contains_key(&affector) {
            return Vec::new();
        }
        let placement = self.resolve(&affector, ctx);
        self.placements.insert(affector.clone(), placement);

        match placement {
            Placement::Direct(target) => {
                self.link(&affector, target);
                vec![target]
            }
            Placement::Filtered(key) => {
                self.filtered.entry(key).or_default().insert(affector.clone());
                let targets: Vec<Entity> = self
                    .residents
                    .get(&key)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default();
                for target in &targets {
                    self.link(&affector, *target);
                }
                targets
            }
            Placement::Pending(slot) => {
                self.awaiting.entry(slot).or_default().insert(affector);
                Vec::new()
            }
            Placement::Skipped => Vec::new(),
        }
    }

    pub(crate) fn unregister_affector(&mut self, affector: &Affector) {
        let Some(placement) = self.placements.remove(affector) else {
            return;
        };
        match placement {
            Placement::Direct(target) => {
                self.unlink(affector, target);
            }
            Placement::Filtered(key) => {
                if let Some(set) = self.filtered.get_mut(&key) {
                    set.remove(affector);
                }
                let targets: Vec<Entity> = self.edge_targets(affector);
                for target in targets {
                    self.unlink(affector, target);
                }
            }
            Placement::Pending(slot) => {
                if let Some(set) = self.awaiting.get_mut(&slot) {
                    set.remove(affector);
                }
            }
            Placement::Skipped => {}
        }
    }

    /// All affectors currently aimed at `holder`.
    pub fn affectors(&self, holder: Entity) -> Vec<Affector> {
        let Some(idx) = self.nodes.get(&holder) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*idx, Incoming)
            .map(|edge| edge.weight().clone())
            .collect()
    }

    pub(crate) fn affectors_of(&self, holder: Entity, attribute: AttributeId) -> Vec<Affector> {
        let Some(idx) = self.nodes.get(&holder) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*idx, Incoming)
            .filter(|edge| edge.weight().modifier.tgt_attr == attribute)
            .map(|edge| edge.weight().clone())
            .collect()
    }

    /// All holders the affector currently hits.
    pub fn affectees_of(&self, affector: &Affector) -> Vec<Entity> {
        match self.placements.get(affector) {
            Some(Placement::Direct(target)) => vec![*target],
            Some(Placement::Filtered(_)) => self.edge_targets(affector),
            _ => Vec::new(),
        }
    }

    /// Cached values that read `(holder, attribute)`.
    pub(crate) fn dependents_of(
        &self,
        holder: Entity,
        attribute: AttributeId,
    ) -> Vec<(Entity, AttributeId)> {
        let Some(idx) = self.nodes.get(&holder) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*idx, Outgoing)
            .filter(|edge| edge.weight().modifier.src == ModSrc::Attribute(attribute))
            .map(|edge| {
                let target = self.graph[edge.target()];
                (target, edge.weight().modifier.tgt_attr)
            })
            .collect()
    }

    pub(crate) fn emitted_affectors(&self, source: Entity) -> Vec<Affector> {
        self.placements
            .keys()
            .filter(|affector| affector.source == source)
            .cloned()
            .collect()
    }

    /// Fills or clears a fit role slot, re-placing waiting affectors.
    pub(crate) fn set_role(
        &mut self,
        slot: RoleSlot,
        holder: Option<Entity>,
    ) -> Vec<(Affector, Entity)> {
        let (field, pending) = match slot {
            RoleSlot::Ship => (&mut self.ship, PendingSlot::Ship),
            RoleSlot::Character => (&mut self.character, PendingSlot::Character),
        };
        *field = holder;
        let Some(holder) = holder else {
            return Vec::new();
        };

        let waiting: Vec<Affector> = self
            .awaiting
            .remove(&pending)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        let mut activated = Vec::new();
        for affector in waiting {
            self.placements
                .insert(affector.clone(), Placement::Direct(holder));
            self.link(&affector, holder);
            activated.push((affector, holder));
        }
        activated
    }

    pub(crate) fn set_other(
        &mut self,
        source: Entity,
        other: Entity,
    ) -> Vec<(Affector, Entity)> {
        let waiting: Vec<Affector> = self
            .awaiting
            .remove(&PendingSlot::Other(source))
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        let mut activated = Vec::new();
        for affector in waiting {
            self.placements
                .insert(affector.clone(), Placement::Direct(other));
            self.link(&affector, other);
            activated.push((affector, other));
        }
        activated
    }

    fn resolve(&self, affector: &Affector, ctx: AffectorCtx) -> Placement {
        let modifier = &affector.modifier;
        if modifier.filter == ModFilter::Item {
            return match modifier.domain {
                Domain::SelfItem => Placement::Direct(affector.source),
                Domain::Ship => self
                    .ship
                    .map(Placement::Direct)
                    .unwrap_or(Placement::Pending(PendingSlot::Ship)),
                Domain::Character => self
                    .character
                    .map(Placement::Direct)
                    .unwrap_or(Placement::Pending(PendingSlot::Character)),
                Domain::Other => ctx
                    .other
                    .map(Placement::Direct)
                    .unwrap_or(Placement::Pending(PendingSlot::Other(affector.source))),
                Domain::Space => {
                    warn!("modifier {modifier} skipped: space has no direct target");
                    Placement::Skipped
                }
            };
        }

        let root = match modifier.domain {
            Domain::Ship => DomainRoot::Ship,
            Domain::Character => DomainRoot::Character,
            Domain::Space => DomainRoot::Space,
            Domain::SelfItem | Domain::Other => {
                warn!("modifier {modifier} skipped: filters cannot narrow this domain");
                return Placement::Skipped;
            }
        };
        match modifier.filter {
            ModFilter::All => Placement::Filtered(LinkKey::Domain(root)),
            ModFilter::Group(group) => Placement::Filtered(LinkKey::DomainGroup(root, group)),
            ModFilter::Skill(skill) => Placement::Filtered(LinkKey::DomainSkill(root, skill)),
            ModFilter::SkillSelf => {
                Placement::Filtered(LinkKey::DomainSkill(root, ctx.source_type))
            }
            ModFilter::Item => Placement::Skipped,
        }
    }

    fn link(&mut self, affector: &Affector, target: Entity) {
        let (Some(src), Some(tgt)) = (
            self.nodes.get(&affector.source).copied(),
            self.nodes.get(&target).copied(),
        ) else {
            warn!(
                "link between unregistered holders dropped ({:?} -> {:?})",
                affector.source, target
            );
            return;
        };
        self.graph.add_edge(src, tgt, affector.clone());
    }

    fn unlink(&mut self, affector: &Affector, target: Entity) {
        let (Some(src), Some(tgt)) = (
            self.nodes.get(&affector.source).copied(),
            self.nodes.get(&target).copied(),
        ) else {
            return;
        };
        let edges: Vec<_> = self
            .graph
            .edges_directed(src, Outgoing)
            .filter(|edge| edge.target() == tgt && edge.weight() == affector)
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }
    }

    fn edge_targets(&self, affector: &Affector) -> Vec<Entity> {
        let Some(idx) = self.nodes.get(&affector.source) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*idx, Outgoing)
            .filter(|edge| edge.weight() == affector)
            .map(|edge| self.graph[edge.target()])
            .collect()
    }
}

/// Keys a holder satisfies as an affectee.
pub(crate) fn affectee_keys(item: &ItemType, kind: HolderKind) -> Vec<LinkKey> {
    let Some(root) = kind.domain_root() else {
        return Vec::new();
    };
    let mut keys = vec![
        LinkKey::Domain(root),
        LinkKey::DomainGroup(root, item.group),
    ];
    for (skill, _) in item.required_skills() {
        keys.push(LinkKey::DomainSkill(root, skill));
    }
    if kind == HolderKind::Skill {
        keys.push(LinkKey::DomainSkill(root, item.id));
    }
    keys
}

/// Insert first, invalidate after.
pub(crate) fn enable_affector(world: &mut World, fit: Entity, affector: Affector) {
    let Some(source) = world.get::<Holder>(affector.source) else {
        return;
    };
    let ctx = AffectorCtx {
        other: paired_with(world, affector.source),
        source_type: source.item.id,
    };
    let tgt_attr = affector.modifier.tgt_attr;
    let linked = match world.get_mut::<LinkRegister>(fit) {
        Some(mut register) => register.register_affector(affector, ctx),
        None => Vec::new(),
    };
    for entity in linked {
        invalidate(world, entity, tgt_attr);
    }
}

/// Invalidate first, remove after; cleanup reads the register.
pub(crate) fn disable_affector(world: &mut World, fit: Entity, affector: Affector) {
    let tgt_attr = affector.modifier.tgt_attr;
    let affectees = world
        .get::<LinkRegister>(fit)
        .map(|register| register.affectees_of(&affector))
        .unwrap_or_default();
    for entity in affectees {
        invalidate(world, entity, tgt_attr);
    }
    if let Some(mut register) = world.get_mut::<LinkRegister>(fit) {
        register.unregister_affector(&affector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{AttributeModifier, ModOp};
    use crate::state::State;
    use std::sync::Arc;

    fn entities(n: usize) -> Vec<Entity> {
        let mut world = World::new();
        (0..n).map(|_| world.spawn_empty().id()).collect()
    }

    fn ship_all_modifier() -> Arc<AttributeModifier> {
        Arc::new(AttributeModifier::local(
            Domain::Ship,
            ModFilter::All,
            ModSrc::Attribute(AttributeId(1)),
            ModOp::PostMul,
            AttributeId(2),
        ))
    }

    fn ctx(source_type: i32) -> AffectorCtx {
        AffectorCtx {
            other: None,
            source_type: ItemTypeId(source_type),
        }
    }

    #[test]
    fn filtered_affector_reaches_existing_and_future_residents() {
        let ids = entities(3);
        let (source, old, newcomer) = (ids[0], ids[1], ids[2]);
        let mut register = LinkRegister::default();

        register.register_affectee(source, Vec::new());
        register.register_affectee(old, vec![LinkKey::Domain(DomainRoot::Ship)]);

        let affector = Affector::new(source, ship_all_modifier());
        let linked = register.register_affector(affector.clone(), ctx(1));
        assert_eq!(linked, vec![old]);

        let linked = register.register_affectee(newcomer, vec![LinkKey::Domain(DomainRoot::Ship)]);
        assert_eq!(linked, vec![affector.clone()]);

        let mut affectees = register.affectees_of(&affector);
        affectees.sort();
        let mut expected = vec![old, newcomer];
        expected.sort();
        assert_eq!(affectees, expected);
    }

    #[test]
    fn ship_direct_affector_waits_for_the_ship() {
        let ids = entities(2);
        let (source, ship) = (ids[0], ids[1]);
        let mut register = LinkRegister::default();
        register.register_affectee(source, Vec::new());

        let modifier = Arc::new(AttributeModifier::local(
            Domain::Ship,
            ModFilter::Item,
            ModSrc::Attribute(AttributeId(1)),
            ModOp::PostPercent,
            AttributeId(2),
        ));
        let affector = Affector::new(source, modifier);
        assert!(register.register_affector(affector.clone(), ctx(1)).is_empty());
        assert!(register.affectees_of(&affector).is_empty());

        register.register_affectee(ship, Vec::new());
        let activated = register.set_role(RoleSlot::Ship, Some(ship));
        assert_eq!(activated, vec![(affector.clone(), ship)]);
        assert_eq!(register.affectees_of(&affector), vec![ship]);

        // The ship leaving moves the link back to the pending buffer.
        register.unregister_affectee(ship);
        register.set_role(RoleSlot::Ship, None);
        assert!(register.affectees_of(&affector).is_empty());
        assert!(register.affectors(ship).is_empty());
    }

    #[test]
    fn dependents_follow_source_attribute() {
        let ids = entities(2);
        let (source, ship) = (ids[0], ids[1]);
        let mut register = LinkRegister::default();
        register.register_affectee(source, Vec::new());
        register.register_affectee(ship, Vec::new());
        register.set_role(RoleSlot::Ship, Some(ship));

        let modifier = Arc::new(AttributeModifier {
            state: State::Offline,
            scope: crate::modifier::ModScope::Local,
            src: ModSrc::Attribute(AttributeId(1)),
            op: ModOp::PostMul,
            tgt_attr: AttributeId(2),
            domain: Domain::Ship,
            filter: ModFilter::Item,
        });
        register.register_affector(Affector::new(source, modifier), ctx(1));

        assert_eq!(
            register.dependents_of(source, AttributeId(1)),
            vec![(ship, AttributeId(2))]
        );
        assert!(register.dependents_of(source, AttributeId(9)).is_empty());
    }
}
