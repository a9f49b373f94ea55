use bevy::app::App;
use loadout::attribute::AttributeMap;
use loadout::attribute::calculator::{PENALTY_BASE, attribute_value};
use loadout::catalog::{
    AttributeDef, AttributeId, Catalog, EffectCategory, EffectId, GroupId, ItemTypeId, attrs,
    categories,
};
use loadout::fit::{add_holder, remove_holder, set_skill_level, spawn_fit};
use loadout::holder::HolderKind;
use loadout::modifier::{
    AttributeModifier, Domain, EffectBuilder, ModFilter, ModOp, ModSrc,
};
use loadout::prelude::ItemTypeBuilder;
use loadout::state::disable_effect;
use loadout::{AttributeError, LoadoutPlugin};

const TGT: AttributeId = AttributeId(30);
const SRC: AttributeId = AttributeId(20);

fn app() -> App {
    let mut app = App::new();
    app.add_plugins(LoadoutPlugin);
    app
}

fn self_modifier(op: ModOp, src: ModSrc) -> AttributeModifier {
    AttributeModifier::local(Domain::SelfItem, ModFilter::Item, src, op, TGT)
}

#[test]
fn post_percent_from_attribute() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt"));
        catalog.add_attribute(AttributeDef::new(SRC, "src"));
        let effect = EffectBuilder::new(EffectId(1), EffectCategory::Passive)
            .modifier(self_modifier(ModOp::PostPercent, ModSrc::Attribute(SRC)))
            .build();
        let effect = catalog.add_effect(effect);
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "booster rig")
                .category(categories::MODULE)
                .attribute(TGT, 100.0)
                .attribute(SRC, 20.0)
                .effect(effect)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    let value = attribute_value(world, holder, TGT).unwrap();
    assert_eq!(value, 120.0);
}

#[test]
fn non_stackable_multipliers_are_penalized() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt").unstackable());
        catalog.add_attribute(AttributeDef::new(SRC, "src"));
        let effect = EffectBuilder::new(EffectId(1), EffectCategory::Passive)
            .modifier(self_modifier(ModOp::PostMul, ModSrc::Attribute(SRC)))
            .modifier(self_modifier(ModOp::PostMul, ModSrc::Attribute(SRC)))
            .build();
        let effect = catalog.add_effect(effect);
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "damage module")
                .category(categories::MODULE)
                .attribute(TGT, 10.0)
                .attribute(SRC, 1.1)
                .effect(effect)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    let value = attribute_value(world, holder, TGT).unwrap();
    let expected = 10.0 * 1.1 * (1.0 + 0.1 * PENALTY_BASE);
    assert!((value - expected).abs() < 1e-9);
    assert!((value - 11.956).abs() < 1e-3);
}

#[test]
fn exempt_source_category_skips_the_penalty() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt").unstackable());
        catalog.add_attribute(AttributeDef::new(SRC, "src"));
        let effect = EffectBuilder::new(EffectId(1), EffectCategory::Passive)
            .modifier(self_modifier(ModOp::PostMul, ModSrc::Attribute(SRC)))
            .modifier(self_modifier(ModOp::PostMul, ModSrc::Attribute(SRC)))
            .build();
        let effect = catalog.add_effect(effect);
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "hardwiring")
                .category(categories::IMPLANT)
                .attribute(TGT, 10.0)
                .attribute(SRC, 1.1)
                .effect(effect)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Implant).unwrap();

    let value = attribute_value(world, holder, TGT).unwrap();
    assert!((value - 12.1).abs() < 1e-9);
}

#[test]
fn operator_order_over_mixed_modifiers() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt"));
        let effect = EffectBuilder::new(EffectId(1), EffectCategory::Passive)
            .modifier(self_modifier(ModOp::PreMul, ModSrc::Value(2.0)))
            .modifier(self_modifier(ModOp::Add, ModSrc::Value(5.0)))
            .modifier(self_modifier(ModOp::PostMul, ModSrc::Value(3.0)))
            .build();
        let effect = catalog.add_effect(effect);
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "mixed module")
                .category(categories::MODULE)
                .attribute(TGT, 10.0)
                .effect(effect)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    assert_eq!(attribute_value(world, holder, TGT).unwrap(), 75.0);
}

#[test]
fn cap_clamps_and_tracks_its_source() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt").capped_by(attrs::SKILL_LEVEL));
        catalog.add_attribute(AttributeDef::new(attrs::SKILL_LEVEL, "skill level"));
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "capped skill")
                .category(categories::SKILL)
                .attribute(TGT, 150.0)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Skill).unwrap();

    set_skill_level(world, holder, 50).unwrap();
    assert_eq!(attribute_value(world, holder, TGT).unwrap(), 50.0);

    // Raising the cap invalidates the capped value.
    set_skill_level(world, holder, 200).unwrap();
    assert_eq!(
        world.get::<AttributeMap>(holder).unwrap().cached(TGT),
        None
    );
    assert_eq!(attribute_value(world, holder, TGT).unwrap(), 150.0);
}

#[test]
fn reads_memoize_and_stay_independent() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt"));
        catalog.add_attribute(AttributeDef::new(SRC, "src"));
        let effect = EffectBuilder::new(EffectId(1), EffectCategory::Passive)
            .modifier(self_modifier(ModOp::PostPercent, ModSrc::Attribute(SRC)))
            .build();
        let effect = catalog.add_effect(effect);
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "module")
                .category(categories::MODULE)
                .attribute(TGT, 100.0)
                .attribute(SRC, 20.0)
                .effect(effect)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let first = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();
    let second = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    let a = attribute_value(world, first, TGT).unwrap();
    assert_eq!(world.get::<AttributeMap>(first).unwrap().cached(TGT), Some(a));
    assert_eq!(attribute_value(world, first, TGT).unwrap(), a);

    let b = attribute_value(world, second, TGT).unwrap();
    assert_eq!(a, b);

    // Killing the first holder's effect leaves the second holder's cache
    // untouched: nothing links them.
    disable_effect(world, first, EffectId(1)).unwrap();
    assert_eq!(world.get::<AttributeMap>(first).unwrap().cached(TGT), None);
    assert_eq!(world.get::<AttributeMap>(second).unwrap().cached(TGT), Some(b));
    assert_eq!(attribute_value(world, first, TGT).unwrap(), 100.0);
}

#[test]
fn self_reference_cycles_fall_back_to_base_values() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "a"));
        catalog.add_attribute(AttributeDef::new(SRC, "b"));
        let effect = EffectBuilder::new(EffectId(1), EffectCategory::Passive)
            // a += b while b += a: a genuine reference cycle.
            .modifier(self_modifier(ModOp::Add, ModSrc::Attribute(SRC)))
            .modifier(AttributeModifier::local(
                Domain::SelfItem,
                ModFilter::Item,
                ModSrc::Attribute(TGT),
                ModOp::Add,
                SRC,
            ))
            .build();
        let effect = catalog.add_effect(effect);
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "feedback loop")
                .category(categories::MODULE)
                .attribute(TGT, 10.0)
                .attribute(SRC, 100.0)
                .effect(effect)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    // b re-enters a, sees its base (10), lands at 110; a then reads 10 + 110.
    assert_eq!(attribute_value(world, holder, TGT).unwrap(), 120.0);
    assert_eq!(attribute_value(world, holder, SRC).unwrap(), 110.0);
}

#[test]
fn missing_attribute_with_no_affectors_is_an_error() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt"));
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "bare module")
                .category(categories::MODULE)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    assert_eq!(
        attribute_value(world, holder, TGT),
        Err(AttributeError::NotFound {
            holder,
            attribute: TGT
        })
    );
}

#[test]
fn only_the_skill_level_accepts_writes() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt"));
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "skill")
                .category(categories::SKILL)
                .attribute(TGT, 1.0)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Skill).unwrap();

    let mut map = world.get_mut::<AttributeMap>(holder).unwrap();
    assert_eq!(
        map.write(TGT, 5.0),
        Err(AttributeError::WriteProtected(TGT))
    );
    assert!(map.write(attrs::SKILL_LEVEL, 5.0).is_ok());
}

#[test]
fn cached_values_are_visible_to_systems() {
    use bevy::ecs::system::RunSystemOnce;
    use loadout::attribute::CachedAttributes;

    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt"));
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "module")
                .category(categories::MODULE)
                .attribute(TGT, 42.0)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let holder = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    // Nothing computed yet: the read-only view misses.
    world
        .run_system_once(move |cached: CachedAttributes| {
            assert_eq!(cached.cached(holder, TGT), None);
        })
        .unwrap();

    attribute_value(world, holder, TGT).unwrap();
    world
        .run_system_once(move |cached: CachedAttributes| {
            assert_eq!(cached.cached(holder, TGT), Some(42.0));
        })
        .unwrap();
}

#[test]
fn removed_source_reverts_its_targets() {
    let mut app = app();
    {
        let mut catalog = app.world_mut().resource_mut::<Catalog>();
        catalog.add_attribute(AttributeDef::new(TGT, "tgt"));
        catalog.add_attribute(AttributeDef::new(SRC, "src"));
        let effect = EffectBuilder::new(EffectId(1), EffectCategory::Passive)
            .modifier(AttributeModifier::local(
                Domain::Ship,
                ModFilter::Item,
                ModSrc::Attribute(SRC),
                ModOp::PostPercent,
                TGT,
            ))
            .build();
        let effect = catalog.add_effect(effect);
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(1), "hull tuner")
                .category(categories::MODULE)
                .attribute(SRC, 25.0)
                .effect(effect)
                .build(),
        );
        catalog.add_type(
            ItemTypeBuilder::new(ItemTypeId(2), "hull")
                .category(categories::SHIP)
                .group(GroupId(9))
                .attribute(TGT, 200.0)
                .build(),
        );
    }

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let ship = add_holder(world, fit, ItemTypeId(2), HolderKind::Ship).unwrap();
    let module = add_holder(world, fit, ItemTypeId(1), HolderKind::Module).unwrap();

    assert_eq!(attribute_value(world, ship, TGT).unwrap(), 250.0);

    remove_holder(world, module).unwrap();
    assert_eq!(world.get::<AttributeMap>(ship).unwrap().cached(TGT), None);
    assert_eq!(attribute_value(world, ship, TGT).unwrap(), 200.0);
}
