use bevy::app::App;
use loadout::LoadoutPlugin;
use loadout::catalog::{AttributeDef, AttributeId, Catalog, ItemTypeId, attrs, categories};
use loadout::fit::{add_holder, detach_holder, remove_holder, set_skill_level, spawn_fit, validate};
use loadout::holder::HolderKind;
use loadout::prelude::ItemTypeBuilder;
use loadout::restriction::{CAPITAL_VOLUME, FailureData, RestrictionKind};

const GUNNERY: ItemTypeId = ItemTypeId(3300);

fn app() -> App {
    let mut app = App::new();
    app.add_plugins(LoadoutPlugin);
    app
}

fn seed_catalog(catalog: &mut Catalog) {
    catalog.add_attribute(AttributeDef::new(attrs::VOLUME, "volume"));
    catalog.add_attribute(AttributeDef::new(attrs::IS_CAPITAL_SIZE, "is capital size"));
    catalog.add_attribute(AttributeDef::new(attrs::SKILL_LEVEL, "skill level"));

    catalog.add_type(
        ItemTypeBuilder::new(ItemTypeId(1), "frigate")
            .category(categories::SHIP)
            .build(),
    );
    catalog.add_type(
        ItemTypeBuilder::new(ItemTypeId(2), "freighter")
            .category(categories::SHIP)
            .attribute(attrs::IS_CAPITAL_SIZE, 1.0)
            .build(),
    );
    catalog.add_type(
        ItemTypeBuilder::new(ItemTypeId(3), "capital repairer")
            .category(categories::MODULE)
            .attribute(attrs::VOLUME, 4000.0)
            .build(),
    );
    catalog.add_type(
        ItemTypeBuilder::new(ItemTypeId(4), "small repairer")
            .category(categories::MODULE)
            .build(),
    );
    catalog.add_type(
        ItemTypeBuilder::new(GUNNERY, "gunnery")
            .category(categories::SKILL)
            .build(),
    );
    catalog.add_type(
        ItemTypeBuilder::new(ItemTypeId(5), "turret")
            .category(categories::MODULE)
            .attribute(AttributeId(182), f64::from(GUNNERY.0))
            .attribute(AttributeId(277), 3.0)
            .build(),
    );
}

#[test]
fn capital_module_needs_a_capital_hull() {
    let mut app = app();
    seed_catalog(&mut app.world_mut().resource_mut::<Catalog>());

    let world = app.world_mut();
    let fit = spawn_fit(world);
    let frigate = add_holder(world, fit, ItemTypeId(1), HolderKind::Ship).unwrap();
    let repairer = add_holder(world, fit, ItemTypeId(3), HolderKind::Module).unwrap();

    let err = validate(world, fit).unwrap_err();
    assert_eq!(err.failures.len(), 1);
    let failure = &err.failures[0];
    assert_eq!(failure.kind, RestrictionKind::CapitalModule);
    assert_eq!(failure.holder, repairer);
    assert_eq!(
        failure.data,
        FailureData::CapitalModule {
            holder_volume: 4000.0,
            max_subcapital_volume: CAPITAL_VOLUME,
        }
    );

    // Swapping to a capital-flagged hull clears the failure.
    detach_holder(world, frigate).unwrap();
    add_holder(world, fit, ItemTypeId(2), HolderKind::Ship).unwrap();
    assert!(validate(world, fit).is_ok());
}

#[test]
fn modules_without_volume_are_ignored() {
    let mut app = app();
    seed_catalog(&mut app.world_mut().resource_mut::<Catalog>());

    let world = app.world_mut();
    let fit = spawn_fit(world);
    add_holder(world, fit, ItemTypeId(1), HolderKind::Ship).unwrap();
    add_holder(world, fit, ItemTypeId(4), HolderKind::Module).unwrap();

    assert!(validate(world, fit).is_ok());
}

#[test]
fn removing_the_offender_clears_the_failure() {
    let mut app = app();
    seed_catalog(&mut app.world_mut().resource_mut::<Catalog>());

    let world = app.world_mut();
    let fit = spawn_fit(world);
    add_holder(world, fit, ItemTypeId(1), HolderKind::Ship).unwrap();
    let repairer = add_holder(world, fit, ItemTypeId(3), HolderKind::Module).unwrap();

    assert!(validate(world, fit).is_err());
    remove_holder(world, repairer).unwrap();
    assert!(validate(world, fit).is_ok());
}

#[test]
fn skill_requirements_check_trained_levels() {
    let mut app = app();
    seed_catalog(&mut app.world_mut().resource_mut::<Catalog>());

    let world = app.world_mut();
    let fit = spawn_fit(world);
    add_holder(world, fit, ItemTypeId(2), HolderKind::Ship).unwrap();
    let turret = add_holder(world, fit, ItemTypeId(5), HolderKind::Module).unwrap();

    // No skill at all.
    let err = validate(world, fit).unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(
        err.failures[0].data,
        FailureData::SkillRequirement {
            skill: GUNNERY,
            required_level: 3,
            trained_level: None,
        }
    );
    assert_eq!(err.failures[0].holder, turret);

    // Undertrained.
    let skill = add_holder(world, fit, GUNNERY, HolderKind::Skill).unwrap();
    set_skill_level(world, skill, 2).unwrap();
    let err = validate(world, fit).unwrap_err();
    assert_eq!(
        err.failures[0].data,
        FailureData::SkillRequirement {
            skill: GUNNERY,
            required_level: 3,
            trained_level: Some(2),
        }
    );

    set_skill_level(world, skill, 3).unwrap();
    assert!(validate(world, fit).is_ok());
}
