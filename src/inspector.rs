use crate::fit::fit_holders;
use crate::holder::{Holder, HolderState};
use bevy::prelude::{Entity, World};
use ptree::{TreeBuilder, write_tree};

/// Renders a fit as a tree of holders, effects and modifiers.
pub fn fit_tree(world: &World, fit: Entity) -> std::io::Result<String> {
    let mut tree = TreeBuilder::new(format!("fit {fit:?}"));
    for entity in fit_holders(world, fit) {
        let Some(holder) = world.get::<Holder>(entity) else {
            continue;
        };
        let state = world
            .get::<HolderState>(entity)
            .map(|s| s.0)
            .unwrap_or_default();
        tree.begin_child(format!(
            "{} [{:?}] {state}",
            holder.item.name, holder.kind
        ));
        for effect in &holder.item.effects {
            tree.begin_child(format!(
                "effect {} ({:?}, {:?})",
                effect.id, effect.category, effect.build_status
            ));
            for modifier in &effect.modifiers {
                tree.add_empty_child(modifier.to_string());
            }
            tree.end_child();
        }
        tree.end_child();
    }
    let tree = tree.build();
    let mut out = Vec::new();
    write_tree(&tree, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
