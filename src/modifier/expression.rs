use crate::catalog::{AttributeId, GroupId, ItemTypeId};
use crate::modifier::{AttributeModifier, Domain, ModFilter, ModOp, ModScope, ModSrc};
use crate::state::State;
use bevy::log::warn;

/// Operand codes of the legacy expression trees. `ADD_*` installs, the
/// matching `RM_*` undoes, `SPLICE` sequences subtrees, `DEF_*` leaves
/// carry operands.
pub mod operands {
    pub const ADD_GANG_GRP_MOD: i32 = 2;
    pub const ADD_GANG_ITM_MOD: i32 = 3;
    pub const ADD_GANG_OWN_SRQ_MOD: i32 = 4;
    pub const ADD_GANG_SRQ_MOD: i32 = 5;
    pub const ADD_ITM_MOD: i32 = 6;
    pub const ADD_LOC_GRP_MOD: i32 = 7;
    pub const ADD_LOC_MOD: i32 = 8;
    pub const ADD_LOC_SRQ_MOD: i32 = 9;
    pub const ADD_OWN_SRQ_MOD: i32 = 11;
    // (location, attribute) pair naming what gets modified.
    pub const ITM_ATTR: i32 = 12;
    pub const SPLICE: i32 = 17;
    pub const DEF_OPTR: i32 = 21;
    pub const DEF_ATTR: i32 = 22;
    pub const DEF_LOC: i32 = 24;
    pub const DEF_GRP: i32 = 26;
    pub const DEF_TYPE: i32 = 29;
    // (operator, item-attribute) pair: the full target specification.
    pub const TGT_SPEC: i32 = 31;
    pub const LOC_GRP: i32 = 48;
    pub const LOC_SRQ: i32 = 49;
    pub const RM_GANG_GRP_MOD: i32 = 54;
    pub const RM_GANG_ITM_MOD: i32 = 55;
    pub const RM_GANG_OWN_SRQ_MOD: i32 = 56;
    pub const RM_GANG_SRQ_MOD: i32 = 57;
    pub const RM_ITM_MOD: i32 = 58;
    pub const RM_LOC_GRP_MOD: i32 = 59;
    pub const RM_LOC_MOD: i32 = 60;
    pub const RM_LOC_SRQ_MOD: i32 = 61;
    pub const RM_OWN_SRQ_MOD: i32 = 62;
}

use operands::*;

/// One node of a raw expression tree.
#[derive(Clone, Debug, Default)]
pub struct ExprNode {
    pub operand: i32,
    pub arg1: Option<Box<ExprNode>>,
    pub arg2: Option<Box<ExprNode>>,
    pub value: Option<String>,
    pub attribute_id: Option<i32>,
    pub group_id: Option<i32>,
    pub type_id: Option<i32>,
}

impl ExprNode {
    pub fn branch(operand: i32, arg1: ExprNode, arg2: ExprNode) -> Self {
        Self {
            operand,
            arg1: Some(Box::new(arg1)),
            arg2: Some(Box::new(arg2)),
            ..Default::default()
        }
    }

    pub fn splice(arg1: ExprNode, arg2: ExprNode) -> Self {
        Self::branch(SPLICE, arg1, arg2)
    }

    pub fn def_optr(name: &str) -> Self {
        Self {
            operand: DEF_OPTR,
            value: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn def_loc(name: &str) -> Self {
        Self {
            operand: DEF_LOC,
            value: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn def_attr(attribute: i32) -> Self {
        Self {
            operand: DEF_ATTR,
            attribute_id: Some(attribute),
            ..Default::default()
        }
    }

    pub fn def_grp(group: i32) -> Self {
        Self {
            operand: DEF_GRP,
            group_id: Some(group),
            ..Default::default()
        }
    }

    pub fn def_type(item_type: i32) -> Self {
        Self {
            operand: DEF_TYPE,
            type_id: Some(item_type),
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Shape {
    Item,
    All,
    Group,
    Skill,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Install,
    Undo,
}

fn shape_for(operand: i32, phase: Phase) -> Option<(Shape, ModScope)> {
    let install = match phase {
        Phase::Install => operand,
        // Normalize undo opcodes onto their install counterparts.
        Phase::Undo => match operand {
            RM_ITM_MOD => ADD_ITM_MOD,
            RM_LOC_MOD => ADD_LOC_MOD,
            RM_LOC_GRP_MOD => ADD_LOC_GRP_MOD,
            RM_LOC_SRQ_MOD => ADD_LOC_SRQ_MOD,
            RM_OWN_SRQ_MOD => ADD_OWN_SRQ_MOD,
            RM_GANG_ITM_MOD => ADD_GANG_ITM_MOD,
            RM_GANG_GRP_MOD => ADD_GANG_GRP_MOD,
            RM_GANG_SRQ_MOD => ADD_GANG_SRQ_MOD,
            RM_GANG_OWN_SRQ_MOD => ADD_GANG_OWN_SRQ_MOD,
            _ => return None,
        },
    };
    match install {
        ADD_ITM_MOD => Some((Shape::Item, ModScope::Local)),
        ADD_LOC_MOD => Some((Shape::All, ModScope::Local)),
        ADD_LOC_GRP_MOD => Some((Shape::Group, ModScope::Local)),
        ADD_LOC_SRQ_MOD | ADD_OWN_SRQ_MOD => Some((Shape::Skill, ModScope::Local)),
        ADD_GANG_ITM_MOD => Some((Shape::Item, ModScope::Gang)),
        ADD_GANG_GRP_MOD => Some((Shape::Group, ModScope::Gang)),
        ADD_GANG_SRQ_MOD | ADD_GANG_OWN_SRQ_MOD => Some((Shape::Skill, ModScope::Gang)),
        _ => None,
    }
}

/// Compiles a pre/post expression pair. Every installed modifier needs a
/// matching undo in the post tree; unmatched entries are dropped and
/// counted.
pub fn compile_expressions(pre: &ExprNode, post: &ExprNode) -> (Vec<AttributeModifier>, usize) {
    let mut dropped = 0usize;
    let mut installed = Vec::new();
    gather(pre, Phase::Install, &mut installed, &mut dropped);
    let mut undone = Vec::new();
    gather(post, Phase::Undo, &mut undone, &mut dropped);

    let mut out = Vec::new();
    for modifier in installed {
        if let Some(pos) = undone.iter().position(|undo| *undo == modifier) {
            undone.remove(pos);
            out.push(modifier);
        } else {
            warn!("expression modifier without undo counterpart dropped: {modifier}");
            dropped += 1;
        }
    }
    for undo in undone {
        warn!("expression undo without installed counterpart ignored: {undo}");
        dropped += 1;
    }
    (out, dropped)
}

fn gather(node: &ExprNode, phase: Phase, out: &mut Vec<AttributeModifier>, dropped: &mut usize) {
    if node.operand == SPLICE {
        if let Some(arg1) = &node.arg1 {
            gather(arg1, phase, out, dropped);
        }
        if let Some(arg2) = &node.arg2 {
            gather(arg2, phase, out, dropped);
        }
        return;
    }
    let Some((shape, scope)) = shape_for(node.operand, phase) else {
        warn!("unknown operand {} in expression tree", node.operand);
        *dropped += 1;
        return;
    };
    match parse_mod(node, shape, scope) {
        Ok(modifier) => out.push(modifier),
        Err(reason) => {
            warn!("malformed expression modifier: {reason}");
            *dropped += 1;
        }
    }
}

fn parse_mod(node: &ExprNode, shape: Shape, scope: ModScope) -> Result<AttributeModifier, String> {
    let tgt_spec = expect(node.arg1.as_deref(), TGT_SPEC)?;
    let optr = expect(tgt_spec.arg1.as_deref(), DEF_OPTR)?;
    let op = op_from_name(
        optr.value
            .as_deref()
            .ok_or_else(|| "operator leaf without value".to_string())?,
    )?;
    let itm_attr = expect(tgt_spec.arg2.as_deref(), ITM_ATTR)?;
    let tgt_attr = attr_leaf(itm_attr.arg2.as_deref())?;

    let location = itm_attr
        .arg1
        .as_deref()
        .ok_or_else(|| "target spec without location".to_string())?;
    let (domain, filter, projected) = match shape {
        Shape::Item => {
            let (domain, projected) = loc_leaf(Some(location))?;
            (domain, ModFilter::Item, projected)
        }
        Shape::All => {
            let (domain, projected) = loc_leaf(Some(location))?;
            (domain, ModFilter::All, projected)
        }
        Shape::Group => {
            let inner = expect(Some(location), LOC_GRP)?;
            let (domain, projected) = loc_leaf(inner.arg1.as_deref())?;
            let group = expect(inner.arg2.as_deref(), DEF_GRP)?
                .group_id
                .ok_or_else(|| "group leaf without value".to_string())?;
            (domain, ModFilter::Group(GroupId(group)), projected)
        }
        Shape::Skill => {
            let inner = expect(Some(location), LOC_SRQ)?;
            let (domain, projected) = loc_leaf(inner.arg1.as_deref())?;
            let skill = expect(inner.arg2.as_deref(), DEF_TYPE)?
                .type_id
                .ok_or_else(|| "type leaf without value".to_string())?;
            let filter = if ItemTypeId(skill) == ItemTypeId::OWNER_SELF {
                ModFilter::SkillSelf
            } else {
                ModFilter::Skill(ItemTypeId(skill))
            };
            (domain, filter, projected)
        }
    };

    let src_attr = attr_leaf(node.arg2.as_deref())?;
    let scope = if projected && scope == ModScope::Local {
        ModScope::Projected
    } else {
        scope
    };
    Ok(AttributeModifier {
        state: State::Offline,
        scope,
        src: ModSrc::Attribute(src_attr),
        op,
        tgt_attr,
        domain,
        filter,
    })
}

fn expect<'a>(node: Option<&'a ExprNode>, operand: i32) -> Result<&'a ExprNode, String> {
    let node = node.ok_or_else(|| format!("missing operand {operand}"))?;
    if node.operand == operand {
        Ok(node)
    } else {
        Err(format!("expected operand {operand}, found {}", node.operand))
    }
}

fn attr_leaf(node: Option<&ExprNode>) -> Result<AttributeId, String> {
    expect(node, DEF_ATTR)?
        .attribute_id
        .map(AttributeId)
        .ok_or_else(|| "attribute leaf without value".to_string())
}

fn loc_leaf(node: Option<&ExprNode>) -> Result<(Domain, bool), String> {
    let leaf = expect(node, DEF_LOC)?;
    match leaf.value.as_deref() {
        Some("Self") => Ok((Domain::SelfItem, false)),
        Some("Char") => Ok((Domain::Character, false)),
        Some("Ship") => Ok((Domain::Ship, false)),
        Some("Target") => Ok((Domain::Ship, true)),
        Some("Other") => Ok((Domain::Other, false)),
        Some(other) => Err(format!("unknown location {other}")),
        None => Err("location leaf without value".to_string()),
    }
}

fn op_from_name(name: &str) -> Result<ModOp, String> {
    match name {
        "PreAssignment" => Ok(ModOp::PreAssign),
        "PreMul" => Ok(ModOp::PreMul),
        "PreDiv" => Ok(ModOp::PreDiv),
        "ModAdd" => Ok(ModOp::Add),
        "ModSub" => Ok(ModOp::Sub),
        "PostMul" => Ok(ModOp::PostMul),
        "PostDiv" => Ok(ModOp::PostDiv),
        "PostPercent" => Ok(ModOp::PostPercent),
        "PostAssignment" => Ok(ModOp::PostAssign),
        other => Err(format!("unknown operator association {other}")),
    }
}
