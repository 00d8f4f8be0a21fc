//! Tree-construction input: a recursive profile record, and the builder
//! that walks it into a [`Tree`] of [`ClassNode`]s plus a flat list of
//! [`ShaperLeaf`]s.

use std::collections::HashSet;

use crate::error::{ConfigError, Error};
use crate::node::{ClassNode, NodeId, Tree};
use crate::shaper::ShaperLeaf;
use crate::{HIGHEST_PRIO, LOWEST_PRIO};

/// A node in the tree-construction input: `(name, rate, ceil, prio,
/// input_rate, children)`. A profile with no children builds a leaf; one
/// with children builds an inner node, except the outermost profile passed
/// to [`Profile::build`], which is always the (inner) root regardless of
/// whether it lists children directly or nests everything underneath.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "borsh", derive(borsh::BorshSerialize, borsh::BorshDeserialize))]
pub struct Profile {
    pub name: String,
    pub rate: f64,
    pub ceil: f64,
    pub prio: u8,
    pub input_rate: f64,
    pub children: Vec<Profile>,
}

impl Profile {
    /// An inner (aggregating) node: no traffic of its own, just a CIR/PIR
    /// budget shared by its children.
    pub fn inner(name: impl Into<String>, rate: f64, ceil: f64, children: Vec<Profile>) -> Self {
        Profile {
            name: name.into(),
            rate,
            ceil,
            prio: 0,
            input_rate: 0.0,
            children,
        }
    }

    /// A leaf: carries traffic from a Source toward a Sink at `input_rate`,
    /// scheduled at priority `prio` (0 = highest).
    pub fn leaf(name: impl Into<String>, rate: f64, ceil: f64, prio: u8, input_rate: f64) -> Self {
        Profile {
            name: name.into(),
            rate,
            ceil,
            prio,
            input_rate,
            children: Vec::new(),
        }
    }

    /// Validate and build this profile into a [`Tree`] plus its leaves.
    ///
    /// This profile is always the root and is always treated as an inner
    /// node, even if `children` is empty (an empty tree with only a root
    /// is legal, if useless).
    pub fn build(&self) -> Result<(Tree, Vec<ShaperLeaf>), Error> {
        let mut seen_names = HashSet::new();
        self.validate(true, &mut seen_names)?;

        let mut tree = Tree::new();
        let mut leaves = Vec::new();
        let root = tree.push(ClassNode::new(self.name.clone(), self.rate, self.ceil, None));
        build_children(&self.children, &mut tree, &mut leaves, root);
        Ok((tree, leaves))
    }

    fn validate(&self, is_root: bool, seen_names: &mut HashSet<String>) -> Result<(), Error> {
        if self.rate < 0.0 || self.ceil < 0.0 {
            return Err(ConfigError::NegativeRate.into());
        }
        if self.ceil < self.rate {
            return Err(ConfigError::CeilBelowRate.into());
        }
        if !seen_names.insert(self.name.clone()) {
            return Err(ConfigError::DuplicateName.into());
        }
        let is_leaf = !is_root && self.children.is_empty();
        if is_leaf && !(HIGHEST_PRIO..=LOWEST_PRIO).contains(&self.prio) {
            return Err(ConfigError::PrioOutOfRange.into());
        }
        for child in &self.children {
            child.validate(false, seen_names)?;
        }
        Ok(())
    }
}

fn build_children(
    children: &[Profile],
    tree: &mut Tree,
    leaves: &mut Vec<ShaperLeaf>,
    parent: NodeId,
) {
    for child in children {
        if child.children.is_empty() {
            let id = tree.push(ClassNode::new(
                child.name.clone(),
                child.rate,
                child.ceil,
                Some(parent),
            ));
            leaves.push(ShaperLeaf::new(id, child.name.clone(), child.prio, child.input_rate));
        } else {
            let id = tree.push(ClassNode::new(
                child.name.clone(),
                child.rate,
                child.ceil,
                Some(parent),
            ));
            build_children(&child.children, tree, leaves, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_with_no_children_is_still_an_inner_node() {
        let profile = Profile::inner("Root", 10.0, 10.0, vec![]);
        let (tree, leaves) = profile.build().unwrap();
        assert_eq!(leaves.len(), 0);
        assert_eq!(tree.iter().count(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let profile = Profile::inner(
            "Root",
            10.0,
            10.0,
            vec![
                Profile::leaf("L", 1.0, 1.0, 0, 1.0),
                Profile::leaf("L", 1.0, 1.0, 1, 1.0),
            ],
        );
        assert_eq!(
            profile.build().unwrap_err(),
            Error::Config(ConfigError::DuplicateName)
        );
    }

    #[test]
    fn ceil_below_rate_is_rejected() {
        let profile = Profile::leaf("L", 10.0, 5.0, 0, 1.0);
        assert_eq!(
            profile.build().unwrap_err(),
            Error::Config(ConfigError::CeilBelowRate)
        );
    }

    #[test]
    fn prio_out_of_range_is_rejected() {
        let profile = Profile::inner(
            "Root",
            10.0,
            10.0,
            vec![Profile::leaf("L", 1.0, 1.0, 8, 1.0)],
        );
        assert_eq!(
            profile.build().unwrap_err(),
            Error::Config(ConfigError::PrioOutOfRange)
        );
    }

    #[test]
    fn negative_rate_is_rejected() {
        let profile = Profile::leaf("L", -1.0, 0.0, 0, 1.0);
        assert_eq!(
            profile.build().unwrap_err(),
            Error::Config(ConfigError::NegativeRate)
        );
    }

    #[test]
    fn builds_leaves_in_depth_first_order_matching_topology() {
        let profile = Profile::inner(
            "Root",
            10.0,
            10.0,
            vec![
                Profile::leaf("A", 1.0, 1.0, 0, 1.0),
                Profile::inner(
                    "Mid",
                    5.0,
                    5.0,
                    vec![Profile::leaf("B", 1.0, 1.0, 0, 1.0)],
                ),
            ],
        );
        let (tree, leaves) = profile.build().unwrap();
        let names: Vec<_> = tree.iter().map(|(_, n)| n.name().to_string()).collect();
        assert_eq!(names, vec!["Root", "A", "Mid", "B"]);
        assert_eq!(leaves.len(), 2);
    }
}
