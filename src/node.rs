//! Token-bucket accounting: [`ClassNode`] and the [`Tree`] arena that owns
//! every node in a profile and threads parent lookups through plain indices
//! instead of `Rc`/`Weak` back-references.

use std::ops::Index;

use crate::error::Error;
use crate::PKT_MAX_LEN;

/// Index of a node inside a [`Tree`]'s arena.
///
/// A newtype rather than a bare `usize` so that node handles can't be
/// confused with byte counts or priorities elsewhere in the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "borsh", derive(borsh::BorshSerialize, borsh::BorshDeserialize))]
pub struct NodeId(pub(crate) usize);

/// The three-valued readiness of a node, recomputed after every replenish
/// and every account step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    /// `tokens >= quantum`: can send against the committed rate.
    CanSend,
    /// `tokens < quantum` but `ctokens >= quantum`: can borrow from an
    /// ancestor with spare capacity.
    CanBorrow,
    /// Neither bucket holds a full quantum.
    CannotSend,
}

/// One class in the HTB tree: committed/peak token accounting shared by
/// inner (aggregating) and leaf (traffic-carrying) nodes alike.
///
/// Inner nodes are plain `ClassNode`s; leaves wrap one inside
/// [`ShaperLeaf`][crate::shaper::ShaperLeaf] together with a queue, a
/// source, and a sink. Both kinds live in the same [`Tree`] arena so that
/// `replenish`/`account_*` can walk the parent chain uniformly.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassNode {
    pub(crate) name: String,
    pub(crate) rate: f64,
    pub(crate) ceil: f64,
    pub(crate) burst: f64,
    pub(crate) cburst: f64,
    pub(crate) quantum: f64,
    pub(crate) tokens: f64,
    pub(crate) ctokens: f64,
    pub(crate) update_time: f64,
    pub(crate) state: State,
    pub(crate) parent: Option<NodeId>,
}

impl ClassNode {
    pub(crate) fn new(name: String, rate: f64, ceil: f64, parent: Option<NodeId>) -> Self {
        let burst = rate;
        let cburst = ceil;
        let quantum = (PKT_MAX_LEN as f64).max(rate / 10.0);
        ClassNode {
            name,
            rate,
            ceil,
            burst,
            cburst,
            quantum,
            tokens: burst,
            ctokens: cburst,
            update_time: 0.0,
            state: State::CanSend,
            parent,
        }
    }

    /// Stable identifier, unique within its tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Committed Information Rate, bytes/sec.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Peak Information Rate, bytes/sec.
    pub fn ceil(&self) -> f64 {
        self.ceil
    }

    /// Current readiness.
    pub fn state(&self) -> State {
        self.state
    }

    /// Parent node, or `None` at the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Current committed-bucket level, bytes.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Current peak-bucket level, bytes.
    pub fn ctokens(&self) -> f64 {
        self.ctokens
    }

    /// Committed bucket capacity, bytes.
    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Peak bucket capacity, bytes.
    pub fn cburst(&self) -> f64 {
        self.cburst
    }

    /// Minimum tokens required to be deemed sendable.
    pub fn quantum(&self) -> f64 {
        self.quantum
    }

    fn recompute_state(&mut self) {
        self.state = if self.tokens >= self.quantum {
            State::CanSend
        } else if self.ctokens >= self.quantum {
            State::CanBorrow
        } else {
            State::CannotSend
        };
    }
}

/// Owns every [`ClassNode`] in a profile's tree and implements the
/// borrowing discipline by walking parent chains through [`NodeId`]s.
///
/// A single-owner arena (rather than `Rc<RefCell<_>>` parent pointers) is
/// possible because the simulation is single-threaded and cooperative:
/// nothing outside a tick ever holds a node reference across a mutation.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tree {
    nodes: Vec<ClassNode>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Tree { nodes: Vec::new() }
    }

    pub(crate) fn push(&mut self, node: ClassNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Read-only access to a node's accounting state.
    pub fn node(&self, id: NodeId) -> &ClassNode {
        &self[id]
    }

    /// Every node in the order the builder constructed them (depth-first,
    /// root first), paired with its [`NodeId`].
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ClassNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// The chain from `id` up to (and including) the root, nearest first.
    fn ancestor_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut cur = self.nodes[id.0].parent;
        while let Some(p) = cur {
            chain.push(p);
            cur = self.nodes[p.0].parent;
        }
        chain
    }

    /// Replenish `id` and every ancestor at time `t`.
    ///
    /// The original module recurses parent-first so that an ancestor's
    /// tokens are fresh before a descendant accounts against them; walking
    /// the chain root-first here has the same effect. A second call with
    /// the same `t` is a no-op (`elapsed == 0`), which is what makes the
    /// replenish pass idempotent when several leaves share an ancestor
    /// within one tick.
    pub fn replenish(&mut self, id: NodeId, t: f64) -> Result<(), Error> {
        let mut chain = self.ancestor_chain(id);
        chain.reverse(); // root first
        for node_id in chain {
            let node = &mut self.nodes[node_id.0];
            let elapsed = t - node.update_time;
            if elapsed < 0.0 {
                return Err(Error::InvalidTime {
                    at: t,
                    update_time: node.update_time,
                });
            }
            node.tokens = node.burst.min(node.tokens + node.rate * elapsed);
            node.ctokens = node.cburst.min(node.ctokens + node.ceil * elapsed);
            node.update_time = t;
            node.recompute_state();
        }
        Ok(())
    }

    /// Strict CIR accounting: `id` and every ancestor must individually
    /// hold at least `amount` tokens in their committed bucket. All-or-
    /// nothing: if any node in the chain refuses, nothing is debited
    /// anywhere in the chain.
    pub fn account_cir(&mut self, id: NodeId, amount: f64) -> bool {
        let chain = self.ancestor_chain(id);
        if chain
            .iter()
            .any(|&n| amount > self.nodes[n.0].tokens)
        {
            return false;
        }
        for n in chain {
            let node = &mut self.nodes[n.0];
            node.tokens = (node.tokens - amount).max(0.0);
            node.ctokens = (node.ctokens - amount).max(0.0);
            node.recompute_state();
        }
        true
    }

    /// PIR accounting: `id` and every ancestor must individually hold
    /// `amount` in *either* bucket. Same all-or-nothing debiting as
    /// [`account_cir`][Self::account_cir].
    pub fn account_pir(&mut self, id: NodeId, amount: f64) -> bool {
        let chain = self.ancestor_chain(id);
        if chain
            .iter()
            .any(|&n| amount > self.nodes[n.0].tokens && amount > self.nodes[n.0].ctokens)
        {
            return false;
        }
        for n in chain {
            let node = &mut self.nodes[n.0];
            node.tokens = (node.tokens - amount).max(0.0);
            node.ctokens = (node.ctokens - amount).max(0.0);
            node.recompute_state();
        }
        true
    }

    /// `id`'s local state is `CanSend` and every ancestor is too.
    pub fn can_send(&self, id: NodeId) -> bool {
        self.ancestor_chain(id)
            .iter()
            .all(|&n| self.nodes[n.0].state == State::CanSend)
    }

    /// `id`'s local state is `CanBorrow` and its parent can either send
    /// outright or itself borrow further up the chain.
    ///
    /// Deliberately *not* "every ancestor is `CanSend` or `CanBorrow`": a
    /// node can borrow only if its immediate parent can either send
    /// outright or itself borrow further up, recursively. Flattening that
    /// into a single all-ancestors-ready check accepts chains this
    /// recursive definition rejects (a `CanBorrow` grandparent whose own
    /// parent can't send doesn't actually have anything to lend).
    pub fn can_borrow(&self, id: NodeId) -> bool {
        if self.nodes[id.0].state != State::CanBorrow {
            return false;
        }
        match self.nodes[id.0].parent {
            None => true,
            Some(parent) => self.can_send(parent) || self.can_borrow(parent),
        }
    }

    /// Whether `id` may borrow capacity from its parent right now: the
    /// parent can either send outright, or itself borrow from its own
    /// parent, recursing to the root.
    ///
    /// Mirrors the mutual recursion of `borrow()`/`borrow_from_parent()`:
    /// a node lends capacity if it can send outright, or else if it can
    /// itself borrow from further up the chain.
    pub fn borrow_from_parent(&self, id: NodeId) -> bool {
        match self.nodes[id.0].parent {
            None => false,
            Some(parent) => self.borrow(parent),
        }
    }

    fn borrow(&self, id: NodeId) -> bool {
        if self.can_send(id) {
            return true;
        }
        if self.can_borrow(id) {
            return self.borrow_from_parent(id);
        }
        false
    }
}

/// Indexing a [`Tree`] by [`NodeId`] is the arena's primary read access,
/// mirroring the teacher crate's own `Index<T>` impl over its bucket store.
impl Index<NodeId> for Tree {
    type Output = ClassNode;

    fn index(&self, id: NodeId) -> &ClassNode {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_tree() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.push(ClassNode::new("root".into(), 1000.0, 1000.0, None));
        let child = tree.push(ClassNode::new("child".into(), 100.0, 1000.0, Some(root)));
        (tree, root, child)
    }

    #[test]
    fn replenish_is_idempotent_at_same_timestamp() {
        let (mut tree, _root, child) = two_level_tree();
        assert!(tree.account_cir(child, 50.0));
        tree.replenish(child, 1.0).unwrap();
        let before = (tree.node(child).tokens(), tree.node(child).ctokens());
        tree.replenish(child, 1.0).unwrap();
        let after = (tree.node(child).tokens(), tree.node(child).ctokens());
        assert_eq!(before, after);
    }

    #[test]
    fn replenish_rejects_non_monotonic_time() {
        let (mut tree, _root, child) = two_level_tree();
        tree.replenish(child, 1.0).unwrap();
        let err = tree.replenish(child, 0.5).unwrap_err();
        assert!(matches!(err, Error::InvalidTime { .. }));
    }

    #[test]
    fn tokens_never_exceed_burst_after_replenish() {
        let (mut tree, _root, child) = two_level_tree();
        tree.replenish(child, 1000.0).unwrap();
        assert!(tree.node(child).tokens() <= tree.node(child).burst());
        assert!(tree.node(child).ctokens() <= tree.node(child).cburst());
    }

    #[test]
    fn account_cir_is_all_or_nothing_across_the_chain() {
        let mut tree = Tree::new();
        let root = tree.push(ClassNode::new("root".into(), 10.0, 10.0, None));
        let child = tree.push(ClassNode::new("child".into(), 1000.0, 1000.0, Some(root)));
        // child's own bucket can cover 500 bytes, but root's can't.
        assert!(!tree.account_cir(child, 500.0));
        // nothing was debited anywhere in the chain.
        assert_eq!(tree.node(child).tokens(), tree.node(child).burst());
        assert_eq!(tree.node(root).tokens(), tree.node(root).burst());
    }

    #[test]
    fn can_borrow_requires_ancestor_send_or_borrow_not_flattened_chain() {
        // root can_send, middle can_borrow, leaf can_borrow: leaf should be
        // able to borrow (middle can_borrow, and middle's own parent --
        // root -- can_send).
        let mut tree = Tree::new();
        let root = tree.push(ClassNode::new("root".into(), 1000.0, 1000.0, None));
        let middle = tree.push(ClassNode::new("middle".into(), 10.0, 1000.0, Some(root)));
        let leaf = tree.push(ClassNode::new("leaf".into(), 10.0, 1000.0, Some(middle)));
        // Drain middle and leaf's committed tokens below quantum but leave
        // their peak tokens high, so both sit in CanBorrow.
        tree.node_for_test(middle).tokens = 0.0;
        tree.node_for_test(middle).state = State::CanBorrow;
        tree.node_for_test(leaf).tokens = 0.0;
        tree.node_for_test(leaf).state = State::CanBorrow;
        assert!(tree.can_borrow(leaf));
        assert!(tree.borrow_from_parent(leaf));
    }

    impl Tree {
        fn node_for_test(&mut self, id: NodeId) -> &mut ClassNode {
            &mut self.nodes[id.0]
        }
    }
}
