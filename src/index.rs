use crate::{
    ast::{Node, Operator, OptimizedNode, OptimizedNodeKind},
    error::RuleError,
    evaluation::ResultCache,
    events::{AttributeDefinition, AttributeTable, Event, EventBuilder},
    predicates::Predicate,
    strings::{StringId, StringTable},
};
use slab::Slab;
use std::{collections::HashMap, fmt::Debug, hash::Hash};

type NodeId = usize;
type ExpressionId = u64;

/// An index of boolean rules sharing one DAG of subexpressions.
///
/// Every registered rule is rewritten into a canonical form and interned
/// node by node: structurally equal subexpressions collapse onto a single
/// entry, no matter which rules they came from. Searching evaluates the whole
/// rule population against one event in a single pass over that DAG.
#[derive(Debug)]
pub struct RuleIndex<T> {
    nodes: Slab<Entry<T>>,
    strings: StringTable,
    attributes: AttributeTable,
    roots: Vec<NodeId>,
    max_level: usize,
    frontier: Vec<NodeId>,
    expression_to_node: HashMap<ExpressionId, NodeId>,
    subscriptions: HashMap<T, NodeId>,
}

impl<T: Eq + Hash + Clone + Debug> RuleIndex<T> {
    const DEFAULT_FRONTIER: usize = 1000;
    const DEFAULT_NODES: usize = 2000;
    const DEFAULT_ROOTS: usize = 50;

    /// Create a new [`RuleIndex`] over the given attribute schema.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rule_index::{AttributeDefinition, RuleIndex};
    ///
    /// let definitions = [
    ///     AttributeDefinition::boolean("private"),
    ///     AttributeDefinition::integer("exchange_id"),
    /// ];
    /// let result = RuleIndex::<u64>::new(&definitions);
    /// assert!(result.is_ok());
    /// ```
    ///
    /// Duplicate attribute names are rejected:
    ///
    /// ```rust
    /// use rule_index::{AttributeDefinition, RuleIndex};
    ///
    /// let definitions = [
    ///     AttributeDefinition::boolean("private"),
    ///     AttributeDefinition::boolean("private"),
    /// ];
    /// let result = RuleIndex::<u64>::new(&definitions);
    /// assert!(result.is_err());
    /// ```
    pub fn new(definitions: &[AttributeDefinition]) -> Result<Self, RuleError> {
        let attributes = AttributeTable::new(definitions).map_err(RuleError::Event)?;
        let strings = StringTable::new();
        Ok(Self {
            attributes,
            strings,
            max_level: 1,
            roots: Vec::with_capacity(Self::DEFAULT_ROOTS),
            frontier: Vec::with_capacity(Self::DEFAULT_FRONTIER),
            nodes: Slab::with_capacity(Self::DEFAULT_NODES),
            expression_to_node: HashMap::new(),
            subscriptions: HashMap::new(),
        })
    }

    /// Register a rule under the given subscription id.
    ///
    /// The expression is validated against the schema, rewritten into its
    /// canonical form and interned into the DAG; on any error the index is
    /// left untouched. Registering an id that already exists replaces its
    /// previous rule.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rule_index::{AttributeDefinition, Condition, Node, RuleIndex};
    ///
    /// let definitions = [
    ///     AttributeDefinition::boolean("private"),
    ///     AttributeDefinition::boolean("debug"),
    /// ];
    /// let mut index = RuleIndex::new(&definitions).unwrap();
    ///
    /// let rule = Node::and(
    ///     Node::value(Condition::variable("private")),
    ///     Node::not(Node::value(Condition::variable("debug"))),
    /// );
    /// assert!(index.add_rule(&1u64, &rule).is_ok());
    /// ```
    pub fn add_rule(&mut self, subscription_id: &T, expression: &Node) -> Result<(), RuleError> {
        let optimized = expression.compile(&self.attributes, &self.strings)?;
        if self.subscriptions.contains_key(subscription_id) {
            self.remove_rule(subscription_id);
        }
        self.insert_root(subscription_id, optimized);
        Ok(())
    }

    /// Remove the rule registered under the given subscription id.
    ///
    /// Entries that no other rule refers to are swept from the DAG. Unknown
    /// subscription ids are ignored.
    pub fn remove_rule(&mut self, subscription_id: &T) {
        let Some(node_id) = self.subscriptions.remove(subscription_id) else {
            return;
        };
        let entry = &mut self.nodes[node_id];
        entry.subscription_ids.retain(|id| id != subscription_id);
        entry.use_count -= 1;
        if entry.subscription_ids.is_empty() {
            self.roots.retain(|id| *id != node_id);
        }
        if self.nodes[node_id].use_count == 0 {
            self.release(node_id);
        }
        self.max_level = max_level(&self.roots, &self.nodes);
    }

    fn insert_root(&mut self, subscription_id: &T, root: OptimizedNode) {
        let OptimizedNode {
            id: expression_id,
            cost,
            kind,
        } = root;
        if let Some(&node_id) = self.expression_to_node.get(&expression_id) {
            let entry = &mut self.nodes[node_id];
            if !entry.subscription_ids.contains(subscription_id) {
                entry.subscription_ids.push(subscription_id.clone());
            }
            entry.use_count += 1;
            self.subscriptions.insert(subscription_id.clone(), node_id);
            if !self.roots.contains(&node_id) {
                self.roots.push(node_id);
            }
            // The expression may only have existed as an inner node so far,
            // in which case none of its leaves are primed yet.
            self.prime_frontier(node_id);
            self.max_level = max_level(&self.roots, &self.nodes);
            return;
        }

        let is_and = matches!(kind, OptimizedNodeKind::And(_, _));
        let node_id = match kind {
            OptimizedNodeKind::And(left, right) | OptimizedNodeKind::Or(left, right) => {
                let left_id = self.insert_node(*left);
                let right_id = self.insert_node(*right);
                let left_entry = &self.nodes[left_id];
                let right_entry = &self.nodes[right_id];
                let rnode = IndexNode::RNode(RNode {
                    level: 1 + std::cmp::max(left_entry.level(), right_entry.level()),
                    operator: if is_and { Operator::And } else { Operator::Or },
                    children: if left_entry.cost > right_entry.cost {
                        vec![right_id, left_id]
                    } else {
                        vec![left_id, right_id]
                    },
                });
                let node_id = self.allocate(
                    expression_id,
                    rnode,
                    Some(subscription_id.clone()),
                    cost,
                );
                self.nodes[left_id].node.add_parent(node_id);
                self.nodes[right_id].node.add_parent(node_id);
                node_id
            }
            OptimizedNodeKind::Value(predicate) => {
                let lnode = IndexNode::lnode(&predicate);
                self.allocate(expression_id, lnode, Some(subscription_id.clone()), cost)
            }
        };
        self.subscriptions.insert(subscription_id.clone(), node_id);
        self.roots.push(node_id);
        self.prime_frontier(node_id);
        self.max_level = max_level(&self.roots, &self.nodes);
    }

    fn insert_node(&mut self, node: OptimizedNode) -> NodeId {
        let OptimizedNode {
            id: expression_id,
            cost,
            kind,
        } = node;
        if let Some(&node_id) = self.expression_to_node.get(&expression_id) {
            demote_root(&mut self.nodes, node_id);
            self.nodes[node_id].use_count += 1;
            return node_id;
        }

        let is_and = matches!(kind, OptimizedNodeKind::And(_, _));
        match kind {
            OptimizedNodeKind::And(left, right) | OptimizedNodeKind::Or(left, right) => {
                let left_id = self.insert_node(*left);
                let right_id = self.insert_node(*right);
                let left_entry = &self.nodes[left_id];
                let right_entry = &self.nodes[right_id];
                let inode = IndexNode::INode(INode {
                    parents: vec![],
                    level: 1 + std::cmp::max(left_entry.level(), right_entry.level()),
                    operator: if is_and { Operator::And } else { Operator::Or },
                    children: if left_entry.cost > right_entry.cost {
                        vec![right_id, left_id]
                    } else {
                        vec![left_id, right_id]
                    },
                });
                let node_id = self.allocate(expression_id, inode, None, cost);
                self.nodes[left_id].node.add_parent(node_id);
                self.nodes[right_id].node.add_parent(node_id);
                node_id
            }
            OptimizedNodeKind::Value(predicate) => {
                self.allocate(expression_id, IndexNode::lnode(&predicate), None, cost)
            }
        }
    }

    fn allocate(
        &mut self,
        expression_id: ExpressionId,
        node: IndexNode,
        subscription_id: Option<T>,
        cost: u64,
    ) -> NodeId {
        let entry = Entry::new(expression_id, node, subscription_id, cost);
        let node_id = self.nodes.insert(entry);
        if self
            .expression_to_node
            .insert(expression_id, node_id)
            .is_some()
        {
            unreachable!("expression {expression_id} is already interned; this is a bug");
        }
        node_id
    }

    // Seed the predicate frontier for a root: walk down through both
    // children of every Or and only the cheapest child of every And. The
    // leaves reached this way are evaluated unconditionally at the start of
    // each search; everything else wakes up through parent links or gets
    // pulled in lazily.
    fn prime_frontier(&mut self, node_id: NodeId) {
        let (operator, first, second) = match &self.nodes[node_id].node {
            IndexNode::LNode(_) => {
                if !self.frontier.contains(&node_id) {
                    self.frontier.push(node_id);
                }
                return;
            }
            IndexNode::INode(INode {
                operator, children, ..
            })
            | IndexNode::RNode(RNode {
                operator, children, ..
            }) => (operator.clone(), children[0], children[1]),
        };
        // Children are ordered cheapest-first.
        self.prime_frontier(first);
        if matches!(operator, Operator::Or) {
            self.prime_frontier(second);
        }
    }

    // Drop an entry whose use count reached zero: unlink it from the maps and
    // the frontier, detach it from its children and cascade into any child
    // left without references. Children keep no parent pointer to the freed
    // slot, which the slab may hand out again on the next insertion.
    fn release(&mut self, node_id: NodeId) {
        let entry = self.nodes.remove(node_id);
        self.expression_to_node.remove(&entry.id);
        self.frontier.retain(|id| *id != node_id);
        let children = match entry.node {
            IndexNode::LNode(_) => return,
            IndexNode::INode(INode { children, .. }) | IndexNode::RNode(RNode { children, .. }) => {
                children
            }
        };
        for child_id in children {
            let child = &mut self.nodes[child_id];
            child.node.remove_parent(node_id);
            child.use_count -= 1;
            let remaining = child.use_count;
            if remaining == 0 {
                self.release(child_id);
            }
        }
    }

    /// Create a new [`EventBuilder`] for an [`Event`] that can be handed to
    /// [`RuleIndex::search`].
    #[inline]
    pub fn make_event(&self) -> EventBuilder {
        EventBuilder::new(&self.attributes, &self.strings)
    }

    /// Search the index for the rules that match the [`Event`].
    pub fn search<'index>(&'index self, event: &Event) -> Result<Report<'index, T>, RuleError> {
        let mut buffers = SearchBuffers::new();
        self.search_with(&mut buffers, event)
    }

    /// Search with caller-provided scratch buffers.
    ///
    /// The result cache and the per-level worklists are reset in place, so a
    /// caller matching a stream of events can reuse one [`SearchBuffers`]
    /// and keep allocations out of the hot path.
    pub fn search_with<'index>(
        &'index self,
        buffers: &mut SearchBuffers,
        event: &Event,
    ) -> Result<Report<'index, T>, RuleError> {
        buffers.reset(self.nodes.capacity(), self.max_level);
        let SearchBuffers { results, queues } = buffers;
        let mut matches = Vec::with_capacity(DEFAULT_MATCHES);

        process_frontier(
            &self.frontier,
            &self.nodes,
            event,
            &mut matches,
            results,
            queues,
        );

        for level in 0..queues.len() {
            while let Some(node_id) = queues[level].pop() {
                if results.is_evaluated(node_id) {
                    continue;
                }

                let node = &self.nodes[node_id];
                let result =
                    evaluate_node(node_id, event, node, &self.nodes, results, &mut matches);
                add_matches(result, node, &mut matches);

                if node.is_root() {
                    continue;
                }

                for &parent_id in node.parents() {
                    if results.is_evaluated(parent_id) {
                        continue;
                    }
                    let parent = &self.nodes[parent_id];
                    if matches!(parent.operator(), Operator::And) && !result.unwrap_or(true) {
                        results.set(parent_id, Some(false));
                    } else {
                        queues[parent.level() - 2].push(parent_id);
                    }
                }
            }
        }

        Ok(Report::new(matches))
    }

    /// Export the DAG to the Graphviz format.
    pub fn to_graphviz(&self) -> String {
        const DEFAULT_CAPACITY: usize = 100_000;
        let mut builder = String::with_capacity(DEFAULT_CAPACITY);
        builder.push_str("digraph {\n");
        builder.push_str("rankdir = TB;\n");
        builder.push_str(r#"node [shape = "record"];"#);
        builder.push('\n');
        let mut relations = Vec::with_capacity(DEFAULT_CAPACITY);
        let mut levels = vec![vec![]; self.max_level];
        for (id, entry) in &self.nodes {
            match &entry.node {
                IndexNode::LNode(LNode {
                    parents, predicate, ..
                }) => {
                    let node = format!(
                        r#"node_{id} [label = "{{{id} | level: {} | {predicate} | subscriptions: {:?} | l-node}}", style = "rounded"];"#,
                        entry.level(),
                        entry.subscription_ids
                    );
                    levels[entry.level() - 1].push((id, node));

                    for parent_id in parents {
                        relations.push(format!("node_{id} -> node_{parent_id};"));
                    }
                }
                IndexNode::INode(INode {
                    children,
                    parents,
                    operator,
                    ..
                }) => {
                    let node = format!(
                        r#"node_{id} [label = "{{{id} | level: {} | {operator:#?} | subscriptions: {:?} | i-node}}"];"#,
                        entry.level(),
                        entry.subscription_ids
                    );
                    levels[entry.level() - 1].push((id, node));

                    for parent_id in parents {
                        relations.push(format!("node_{id} -> node_{parent_id};"));
                    }

                    for child_id in children {
                        relations.push(format!("node_{id} -> node_{child_id};"));
                    }
                }
                IndexNode::RNode(RNode {
                    children, operator, ..
                }) => {
                    let node = format!(
                        r#"node_{id} [label = "{{{id} | level: {} | {operator:#?} | subscriptions: {:?} | r-node}}"];"#,
                        entry.level(),
                        entry.subscription_ids
                    );
                    levels[entry.level() - 1].push((id, node));

                    for child_id in children {
                        relations.push(format!("node_{id} -> node_{child_id};"));
                    }
                }
            }
        }

        builder.push_str("\n// nodes\n");
        for entries in levels.into_iter().rev() {
            for (_, node) in entries.iter() {
                builder.push_str(node);
                builder.push('\n');
            }

            builder.push_str("{rank = same; ");
            for (id, _) in entries {
                builder.push_str(&format!("node_{id}; "));
            }
            builder.push_str("};\n");
        }

        builder.push_str("\n// edges\n");
        for relation in relations {
            builder.push_str(&relation);
            builder.push('\n');
        }

        // Leaf labels print interned string ids; this legend maps them back.
        builder.push_str("\n// strings\n");
        for index in 1..=self.strings.len() {
            if let Some(value) = self.strings.lookup(StringId(index)) {
                builder.push_str(&format!("// string {index} = {value:?}\n"));
            }
        }

        builder.push('}');
        builder
    }
}

const DEFAULT_MATCHES: usize = 50;

/// Reusable scratch space for [`RuleIndex::search_with`].
#[derive(Debug, Default)]
pub struct SearchBuffers {
    results: ResultCache,
    queues: Vec<Vec<NodeId>>,
}

impl SearchBuffers {
    const DEFAULT_QUEUE_CAPACITY: usize = 50;

    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, nodes: usize, max_level: usize) {
        self.results.reset(nodes);
        for queue in &mut self.queues {
            queue.clear();
        }
        let levels = max_level.saturating_sub(1);
        if self.queues.len() < levels {
            self.queues
                .resize_with(levels, || Vec::with_capacity(Self::DEFAULT_QUEUE_CAPACITY));
        }
    }
}

#[inline]
fn demote_root<T>(nodes: &mut Slab<Entry<T>>, node_id: NodeId) {
    let entry = &mut nodes[node_id];
    if let IndexNode::RNode(RNode {
        children,
        level,
        operator,
    }) = &entry.node
    {
        let inode = IndexNode::INode(INode {
            parents: vec![],
            children: children.to_vec(),
            level: *level,
            operator: operator.clone(),
        });
        entry.node = inode;
    }
}

#[inline]
fn max_level<T>(roots: &[NodeId], nodes: &Slab<Entry<T>>) -> usize {
    roots
        .iter()
        .map(|root_id| nodes[*root_id].level())
        .max()
        .unwrap_or(1)
}

#[inline]
fn process_frontier<'a, T>(
    frontier: &[NodeId],
    nodes: &'a Slab<Entry<T>>,
    event: &Event,
    matches: &mut Vec<&'a T>,
    results: &mut ResultCache,
    queues: &mut [Vec<NodeId>],
) {
    for &leaf_id in frontier {
        if results.is_evaluated(leaf_id) {
            continue;
        }

        let node = &nodes[leaf_id];
        let result = node.evaluate(event);
        results.set(leaf_id, result);
        add_matches(result, node, matches);

        for &parent_id in node.parents() {
            if results.is_evaluated(parent_id) {
                continue;
            }
            let parent = &nodes[parent_id];
            if matches!(parent.operator(), Operator::And) && !result.unwrap_or(true) {
                results.set(parent_id, Some(false));
            } else {
                queues[parent.level() - 2].push(parent_id);
            }
        }
    }
}

#[inline]
fn evaluate_node<'a, T>(
    node_id: NodeId,
    event: &Event,
    node: &'a Entry<T>,
    nodes: &'a Slab<Entry<T>>,
    results: &mut ResultCache,
    matches: &mut Vec<&'a T>,
) -> Option<bool> {
    let result = match node.operator() {
        Operator::And => evaluate_and(node.children(), event, nodes, results, matches),
        Operator::Or => evaluate_or(node.children(), event, nodes, results, matches),
    };
    results.set(node_id, result);
    result
}

#[inline]
fn evaluate_and<'a, T>(
    children: &[NodeId],
    event: &Event,
    nodes: &'a Slab<Entry<T>>,
    results: &mut ResultCache,
    matches: &mut Vec<&'a T>,
) -> Option<bool> {
    let mut acc = Some(true);
    for &child_id in children {
        match lazy_evaluate(child_id, event, nodes, results, matches) {
            Some(false) => return Some(false),
            Some(true) => {}
            None => acc = None,
        }
    }
    acc
}

#[inline]
fn evaluate_or<'a, T>(
    children: &[NodeId],
    event: &Event,
    nodes: &'a Slab<Entry<T>>,
    results: &mut ResultCache,
    matches: &mut Vec<&'a T>,
) -> Option<bool> {
    let mut acc = Some(false);
    for &child_id in children {
        match lazy_evaluate(child_id, event, nodes, results, matches) {
            Some(true) => return Some(true),
            Some(false) => {}
            None => acc = None,
        }
    }
    acc
}

// Children usually resolve before their parents thanks to the level order;
// shared subexpressions crossing levels are the exception and get evaluated
// on demand here.
#[inline]
fn lazy_evaluate<'a, T>(
    node_id: NodeId,
    event: &Event,
    nodes: &'a Slab<Entry<T>>,
    results: &mut ResultCache,
    matches: &mut Vec<&'a T>,
) -> Option<bool> {
    if results.is_evaluated(node_id) {
        return results.get(node_id);
    }
    let node = &nodes[node_id];
    let result = if node.is_leaf() {
        let result = node.evaluate(event);
        results.set(node_id, result);
        result
    } else {
        evaluate_node(node_id, event, node, nodes, results, matches)
    };
    add_matches(result, node, matches);
    result
}

#[inline]
fn add_matches<'a, T>(result: Option<bool>, node: &'a Entry<T>, matches: &mut Vec<&'a T>) {
    if !node.subscription_ids.is_empty() {
        if let Some(true) = result {
            for subscription_id in &node.subscription_ids {
                matches.push(subscription_id);
            }
        }
    }
}

#[derive(Debug)]
struct Entry<T> {
    id: ExpressionId,
    subscription_ids: Vec<T>,
    node: IndexNode,
    use_count: usize,
    cost: u64,
}

impl<T> Entry<T> {
    fn new(
        id: ExpressionId,
        node: IndexNode,
        subscription_id: Option<T>,
        cost: u64,
    ) -> Self {
        Self {
            id,
            node,
            use_count: 1,
            subscription_ids: subscription_id
                .map_or_else(Vec::new, |subscription_id| vec![subscription_id]),
            cost,
        }
    }

    #[inline]
    const fn is_leaf(&self) -> bool {
        matches!(self.node, IndexNode::LNode(_))
    }

    #[inline]
    const fn is_root(&self) -> bool {
        matches!(self.node, IndexNode::RNode(_))
    }

    #[inline]
    const fn level(&self) -> usize {
        self.node.level()
    }

    #[inline]
    fn evaluate(&self, event: &Event) -> Option<bool> {
        self.node.evaluate(event)
    }

    #[inline]
    fn operator(&self) -> Operator {
        self.node.operator()
    }

    #[inline]
    fn children(&self) -> &[NodeId] {
        self.node.children()
    }

    #[inline]
    fn parents(&self) -> &[NodeId] {
        self.node.parents()
    }
}

#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
enum IndexNode {
    LNode(LNode),
    INode(INode),
    RNode(RNode),
}

impl IndexNode {
    #[inline]
    fn lnode(predicate: &Predicate) -> Self {
        Self::LNode(LNode {
            level: 1,
            parents: vec![],
            predicate: predicate.clone(),
        })
    }

    #[inline]
    const fn level(&self) -> usize {
        match self {
            Self::RNode(node) => node.level,
            Self::LNode(node) => node.level,
            Self::INode(node) => node.level,
        }
    }

    #[inline]
    fn evaluate(&self, event: &Event) -> Option<bool> {
        match self {
            Self::LNode(node) => node.predicate.evaluate(event),
            node => unreachable!("evaluating {node:?} which is not a predicate; this is a bug"),
        }
    }

    #[inline]
    fn operator(&self) -> Operator {
        match self {
            Self::LNode(_) => {
                unreachable!("trying to get the operator of a leaf node; this is a bug");
            }
            Self::RNode(RNode { operator, .. }) | Self::INode(INode { operator, .. }) => {
                operator.clone()
            }
        }
    }

    #[inline]
    fn children(&self) -> &[NodeId] {
        match self {
            Self::INode(INode { children, .. }) | Self::RNode(RNode { children, .. }) => children,
            Self::LNode(_) => unreachable!("cannot get children for l-node; this is a bug"),
        }
    }

    #[inline]
    fn parents(&self) -> &[NodeId] {
        match self {
            Self::INode(INode { parents, .. }) | Self::LNode(LNode { parents, .. }) => parents,
            Self::RNode(_) => unreachable!("cannot get parents for r-node; this is a bug"),
        }
    }

    #[inline]
    fn add_parent(&mut self, parent_id: NodeId) {
        match self {
            IndexNode::INode(node) => {
                node.parents.push(parent_id);
            }
            IndexNode::LNode(node) => {
                node.parents.push(parent_id);
            }
            IndexNode::RNode(node) => {
                unreachable!("trying to add a parent to r-node {node:?} which cannot have any; this is a bug");
            }
        }
    }

    #[inline]
    fn remove_parent(&mut self, parent_id: NodeId) {
        let parents = match self {
            IndexNode::INode(node) => &mut node.parents,
            IndexNode::LNode(node) => &mut node.parents,
            IndexNode::RNode(node) => {
                unreachable!("trying to unlink a parent from r-node {node:?}; this is a bug");
            }
        };
        if let Some(position) = parents.iter().position(|id| *id == parent_id) {
            parents.swap_remove(position);
        }
    }
}

#[derive(Debug)]
struct LNode {
    parents: Vec<NodeId>,
    level: usize,
    predicate: Predicate,
}

#[derive(Debug)]
struct INode {
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
    level: usize,
    operator: Operator,
}

#[derive(Debug)]
struct RNode {
    children: Vec<NodeId>,
    level: usize,
    operator: Operator,
}

/// Structure that holds the results from the [`RuleIndex::search`] function
#[derive(Debug)]
pub struct Report<'index, T> {
    matches: Vec<&'index T>,
}

impl<'index, T> Report<'index, T> {
    const fn new(matches: Vec<&'index T>) -> Self {
        Self { matches }
    }

    /// Get the matching subscription ids, in resolution order.
    #[inline]
    pub fn matches(&self) -> &[&'index T] {
        &self.matches
    }
}

#[cfg(test)]
impl<T: Eq + Hash + Clone + Debug> RuleIndex<T> {
    // Structural health check used by the tests after insert/remove sequences.
    fn assert_consistent(&self) {
        use std::collections::HashSet;

        assert_eq!(self.expression_to_node.len(), self.nodes.len());
        for (&expression_id, &node_id) in &self.expression_to_node {
            assert_eq!(expression_id, self.nodes[node_id].id);
        }

        let mut parent_edges: HashMap<NodeId, usize> = HashMap::new();
        for (node_id, entry) in &self.nodes {
            match &entry.node {
                IndexNode::LNode(node) => {
                    assert_eq!(1, node.level);
                }
                IndexNode::INode(INode {
                    children, level, ..
                })
                | IndexNode::RNode(RNode {
                    children, level, ..
                }) => {
                    assert_eq!(2, children.len());
                    let left = &self.nodes[children[0]];
                    let right = &self.nodes[children[1]];
                    assert!(left.cost <= right.cost);
                    assert_eq!(*level, 1 + left.level().max(right.level()));
                    for &child_id in children {
                        *parent_edges.entry(child_id).or_default() += 1;
                        assert!(self.nodes[child_id].parents().contains(&node_id));
                    }
                }
            }
        }
        for (node_id, edges) in parent_edges {
            assert!(self.nodes[node_id].use_count >= edges);
        }

        let mut reachable: HashSet<NodeId> = HashSet::new();
        let mut stack = self.roots.clone();
        while let Some(node_id) = stack.pop() {
            if !reachable.insert(node_id) {
                continue;
            }
            let entry = &self.nodes[node_id];
            if !entry.is_leaf() {
                stack.extend_from_slice(entry.children());
            }
        }
        assert_eq!(reachable.len(), self.nodes.len());

        for &leaf_id in &self.frontier {
            assert!(self.nodes[leaf_id].is_leaf());
        }

        for (subscription_id, &node_id) in &self.subscriptions {
            assert!(self.nodes[node_id]
                .subscription_ids
                .contains(subscription_id));
        }
    }
}
