use crate::{
    error::RuleError,
    events::AttributeTable,
    predicates::{
        ComparisonOperator, ComparisonValue, EqualityOperator, ListLiteral, ListOperator,
        NullOperator, Predicate, PredicateKind, PrimitiveLiteral, SetOperator, StableHasher,
    },
    strings::StringTable,
};
use itertools::Itertools;
use rust_decimal::Decimal;

// Expressions are rewritten and interned recursively; anything nested deeper
// than this is rejected instead of risking the stack.
const MAX_EXPRESSION_DEPTH: usize = 4096;

// Salts keep `a ∧ b` and `a ∨ b` from colliding on the same child ids.
const AND_SALT: u64 = 0x9e37_79b9_7f4a_7c15;
const OR_SALT: u64 = 0xc2b2_ae3d_27d4_eb4f;

pub type TreeNode = Box<Node>;

/// A boolean rule over the registered attributes, as handed to
/// [`crate::RuleIndex::add_rule`].
#[derive(PartialEq, Clone, Debug)]
pub enum Node {
    And(TreeNode, TreeNode),
    Or(TreeNode, TreeNode),
    Not(TreeNode),
    Value(Condition),
}

impl Node {
    pub fn and(left: Node, right: Node) -> Node {
        Node::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Node, right: Node) -> Node {
        Node::Or(Box::new(left), Box::new(right))
    }

    pub fn not(value: Node) -> Node {
        Node::Not(Box::new(value))
    }

    pub fn value(condition: Condition) -> Node {
        Node::Value(condition)
    }

    /// Resolve every condition against the schema and rewrite the tree into
    /// its canonical, `Not`-free form.
    pub(crate) fn compile(
        &self,
        attributes: &AttributeTable,
        strings: &StringTable,
    ) -> Result<OptimizedNode, RuleError> {
        self.rewrite(attributes, strings, false, 0)
    }

    // Negation is threaded downward: De Morgan's laws swap the operator on
    // the way through, and the flag lands on the leaves as predicate negation.
    fn rewrite(
        &self,
        attributes: &AttributeTable,
        strings: &StringTable,
        negate: bool,
        depth: usize,
    ) -> Result<OptimizedNode, RuleError> {
        if depth >= MAX_EXPRESSION_DEPTH {
            return Err(RuleError::InvalidExpression);
        }
        match (self, negate) {
            (Self::And(left, right), false) | (Self::Or(left, right), true) => {
                Ok(OptimizedNode::and(
                    left.rewrite(attributes, strings, negate, depth + 1)?,
                    right.rewrite(attributes, strings, negate, depth + 1)?,
                ))
            }
            (Self::Or(left, right), false) | (Self::And(left, right), true) => {
                Ok(OptimizedNode::or(
                    left.rewrite(attributes, strings, negate, depth + 1)?,
                    right.rewrite(attributes, strings, negate, depth + 1)?,
                ))
            }
            (Self::Not(value), _) => value.rewrite(attributes, strings, !negate, depth + 1),
            (Self::Value(condition), false) => {
                let predicate = condition
                    .resolve(attributes, strings)
                    .map_err(RuleError::Event)?;
                Ok(OptimizedNode::value(predicate))
            }
            (Self::Value(condition), true) => {
                let predicate = condition
                    .resolve(attributes, strings)
                    .map_err(RuleError::Event)?;
                Ok(OptimizedNode::value(!predicate))
            }
        }
    }
}

/// A single check against one named attribute.
#[derive(PartialEq, Clone, Debug)]
pub struct Condition {
    attribute: String,
    kind: ConditionKind,
}

#[derive(PartialEq, Clone, Debug)]
pub(crate) enum ConditionKind {
    Variable,
    NegatedVariable,
    Set(SetOperator, LiteralList),
    Comparison(ComparisonOperator, ComparisonValue),
    Equality(EqualityOperator, Literal),
    List(ListOperator, LiteralList),
    Null(NullOperator),
}

impl Condition {
    /// A boolean attribute used directly as a truth value.
    pub fn variable(attribute: &str) -> Self {
        Self::new(attribute, ConditionKind::Variable)
    }

    /// The complement of [`Condition::variable`].
    pub fn negated_variable(attribute: &str) -> Self {
        Self::new(attribute, ConditionKind::NegatedVariable)
    }

    /// Membership of a scalar attribute in a literal set.
    pub fn set(attribute: &str, operator: SetOperator, values: LiteralList) -> Self {
        Self::new(attribute, ConditionKind::Set(operator, values))
    }

    /// An ordering comparison against a numeric literal.
    pub fn comparison(attribute: &str, operator: ComparisonOperator, value: ComparisonValue) -> Self {
        Self::new(attribute, ConditionKind::Comparison(operator, value))
    }

    /// An equality check against a scalar literal.
    pub fn equality(attribute: &str, operator: EqualityOperator, value: Literal) -> Self {
        Self::new(attribute, ConditionKind::Equality(operator, value))
    }

    /// An overlap or containment check between a list attribute and a literal
    /// list.
    pub fn list(attribute: &str, operator: ListOperator, values: LiteralList) -> Self {
        Self::new(attribute, ConditionKind::List(operator, values))
    }

    /// A null or emptiness check.
    pub fn null(attribute: &str, operator: NullOperator) -> Self {
        Self::new(attribute, ConditionKind::Null(operator))
    }

    fn new(attribute: &str, kind: ConditionKind) -> Self {
        Self {
            attribute: attribute.to_owned(),
            kind,
        }
    }

    pub(crate) fn resolve(
        &self,
        attributes: &AttributeTable,
        strings: &StringTable,
    ) -> Result<Predicate, crate::events::EventError> {
        let kind = match &self.kind {
            ConditionKind::Variable => PredicateKind::Variable,
            ConditionKind::NegatedVariable => PredicateKind::NegatedVariable,
            ConditionKind::Set(operator, values) => {
                PredicateKind::Set(operator.clone(), values.resolve(strings))
            }
            ConditionKind::Comparison(operator, value) => {
                PredicateKind::Comparison(operator.clone(), value.clone())
            }
            ConditionKind::Equality(operator, value) => {
                PredicateKind::Equality(operator.clone(), value.resolve(strings))
            }
            ConditionKind::List(operator, values) => {
                PredicateKind::List(operator.clone(), values.resolve(strings))
            }
            ConditionKind::Null(operator) => PredicateKind::Null(operator.clone()),
        };
        Predicate::new(attributes, &self.attribute, kind)
    }
}

/// A scalar literal carried by an equality condition.
#[derive(PartialEq, Clone, Debug)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(Decimal),
    String(String),
}

impl Literal {
    fn resolve(&self, strings: &StringTable) -> PrimitiveLiteral {
        match self {
            Self::Boolean(value) => PrimitiveLiteral::Boolean(*value),
            Self::Integer(value) => PrimitiveLiteral::Integer(*value),
            Self::Float(value) => PrimitiveLiteral::Float(*value),
            Self::String(value) => PrimitiveLiteral::String(strings.intern(value)),
        }
    }
}

/// A list literal carried by set and list conditions.
#[derive(PartialEq, Clone, Debug)]
pub enum LiteralList {
    Boolean(Vec<bool>),
    Integer(Vec<i64>),
    Float(Vec<Decimal>),
    String(Vec<String>),
}

impl LiteralList {
    // Literal lists are canonicalized on resolution: sorted ascending with
    // duplicates removed, which the binary-search and merge evaluators rely
    // on. String lists sort by interned id.
    fn resolve(&self, strings: &StringTable) -> ListLiteral {
        match self {
            Self::Boolean(values) => {
                ListLiteral::BooleanList(values.iter().copied().sorted().dedup().collect())
            }
            Self::Integer(values) => {
                ListLiteral::IntegerList(values.iter().copied().sorted().dedup().collect())
            }
            Self::Float(values) => {
                ListLiteral::FloatList(values.iter().copied().sorted().dedup().collect())
            }
            Self::String(values) => ListLiteral::StringList(
                values
                    .iter()
                    .map(|value| strings.intern(value))
                    .sorted()
                    .dedup()
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Hash, Clone, Eq, PartialEq)]
pub(crate) enum Operator {
    And,
    Or,
}

/// The canonical, `Not`-free form of an expression.
///
/// Operands of a binary node are ordered by (cost, id), so two expressions
/// that differ only in operand order or in where their negations sit collapse
/// to the same structure and the same id.
#[derive(PartialEq, Clone, Debug)]
pub(crate) struct OptimizedNode {
    pub(crate) id: u64,
    pub(crate) cost: u64,
    pub(crate) kind: OptimizedNodeKind,
}

#[derive(PartialEq, Clone, Debug)]
pub(crate) enum OptimizedNodeKind {
    And(Box<OptimizedNode>, Box<OptimizedNode>),
    Or(Box<OptimizedNode>, Box<OptimizedNode>),
    Value(Predicate),
}

impl OptimizedNode {
    // And nodes short-circuit more often than Or nodes, so they carry a
    // slightly smaller combination overhead.
    const AND_COST: u64 = 50;
    const OR_COST: u64 = 60;

    pub(crate) fn and(left: OptimizedNode, right: OptimizedNode) -> Self {
        Self::binary(Operator::And, left, right)
    }

    pub(crate) fn or(left: OptimizedNode, right: OptimizedNode) -> Self {
        Self::binary(Operator::Or, left, right)
    }

    pub(crate) fn value(predicate: Predicate) -> Self {
        Self {
            id: predicate.id(),
            cost: predicate.cost(),
            kind: OptimizedNodeKind::Value(predicate),
        }
    }

    fn binary(operator: Operator, left: OptimizedNode, right: OptimizedNode) -> Self {
        let (left, right) = if (right.cost, right.id) < (left.cost, left.id) {
            (right, left)
        } else {
            (left, right)
        };
        let (salt, overhead) = match operator {
            Operator::And => (AND_SALT, Self::AND_COST),
            Operator::Or => (OR_SALT, Self::OR_COST),
        };
        let mut hasher = StableHasher::new();
        hasher.write_u64(salt);
        hasher.write_u64(left.id);
        hasher.write_u64(right.id);
        let id = hasher.finish();
        let cost = left.cost + right.cost + overhead;
        let kind = match operator {
            Operator::And => OptimizedNodeKind::And(Box::new(left), Box::new(right)),
            Operator::Or => OptimizedNodeKind::Or(Box::new(left), Box::new(right)),
        };
        Self { id, cost, kind }
    }
}
