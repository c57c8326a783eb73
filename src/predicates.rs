use crate::{
    events::{AttributeId, AttributeKind, AttributeTable, AttributeValue, Event, EventError},
    strings::StringId,
};
use rust_decimal::Decimal;
use std::{
    fmt::{Display, Formatter},
    ops::Not,
};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over canonicalized payload bytes.
///
/// Predicate and expression ids must be identical across processes and runs,
/// so hashing goes through this fixed hasher rather than the randomized
/// `DefaultHasher`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StableHasher(u64);

impl StableHasher {
    pub(crate) fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    pub(crate) fn write_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    pub(crate) fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct Predicate {
    attribute: AttributeId,
    kind: PredicateKind,
}

impl Predicate {
    pub fn new(
        attributes: &AttributeTable,
        name: &str,
        kind: PredicateKind,
    ) -> Result<Self, EventError> {
        attributes
            .by_name(name)
            .ok_or_else(|| EventError::UnknownAttribute(name.to_string()))
            .and_then(|id| {
                validate_predicate(name, &kind, &attributes.by_id(id))?;
                Ok(Predicate {
                    attribute: id,
                    kind,
                })
            })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        let mut hasher = StableHasher::new();
        hasher.write_u64(self.attribute.0 as u64);
        self.kind.hash_into(&mut hasher);
        hasher.finish()
    }

    #[inline]
    pub fn cost(&self) -> u64 {
        self.kind.cost()
    }

    pub fn evaluate(&self, event: &Event) -> Option<bool> {
        let value = &event[self.attribute];
        match (&self.kind, value) {
            (PredicateKind::Null(operator), value) => operator.evaluate(value),
            (_, AttributeValue::Undefined) => None,
            (PredicateKind::Variable, AttributeValue::Boolean(value)) => Some(*value),
            (PredicateKind::NegatedVariable, AttributeValue::Boolean(value)) => Some(!*value),
            (PredicateKind::Set(operator, haystack), needle) => {
                Some(operator.evaluate(haystack, needle))
            }
            (PredicateKind::Comparison(operator, literal), value) => {
                Some(operator.evaluate(literal, value))
            }
            (PredicateKind::Equality(operator, literal), value) => {
                Some(operator.evaluate(literal, value))
            }
            (PredicateKind::List(operator, probe), value) => Some(operator.evaluate(probe, value)),
            (kind, value) => {
                unreachable!("evaluating {kind:?} against {value:?}; this is a bug");
            }
        }
    }
}

impl Not for Predicate {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self {
            attribute: self.attribute,
            kind: !self.kind,
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "⟨{}, {}⟩", self.attribute, self.kind)
    }
}

fn validate_predicate(
    name: &str,
    kind: &PredicateKind,
    attribute_kind: &AttributeKind,
) -> Result<(), EventError> {
    match (&kind, attribute_kind) {
        (PredicateKind::Set(_, ListLiteral::StringList(_)), AttributeKind::String) => Ok(()),
        (PredicateKind::Set(_, ListLiteral::IntegerList(_)), AttributeKind::Integer) => Ok(()),

        (PredicateKind::Comparison(_, ComparisonValue::Integer(_)), AttributeKind::Integer) => {
            Ok(())
        }
        (PredicateKind::Comparison(_, ComparisonValue::Float(_)), AttributeKind::Float) => Ok(()),

        (PredicateKind::Equality(_, PrimitiveLiteral::Boolean(_)), AttributeKind::Boolean) => {
            Ok(())
        }
        (PredicateKind::Equality(_, PrimitiveLiteral::Integer(_)), AttributeKind::Integer) => {
            Ok(())
        }
        (PredicateKind::Equality(_, PrimitiveLiteral::Float(_)), AttributeKind::Float) => Ok(()),
        (PredicateKind::Equality(_, PrimitiveLiteral::String(_)), AttributeKind::String) => Ok(()),

        (PredicateKind::List(_, ListLiteral::BooleanList(_)), AttributeKind::BooleanList) => Ok(()),
        (PredicateKind::List(_, ListLiteral::IntegerList(_)), AttributeKind::IntegerList) => Ok(()),
        (PredicateKind::List(_, ListLiteral::FloatList(_)), AttributeKind::FloatList) => Ok(()),
        (PredicateKind::List(_, ListLiteral::StringList(_)), AttributeKind::StringList) => Ok(()),

        (PredicateKind::Variable, AttributeKind::Boolean) => Ok(()),
        (PredicateKind::NegatedVariable, AttributeKind::Boolean) => Ok(()),

        // Null checks apply to every attribute kind; emptiness checks only to lists.
        (PredicateKind::Null(NullOperator::IsNull), _) => Ok(()),
        (PredicateKind::Null(NullOperator::IsNotNull), _) => Ok(()),
        (
            PredicateKind::Null(NullOperator::IsEmpty | NullOperator::IsNotEmpty),
            AttributeKind::BooleanList
            | AttributeKind::IntegerList
            | AttributeKind::FloatList
            | AttributeKind::StringList,
        ) => Ok(()),

        (actual, expected) => Err(EventError::SchemaMismatch {
            name: name.to_string(),
            expected: expected.clone(),
            actual: (*actual).clone(),
        }),
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum PredicateKind {
    Variable,
    NegatedVariable,
    Set(SetOperator, ListLiteral),
    Comparison(ComparisonOperator, ComparisonValue),
    Equality(EqualityOperator, PrimitiveLiteral),
    List(ListOperator, ListLiteral),
    Null(NullOperator),
}

impl PredicateKind {
    const CONSTANT_COST: u64 = 0;
    const LOGARITHMIC_COST: u64 = 1;
    const LIST_COST: u64 = 2;

    #[inline]
    pub fn cost(&self) -> u64 {
        match self {
            Self::NegatedVariable
            | Self::Variable
            | Self::Null(_)
            | Self::Comparison(_, _)
            | Self::Equality(_, _) => Self::CONSTANT_COST,
            Self::Set(_, haystack) => Self::LOGARITHMIC_COST * (haystack.len() as u64),
            Self::List(_, probe) => Self::LIST_COST * (probe.len() as u64),
        }
    }

    fn hash_into(&self, hasher: &mut StableHasher) {
        match self {
            Self::Variable => hasher.write(&[1]),
            Self::NegatedVariable => hasher.write(&[2]),
            Self::Set(operator, haystack) => {
                hasher.write(&[3, operator.tag()]);
                haystack.hash_into(hasher);
            }
            Self::Comparison(operator, value) => {
                hasher.write(&[4, operator.tag()]);
                value.hash_into(hasher);
            }
            Self::Equality(operator, literal) => {
                hasher.write(&[5, operator.tag()]);
                literal.hash_into(hasher);
            }
            Self::List(operator, probe) => {
                hasher.write(&[6, operator.tag()]);
                probe.hash_into(hasher);
            }
            Self::Null(operator) => hasher.write(&[7, operator.tag()]),
        }
    }
}

impl Not for PredicateKind {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Set(SetOperator::In, value) => Self::Set(SetOperator::NotIn, value),
            Self::Set(SetOperator::NotIn, value) => Self::Set(SetOperator::In, value),
            Self::Comparison(ComparisonOperator::LessThan, value) => {
                Self::Comparison(ComparisonOperator::GreaterThanEqual, value)
            }
            Self::Comparison(ComparisonOperator::LessThanEqual, value) => {
                Self::Comparison(ComparisonOperator::GreaterThan, value)
            }
            Self::Comparison(ComparisonOperator::GreaterThan, value) => {
                Self::Comparison(ComparisonOperator::LessThanEqual, value)
            }
            Self::Comparison(ComparisonOperator::GreaterThanEqual, value) => {
                Self::Comparison(ComparisonOperator::LessThan, value)
            }
            Self::Null(NullOperator::IsNull) => Self::Null(NullOperator::IsNotNull),
            Self::Null(NullOperator::IsNotNull) => Self::Null(NullOperator::IsNull),
            Self::Null(NullOperator::IsEmpty) => Self::Null(NullOperator::IsNotEmpty),
            Self::Null(NullOperator::IsNotEmpty) => Self::Null(NullOperator::IsEmpty),
            Self::Equality(EqualityOperator::Equal, value) => {
                Self::Equality(EqualityOperator::NotEqual, value)
            }
            Self::Equality(EqualityOperator::NotEqual, value) => {
                Self::Equality(EqualityOperator::Equal, value)
            }
            Self::List(ListOperator::OneOf, value) => Self::List(ListOperator::NoneOf, value),
            Self::List(ListOperator::NoneOf, value) => Self::List(ListOperator::OneOf, value),
            Self::List(ListOperator::AllOf, value) => Self::List(ListOperator::NotAllOf, value),
            Self::List(ListOperator::NotAllOf, value) => Self::List(ListOperator::AllOf, value),
            Self::Variable => Self::NegatedVariable,
            Self::NegatedVariable => Self::Variable,
        }
    }
}

impl Display for PredicateKind {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Variable => write!(formatter, "id, variable"),
            Self::NegatedVariable => write!(formatter, "not, variable"),
            Self::Set(operator, values) => write!(formatter, "{operator}, {values}"),
            Self::Comparison(operator, values) => write!(formatter, "{operator}, {values}"),
            Self::List(operator, values) => write!(formatter, "{operator}, {values}"),
            Self::Null(operator) => write!(formatter, "{operator}, variable"),
            Self::Equality(operator, values) => write!(formatter, "{operator}, {values}"),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum SetOperator {
    NotIn,
    In,
}

impl SetOperator {
    fn evaluate(&self, haystack: &ListLiteral, needle: &AttributeValue) -> bool {
        match (haystack, needle) {
            (ListLiteral::StringList(haystack), AttributeValue::String(needle)) => {
                self.apply(haystack, needle)
            }
            (ListLiteral::IntegerList(haystack), AttributeValue::Integer(needle)) => {
                self.apply(haystack, needle)
            }
            (a, b) => {
                unreachable!("set operation ({self:?}) in haystack {a:?} for {b:?} should never happen; this is a bug")
            }
        }
    }

    fn apply<T: Ord>(&self, haystack: &[T], needle: &T) -> bool {
        match self {
            Self::In => haystack.binary_search(needle).is_ok(),
            Self::NotIn => haystack.binary_search(needle).is_err(),
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::In => 1,
            Self::NotIn => 2,
        }
    }
}

impl Display for SetOperator {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::In => write!(formatter, "in"),
            Self::NotIn => write!(formatter, "not in"),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum ComparisonOperator {
    LessThan,
    LessThanEqual,
    GreaterThanEqual,
    GreaterThan,
}

impl ComparisonOperator {
    fn evaluate(&self, literal: &ComparisonValue, value: &AttributeValue) -> bool {
        match (literal, value) {
            (ComparisonValue::Float(literal), AttributeValue::Float(value)) => {
                self.apply(value, literal)
            }
            (ComparisonValue::Integer(literal), AttributeValue::Integer(value)) => {
                self.apply(value, literal)
            }
            (a, b) => {
                unreachable!(
                    "comparison ({self:?}) between {a:?} and {b:?} should never happen; this is a bug"
                )
            }
        }
    }

    fn apply<T: PartialOrd>(&self, value: &T, literal: &T) -> bool {
        match self {
            Self::LessThan => *value < *literal,
            Self::LessThanEqual => *value <= *literal,
            Self::GreaterThan => *value > *literal,
            Self::GreaterThanEqual => *value >= *literal,
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::LessThan => 1,
            Self::LessThanEqual => 2,
            Self::GreaterThan => 3,
            Self::GreaterThanEqual => 4,
        }
    }
}

impl Display for ComparisonOperator {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::GreaterThanEqual => write!(formatter, ">="),
            Self::GreaterThan => write!(formatter, ">"),
            Self::LessThan => write!(formatter, "<"),
            Self::LessThanEqual => write!(formatter, "<="),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum ComparisonValue {
    Integer(i64),
    Float(Decimal),
}

impl ComparisonValue {
    fn hash_into(&self, hasher: &mut StableHasher) {
        match self {
            Self::Integer(value) => {
                hasher.write(&[2]);
                hasher.write(&value.to_le_bytes());
            }
            Self::Float(value) => {
                hasher.write(&[3]);
                hasher.write(&value.normalize().serialize());
            }
        }
    }
}

impl Display for ComparisonValue {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum EqualityOperator {
    Equal,
    NotEqual,
}

impl EqualityOperator {
    fn evaluate(&self, literal: &PrimitiveLiteral, value: &AttributeValue) -> bool {
        match (literal, value) {
            (PrimitiveLiteral::Boolean(a), AttributeValue::Boolean(b)) => self.apply(a, b),
            (PrimitiveLiteral::Float(a), AttributeValue::Float(b)) => self.apply(a, b),
            (PrimitiveLiteral::Integer(a), AttributeValue::Integer(b)) => self.apply(a, b),
            (PrimitiveLiteral::String(a), AttributeValue::String(b)) => self.apply(a, b),
            (a, b) => {
                unreachable!(
                    "equality ({self:?}) between {a:?} and {b:?} should never happen; this is a bug"
                )
            }
        }
    }

    fn apply<T: PartialEq>(&self, a: &T, b: &T) -> bool {
        match self {
            Self::Equal => *a == *b,
            Self::NotEqual => *a != *b,
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::Equal => 1,
            Self::NotEqual => 2,
        }
    }
}

impl Display for EqualityOperator {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Equal => write!(formatter, "="),
            Self::NotEqual => write!(formatter, "<>"),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum ListOperator {
    OneOf,
    NoneOf,
    AllOf,
    // Only reachable through negation; kept to make the rewrite closed under
    // De Morgan's laws, like the `not in` form of the set operator.
    NotAllOf,
}

impl ListOperator {
    fn evaluate(&self, probe: &ListLiteral, value: &AttributeValue) -> bool {
        match (probe, value) {
            (ListLiteral::BooleanList(probe), AttributeValue::BooleanList(values)) => {
                self.apply(values, probe)
            }
            (ListLiteral::IntegerList(probe), AttributeValue::IntegerList(values)) => {
                self.apply(values, probe)
            }
            (ListLiteral::FloatList(probe), AttributeValue::FloatList(values)) => {
                self.apply(values, probe)
            }
            (ListLiteral::StringList(probe), AttributeValue::StringList(values)) => {
                self.apply(values, probe)
            }
            (a, b) => {
                unreachable!("list operation ({self:?}) between {a:?} and {b:?} should never happen; this is a bug")
            }
        }
    }

    // `all of` asks whether the whole probe list is contained in the event's
    // values; `one of` only needs a non-empty intersection.
    fn apply<T: Ord>(&self, values: &[T], probe: &[T]) -> bool {
        match self {
            Self::OneOf => one_of(values, probe),
            Self::NoneOf => none_of(values, probe),
            Self::AllOf => all_of(probe, values),
            Self::NotAllOf => not_all_of(probe, values),
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::OneOf => 1,
            Self::NoneOf => 2,
            Self::AllOf => 3,
            Self::NotAllOf => 4,
        }
    }
}

impl Display for ListOperator {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::AllOf => write!(formatter, "all of"),
            Self::OneOf => write!(formatter, "one of"),
            Self::NoneOf => write!(formatter, "none of"),
            Self::NotAllOf => write!(formatter, "not all of"),
        }
    }
}

#[inline]
fn none_of<T: Ord>(left: &[T], right: &[T]) -> bool {
    !one_of(left, right)
}

// Both sides are sorted, so intersection is a single merge pass.
fn one_of<T: Ord>(left: &[T], right: &[T]) -> bool {
    use std::cmp::Ordering;

    if left.is_empty() || right.is_empty() {
        return false;
    }

    let mut i = 0usize;
    let mut j = 0usize;
    while j < left.len() && i < right.len() {
        let x = &left[j];
        let y = &right[i];
        match y.cmp(x) {
            Ordering::Less => {
                i += 1;
            }
            Ordering::Equal => {
                return true;
            }
            Ordering::Greater => {
                j += 1;
            }
        }
    }

    false
}

#[inline]
fn not_all_of<T: Ord>(left: &[T], right: &[T]) -> bool {
    !all_of(left, right)
}

// Subset check over two sorted lists; the empty probe is a subset of anything.
fn all_of<T: Ord>(left: &[T], right: &[T]) -> bool {
    use std::cmp::Ordering;

    if left.len() > right.len() {
        return false;
    }

    let mut i = 0usize;
    let mut j = 0usize;
    while j < left.len() && i < right.len() {
        let x = &left[j];
        let y = &right[i];
        match y.cmp(x) {
            Ordering::Less => {
                i += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Greater => {
                break;
            }
        }
    }

    j >= left.len()
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum NullOperator {
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

impl NullOperator {
    // Null checks inspect the raw value, so they resolve even for undefined
    // attributes; emptiness checks stay undefined when the list itself is.
    fn evaluate(&self, value: &AttributeValue) -> Option<bool> {
        match self {
            Self::IsNull => Some(matches!(value, AttributeValue::Undefined)),
            Self::IsNotNull => Some(!matches!(value, AttributeValue::Undefined)),
            Self::IsEmpty | Self::IsNotEmpty => {
                let empty = match value {
                    AttributeValue::BooleanList(list) => list.is_empty(),
                    AttributeValue::IntegerList(list) => list.is_empty(),
                    AttributeValue::FloatList(list) => list.is_empty(),
                    AttributeValue::StringList(list) => list.is_empty(),
                    AttributeValue::Undefined => return None,
                    value => {
                        unreachable!(
                            "emptiness check ({self:?}) for {value:?} should never happen; this is a bug"
                        )
                    }
                };
                Some(if matches!(self, Self::IsEmpty) {
                    empty
                } else {
                    !empty
                })
            }
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::IsNull => 1,
            Self::IsNotNull => 2,
            Self::IsEmpty => 3,
            Self::IsNotEmpty => 4,
        }
    }
}

impl Display for NullOperator {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::IsNull => write!(formatter, "is null"),
            Self::IsNotNull => write!(formatter, "is not null"),
            Self::IsEmpty => write!(formatter, "is empty"),
            Self::IsNotEmpty => write!(formatter, "is not empty"),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum ListLiteral {
    BooleanList(Vec<bool>),
    IntegerList(Vec<i64>),
    FloatList(Vec<Decimal>),
    StringList(Vec<StringId>),
}

impl ListLiteral {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::BooleanList(values) => values.len(),
            Self::IntegerList(values) => values.len(),
            Self::FloatList(values) => values.len(),
            Self::StringList(values) => values.len(),
        }
    }

    fn hash_into(&self, hasher: &mut StableHasher) {
        match self {
            Self::BooleanList(values) => {
                hasher.write(&[1]);
                hasher.write_u64(values.len() as u64);
                for value in values {
                    hasher.write(&[u8::from(*value)]);
                }
            }
            Self::IntegerList(values) => {
                hasher.write(&[2]);
                hasher.write_u64(values.len() as u64);
                for value in values {
                    hasher.write(&value.to_le_bytes());
                }
            }
            Self::FloatList(values) => {
                hasher.write(&[3]);
                hasher.write_u64(values.len() as u64);
                for value in values {
                    hasher.write(&value.normalize().serialize());
                }
            }
            Self::StringList(values) => {
                hasher.write(&[4]);
                hasher.write_u64(values.len() as u64);
                for value in values {
                    hasher.write_u64(value.0 as u64);
                }
            }
        }
    }
}

impl Display for ListLiteral {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::BooleanList(values) => write!(formatter, "{values:?}"),
            Self::IntegerList(values) => write!(formatter, "{values:?}"),
            Self::FloatList(values) => write!(formatter, "{values:?}"),
            Self::StringList(values) => write!(formatter, "{values:?}"),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum PrimitiveLiteral {
    Boolean(bool),
    Integer(i64),
    Float(Decimal),
    String(StringId),
}

impl PrimitiveLiteral {
    fn hash_into(&self, hasher: &mut StableHasher) {
        match self {
            Self::Boolean(value) => hasher.write(&[1, u8::from(*value)]),
            Self::Integer(value) => {
                hasher.write(&[2]);
                hasher.write(&value.to_le_bytes());
            }
            Self::Float(value) => {
                hasher.write(&[3]);
                hasher.write(&value.normalize().serialize());
            }
            Self::String(value) => {
                hasher.write(&[4]);
                hasher.write_u64(value.0 as u64);
            }
        }
    }
}

impl Display for PrimitiveLiteral {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Boolean(values) => write!(formatter, "{values}"),
            Self::Integer(values) => write!(formatter, "{values}"),
            Self::Float(values) => write!(formatter, "{values}"),
            Self::String(values) => write!(formatter, "{values:?}"),
        }
    }
}
