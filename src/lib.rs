//! A boolean expression matching engine built on the [A-Tree: A Dynamic Data
//! Structure for Efficiently Indexing Arbitrary Boolean
//! Expressions](https://dl.acm.org/doi/10.1145/3448016.3457266) design:
//! subscribers register boolean rules over a fixed attribute schema, and a
//! search evaluates the whole rule population against one event in a single
//! pass over a shared DAG.
//!
//! # Examples
//!
//! Registering rules and searching for the ones that match an event:
//!
//! ```
//! use rule_index::{
//!     AttributeDefinition, Condition, ListOperator, LiteralList, Node, RuleIndex,
//! };
//!
//! // Create the index over a fixed schema
//! let mut index = RuleIndex::new(&[
//!     AttributeDefinition::string_list("deal_ids"),
//!     AttributeDefinition::integer("exchange_id"),
//!     AttributeDefinition::boolean("debug"),
//!     AttributeDefinition::integer_list("segment_ids"),
//! ])
//! .unwrap();
//!
//! // Register the rules
//! let deal_rule = Node::value(Condition::list(
//!     "deal_ids",
//!     ListOperator::OneOf,
//!     LiteralList::String(vec!["deal-1".to_string(), "deal-2".to_string()]),
//! ));
//! let segment_rule = Node::and(
//!     Node::value(Condition::list(
//!         "segment_ids",
//!         ListOperator::OneOf,
//!         LiteralList::Integer(vec![1, 2, 3, 4]),
//!     )),
//!     Node::not(Node::value(Condition::variable("debug"))),
//! );
//! index.add_rule(&1u64, &deal_rule).unwrap();
//! index.add_rule(&2u64, &segment_rule).unwrap();
//!
//! // Create an event
//! let event = index
//!     .make_event()
//!     .with_string_list("deal_ids", &["deal-2"])
//!     .unwrap()
//!     .with_integer_list("segment_ids", &[1, 2])
//!     .unwrap()
//!     .with_boolean("debug", false)
//!     .unwrap()
//!     .build();
//!
//! // Collect the subscriptions whose rules match
//! let report = index.search(&event).unwrap();
//! let mut matches: Vec<u64> = report.matches().iter().map(|id| **id).collect();
//! matches.sort();
//! assert_eq!(vec![1, 2], matches);
//! ```
//!
//! # Rules
//!
//! Rules are ordinary expression trees built out of [`Node::and`],
//! [`Node::or`], [`Node::not`] and [`Node::value`]; the leaves are
//! [`Condition`]s over named attributes:
//!
//! * Boolean variables and their negations;
//! * Comparisons (`<`, `<=`, `>`, `>=`) over integers and floats;
//! * Equalities (`=`, `<>`) over booleans, integers, floats and strings;
//! * Null checks (`is null`, `is not null`) over any attribute and emptiness
//!   checks (`is empty`, `is not empty`) over lists;
//! * Set membership (`in`, `not in`) of a scalar in a literal list;
//! * List operations (`one of`, `none of`, `all of`) between a list
//!   attribute and a literal list.
//!
//! An attribute an event does not carry evaluates as undefined: predicates
//! over it resolve to neither true nor false, and the uncertainty propagates
//! through the boolean operators, so a rule never matches on missing data
//! (null checks excepted, since they test exactly that).
//!
//! # What the index does to stay fast
//!
//! * Negations are eliminated up front by pushing them down to the leaves
//!   with De Morgan's laws, so only `and`/`or` nodes reach the DAG;
//! * Commutative operands are put into a canonical order and every
//!   subexpression gets a content-derived id, so structurally equivalent
//!   subexpressions — across all registered rules — collapse onto one shared
//!   node that is evaluated once per event;
//! * Strings are interned once and compared as integers from then on;
//! * Literal lists are sorted and deduplicated so membership checks are a
//!   binary search or a single merge pass;
//! * Operands are ordered cheapest-first and conjunctions are gated on their
//!   cheapest leaf: if that leaf comes out false the rest of the conjunction
//!   is never evaluated;
//! * Search walks the DAG level by level, evaluating leaves first and waking
//!   parents only when one of their watched children resolved, with lazy
//!   evaluation filling in whatever the level order could not.
mod ast;
mod error;
mod evaluation;
mod events;
mod index;
mod predicates;
mod strings;
#[cfg(test)]
mod test_utils;

pub use crate::{
    ast::{Condition, Literal, LiteralList, Node, TreeNode},
    error::RuleError,
    events::{AttributeDefinition, Event, EventBuilder, EventError},
    index::{Report, RuleIndex, SearchBuffers},
    predicates::{
        ComparisonOperator, ComparisonValue, EqualityOperator, ListOperator, NullOperator,
        SetOperator,
    },
};
