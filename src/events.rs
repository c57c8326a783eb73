use crate::{
    predicates::PredicateKind,
    strings::{StringId, StringTable},
};
use itertools::Itertools;
use rust_decimal::Decimal;
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    ops::Index,
};
use thiserror::Error;

#[derive(Error, PartialEq, Debug)]
pub enum EventError {
    #[error("attribute {0} has already been defined")]
    DuplicateAttribute(String),
    #[error("expression refers to non-existing attribute {0:?}")]
    UnknownAttribute(String),
    #[error("{name:?}: wrong value type => expected: {expected:?}, found: {actual:?}")]
    WrongType {
        name: String,
        expected: AttributeKind,
        actual: AttributeKind,
    },
    #[error("{name:?}: mismatching types => expected: {expected:?}, found: {actual:?}")]
    SchemaMismatch {
        name: String,
        expected: AttributeKind,
        actual: PredicateKind,
    },
}

/// An [`Event`] builder
///
/// Attributes start out `undefined` and stay that way unless a setter assigns
/// them. Setters consume the builder and hand it back so calls can be chained.
#[derive(Debug)]
pub struct EventBuilder<'index> {
    by_ids: Vec<AttributeValue>,
    attributes: &'index AttributeTable,
    strings: &'index StringTable,
}

impl<'index> EventBuilder<'index> {
    pub(crate) fn new(attributes: &'index AttributeTable, strings: &'index StringTable) -> Self {
        Self {
            attributes,
            strings,
            by_ids: vec![AttributeValue::Undefined; attributes.len()],
        }
    }

    /// Build the corresponding [`Event`].
    ///
    /// Attributes that were never assigned stay `undefined`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rule_index::{AttributeDefinition, RuleIndex};
    ///
    /// let definitions = [
    ///     AttributeDefinition::boolean("private"),
    ///     AttributeDefinition::integer("exchange_id"),
    ///     AttributeDefinition::string_list("deal_ids"),
    /// ];
    /// let index = RuleIndex::<u64>::new(&definitions).unwrap();
    ///
    /// // `deal_ids` is never set, so the event reports it as undefined
    /// let event = index
    ///     .make_event()
    ///     .with_integer("exchange_id", 1)
    ///     .unwrap()
    ///     .with_boolean("private", false)
    ///     .unwrap()
    ///     .build();
    /// ```
    pub fn build(self) -> Event {
        Event(self.by_ids)
    }

    /// Set the specified boolean attribute.
    pub fn with_boolean(self, name: &str, value: bool) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::Boolean, |_| {
            AttributeValue::Boolean(value)
        })
    }

    /// Set the specified integer attribute.
    pub fn with_integer(self, name: &str, value: i64) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::Integer, |_| {
            AttributeValue::Integer(value)
        })
    }

    /// Set the specified float attribute.
    pub fn with_float(self, name: &str, value: Decimal) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::Float, |_| AttributeValue::Float(value))
    }

    /// Set the specified string attribute.
    ///
    /// A string that appears in no registered rule maps to a sentinel id, so
    /// it can only ever fail equality and membership checks.
    pub fn with_string(self, name: &str, value: &str) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::String, |strings| {
            AttributeValue::String(strings.get(value))
        })
    }

    /// Set the specified list of booleans attribute.
    pub fn with_boolean_list(self, name: &str, values: &[bool]) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::BooleanList, |_| {
            let values = values.iter().copied().sorted().dedup().collect_vec();
            AttributeValue::BooleanList(values)
        })
    }

    /// Set the specified list of integers attribute.
    pub fn with_integer_list(self, name: &str, values: &[i64]) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::IntegerList, |_| {
            let values = values.iter().copied().sorted().dedup().collect_vec();
            AttributeValue::IntegerList(values)
        })
    }

    /// Set the specified list of floats attribute.
    pub fn with_float_list(self, name: &str, values: &[Decimal]) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::FloatList, |_| {
            let values = values.iter().copied().sorted().dedup().collect_vec();
            AttributeValue::FloatList(values)
        })
    }

    /// Set the specified list of strings attribute.
    pub fn with_string_list(self, name: &str, values: &[&str]) -> Result<Self, EventError> {
        self.add_value(name, AttributeKind::StringList, |strings| {
            let values = values
                .iter()
                .map(|value| strings.get(value))
                .sorted()
                .dedup()
                .collect_vec();
            AttributeValue::StringList(values)
        })
    }

    /// Set the specified attribute back to `undefined`.
    pub fn with_undefined(mut self, name: &str) -> Result<Self, EventError> {
        let index = self
            .attributes
            .by_name(name)
            .ok_or_else(|| EventError::UnknownAttribute(name.to_string()))?;
        self.by_ids[index.0] = AttributeValue::Undefined;
        Ok(self)
    }

    fn add_value<F>(mut self, name: &str, actual: AttributeKind, f: F) -> Result<Self, EventError>
    where
        F: FnOnce(&StringTable) -> AttributeValue,
    {
        let index = self
            .attributes
            .by_name(name)
            .ok_or_else(|| EventError::UnknownAttribute(name.to_string()))?;
        let expected = self.attributes.by_id(index);
        if expected != actual {
            return Err(EventError::WrongType {
                name: name.to_owned(),
                expected,
                actual,
            });
        }
        self.by_ids[index.0] = f(self.strings);
        Ok(self)
    }
}

/// An event that can be matched against the registered rules
#[derive(Clone, Debug)]
pub struct Event(Vec<AttributeValue>);

impl Index<AttributeId> for Event {
    type Output = AttributeValue;

    #[inline]
    fn index(&self, index: AttributeId) -> &Self::Output {
        &self.0[index.0]
    }
}

#[derive(Clone, Debug)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Float(Decimal),
    String(StringId),
    BooleanList(Vec<bool>),
    IntegerList(Vec<i64>),
    FloatList(Vec<Decimal>),
    StringList(Vec<StringId>),
    Undefined,
}

#[derive(Clone, Debug)]
pub struct AttributeTable {
    by_names: HashMap<String, AttributeId>,
    by_ids: Vec<AttributeKind>,
}

#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Debug, Hash)]
pub struct AttributeId(pub(crate) usize);

impl Display for AttributeId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "attribute({})", self.0)
    }
}

impl AttributeTable {
    pub fn new(definitions: &[AttributeDefinition]) -> Result<Self, EventError> {
        let size = definitions.len();
        let mut by_names = HashMap::with_capacity(size);
        let mut by_ids = Vec::with_capacity(size);
        for (i, definition) in definitions.iter().enumerate() {
            let name = definition.name.to_owned();
            if by_names.contains_key(&name) {
                return Err(EventError::DuplicateAttribute(name));
            }

            by_names.insert(name, AttributeId(i));
            by_ids.push(definition.kind.clone());
        }

        Ok(Self { by_names, by_ids })
    }

    #[inline]
    pub fn by_name(&self, name: &str) -> Option<AttributeId> {
        self.by_names.get(name).cloned()
    }

    #[inline]
    pub fn by_id(&self, id: AttributeId) -> AttributeKind {
        self.by_ids[id.0].clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_ids.len()
    }
}

/// The definition of an attribute that events and rules can refer to
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    name: String,
    kind: AttributeKind,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum AttributeKind {
    Boolean,
    Integer,
    Float,
    String,
    BooleanList,
    IntegerList,
    FloatList,
    StringList,
}

impl AttributeDefinition {
    /// Create a boolean attribute definition.
    pub fn boolean(name: &str) -> Self {
        Self::new(name, AttributeKind::Boolean)
    }

    /// Create an integer attribute definition.
    pub fn integer(name: &str) -> Self {
        Self::new(name, AttributeKind::Integer)
    }

    /// Create a float attribute definition.
    pub fn float(name: &str) -> Self {
        Self::new(name, AttributeKind::Float)
    }

    /// Create a string attribute definition.
    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeKind::String)
    }

    /// Create a list of booleans attribute definition.
    pub fn boolean_list(name: &str) -> Self {
        Self::new(name, AttributeKind::BooleanList)
    }

    /// Create a list of integers attribute definition.
    pub fn integer_list(name: &str) -> Self {
        Self::new(name, AttributeKind::IntegerList)
    }

    /// Create a list of floats attribute definition.
    pub fn float_list(name: &str) -> Self {
        Self::new(name, AttributeKind::FloatList)
    }

    /// Create a list of strings attribute definition.
    pub fn string_list(name: &str) -> Self {
        Self::new(name, AttributeKind::StringList)
    }

    fn new(name: &str, kind: AttributeKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_create_an_attribute_table_with_no_attributes() {
        assert!(AttributeTable::new(&[]).is_ok())
    }

    #[test]
    fn can_create_an_attribute_table_with_some_attributes() {
        let definitions = [
            AttributeDefinition::boolean("private"),
            AttributeDefinition::string_list("deals"),
            AttributeDefinition::integer("exchange_id"),
            AttributeDefinition::float("bidfloor"),
            AttributeDefinition::string("country"),
            AttributeDefinition::integer_list("segment_ids"),
            AttributeDefinition::float_list("bids"),
            AttributeDefinition::boolean_list("flags"),
        ];

        assert!(AttributeTable::new(&definitions).is_ok());
    }

    #[test]
    fn return_an_error_on_duplicate_definitions() {
        let definitions = [
            AttributeDefinition::boolean("private"),
            AttributeDefinition::string("country"),
            AttributeDefinition::string_list("deals"),
            AttributeDefinition::integer("exchange_id"),
            AttributeDefinition::float("bidfloor"),
            AttributeDefinition::integer("country"),
            AttributeDefinition::integer_list("segment_ids"),
        ];

        assert_eq!(
            Err(EventError::DuplicateAttribute("country".to_string())),
            AttributeTable::new(&definitions).map(|_| ())
        );
    }

    #[test]
    fn can_add_scalar_attribute_values() {
        let attributes = AttributeTable::new(&[
            AttributeDefinition::boolean("private"),
            AttributeDefinition::integer("exchange_id"),
            AttributeDefinition::float("bidfloor"),
            AttributeDefinition::string("country"),
        ])
        .unwrap();
        let strings = StringTable::new();

        let result = EventBuilder::new(&attributes, &strings)
            .with_boolean("private", true)
            .and_then(|builder| builder.with_integer("exchange_id", 1))
            .and_then(|builder| builder.with_float("bidfloor", Decimal::new(15, 1)))
            .and_then(|builder| builder.with_string("country", "US"));

        assert!(result.is_ok());
    }

    #[test]
    fn can_add_list_attribute_values() {
        let attributes = AttributeTable::new(&[
            AttributeDefinition::boolean_list("flags"),
            AttributeDefinition::integer_list("segment_ids"),
            AttributeDefinition::float_list("bids"),
            AttributeDefinition::string_list("deal_ids"),
        ])
        .unwrap();
        let strings = StringTable::new();

        let result = EventBuilder::new(&attributes, &strings)
            .with_boolean_list("flags", &[true, false])
            .and_then(|builder| builder.with_integer_list("segment_ids", &[3, 1, 2]))
            .and_then(|builder| builder.with_float_list("bids", &[Decimal::new(1, 0)]))
            .and_then(|builder| builder.with_string_list("deal_ids", &["deal-1", "deal-2"]));

        assert!(result.is_ok());
    }

    #[test]
    fn return_an_error_when_adding_a_non_existing_attribute() {
        let attributes =
            AttributeTable::new(&[AttributeDefinition::string_list("deal_ids")]).unwrap();
        let strings = StringTable::new();

        let result = EventBuilder::new(&attributes, &strings).with_boolean("non_existing", true);

        assert!(matches!(result, Err(EventError::UnknownAttribute(_))));
    }

    #[test]
    fn return_an_error_when_trying_to_add_an_attribute_with_mismatched_type() {
        let attributes = AttributeTable::new(&[AttributeDefinition::boolean("private")]).unwrap();
        let strings = StringTable::new();

        let result = EventBuilder::new(&attributes, &strings).with_integer("private", 1);

        assert!(matches!(result, Err(EventError::WrongType { .. })));
    }

    #[test]
    fn can_create_an_event_with_no_attributes() {
        let attributes = AttributeTable::new(&[]).unwrap();
        let strings = StringTable::new();

        let _ = EventBuilder::new(&attributes, &strings).build();
    }

    #[test]
    fn unassigned_attributes_read_as_undefined() {
        let attributes = AttributeTable::new(&[
            AttributeDefinition::boolean("private"),
            AttributeDefinition::integer("exchange_id"),
        ])
        .unwrap();
        let strings = StringTable::new();

        let event = EventBuilder::new(&attributes, &strings)
            .with_boolean("private", true)
            .unwrap()
            .build();

        let exchange_id = attributes.by_name("exchange_id").unwrap();
        assert!(matches!(event[exchange_id], AttributeValue::Undefined));
    }

    #[test]
    fn can_set_an_attribute_back_to_undefined() {
        let attributes = AttributeTable::new(&[AttributeDefinition::boolean("private")]).unwrap();
        let strings = StringTable::new();

        let event = EventBuilder::new(&attributes, &strings)
            .with_boolean("private", true)
            .unwrap()
            .with_undefined("private")
            .unwrap()
            .build();

        let private = attributes.by_name("private").unwrap();
        assert!(matches!(event[private], AttributeValue::Undefined));
    }

    #[test]
    fn list_attribute_values_are_sorted_and_deduplicated() {
        let attributes =
            AttributeTable::new(&[AttributeDefinition::integer_list("segment_ids")]).unwrap();
        let strings = StringTable::new();

        let event = EventBuilder::new(&attributes, &strings)
            .with_integer_list("segment_ids", &[3, 1, 2, 3, 1])
            .unwrap()
            .build();

        let segment_ids = attributes.by_name("segment_ids").unwrap();
        match &event[segment_ids] {
            AttributeValue::IntegerList(values) => assert_eq!(&vec![1, 2, 3], values),
            value => panic!("expected an integer list, got {value:?}"),
        }
    }
}
