use rule_index::{
    AttributeDefinition, Condition, EqualityOperator, Literal, LiteralList, ListOperator, Node,
    RuleIndex, SetOperator,
};
use std::collections::HashMap;

fn integer_equals(attribute: &str, value: i64) -> Node {
    Node::value(Condition::equality(
        attribute,
        EqualityOperator::Equal,
        Literal::Integer(value),
    ))
}

fn string_equals(attribute: &str, value: &str) -> Node {
    Node::value(Condition::equality(
        attribute,
        EqualityOperator::Equal,
        Literal::String(value.to_string()),
    ))
}

fn string_in(attribute: &str, values: &[&str]) -> Node {
    Node::value(Condition::set(
        attribute,
        SetOperator::In,
        LiteralList::String(values.iter().map(|value| value.to_string()).collect()),
    ))
}

fn one_of_strings(attribute: &str, values: &[&str]) -> Node {
    Node::value(Condition::list(
        attribute,
        ListOperator::OneOf,
        LiteralList::String(values.iter().map(|value| value.to_string()).collect()),
    ))
}

fn one_of_integers(attribute: &str, values: &[i64]) -> Node {
    Node::value(Condition::list(
        attribute,
        ListOperator::OneOf,
        LiteralList::Integer(values.to_vec()),
    ))
}

// The prefix every campaign shares:
// exchange_id = 1 ∧ deal_ids ∩ {deal-1, deal-2} ∧ segment_ids ∩ {1, 2, 3}
fn common_prefix() -> Node {
    Node::and(
        Node::and(
            integer_equals("exchange_id", 1),
            one_of_strings("deal_ids", &["deal-1", "deal-2"]),
        ),
        one_of_integers("segment_ids", &[1, 2, 3]),
    )
}

fn main() {
    // Create the index
    let attributes = [
        AttributeDefinition::integer("exchange_id"),
        AttributeDefinition::string_list("deal_ids"),
        AttributeDefinition::integer_list("segment_ids"),
        AttributeDefinition::string("country"),
        AttributeDefinition::string("city"),
    ];
    let mut index = RuleIndex::new(&attributes).unwrap();

    // Register the rules
    let first = Node::and(common_prefix(), string_in("country", &["FR", "GB"]));
    let second = Node::and(
        common_prefix(),
        Node::or(
            Node::and(string_equals("country", "CA"), string_in("city", &["QC"])),
            Node::and(string_equals("country", "US"), string_in("city", &["AZ"])),
        ),
    );
    let third = Node::and(
        common_prefix(),
        Node::or(
            Node::and(string_equals("country", "CA"), string_in("city", &["QC"])),
            string_equals("country", "US"),
        ),
    );
    let fourth = common_prefix();

    let rules = [(1u64, first), (2, second), (3, third), (4, fourth)];
    let descriptions: HashMap<u64, &str> = HashMap::from_iter([
        (1, "common prefix, France or Great Britain"),
        (2, "common prefix, Québec or Arizona"),
        (3, "common prefix, Québec or anywhere in the US"),
        (4, "common prefix only"),
    ]);
    for (id, rule) in &rules {
        index.add_rule(id, rule).unwrap();
    }

    // Create the matching event
    let event = index
        .make_event()
        .with_integer("exchange_id", 1)
        .unwrap()
        .with_string_list("deal_ids", &["deal-3", "deal-1"])
        .unwrap()
        .with_integer_list("segment_ids", &[3, 4, 5])
        .unwrap()
        .with_string("country", "US")
        .unwrap()
        .with_string("city", "AZ")
        .unwrap()
        .build();

    // Search the index for the rules it satisfies
    let report = index.search(&event).unwrap();
    report.matches().iter().for_each(|id| {
        println!(r#"Found ID: {id}, Rule: "{}""#, descriptions[*id]);
    });
}
