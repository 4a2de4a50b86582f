//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;

use disco_identity::{Action, Permission, Resource, Target, WILDCARD};
use disco_store::is_valid_namespace;

/// Generate an action, the wildcard included.
pub fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Any),
        Just(Action::Delete),
        Just(Action::Read),
        Just(Action::Write),
    ]
}

/// Generate a non-empty action set.
pub fn actions() -> impl Strategy<Value = BTreeSet<Action>> {
    prop::collection::btree_set(action(), 1..=4)
}

/// Generate a namespace the store accepts.
pub fn namespace() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_./-]{0,15}".prop_filter("reserved namespace", |ns| is_valid_namespace(ns))
}

/// Generate the namespace list of a permission: `*` or a few namespaces.
pub fn permission_namespaces() -> impl Strategy<Value = Vec<String>> {
    prop_oneof![
        1 => Just(vec![WILDCARD.to_string()]),
        3 => prop::collection::vec(namespace(), 1..4),
    ]
}

/// Generate a concrete resource.
pub fn resource() -> impl Strategy<Value = Resource> {
    prop_oneof![
        Just(Resource::Store),
        Just(Resource::User),
        Just(Resource::Role),
    ]
}

/// Generate a glob pattern: `*`, a literal, or a literal prefix with `*`.
pub fn pattern() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(WILDCARD.to_string()),
        3 => "[a-z0-9/_.-]{1,8}",
        2 => "[a-z0-9/_.-]{1,8}\\*",
    ]
}

/// Generate a target: the wildcard target or a resource with patterns.
pub fn target() -> impl Strategy<Value = Target> {
    prop_oneof![
        1 => Just(Target::any()),
        3 => (resource(), prop::collection::vec(pattern(), 1..4))
            .prop_filter_map("invalid target", |(resource, patterns)| {
                Target::new(resource, patterns).ok()
            }),
    ]
}

/// Generate a valid permission.
pub fn permission() -> impl Strategy<Value = Permission> {
    (actions(), permission_namespaces(), target()).prop_filter_map(
        "invalid permission",
        |(actions, namespaces, target)| Permission::new(actions, namespaces, target).ok(),
    )
}

/// Generate a store key.
pub fn store_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./-]{1,32}".prop_map(String::from)
}

/// Generate value bytes of at most `max_len`.
pub fn store_value(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}
