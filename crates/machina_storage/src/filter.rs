//! Composable resource filters.
//!
//! A [`ResourceFilter`] decides whether a resource (with its optional tag) may
//! enter a slot. Filters are pure: the same input always yields the same
//! answer, and evaluating a filter has no side effects.
//!
//! # Example
//!
//! ```
//! use machina_storage::filter::ResourceFilter;
//! use machina_storage::resource::{Fluid, Identifier};
//!
//! let water = Fluid::new(Identifier::parse("minecraft:water").unwrap());
//! let lava = Fluid::new(Identifier::parse("minecraft:lava").unwrap());
//!
//! let only_water = ResourceFilter::resource(water.clone());
//! assert!(only_water.test(&water, None));
//! assert!(!only_water.test(&lava, None));
//!
//! let anything_but_water = ResourceFilter::not(only_water);
//! assert!(anything_but_water.test(&lava, None));
//! ```

use core::fmt;
use std::borrow::Cow;
use std::rc::Rc;

use serde::Serialize;

use crate::resource::{Resource, ResourceVariant, Tag};

/// Signature of a custom filter predicate.
pub type FilterFn<R> = dyn Fn(&R, Option<&Tag>) -> bool;

/// A predicate over a resource and its tag.
pub enum ResourceFilter<R> {
    /// Accepts everything.
    Any,
    /// Accepts nothing.
    None,
    /// Accepts one resource with any tag.
    Resource(R),
    /// Accepts one resource with exactly one tag.
    Variant(ResourceVariant<R>),
    /// Accepts any of the listed resources, with any tag.
    OneOf(Vec<R>),
    /// Accepts resources whose tag contains a key.
    HasTag(String),
    /// Inverts a filter.
    Not(Box<ResourceFilter<R>>),
    /// Accepts when every filter accepts. An empty list accepts everything.
    And(Vec<ResourceFilter<R>>),
    /// Accepts when any filter accepts. An empty list accepts nothing.
    Or(Vec<ResourceFilter<R>>),
    /// A named predicate, for rules that cannot be expressed structurally
    /// (fuel items, recipe inputs).
    Custom {
        /// Name shown to players.
        name: Cow<'static, str>,
        /// The predicate.
        test: Rc<FilterFn<R>>,
    },
}

impl<R: Resource> ResourceFilter<R> {
    /// Accepts everything.
    #[must_use]
    pub fn any() -> Self {
        Self::Any
    }

    /// Accepts nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::None
    }

    /// Accepts `resource` with any tag.
    #[must_use]
    pub fn resource(resource: R) -> Self {
        Self::Resource(resource)
    }

    /// Accepts exactly `variant`.
    #[must_use]
    pub fn variant(variant: ResourceVariant<R>) -> Self {
        Self::Variant(variant)
    }

    /// Accepts any of `resources`.
    #[must_use]
    pub fn one_of(resources: impl IntoIterator<Item = R>) -> Self {
        Self::OneOf(resources.into_iter().collect())
    }

    /// Accepts resources whose tag has `key`.
    #[must_use]
    pub fn has_tag(key: impl Into<String>) -> Self {
        Self::HasTag(key.into())
    }

    /// Inverts `filter`.
    #[must_use]
    pub fn not(filter: Self) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Accepts when all of `filters` accept.
    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Accepts when any of `filters` accepts.
    #[must_use]
    pub fn or(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Wraps a named predicate.
    #[must_use]
    pub fn custom<F>(name: impl Into<Cow<'static, str>>, test: F) -> Self
    where
        F: Fn(&R, Option<&Tag>) -> bool + 'static,
    {
        Self::Custom {
            name: name.into(),
            test: Rc::new(test),
        }
    }

    /// Evaluates the filter.
    #[must_use]
    pub fn test(&self, resource: &R, tag: Option<&Tag>) -> bool {
        match self {
            Self::Any => true,
            Self::None => false,
            Self::Resource(expected) => expected == resource,
            Self::Variant(variant) => variant.is(resource, tag),
            Self::OneOf(resources) => resources.contains(resource),
            Self::HasTag(key) => tag.is_some_and(|tag| tag.contains_key(key)),
            Self::Not(filter) => !filter.test(resource, tag),
            Self::And(filters) => filters.iter().all(|filter| filter.test(resource, tag)),
            Self::Or(filters) => filters.iter().any(|filter| filter.test(resource, tag)),
            Self::Custom { test, .. } => test(resource, tag),
        }
    }

    /// Returns `true` if this filter can never accept anything.
    #[must_use]
    pub fn rejects_all(&self) -> bool {
        match self {
            Self::None => true,
            Self::OneOf(resources) => resources.is_empty(),
            Self::Or(filters) => filters.iter().all(Self::rejects_all),
            Self::And(filters) => filters.iter().any(Self::rejects_all),
            Self::Not(filter) => matches!(**filter, Self::Any),
            _ => false,
        }
    }

    /// Returns a serializable description of this filter for display.
    #[must_use]
    pub fn describe(&self) -> FilterDescriptor {
        match self {
            Self::Any => FilterDescriptor::Any,
            Self::None => FilterDescriptor::None,
            Self::Resource(resource) => FilterDescriptor::Resource {
                id: resource.id().to_string(),
            },
            Self::Variant(variant) => FilterDescriptor::Variant {
                id: variant.resource().id().to_string(),
                tagged: variant.tag().is_some(),
            },
            Self::OneOf(resources) => FilterDescriptor::OneOf {
                ids: resources.iter().map(|r| r.id().to_string()).collect(),
            },
            Self::HasTag(key) => FilterDescriptor::HasTag { key: key.clone() },
            Self::Not(filter) => FilterDescriptor::Not(Box::new(filter.describe())),
            Self::And(filters) => {
                FilterDescriptor::And(filters.iter().map(Self::describe).collect())
            }
            Self::Or(filters) => FilterDescriptor::Or(filters.iter().map(Self::describe).collect()),
            Self::Custom { name, .. } => FilterDescriptor::Custom {
                name: name.to_string(),
            },
        }
    }
}

impl<R: Resource> Default for ResourceFilter<R> {
    fn default() -> Self {
        Self::Any
    }
}

impl<R: Clone> Clone for ResourceFilter<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Any => Self::Any,
            Self::None => Self::None,
            Self::Resource(resource) => Self::Resource(resource.clone()),
            Self::Variant(variant) => Self::Variant(variant.clone()),
            Self::OneOf(resources) => Self::OneOf(resources.clone()),
            Self::HasTag(key) => Self::HasTag(key.clone()),
            Self::Not(filter) => Self::Not(filter.clone()),
            Self::And(filters) => Self::And(filters.clone()),
            Self::Or(filters) => Self::Or(filters.clone()),
            Self::Custom { name, test } => Self::Custom {
                name: name.clone(),
                test: Rc::clone(test),
            },
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for ResourceFilter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::None => f.write_str("None"),
            Self::Resource(resource) => f.debug_tuple("Resource").field(resource).finish(),
            Self::Variant(variant) => f.debug_tuple("Variant").field(variant).finish(),
            Self::OneOf(resources) => f.debug_tuple("OneOf").field(resources).finish(),
            Self::HasTag(key) => f.debug_tuple("HasTag").field(key).finish(),
            Self::Not(filter) => f.debug_tuple("Not").field(filter).finish(),
            Self::And(filters) => f.debug_tuple("And").field(filters).finish(),
            Self::Or(filters) => f.debug_tuple("Or").field(filters).finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

/// Display form of a [`ResourceFilter`], sent to clients to render slot hints.
///
/// Descriptors are never read back; they only describe a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FilterDescriptor {
    /// Accepts everything.
    Any,
    /// Accepts nothing.
    None,
    /// One resource.
    Resource {
        /// Resource identifier.
        id: String,
    },
    /// One resource with a specific tag.
    Variant {
        /// Resource identifier.
        id: String,
        /// Whether the variant carries a tag.
        tagged: bool,
    },
    /// Several resources.
    OneOf {
        /// Resource identifiers.
        ids: Vec<String>,
    },
    /// Resources carrying a tag key.
    HasTag {
        /// Required tag key.
        key: String,
    },
    /// Inverted filter.
    Not(Box<FilterDescriptor>),
    /// Conjunction.
    And(Vec<FilterDescriptor>),
    /// Disjunction.
    Or(Vec<FilterDescriptor>),
    /// Named predicate.
    Custom {
        /// Predicate name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Identifier, Item};
    use serde_json::json;

    fn item(path: &str) -> Item {
        Item::new(Identifier::new("minecraft", path).unwrap())
    }

    #[test]
    fn constant_filters() {
        let stone = item("stone");
        assert!(ResourceFilter::any().test(&stone, None));
        assert!(!ResourceFilter::none().test(&stone, None));
        assert!(ResourceFilter::<Item>::none().rejects_all());
        assert!(!ResourceFilter::<Item>::any().rejects_all());
    }

    #[test]
    fn empty_combinators() {
        let stone = item("stone");
        assert!(ResourceFilter::and([]).test(&stone, None));
        assert!(!ResourceFilter::or([]).test(&stone, None));
        assert!(ResourceFilter::<Item>::or([]).rejects_all());
    }

    #[test]
    fn resource_filter_ignores_tag_but_variant_does_not() {
        let sword = item("iron_sword");
        let enchanted = Tag::new().with("enchantments", json!(["sharpness"]));

        let by_resource = ResourceFilter::resource(sword.clone());
        assert!(by_resource.test(&sword, Some(&enchanted)));

        let plain = ResourceFilter::variant(ResourceVariant::of(sword.clone()));
        assert!(plain.test(&sword, None));
        assert!(plain.test(&sword, Some(&Tag::new())));
        assert!(!plain.test(&sword, Some(&enchanted)));
    }

    #[test]
    fn tag_and_custom_filters_compose() {
        let coal = item("coal");
        let stick = item("stick");
        let named = Tag::new().with("display", json!("Lucky"));

        let fuel = ResourceFilter::custom("fuel", |item: &Item, _| item.id().path() == "coal");
        let filter = ResourceFilter::and([fuel, ResourceFilter::has_tag("display")]);
        assert!(filter.test(&coal, Some(&named)));
        assert!(!filter.test(&coal, None));
        assert!(!filter.test(&stick, Some(&named)));

        let either = ResourceFilter::or([
            ResourceFilter::one_of([stick.clone()]),
            ResourceFilter::not(ResourceFilter::any()),
        ]);
        assert!(either.test(&stick, None));
        assert!(!either.test(&coal, None));
    }

    #[test]
    fn clones_share_custom_predicates() {
        let filter = ResourceFilter::custom("stone only", |item: &Item, _| item.id().path() == "stone");
        let copy = filter.clone();
        assert!(copy.test(&item("stone"), None));
        assert!(!copy.test(&item("dirt"), None));
    }

    #[test]
    fn descriptors_serialize_for_display() {
        let filter = ResourceFilter::and([
            ResourceFilter::resource(item("coal")),
            ResourceFilter::not(ResourceFilter::has_tag("burnt")),
            ResourceFilter::custom("fuel", |_: &Item, _| true),
        ]);
        let json = serde_json::to_value(filter.describe()).unwrap();
        assert_eq!(
            json,
            json!({
                "kind": "and",
                "value": [
                    {"kind": "resource", "value": {"id": "minecraft:coal"}},
                    {"kind": "not", "value": {"kind": "has_tag", "value": {"key": "burnt"}}},
                    {"kind": "custom", "value": {"name": "fuel"}},
                ]
            })
        );
    }
}
