//! Query construction.
//!
//! A [`Query`] accumulates predicates as a flat parameter map plus the
//! select, order-by and range directives that travel as headers. Two queries
//! combine with [`Query::and`] and [`Query::or`]; OR groups are flattened
//! into the parameter keys with `[or<k>].[and<n>].` prefixes.
//!
//! ```
//! use stackmob::Query;
//!
//! let young = Query::new().lt("age", 25);
//! let local = Query::new().equals("city", "NYC").not_equals("name", "john");
//! let query = young.or(&local).unwrap();
//!
//! let keys: Vec<_> = query.params().keys().cloned().collect();
//! assert_eq!(keys, ["[or1].[and1].city", "[or1].[and1].name[ne]", "[or1].age[lt]"]);
//! ```

mod geo;
mod key;

pub use geo::{EARTH_RADIANS_KM, EARTH_RADIANS_MI, GeoPoint};
pub use key::{Operator, ParamKey, encode};

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::InvalidInputError;

/// Parameter carrying the expand depth for nested relationships.
pub const EXPAND_PARAM: &str = "_expand";

/// Deepest relationship expansion the service supports.
pub const MAX_EXPAND_DEPTH: u8 = 3;

/// Inclusive range of result indices, sent as `Range: objects=<start>-<end>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    pub fn header_value(&self) -> String {
        format!("objects={}-{}", self.start, self.end)
    }
}

/// A composable set of predicates and result directives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    params: BTreeMap<String, Value>,
    select_fields: Vec<String>,
    order_by: Vec<String>,
    range: Option<Range>,
    or_group: Option<u32>,
    and_count: u32,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw parameter.
    pub fn add_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn predicate(self, field: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.add_param(encode(field, Some(op)), value)
    }

    /// `field == value`. An empty string matches empty fields.
    pub fn equals(self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if is_empty_string(&value) {
            self.predicate(field, Operator::Empty, true)
        } else {
            self.add_param(field, value)
        }
    }

    /// `field != value`. An empty string matches non-empty fields.
    pub fn not_equals(self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if is_empty_string(&value) {
            self.predicate(field, Operator::Empty, false)
        } else {
            self.predicate(field, Operator::Ne, value)
        }
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.predicate(field, Operator::Lt, value)
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.predicate(field, Operator::Lte, value)
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.predicate(field, Operator::Gt, value)
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.predicate(field, Operator::Gte, value)
    }

    pub fn is_null(self, field: &str) -> Self {
        self.predicate(field, Operator::Null, true)
    }

    pub fn is_not_null(self, field: &str) -> Self {
        self.predicate(field, Operator::Null, false)
    }

    /// `field` is any of `values`, sent comma-joined.
    pub fn must_be_one_of<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let joined = values
            .into_iter()
            .map(|v| render_value(&v.into()))
            .collect::<Vec<_>>()
            .join(",");
        self.predicate(field, Operator::In, joined)
    }

    /// Results within `distance` radians of `point`, nearest first.
    pub fn must_be_near(self, field: &str, point: &GeoPoint, distance: f64) -> Self {
        let value = format!("{},{},{}", point.lat(), point.lon(), distance);
        self.predicate(field, Operator::Near, value)
    }

    pub fn must_be_near_mi(self, field: &str, point: &GeoPoint, miles: f64) -> Self {
        self.must_be_near(field, point, miles / EARTH_RADIANS_MI)
    }

    pub fn must_be_near_km(self, field: &str, point: &GeoPoint, km: f64) -> Self {
        self.must_be_near(field, point, km / EARTH_RADIANS_KM)
    }

    /// Results within `distance` radians of `point`, unordered.
    pub fn is_within(self, field: &str, point: &GeoPoint, distance: f64) -> Self {
        let value = format!("{},{},{}", point.lat(), point.lon(), distance);
        self.predicate(field, Operator::Within, value)
    }

    pub fn is_within_mi(self, field: &str, point: &GeoPoint, miles: f64) -> Self {
        self.is_within(field, point, miles / EARTH_RADIANS_MI)
    }

    pub fn is_within_km(self, field: &str, point: &GeoPoint, km: f64) -> Self {
        self.is_within(field, point, km / EARTH_RADIANS_KM)
    }

    /// Results inside the box spanned by two corners.
    pub fn is_within_box(self, field: &str, corner1: &GeoPoint, corner2: &GeoPoint) -> Self {
        let value = format!(
            "{},{},{},{}",
            corner1.lat(),
            corner1.lon(),
            corner2.lat(),
            corner2.lon()
        );
        self.predicate(field, Operator::Within, value)
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order_by.push(format!("{field}:asc"));
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order_by.push(format!("{field}:desc"));
        self
    }

    /// Limit results to indices `start..=end`.
    pub fn set_range(mut self, start: u64, end: u64) -> Self {
        self.range = Some(Range { start, end });
        self
    }

    /// Return only the named fields.
    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.select_fields.push(field.into());
        self
    }

    /// Expand relationships `depth` levels deep.
    ///
    /// # Errors
    ///
    /// Returns an error if `depth` is greater than 3.
    pub fn set_expand(self, depth: u8) -> Result<Self, InvalidInputError> {
        if depth > MAX_EXPAND_DEPTH {
            return Err(InvalidInputError::ExpandDepth { depth });
        }
        Ok(self.add_param(EXPAND_PARAM, depth))
    }

    /// A new query matching both `self` and `other`.
    ///
    /// Parameters are merged as-is; on a key collision `other` wins.
    pub fn and(&self, other: &Query) -> Query {
        let mut combined = self.clone();
        for (key, value) in &other.params {
            combined.params.insert(key.clone(), value.clone());
        }
        combined
    }

    /// A new query matching `self` or `other`.
    ///
    /// The first OR opens group 1 and moves the receiver's own parameters
    /// into it; later ORs add further branches to the same group. A side
    /// with more than one parameter gets its own `[and<n>].` branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the same key would appear twice in one branch;
    /// use [`Query::must_be_one_of`] to OR values of a single field.
    pub fn or(&self, other: &Query) -> Result<Query, InvalidInputError> {
        let mut combined = self.clone();

        let group = match self.or_group {
            Some(group) => group,
            None => {
                combined.params.clear();
                combined.or_group = Some(1);
                combined.and_count = 1;
                combined.merge_branch(1, &self.params)?;
                1
            }
        };

        combined.merge_branch(group, &other.params)?;
        Ok(combined)
    }

    fn merge_branch(
        &mut self,
        group: u32,
        params: &BTreeMap<String, Value>,
    ) -> Result<(), InvalidInputError> {
        let and = if params.len() > 1 {
            let n = self.and_count;
            self.and_count += 1;
            key::and_prefix(n)
        } else {
            String::new()
        };
        let prefix = format!("{}{}", key::or_prefix(group), and);

        for (key, value) in params {
            let prefixed = format!("{prefix}{key}");
            if self.params.contains_key(&prefixed) {
                return Err(InvalidInputError::AmbiguousOr {
                    field: ParamKey::parse(key).field,
                });
            }
            self.params.insert(prefixed, value.clone());
        }
        Ok(())
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub fn select_fields(&self) -> &[String] {
        &self.select_fields
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn or_group(&self) -> Option<u32> {
        self.or_group
    }

    /// `X-StackMob-Select` header value.
    pub fn select_header(&self) -> Option<String> {
        (!self.select_fields.is_empty()).then(|| self.select_fields.join(","))
    }

    /// `X-StackMob-OrderBy` header value.
    pub fn order_by_header(&self) -> Option<String> {
        (!self.order_by.is_empty()).then(|| self.order_by.join(","))
    }

    /// `Range` header value.
    pub fn range_header(&self) -> Option<String> {
        self.range.map(|r| r.header_value())
    }

    /// Parameters rendered to strings, ready for the query string.
    pub fn to_params(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), render_value(v)))
            .collect()
    }
}

fn is_empty_string(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

/// Render a parameter value the way it appears on the wire: strings
/// unquoted, everything else as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn predicates_use_field_suffixes() {
        let q = Query::new()
            .equals("name", "john")
            .not_equals("city", "LA")
            .lt("age", 25)
            .gte("score", 1.5)
            .is_null("deleted")
            .is_not_null("email");

        let p = q.params();
        assert_eq!(p["name"], "john");
        assert_eq!(p["city[ne]"], "LA");
        assert_eq!(p["age[lt]"], 25);
        assert_eq!(p["score[gte]"], 1.5);
        assert_eq!(p["deleted[null]"], true);
        assert_eq!(p["email[null]"], false);
    }

    #[test]
    fn empty_string_comparisons_become_empty_checks() {
        let q = Query::new().equals("bio", "").not_equals("nick", "");
        assert_eq!(q.params()["bio[empty]"], true);
        assert_eq!(q.params()["nick[empty]"], false);
        assert!(!q.params().contains_key("bio"));
    }

    #[test]
    fn must_be_one_of_joins_values() {
        let q = Query::new().must_be_one_of("color", ["red", "blue"]);
        assert_eq!(q.params()["color[in]"], "red,blue");
        let q = Query::new().must_be_one_of("n", [1, 2, 3]);
        assert_eq!(q.params()["n[in]"], "1,2,3");
    }

    #[test]
    fn geo_predicates_encode_coordinates() {
        let sf = GeoPoint::new(37.77, -122.42).unwrap();
        let ny = GeoPoint::new(40.71, -74.0).unwrap();

        let q = Query::new()
            .must_be_near("loc", &sf, 0.5)
            .is_within_box("area", &sf, &ny);
        assert_eq!(q.params()["loc[near]"], "37.77,-122.42,0.5");
        assert_eq!(q.params()["area[within]"], "37.77,-122.42,40.71,-74");

        let q = Query::new().is_within_mi("loc", &sf, EARTH_RADIANS_MI);
        assert_eq!(q.params()["loc[within]"], "37.77,-122.42,1");
        let q = Query::new().must_be_near_km("loc", &sf, EARTH_RADIANS_KM * 2.0);
        assert_eq!(q.params()["loc[near]"], "37.77,-122.42,2");
    }

    #[test]
    fn directives_render_as_headers() {
        let q = Query::new()
            .select("name")
            .select("age")
            .order_asc("age")
            .order_desc("name")
            .set_range(0, 9);
        assert_eq!(q.select_header().as_deref(), Some("name,age"));
        assert_eq!(q.order_by_header().as_deref(), Some("age:asc,name:desc"));
        assert_eq!(q.range_header().as_deref(), Some("objects=0-9"));
        assert!(q.to_params().is_empty());

        let empty = Query::new();
        assert!(empty.select_header().is_none());
        assert!(empty.range_header().is_none());
    }

    #[test]
    fn expand_depth_is_bounded() {
        assert_eq!(Query::new().set_expand(3).unwrap().params()["_expand"], 3);
        assert!(matches!(
            Query::new().set_expand(4),
            Err(InvalidInputError::ExpandDepth { depth: 4 })
        ));
    }

    #[test]
    fn and_merges_with_right_side_winning() {
        let a = Query::new().equals("a", 1).equals("b", 1).set_range(0, 4);
        let b = Query::new().equals("b", 2).equals("c", 3);
        let q = a.and(&b);

        assert_eq!(q.params()["a"], 1);
        assert_eq!(q.params()["b"], 2);
        assert_eq!(q.params()["c"], 3);
        assert_eq!(q.range_header().as_deref(), Some("objects=0-4"));
        assert!(q.or_group().is_none());
        assert_eq!(a.params()["b"], 1);
    }

    #[test]
    fn first_or_prefixes_both_sides() {
        let a = Query::new().equals("age", 25);
        let b = Query::new().equals("city", "SF").not_equals("name", "mary");
        let q = a.or(&b).unwrap();

        let keys: Vec<_> = q.params().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["[or1].[and1].city", "[or1].[and1].name[ne]", "[or1].age"]
        );
        assert_eq!(q.or_group(), Some(1));
    }

    #[test]
    fn multi_key_receiver_gets_first_and_branch() {
        let a = Query::new().equals("a", 1).equals("b", 2);
        let b = Query::new().equals("c", 3).equals("d", 4);
        let q = a.or(&b).unwrap();

        assert_eq!(q.params()["[or1].[and1].a"], 1);
        assert_eq!(q.params()["[or1].[and1].b"], 2);
        assert_eq!(q.params()["[or1].[and2].c"], 3);
        assert_eq!(q.params()["[or1].[and2].d"], 4);
    }

    #[test]
    fn chained_or_stays_in_the_same_group() {
        let not_john = Query::new().not_equals("name", "john");
        let not_mary = Query::new().equals("location", "SF").not_equals("name", "mary");
        let is_la = Query::new().equals("location", "LA");
        let not_bob = Query::new().not_equals("name", "bob");

        let q = not_john.or(&not_mary).unwrap().or(&is_la).unwrap();
        assert_eq!(q.params()["[or1].location"], "LA");
        assert_eq!(q.params()["[or1].[and1].location"], "SF");

        let q = not_john.or(&not_mary).unwrap().or(&not_bob);
        assert!(matches!(q, Err(InvalidInputError::AmbiguousOr { .. })));

        let is_nyc = Query::new().equals("city", "NYC").equals("zip", "10001");
        let q = not_john.or(&not_mary).unwrap().or(&is_nyc).unwrap();
        assert_eq!(q.params()["[or1].name[ne]"], "john");
        assert_eq!(q.params()["[or1].[and1].location"], "SF");
        assert_eq!(q.params()["[or1].[and2].city"], "NYC");
        assert_eq!(q.params()["[or1].[and2].zip"], "10001");
    }

    #[test]
    fn or_of_same_field_is_ambiguous() {
        let err = Query::new()
            .equals("a", 1)
            .or(&Query::new().equals("a", 2))
            .unwrap_err();
        match err {
            InvalidInputError::AmbiguousOr { field } => assert_eq!(field, "a"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn must_be_one_of_is_the_unambiguous_alternative() {
        let q = Query::new().equals("a", 1).must_be_one_of("a", [1, 2]);
        assert_eq!(q.params()["a"], 1);
        assert_eq!(q.params()["a[in]"], "1,2");
    }

    #[test]
    fn and_after_or_keeps_grouping() {
        let either = Query::new()
            .equals("a", 1)
            .or(&Query::new().equals("b", 2))
            .unwrap();
        let q = Query::new().equals("age", 25).and(&either);

        assert_eq!(q.params()["age"], 25);
        assert_eq!(q.params()["[or1].a"], 1);
        assert_eq!(q.params()["[or1].b"], 2);
    }

    #[test]
    fn rendered_params_are_unquoted() {
        let q = Query::new().equals("name", "john").lt("age", 25).add_param("flag", json!(true));
        assert_eq!(
            q.to_params(),
            vec![
                ("age[lt]".to_string(), "25".to_string()),
                ("flag".to_string(), "true".to_string()),
                ("name".to_string(), "john".to_string()),
            ]
        );
    }
}
