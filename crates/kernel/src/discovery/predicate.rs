//! Filter predicates for the listing sources.
//!
//! Each source (catalog restaurants, suggestions) gets its own
//! [`Condition`] built against that source's table alias. Values stay in
//! the SeaQuery expression tree until the statement is built, so
//! placeholders are numbered once for the whole query even when two
//! sources are combined with `UNION ALL`.

use sea_query::extension::postgres::PgExpr;
use sea_query::{Alias, Cond, Condition, Expr, LikeExpr, Query, SimpleExpr};
use serde::Deserialize;

use super::geo::{BoundingBox, GeoPoint, GeoQuery};
use crate::models::food_type::{LinkOwner, dedup_ids};

/// Escape LIKE wildcards so user input is matched literally.
pub fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Column names of one listing source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceColumns {
    pub table: &'static str,
    /// Table alias used in the generated SQL.
    pub alias: &'static str,
    /// Foreign key column referencing `category`.
    pub category: &'static str,
    /// Junction table linking the source to food types.
    pub links: LinkOwner,
}

impl SourceColumns {
    /// Columns of the `restaurant` table aliased as `r`.
    pub const RESTAURANT: SourceColumns = SourceColumns {
        table: "restaurant",
        alias: "r",
        category: "category_id",
        links: LinkOwner::Restaurant,
    };

    /// Columns of the `restaurant_suggestion` table aliased as `s`.
    pub const SUGGESTION: SourceColumns = SourceColumns {
        table: "restaurant_suggestion",
        alias: "s",
        category: "suggested_category_id",
        links: LinkOwner::Suggestion,
    };

    /// `alias.name` as a column reference.
    pub fn column_ref(&self, name: &str) -> (Alias, Alias) {
        (Alias::new(self.alias), Alias::new(name))
    }

    pub fn column(&self, name: &str) -> Expr {
        Expr::col(self.column_ref(name))
    }
}

/// Which columns a free-text fragment is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScope {
    NameOrDescription,
    NameOnly,
}

/// Typed discovery filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryFilter {
    pub category_id: Option<i64>,
    /// Rows must carry at least one of these food types.
    pub food_type_ids: Vec<i64>,
    /// Case-insensitive substring.
    pub text: Option<String>,
    pub geo: Option<GeoQuery>,
    pub include_suggestions: bool,
}

/// Filter fields exactly as received from a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDiscoveryFilter {
    pub category: Option<String>,
    pub food_types: Option<String>,
    pub q: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub radius: Option<String>,
    pub include_suggestions: Option<String>,
}

impl RawDiscoveryFilter {
    /// Parse into a [`DiscoveryFilter`]. Malformed values are dropped.
    pub fn parse(&self) -> DiscoveryFilter {
        let category_id = parse_number::<i64>(self.category.as_deref());

        let food_type_ids = self
            .food_types
            .as_deref()
            .map(|list| {
                list.split(',')
                    .filter_map(|id| id.trim().parse::<i64>().ok())
                    .collect::<Vec<_>>()
            })
            .map(|ids| dedup_ids(&ids))
            .unwrap_or_default();

        let text = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        let center = match (
            parse_number::<f64>(self.lat.as_deref()),
            parse_number::<f64>(self.lng.as_deref()),
        ) {
            (Some(lat), Some(lng)) => GeoPoint::try_new(lat, lng),
            _ => None,
        };
        let radius_km =
            parse_number::<f64>(self.radius.as_deref()).filter(|r| r.is_finite() && *r > 0.0);
        let geo = center.map(|center| GeoQuery { center, radius_km });

        let include_suggestions = matches!(
            self.include_suggestions
                .as_deref()
                .map(|v| v.trim().to_ascii_lowercase())
                .as_deref(),
            Some("true" | "1" | "yes")
        );

        DiscoveryFilter {
            category_id,
            food_type_ids,
            text,
            geo,
            include_suggestions,
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Collects the predicates of one source.
#[derive(Debug)]
pub struct PredicateBuilder {
    columns: SourceColumns,
    predicates: Vec<SimpleExpr>,
}

impl PredicateBuilder {
    pub fn new(columns: SourceColumns) -> Self {
        Self {
            columns,
            predicates: Vec::new(),
        }
    }

    /// Predicates for every constraint in `filter`.
    pub fn for_filter(filter: &DiscoveryFilter, columns: SourceColumns, scope: TextScope) -> Self {
        Self::new(columns)
            .category(filter.category_id)
            .food_types(&filter.food_type_ids)
            .text(filter.text.as_deref(), scope)
            .within(filter.geo.and_then(|g| g.bounding_box()))
    }

    pub fn category(mut self, category_id: Option<i64>) -> Self {
        if let Some(id) = category_id {
            let column = self.columns.column(self.columns.category);
            self.predicates.push(column.eq(id));
        }
        self
    }

    /// Rows linked to any of `ids`. An empty set adds nothing.
    pub fn food_types(mut self, ids: &[i64]) -> Self {
        if ids.is_empty() {
            return self;
        }
        let links = self.columns.links;
        let link = Alias::new("l");
        let linked = Query::select()
            .expr(Expr::cust("1"))
            .from_as(Alias::new(links.table()), link.clone())
            .and_where(
                Expr::col((link.clone(), Alias::new(links.owner_column())))
                    .equals(self.columns.column_ref("id")),
            )
            .and_where(Expr::col((link, Alias::new("food_type_id"))).is_in(dedup_ids(ids)))
            .to_owned();
        self.predicates.push(Expr::exists(linked));
        self
    }

    /// Case-insensitive substring match of `text`.
    pub fn text(mut self, text: Option<&str>, scope: TextScope) -> Self {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        let pattern = format!("%{}%", escape_like_wildcards(text));
        let like = || LikeExpr::new(pattern.clone()).escape('\\');

        let mut any = Cond::any().add(self.columns.column("name").ilike(like()));
        if scope == TextScope::NameOrDescription {
            any = any.add(self.columns.column("description").ilike(like()));
        }
        self.predicates.push(any.into());
        self
    }

    /// Rows inside `bbox`. Rows without coordinates never match.
    pub fn within(mut self, bbox: Option<BoundingBox>) -> Self {
        let Some(bbox) = bbox else {
            return self;
        };
        let lat = self.columns.column("latitude");
        let lng = self.columns.column("longitude");

        self.predicates.push(lat.between(bbox.min_lat, bbox.max_lat));
        self.predicates.push(match bbox.lng_range {
            Some((min, max)) => lng.between(min, max),
            None => lng.is_not_null(),
        });
        self
    }

    /// Suggestions whose status is one of `statuses`.
    pub fn status_in(mut self, statuses: &[&str]) -> Self {
        let column = self.columns.column("status");
        self.predicates
            .push(column.is_in(statuses.iter().map(|s| s.to_string())));
        self
    }

    /// Rows with an identity greater than `id`.
    pub fn after_id(mut self, id: Option<i64>) -> Self {
        if let Some(id) = id {
            let column = self.columns.column("id");
            self.predicates.push(column.gt(id));
        }
        self
    }

    /// Number of predicates collected so far.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// All predicates joined with `AND`.
    pub fn finish(self) -> Condition {
        self.predicates
            .into_iter()
            .fold(Cond::all(), |cond, predicate| cond.add(predicate))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use sea_query::{PostgresQueryBuilder, SelectStatement, UnionType, Value, Values};

    fn placeholder_count(sql: &str) -> usize {
        regex::Regex::new(r"\$\d+").unwrap().find_iter(sql).count()
    }

    fn full_filter() -> DiscoveryFilter {
        DiscoveryFilter {
            category_id: Some(3),
            food_type_ids: vec![4, 2, 4],
            text: Some("50%_off".to_string()),
            geo: Some(GeoQuery {
                center: GeoPoint::try_new(52.52, 13.405).unwrap(),
                radius_km: Some(10.0),
            }),
            include_suggestions: true,
        }
    }

    fn select(columns: SourceColumns, condition: Condition) -> SelectStatement {
        Query::select()
            .column(columns.column_ref("id"))
            .from_as(Alias::new(columns.table), Alias::new(columns.alias))
            .cond_where(condition)
            .to_owned()
    }

    fn render(columns: SourceColumns, builder: PredicateBuilder) -> (String, Values) {
        select(columns, builder.finish()).build(PostgresQueryBuilder)
    }

    #[test]
    fn empty_filter_adds_no_predicates() {
        let builder = PredicateBuilder::for_filter(
            &DiscoveryFilter::default(),
            SourceColumns::RESTAURANT,
            TextScope::NameOrDescription,
        );
        assert!(builder.is_empty());
        let (sql, values) = render(SourceColumns::RESTAURANT, builder);
        assert_eq!(placeholder_count(&sql), 0);
        assert!(values.0.is_empty());
    }

    #[test]
    fn empty_food_type_set_adds_no_predicate() {
        let builder = PredicateBuilder::new(SourceColumns::RESTAURANT).food_types(&[]);
        assert!(builder.is_empty());
    }

    #[test]
    fn placeholders_match_values_for_all_combinations() {
        let full = full_filter();
        // Every subset of the five filter dimensions
        for mask in 0u8..32 {
            let filter = DiscoveryFilter {
                category_id: full.category_id.filter(|_| mask & 1 != 0),
                food_type_ids: if mask & 2 != 0 {
                    full.food_type_ids.clone()
                } else {
                    Vec::new()
                },
                text: full.text.clone().filter(|_| mask & 4 != 0),
                geo: full.geo.filter(|_| mask & 8 != 0),
                include_suggestions: mask & 16 != 0,
            };
            for (columns, scope) in [
                (SourceColumns::RESTAURANT, TextScope::NameOrDescription),
                (SourceColumns::SUGGESTION, TextScope::NameOnly),
            ] {
                let builder = PredicateBuilder::for_filter(&filter, columns, scope);
                let (sql, values) = render(columns, builder);
                assert_eq!(placeholder_count(&sql), values.0.len(), "{sql}");
            }
        }
    }

    #[test]
    fn two_sources_share_one_placeholder_sequence() {
        let filter = full_filter();
        let restaurant = PredicateBuilder::for_filter(
            &filter,
            SourceColumns::RESTAURANT,
            TextScope::NameOrDescription,
        )
        .finish();
        let suggestion = PredicateBuilder::for_filter(
            &filter,
            SourceColumns::SUGGESTION,
            TextScope::NameOrDescription,
        )
        .status_in(&["approved", "tested"])
        .finish();

        let (sql, values) = select(SourceColumns::RESTAURANT, restaurant)
            .union(
                UnionType::All,
                select(SourceColumns::SUGGESTION, suggestion),
            )
            .build(PostgresQueryBuilder);

        let n = values.0.len();
        assert_eq!(placeholder_count(&sql), n);
        for i in 1..=n {
            assert!(sql.contains(&format!("${i}")));
        }
        assert!(!sql.contains(&format!("${}", n + 1)));
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains(r#""s"."suggested_category_id" = $"#));
        assert!(sql.contains(r#""r"."category_id" = $1"#));
        assert!(sql.contains(r#""suggestion_food_type" AS "l""#));
        assert!(sql.contains(r#""l"."suggestion_id" = "s"."id""#));
        assert_eq!(
            &values.0[n - 2..],
            &[Value::from("approved"), Value::from("tested")]
        );
    }

    #[test]
    fn food_types_are_deduplicated() {
        let builder = PredicateBuilder::new(SourceColumns::RESTAURANT).food_types(&[4, 2, 4]);
        let (sql, values) = render(SourceColumns::RESTAURANT, builder);
        assert!(sql.contains("EXISTS"));
        assert!(sql.contains(r#""l"."restaurant_id" = "r"."id""#));
        assert_eq!(values.0, vec![Value::from(2i64), Value::from(4i64)]);
    }

    #[test]
    fn text_is_escaped_and_scoped() {
        let builder = PredicateBuilder::new(SourceColumns::RESTAURANT)
            .text(Some("  50%_off "), TextScope::NameOnly);
        let (sql, values) = render(SourceColumns::RESTAURANT, builder);
        assert_eq!(values.0, vec![Value::from("%50\\%\\_off%")]);
        assert!(sql.contains("ILIKE"));
        assert!(sql.contains("ESCAPE"));
        assert!(!sql.contains("description"));

        let builder = PredicateBuilder::new(SourceColumns::RESTAURANT)
            .text(Some("pizza"), TextScope::NameOrDescription);
        let (sql, values) = render(SourceColumns::RESTAURANT, builder);
        assert_eq!(values.0.len(), 2);
        assert!(sql.contains(r#""r"."description" ILIKE $2"#));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn escape_like_wildcards_function() {
        assert_eq!(escape_like_wildcards("hello"), "hello");
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }

    #[test]
    fn raw_filter_drops_malformed_values() {
        let raw = RawDiscoveryFilter {
            category: Some("abc".to_string()),
            food_types: Some("1, x, 3,,1".to_string()),
            q: Some("   ".to_string()),
            lat: Some("52.5".to_string()),
            lng: Some("not-a-number".to_string()),
            radius: Some("5".to_string()),
            include_suggestions: Some("TRUE".to_string()),
        };
        let filter = raw.parse();
        assert_eq!(filter.category_id, None);
        assert_eq!(filter.food_type_ids, vec![1, 3]);
        assert_eq!(filter.text, None);
        assert_eq!(filter.geo, None);
        assert!(filter.include_suggestions);
    }

    #[test]
    fn raw_filter_parses_geo() {
        let raw = RawDiscoveryFilter {
            lat: Some("52.52".to_string()),
            lng: Some("13.405".to_string()),
            radius: Some("-3".to_string()),
            ..Default::default()
        };
        let geo = raw.parse().geo.unwrap();
        assert_eq!(geo.center.lat, 52.52);
        assert_eq!(geo.radius_km, None);

        let out_of_range = RawDiscoveryFilter {
            lat: Some("95".to_string()),
            lng: Some("13".to_string()),
            radius: Some("3".to_string()),
            ..Default::default()
        };
        assert_eq!(out_of_range.parse().geo, None);
    }

    #[test]
    fn bounding_box_omits_longitude_when_unbounded() {
        let bbox = BoundingBox {
            min_lat: 80.0,
            max_lat: 90.0,
            lng_range: None,
        };
        let builder = PredicateBuilder::new(SourceColumns::SUGGESTION).within(Some(bbox));
        assert_eq!(builder.len(), 2);
        let (sql, values) = render(SourceColumns::SUGGESTION, builder);
        assert_eq!(values.0, vec![Value::from(80.0f64), Value::from(90.0f64)]);
        assert!(sql.contains(r#""s"."longitude" IS NOT NULL"#));
    }
}
