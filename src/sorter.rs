//! Typed comparators bound to group names, composed into a priority chain.
//!
//! Sorter kinds are resolved through a static registry keyed by the names in
//! `constants::sorters`. The chain compares two identifier maps sorter by
//! sorter; the first sorter whose values differ decides the order.

use chrono::NaiveDateTime;
use chrono::format::{Item, ParseResult, Parsed, StrftimeItems, parse as parse_with_items};
use std::cmp::Ordering;

use crate::config::{SortOrder, SorterConfig};
use crate::constants::sorters::{
    CUSTOM_LIST, CUSTOM_LIST_CLASS, DATETIME, DATETIME_CLASS, DEFAULT_DATETIME_FORMAT,
    LEXICOGRAPHIC, LEXICOGRAPHIC_CLASS, NUMERIC, NUMERIC_CLASS,
};
use crate::data::{BatchDefinition, BatchIdentifiers};
use crate::errors::ConnectorError;
use crate::types::GroupName;

/// Comparator semantics for one sorter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SorterKind {
    /// Compare raw captured strings.
    Lexicographic,
    /// Parse both values as numbers.
    Numeric,
    /// Parse both values with a `chrono` format string.
    DateTime { format: String },
    /// Order by position in a fixed list of allowed values.
    CustomList { values: Vec<String> },
}

type SorterFactory = fn(&SorterConfig) -> Result<SorterKind, ConnectorError>;

const SORTER_REGISTRY: &[(&str, SorterFactory)] = &[
    (LEXICOGRAPHIC, build_lexicographic),
    (LEXICOGRAPHIC_CLASS, build_lexicographic),
    (NUMERIC, build_numeric),
    (NUMERIC_CLASS, build_numeric),
    (DATETIME, build_datetime),
    (DATETIME_CLASS, build_datetime),
    (CUSTOM_LIST, build_custom_list),
    (CUSTOM_LIST_CLASS, build_custom_list),
];

fn build_lexicographic(_config: &SorterConfig) -> Result<SorterKind, ConnectorError> {
    Ok(SorterKind::Lexicographic)
}

fn build_numeric(_config: &SorterConfig) -> Result<SorterKind, ConnectorError> {
    Ok(SorterKind::Numeric)
}

fn build_datetime(config: &SorterConfig) -> Result<SorterKind, ConnectorError> {
    let format = config
        .datetime_format
        .clone()
        .unwrap_or_else(|| DEFAULT_DATETIME_FORMAT.to_string());
    if format.is_empty() || StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
        return Err(ConnectorError::Configuration(format!(
            "sorter '{}' has an invalid datetime format '{format}'",
            config.name
        )));
    }
    Ok(SorterKind::DateTime { format })
}

fn build_custom_list(config: &SorterConfig) -> Result<SorterKind, ConnectorError> {
    match config.reference_list.as_ref() {
        Some(values) if !values.is_empty() => Ok(SorterKind::CustomList {
            values: values.clone(),
        }),
        _ => Err(ConnectorError::Configuration(format!(
            "sorter '{}' requires a non-empty reference_list",
            config.name
        ))),
    }
}

impl SorterKind {
    /// Look up `config.kind` in the registry and build the comparator.
    pub fn from_config(config: &SorterConfig) -> Result<Self, ConnectorError> {
        let factory = SORTER_REGISTRY
            .iter()
            .find(|(name, _)| *name == config.kind)
            .map(|(_, factory)| *factory)
            .ok_or_else(|| {
                ConnectorError::Configuration(format!(
                    "sorter '{}' has unknown kind '{}'",
                    config.name, config.kind
                ))
            })?;
        factory(config)
    }

    /// Registry names accepted by `from_config`.
    pub fn registered_names() -> impl Iterator<Item = &'static str> {
        SORTER_REGISTRY.iter().map(|(name, _)| *name)
    }

    fn key(&self, group: &str, value: &str) -> Result<SortKey, ConnectorError> {
        let fail = |reason: String| ConnectorError::Comparison {
            group: group.to_string(),
            value: value.to_string(),
            reason,
        };
        match self {
            SorterKind::Lexicographic => Ok(SortKey::Text(value.to_string())),
            SorterKind::Numeric => {
                let trimmed = value.trim();
                if let Ok(integer) = trimmed.parse::<i128>() {
                    return Ok(SortKey::Integer(integer));
                }
                let number = trimmed
                    .parse::<f64>()
                    .map_err(|err| fail(format!("not a number ({err})")))?;
                if number.is_nan() {
                    return Err(fail("not a number".to_string()));
                }
                Ok(SortKey::Number(number))
            }
            SorterKind::DateTime { format } => parse_instant(value, format)
                .map(SortKey::Instant)
                .ok_or_else(|| fail(format!("does not match datetime format '{format}'"))),
            SorterKind::CustomList { values } => values
                .iter()
                .position(|candidate| candidate == value)
                .map(SortKey::Rank)
                .ok_or_else(|| fail("not present in the sorter's reference list".to_string())),
        }
    }
}

/// Parse `value` with `format`, filling fields the format leaves out.
///
/// Missing year defaults to 1900, missing month and day to 1, missing time
/// to midnight, so `%Y%m`, `%Y` or `%H%M` all yield a comparable instant.
fn parse_instant(value: &str, format: &str) -> Option<NaiveDateTime> {
    let mut parsed = Parsed::new();
    parse_with_items(&mut parsed, value, StrftimeItems::new(format)).ok()?;
    if let Ok(instant) = parsed.to_naive_datetime_with_offset(0) {
        return Some(instant);
    }
    fill_missing_fields(&mut parsed).ok()?;
    parsed.to_naive_datetime_with_offset(0).ok()
}

fn fill_missing_fields(parsed: &mut Parsed) -> ParseResult<()> {
    if parsed.timestamp().is_some() {
        return Ok(());
    }
    let has_year = parsed.year().is_some()
        || parsed.year_div_100().is_some()
        || parsed.year_mod_100().is_some()
        || parsed.isoyear().is_some()
        || parsed.isoyear_mod_100().is_some();
    if !has_year {
        parsed.set_year(1900)?;
    }
    let has_week = parsed.week_from_sun().is_some()
        || parsed.week_from_mon().is_some()
        || parsed.isoweek().is_some();
    if parsed.ordinal().is_none() && !has_week {
        if parsed.month().is_none() {
            parsed.set_month(1)?;
        }
        if parsed.day().is_none() {
            parsed.set_day(1)?;
        }
    }
    match (parsed.hour_div_12(), parsed.hour_mod_12()) {
        (None, None) => parsed.set_hour(0)?,
        (None, Some(_)) => parsed.set_ampm(false)?,
        _ => {}
    }
    if parsed.minute().is_none() {
        parsed.set_minute(0)?;
    }
    Ok(())
}

/// Parsed value produced by one sorter for one identifier map.
#[derive(Clone, Debug)]
enum SortKey {
    Text(String),
    Integer(i128),
    Number(f64),
    Instant(NaiveDateTime),
    Rank(usize),
}

impl SortKey {
    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Integer(a), SortKey::Integer(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Integer(a), SortKey::Number(b)) => compare_mixed(*a, *b),
            (SortKey::Number(a), SortKey::Integer(b)) => compare_mixed(*b, *a).reverse(),
            (SortKey::Instant(a), SortKey::Instant(b)) => a.cmp(b),
            (SortKey::Rank(a), SortKey::Rank(b)) => a.cmp(b),
            (a, b) => a.variant_rank().cmp(&b.variant_rank()),
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            SortKey::Text(_) => 0,
            SortKey::Integer(_) | SortKey::Number(_) => 1,
            SortKey::Instant(_) => 2,
            SortKey::Rank(_) => 3,
        }
    }
}

/// Exact integer part first, then the float's fraction.
fn compare_mixed(integer: i128, float: f64) -> Ordering {
    let whole = float.trunc();
    if float.is_finite() && whole >= i128::MIN as f64 && whole < i128::MAX as f64 {
        integer
            .cmp(&(whole as i128))
            .then_with(|| 0.0_f64.total_cmp(&(float - whole)))
    } else {
        (integer as f64).total_cmp(&float)
    }
}

/// One sorter bound to a group name with a direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SorterSpec {
    /// Group the sorter reads.
    pub group_name: GroupName,
    /// Comparator semantics.
    pub kind: SorterKind,
    /// Direction.
    pub order: SortOrder,
}

impl SorterSpec {
    /// Resolve the kind and bind it to its group.
    pub fn from_config(config: &SorterConfig) -> Result<Self, ConnectorError> {
        Ok(Self {
            group_name: config.name.clone(),
            kind: SorterKind::from_config(config)?,
            order: config.orderby,
        })
    }

    fn key_for(&self, identifiers: &BatchIdentifiers) -> Result<SortKey, ConnectorError> {
        let value = identifiers
            .get(&self.group_name)
            .ok_or_else(|| ConnectorError::Comparison {
                group: self.group_name.clone(),
                value: String::new(),
                reason: "group is missing from batch identifiers".to_string(),
            })?;
        self.kind.key(&self.group_name, value)
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Ordered sorters; earlier entries take priority.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SorterChain {
    sorters: Vec<SorterSpec>,
}

impl SorterChain {
    /// Build a chain, rejecting unknown kinds and repeated group names.
    pub fn from_configs(configs: &[SorterConfig]) -> Result<Self, ConnectorError> {
        let mut sorters: Vec<SorterSpec> = Vec::with_capacity(configs.len());
        for config in configs {
            if sorters.iter().any(|spec| spec.group_name == config.name) {
                return Err(ConnectorError::Configuration(format!(
                    "more than one sorter is bound to group '{}'",
                    config.name
                )));
            }
            sorters.push(SorterSpec::from_config(config)?);
        }
        Ok(Self { sorters })
    }

    /// True when no sorter is configured.
    pub fn is_empty(&self) -> bool {
        self.sorters.is_empty()
    }

    /// Sorters in priority order.
    pub fn sorters(&self) -> &[SorterSpec] {
        &self.sorters
    }

    /// Check that the chain covers exactly `group_names`.
    ///
    /// An empty chain accepts any asset.
    pub fn validate_for(
        &self,
        asset_name: &str,
        group_names: &[GroupName],
    ) -> Result<(), ConnectorError> {
        if self.sorters.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = self
            .sorters
            .iter()
            .find(|spec| !group_names.contains(&spec.group_name))
        {
            return Err(ConnectorError::Configuration(format!(
                "sorter '{}' does not match any group of data asset '{asset_name}' (groups: {group_names:?})",
                unknown.group_name
            )));
        }
        if let Some(ungoverned) = group_names
            .iter()
            .find(|name| !self.sorters.iter().any(|spec| &spec.group_name == *name))
        {
            return Err(ConnectorError::Configuration(format!(
                "group '{ungoverned}' of data asset '{asset_name}' is not covered by any sorter"
            )));
        }
        Ok(())
    }

    /// Compare two identifier maps through the whole chain.
    pub fn compare(
        &self,
        a: &BatchIdentifiers,
        b: &BatchIdentifiers,
    ) -> Result<Ordering, ConnectorError> {
        for spec in &self.sorters {
            let ordering = spec.directed(spec.key_for(a)?.compare(&spec.key_for(b)?));
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }

    /// Stable sort; ties keep their incoming order.
    ///
    /// Every value is parsed before any reordering, so a parse failure
    /// leaves nothing half-sorted.
    pub fn sort(
        &self,
        definitions: Vec<BatchDefinition>,
    ) -> Result<Vec<BatchDefinition>, ConnectorError> {
        if self.sorters.is_empty() {
            return Ok(definitions);
        }
        let mut keyed = definitions
            .into_iter()
            .map(|definition| {
                let keys = self
                    .sorters
                    .iter()
                    .map(|spec| spec.key_for(&definition.batch_identifiers))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((keys, definition))
            })
            .collect::<Result<Vec<_>, ConnectorError>>()?;
        keyed.sort_by(|(left, _), (right, _)| {
            self.sorters
                .iter()
                .zip(left.iter().zip(right.iter()))
                .map(|(spec, (l, r))| spec.directed(l.compare(r)))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(keyed.into_iter().map(|(_, definition)| definition).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(name: &str, timestamp: &str, price: &str) -> BatchIdentifiers {
        [("name", name), ("timestamp", timestamp), ("price", price)]
            .into_iter()
            .collect()
    }

    fn definition(name: &str, timestamp: &str, price: &str) -> BatchDefinition {
        BatchDefinition::new("ds", "dc", "asset", ids(name, timestamp, price))
    }

    fn price_chain() -> SorterChain {
        SorterChain::from_configs(&[
            SorterConfig::new("name", "LexicographicSorter", SortOrder::Ascending),
            SorterConfig::new("timestamp", "DateTimeSorter", SortOrder::Descending)
                .with_datetime_format("%Y%m%d"),
            SorterConfig::new("price", "NumericSorter", SortOrder::Descending),
        ])
        .unwrap()
    }

    #[test]
    fn registry_accepts_short_and_class_names() {
        for name in SorterKind::registered_names() {
            let config = SorterConfig::new("g", name, SortOrder::Ascending)
                .with_reference_list(["x"]);
            assert!(SorterKind::from_config(&config).is_ok(), "{name}");
        }
        let err =
            SorterKind::from_config(&SorterConfig::new("g", "Bogus", SortOrder::Ascending))
                .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn datetime_sorter_defaults_and_validates_format() {
        let kind =
            SorterKind::from_config(&SorterConfig::new("t", DATETIME, SortOrder::Ascending))
                .unwrap();
        assert_eq!(
            kind,
            SorterKind::DateTime {
                format: DEFAULT_DATETIME_FORMAT.to_string()
            }
        );
        let bad = SorterConfig::new("t", DATETIME, SortOrder::Ascending)
            .with_datetime_format("%Q%");
        assert!(SorterKind::from_config(&bad).is_err());
    }

    #[test]
    fn custom_list_requires_values() {
        let err = SorterKind::from_config(&SorterConfig::new("g", CUSTOM_LIST, SortOrder::Ascending))
            .unwrap_err();
        assert!(err.to_string().contains("reference_list"));
    }

    #[test]
    fn chain_compares_by_priority_and_direction() {
        let chain = price_chain();
        let a = ids("alex", "20200819", "1300");
        let b = ids("alex", "20200809", "1000");
        let c = ids("abe", "20200809", "1040");
        assert_eq!(chain.compare(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(chain.compare(&c, &a).unwrap(), Ordering::Less);
        assert_eq!(chain.compare(&a, &a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn reversing_one_sorter_only_flips_its_ties() {
        let chain = price_chain();
        let flipped = SorterChain::from_configs(&[
            SorterConfig::new("name", LEXICOGRAPHIC, SortOrder::Ascending),
            SorterConfig::new("timestamp", DATETIME, SortOrder::Ascending)
                .with_datetime_format("%Y%m%d"),
            SorterConfig::new("price", NUMERIC, SortOrder::Descending),
        ])
        .unwrap();
        let defs = vec![
            definition("alex", "20200809", "1000"),
            definition("abe", "20200809", "1040"),
            definition("alex", "20200819", "1300"),
        ];
        let names = |defs: &[BatchDefinition]| {
            defs.iter()
                .map(|d| {
                    format!(
                        "{}:{}",
                        d.batch_identifiers.get("name").unwrap(),
                        d.batch_identifiers.get("timestamp").unwrap()
                    )
                })
                .collect::<Vec<_>>()
        };
        let sorted = chain.sort(defs.clone()).unwrap();
        assert_eq!(
            names(&sorted),
            vec!["abe:20200809", "alex:20200819", "alex:20200809"]
        );
        let resorted = flipped.sort(defs).unwrap();
        assert_eq!(
            names(&resorted),
            vec!["abe:20200809", "alex:20200809", "alex:20200819"]
        );
    }

    #[test]
    fn numeric_sorter_rejects_text() {
        let chain = SorterChain::from_configs(&[SorterConfig::new(
            "price",
            NUMERIC,
            SortOrder::Ascending,
        )])
        .unwrap();
        let good: BatchIdentifiers = [("price", "10")].into_iter().collect();
        let bad: BatchIdentifiers = [("price", "ten")].into_iter().collect();
        let err = chain.compare(&good, &bad).unwrap_err();
        match err {
            ConnectorError::Comparison { group, value, .. } => {
                assert_eq!(group, "price");
                assert_eq!(value, "ten");
            }
            other => panic!("unexpected error: {other}"),
        }
        let nan: BatchIdentifiers = [("price", "NaN")].into_iter().collect();
        assert!(chain.compare(&good, &nan).is_err());
    }

    #[test]
    fn numeric_sorter_orders_by_value_not_text() {
        let chain = SorterChain::from_configs(&[SorterConfig::new(
            "price",
            NUMERIC,
            SortOrder::Ascending,
        )])
        .unwrap();
        let nine: BatchIdentifiers = [("price", "9")].into_iter().collect();
        let ten: BatchIdentifiers = [("price", "10.0")].into_iter().collect();
        assert_eq!(chain.compare(&nine, &ten).unwrap(), Ordering::Less);
        let ten_and_a_half: BatchIdentifiers = [("price", "10.5")].into_iter().collect();
        let ten_int: BatchIdentifiers = [("price", "10")].into_iter().collect();
        assert_eq!(chain.compare(&ten_int, &ten).unwrap(), Ordering::Equal);
        assert_eq!(
            chain.compare(&ten_and_a_half, &ten_int).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn numeric_sorter_keeps_large_integers_distinct() {
        let chain = SorterChain::from_configs(&[SorterConfig::new(
            "id",
            NUMERIC,
            SortOrder::Ascending,
        )])
        .unwrap();
        // Both round to the same f64.
        let low: BatchIdentifiers = [("id", "9007199254740992")].into_iter().collect();
        let high: BatchIdentifiers = [("id", "9007199254740993")].into_iter().collect();
        assert_eq!(chain.compare(&low, &high).unwrap(), Ordering::Less);
        assert_eq!(chain.compare(&high, &low).unwrap(), Ordering::Greater);
    }

    fn datetime_chain(format: &str, order: SortOrder) -> SorterChain {
        SorterChain::from_configs(&[
            SorterConfig::new("period", DATETIME_CLASS, order).with_datetime_format(format)
        ])
        .unwrap()
    }

    fn periods(chain: &SorterChain, values: &[&str]) -> Vec<String> {
        let defs = values
            .iter()
            .map(|value| {
                BatchDefinition::new(
                    "ds",
                    "dc",
                    "asset",
                    [("period", *value)].into_iter().collect(),
                )
            })
            .collect();
        chain
            .sort(defs)
            .unwrap()
            .iter()
            .map(|d| d.batch_identifiers.get("period").unwrap().to_string())
            .collect()
    }

    #[test]
    fn datetime_sorter_accepts_year_month_format() {
        let chain = datetime_chain("%Y%m", SortOrder::Descending);
        assert_eq!(
            periods(&chain, &["202001", "202003", "201912"]),
            vec!["202003", "202001", "201912"]
        );
        let bad: BatchIdentifiers = [("period", "2020-01")].into_iter().collect();
        let good: BatchIdentifiers = [("period", "202001")].into_iter().collect();
        assert!(chain.compare(&good, &bad).is_err());
    }

    #[test]
    fn datetime_sorter_accepts_year_only_format() {
        let chain = datetime_chain("%Y", SortOrder::Ascending);
        assert_eq!(
            periods(&chain, &["2021", "1999", "2020"]),
            vec!["1999", "2020", "2021"]
        );
    }

    #[test]
    fn datetime_sorter_accepts_time_only_and_full_formats() {
        let time_only = datetime_chain("%H%M", SortOrder::Ascending);
        assert_eq!(
            periods(&time_only, &["1300", "0905", "2359"]),
            vec!["0905", "1300", "2359"]
        );
        let full = datetime_chain("%Y-%m-%dT%H:%M:%S", SortOrder::Ascending);
        assert_eq!(
            periods(&full, &["2020-08-09T10:00:01", "2020-08-09T09:59:59"]),
            vec!["2020-08-09T09:59:59", "2020-08-09T10:00:01"]
        );
    }

    #[test]
    fn custom_list_orders_by_position() {
        let chain = SorterChain::from_configs(&[SorterConfig::new(
            "month",
            CUSTOM_LIST_CLASS,
            SortOrder::Ascending,
        )
        .with_reference_list(["jan", "feb", "mar"])])
        .unwrap();
        let mar: BatchIdentifiers = [("month", "mar")].into_iter().collect();
        let jan: BatchIdentifiers = [("month", "jan")].into_iter().collect();
        let dec: BatchIdentifiers = [("month", "dec")].into_iter().collect();
        assert_eq!(chain.compare(&mar, &jan).unwrap(), Ordering::Greater);
        assert!(chain.compare(&mar, &dec).is_err());
    }

    #[test]
    fn validation_rejects_unknown_and_ungoverned_groups() {
        let chain = price_chain();
        let groups: Vec<GroupName> = vec!["name".into(), "timestamp".into(), "price".into()];
        chain.validate_for("asset", &groups).unwrap();

        let too_few: Vec<GroupName> = vec!["name".into()];
        let err = chain.validate_for("asset", &too_few).unwrap_err();
        assert!(err.to_string().contains("does not match any group"));

        let extra: Vec<GroupName> = vec![
            "name".into(),
            "timestamp".into(),
            "price".into(),
            "region".into(),
        ];
        let err = chain.validate_for("asset", &extra).unwrap_err();
        assert!(err.to_string().contains("'region'"));

        SorterChain::default().validate_for("asset", &extra).unwrap();
    }

    #[test]
    fn duplicate_sorters_are_rejected() {
        let err = SorterChain::from_configs(&[
            SorterConfig::new("name", LEXICOGRAPHIC, SortOrder::Ascending),
            SorterConfig::new("name", LEXICOGRAPHIC, SortOrder::Descending),
        ])
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn sort_is_idempotent_and_stable_for_ties() {
        let chain = SorterChain::from_configs(&[SorterConfig::new(
            "name",
            LEXICOGRAPHIC,
            SortOrder::Ascending,
        )])
        .unwrap();
        let defs = vec![
            BatchDefinition::new("ds", "dc", "a", [("name", "b"), ("n", "1")].into_iter().collect()),
            BatchDefinition::new("ds", "dc", "a", [("name", "a"), ("n", "2")].into_iter().collect()),
            BatchDefinition::new("ds", "dc", "a", [("name", "b"), ("n", "3")].into_iter().collect()),
        ];
        let once = chain.sort(defs).unwrap();
        let twice = chain.sort(once.clone()).unwrap();
        assert_eq!(once, twice);
        let order: Vec<&str> = once
            .iter()
            .map(|d| d.batch_identifiers.get("n").unwrap())
            .collect();
        assert_eq!(order, vec!["2", "1", "3"]);
    }
}
