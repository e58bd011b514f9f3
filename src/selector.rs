//! Selector resolution and `{{ALIAS}}` substitution (§4.10): the logic an
//! HTTP `/query` surface would call before handing SQL to the query
//! engine, kept transport-agnostic so it's testable on its own.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use tsdb_catalog::DescriptorCatalog;
use tsdb_core::{Error, MetricId, Result};

/// One `{metric, tags?, alias?}` selector from a query request.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    /// Exact metric name to match.
    pub metric: String,
    /// Tag subset the matching metric(s) must contain.
    pub tags: BTreeMap<String, String>,
    /// Explicit alias; defaults to `S1, S2, …` in selector order.
    pub alias: Option<String>,
}

/// A selector after resolution against the catalog.
#[derive(Debug, Clone)]
pub struct ResolvedSelector {
    /// The alias this selector is known by in SQL (`{{ALIAS}}`).
    pub alias: String,
    /// Every metric id the selector matched.
    pub metric_ids: Vec<MetricId>,
}

/// Resolve every selector via [`DescriptorCatalog::find`], in order.
///
/// An empty match or a match exceeding `cap` is a `ValidationError`.
/// Aliases default to `S1, S2, …` (1-indexed, selector order) when not
/// supplied; a duplicate alias (explicit or defaulted) is also rejected.
pub fn resolve_selectors(
    catalog: &DescriptorCatalog,
    selectors: &[Selector],
    cap: usize,
) -> Result<Vec<ResolvedSelector>> {
    let mut resolved = Vec::with_capacity(selectors.len());
    let mut seen_aliases = BTreeSet::new();
    for (i, selector) in selectors.iter().enumerate() {
        let (matches, hit_limit) = catalog.find(Some(&selector.metric), Some(&selector.tags), cap)?;
        if matches.is_empty() {
            return Err(Error::validation(format!(
                "selector for metric {:?} matched no metrics",
                selector.metric
            )));
        }
        if hit_limit {
            return Err(Error::validation(format!(
                "selector for metric {:?} matched more than {cap} metrics; narrow the tags",
                selector.metric
            )));
        }
        let alias = selector.alias.clone().unwrap_or_else(|| format!("S{}", i + 1));
        if !seen_aliases.insert(alias.clone()) {
            return Err(Error::validation(format!("duplicate alias {alias:?}")));
        }
        resolved.push(ResolvedSelector {
            alias,
            metric_ids: matches.into_iter().map(|m| m.metric_id).collect(),
        });
    }
    Ok(resolved)
}

/// Replace every `{{ALIAS}}` placeholder in `sql` with the decimal
/// `metric_id` of the resolved selector it names.
///
/// An alias token is letters, digits, and underscores, matching the way
/// the original implementation recognizes one. An alias that isn't among
/// `resolved`, or that resolved to more than one metric id (and so can't
/// stand in for a single-value placeholder), is a `ValidationError`.
pub fn substitute_aliases(sql: &str, resolved: &[ResolvedSelector]) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or_else(|| Error::validation("unterminated {{ALIAS}} placeholder in query"))?;
        let token = &after_open[..end];
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::validation(format!("malformed alias placeholder {{{{{token}}}}}")));
        }
        let selector = resolved
            .iter()
            .find(|r| r.alias == token)
            .ok_or_else(|| Error::validation(format!("unknown alias {{{{{token}}}}} in query")))?;
        if selector.metric_ids.len() != 1 {
            return Err(Error::validation(format!(
                "alias {{{{{token}}}}} matched {} metrics, a placeholder needs exactly one",
                selector.metric_ids.len()
            )));
        }
        out.push_str(&selector.metric_ids[0].to_string());
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Verify `explicit` is exactly the union of every resolved selector's
/// metric ids (order-independent).
pub fn verify_metric_ids_union(explicit: &[MetricId], resolved: &[ResolvedSelector]) -> Result<()> {
    let explicit_set: BTreeSet<MetricId> = explicit.iter().copied().collect();
    let mut resolved_set: BTreeSet<MetricId> = BTreeSet::new();
    for r in resolved {
        resolved_set.extend(r.metric_ids.iter().copied());
    }
    if explicit_set != resolved_set {
        return Err(Error::validation(
            "metric_ids does not match the union of resolved selectors",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdb_core::MetricType;
    use tsdb_kvstore::KvStore;

    fn catalog_with_cpu_metrics() -> (DescriptorCatalog, MetricId, MetricId) {
        let store = KvStore::new();
        let catalog = DescriptorCatalog::new(store);
        let mut web = BTreeMap::new();
        web.insert("role".to_string(), "web".to_string());
        let mut db = BTreeMap::new();
        db.insert("role".to_string(), "db".to_string());
        let web_id = catalog
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(5), Some("cpu"), &web)
            .unwrap();
        let db_id = catalog
            .ensure_descriptor(None, MetricType::Gauge, Some(1), Some(5), Some("cpu"), &db)
            .unwrap();
        (catalog, web_id, db_id)
    }

    #[test]
    fn default_aliases_are_assigned_in_order() {
        let (catalog, web_id, db_id) = catalog_with_cpu_metrics();
        let selectors = vec![
            Selector { metric: "cpu".into(), tags: BTreeMap::from([("role".into(), "web".into())]), alias: None },
            Selector { metric: "cpu".into(), tags: BTreeMap::from([("role".into(), "db".into())]), alias: None },
        ];
        let resolved = resolve_selectors(&catalog, &selectors, 10).unwrap();
        assert_eq!(resolved[0].alias, "S1");
        assert_eq!(resolved[0].metric_ids, vec![web_id]);
        assert_eq!(resolved[1].alias, "S2");
        assert_eq!(resolved[1].metric_ids, vec![db_id]);
    }

    #[test]
    fn empty_match_is_validation_error() {
        let (catalog, _web_id, _db_id) = catalog_with_cpu_metrics();
        let selectors = vec![Selector {
            metric: "missing".into(),
            tags: BTreeMap::new(),
            alias: None,
        }];
        let err = resolve_selectors(&catalog, &selectors, 10).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let (catalog, _web_id, _db_id) = catalog_with_cpu_metrics();
        let selectors = vec![
            Selector { metric: "cpu".into(), tags: BTreeMap::from([("role".into(), "web".into())]), alias: Some("X".into()) },
            Selector { metric: "cpu".into(), tags: BTreeMap::from([("role".into(), "db".into())]), alias: Some("X".into()) },
        ];
        let err = resolve_selectors(&catalog, &selectors, 10).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn substitute_aliases_replaces_placeholder_with_metric_id() {
        let (catalog, web_id, _db_id) = catalog_with_cpu_metrics();
        let selectors = vec![Selector {
            metric: "cpu".into(),
            tags: BTreeMap::from([("role".into(), "web".into())]),
            alias: Some("WEB".into()),
        }];
        let resolved = resolve_selectors(&catalog, &selectors, 10).unwrap();
        let sql = substitute_aliases("select * from samples where metric_id = {{WEB}}", &resolved).unwrap();
        assert_eq!(sql, format!("select * from samples where metric_id = {web_id}"));
    }

    #[test]
    fn substitute_aliases_rejects_unknown_alias() {
        let resolved: Vec<ResolvedSelector> = Vec::new();
        let err = substitute_aliases("select {{NOPE}}", &resolved).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn substitute_aliases_rejects_multi_match_placeholder() {
        let (catalog, _web_id, _db_id) = catalog_with_cpu_metrics();
        let selectors = vec![Selector {
            metric: "cpu".into(),
            tags: BTreeMap::new(),
            alias: Some("ALL".into()),
        }];
        let resolved = resolve_selectors(&catalog, &selectors, 10).unwrap();
        let err = substitute_aliases("select {{ALL}}", &resolved).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn verify_union_matches_exactly() {
        let (catalog, web_id, db_id) = catalog_with_cpu_metrics();
        let selectors = vec![
            Selector { metric: "cpu".into(), tags: BTreeMap::from([("role".into(), "web".into())]), alias: None },
            Selector { metric: "cpu".into(), tags: BTreeMap::from([("role".into(), "db".into())]), alias: None },
        ];
        let resolved = resolve_selectors(&catalog, &selectors, 10).unwrap();
        assert!(verify_metric_ids_union(&[web_id, db_id], &resolved).is_ok());
        assert!(verify_metric_ids_union(&[web_id], &resolved).is_err());
    }
}
