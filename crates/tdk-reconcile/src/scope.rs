use std::collections::BTreeSet;

use tdk_schemas::{AuditDomain, EngineError};

/// Resolve requested scope names into audit domains.
///
/// Empty input or `"all"` anywhere selects every domain. Output is sorted and
/// deduplicated. Unknown names are a validation error.
pub fn parse_scope(names: &[String]) -> Result<Vec<AuditDomain>, EngineError> {
    let mut out: BTreeSet<AuditDomain> = BTreeSet::new();
    let mut all = names.is_empty();
    for raw in names {
        let name = raw.trim();
        if name.eq_ignore_ascii_case("all") {
            all = true;
            continue;
        }
        out.insert(AuditDomain::parse(name)?);
    }
    if all {
        return Ok(AuditDomain::ALL.to_vec());
    }
    Ok(out.into_iter().collect())
}

pub fn scope_labels(domains: &[AuditDomain]) -> Vec<String> {
    domains.iter().map(|d| d.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdk_schemas::ErrorKind;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_and_all_select_every_domain() {
        assert_eq!(parse_scope(&[]).unwrap(), AuditDomain::ALL.to_vec());
        assert_eq!(parse_scope(&names(&["ALL"])).unwrap(), AuditDomain::ALL.to_vec());
        assert_eq!(
            parse_scope(&names(&["sync", "all"])).unwrap(),
            AuditDomain::ALL.to_vec()
        );
    }

    #[test]
    fn named_domains_are_sorted_and_deduped() {
        assert_eq!(
            parse_scope(&names(&["sync", "trades", "sync"])).unwrap(),
            vec![AuditDomain::Trades, AuditDomain::Sync]
        );
    }

    #[test]
    fn unknown_domain_is_validation_error() {
        let err = parse_scope(&names(&["trades", "payroll"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("payroll"));
    }
}
