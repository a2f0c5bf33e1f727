// Tests for redirect rule generation

use hopmap_core::config::{PrefixRewrite, RuleConfig, SkipRule};
use hopmap_core::rules::{LiveTargets, RuleBuilder, RuleReason, build_rules};
use hopmap_scanner::{Hop, TraceResult};
use std::collections::HashSet;

const BASE: &str = "https://example.test";

fn own_hosts() -> Vec<String> {
    vec!["example.test".to_string(), "www.example.test".to_string()]
}

fn rule_config() -> RuleConfig {
    let mut config = RuleConfig {
        rewrites: vec![PrefixRewrite {
            legacy: "/bail-bonds/".to_string(),
            target: "/florida-bail-bonds".to_string(),
        }],
        skip: vec![SkipRule {
            pattern: "portal-landing?county=".to_string(),
            reason: "dynamic query param".to_string(),
        }],
        exclude_sources: vec!["/florida-bail-bonds/".to_string()],
        ..Default::default()
    };
    config
        .slug_aliases
        .insert("st-johns".to_string(), "saint-johns".to_string());
    config
        .priority_targets
        .insert("faq".to_string(), "/how-bail-works".to_string());
    config
}

fn ok(path: &str) -> TraceResult {
    let mut result = TraceResult::new(format!("{}{}", BASE, path));
    result.final_status = Some(200);
    result
}

fn not_found(url: &str) -> TraceResult {
    let mut result = TraceResult::new(url.to_string());
    result.final_status = Some(404);
    result
}

fn redirected(url: &str, targets: &[&str], final_status: Option<u16>) -> TraceResult {
    let mut result = TraceResult::new(url.to_string());
    let mut current = url.to_string();
    for target in targets {
        result.push_hop(Hop {
            url: current.clone(),
            status_code: 301,
            target: target.to_string(),
        });
        current = target.to_string();
    }
    result.final_status = final_status;
    result
}

fn live_counties() -> Vec<TraceResult> {
    vec![
        ok("/florida-bail-bonds/hendry"),
        ok("/florida-bail-bonds/saint-johns"),
        ok("/florida-bail-bonds/lee/"),
    ]
}

fn build(results: &[TraceResult]) -> Vec<(String, String)> {
    build_rules(results, &rule_config(), &own_hosts())
        .into_iter()
        .map(|r| (r.old_path, r.new_target))
        .collect()
}

// ============================================================================
// Decision Tree Scenarios
// ============================================================================

#[test]
fn test_single_redirect_without_legacy_prefix_has_no_rule() {
    let results = vec![redirected(
        "https://example.test/old-page",
        &["https://example.test/new-page"],
        Some(200),
    )];
    assert!(build(&results).is_empty());
}

#[test]
fn test_legacy_prefix_404_maps_to_live_county_page() {
    let mut results = live_counties();
    results.push(not_found("https://example.test/bail-bonds/hendry"));

    assert_eq!(
        build(&results),
        vec![(
            "/bail-bonds/hendry".to_string(),
            "/florida-bail-bonds/hendry".to_string()
        )]
    );
}

#[test]
fn test_legacy_prefix_without_live_target_falls_back_to_root() {
    let mut results = live_counties();
    results.push(not_found("https://example.test/bail-bonds/atlantis"));

    assert_eq!(
        build(&results),
        vec![("/bail-bonds/atlantis".to_string(), "/".to_string())]
    );
}

#[test]
fn test_live_targets_ignore_trailing_slash() {
    let live = LiveTargets::from_results(&live_counties(), &rule_config());
    assert!(live.contains("/florida-bail-bonds", "lee"));
    assert!(live.contains("/florida-bail-bonds", "hendry"));
    assert!(!live.contains("/florida-bail-bonds", "atlantis"));
    assert_eq!(live.len(), 3);
}

#[test]
fn test_bare_slug_404_uses_priority_target() {
    let mut results = live_counties();
    results.push(not_found("https://example.test/faq"));

    assert_eq!(
        build(&results),
        vec![("/faq".to_string(), "/how-bail-works".to_string())]
    );
}

#[test]
fn test_bare_slug_404_matching_county_goes_to_county_page() {
    let mut results = live_counties();
    results.push(not_found("https://example.test/hendry"));

    assert_eq!(
        build(&results),
        vec![(
            "/hendry".to_string(),
            "/florida-bail-bonds/hendry".to_string()
        )]
    );
}

#[test]
fn test_unknown_bare_slug_404_falls_back_to_root() {
    let results = vec![not_found("https://example.test/blank")];
    assert_eq!(build(&results), vec![("/blank".to_string(), "/".to_string())]);
}

#[test]
fn test_nested_404_without_legacy_prefix_has_no_rule() {
    let results = vec![not_found("https://example.test/blog/some-post")];
    assert!(build(&results).is_empty());
}

#[test]
fn test_three_hop_chain_collapses_to_final_path() {
    let results = vec![redirected(
        "https://example.test/a",
        &[
            "https://example.test/b",
            "https://www.example.test/c",
            "https://www.example.test/d?utm=x",
        ],
        Some(200),
    )];

    assert_eq!(build(&results), vec![("/a".to_string(), "/d".to_string())]);
}

#[test]
fn test_chain_to_foreign_host_keeps_absolute_url() {
    let results = vec![redirected(
        "https://example.test/partner",
        &["https://example.test/p", "https://partner.test/landing"],
        Some(200),
    )];

    assert_eq!(
        build(&results),
        vec![(
            "/partner".to_string(),
            "https://partner.test/landing".to_string()
        )]
    );
}

#[test]
fn test_truncated_chain_is_not_collapsed() {
    let results = vec![redirected(
        "https://example.test/loop",
        &["https://example.test/loop2", "https://example.test/loop"],
        None,
    )];
    assert!(results[0].is_truncated());
    assert!(build(&results).is_empty());
}

#[test]
fn test_existing_redirect_on_legacy_path_is_re_resolved() {
    let mut results = live_counties();
    results.push(redirected(
        "https://example.test/bail-bonds/lee",
        &["https://example.test/"],
        Some(200),
    ));

    let rules = build_rules(&results, &rule_config(), &own_hosts());
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].old_path, "/bail-bonds/lee");
    assert_eq!(rules[0].new_target, "/florida-bail-bonds/lee");
    assert_eq!(rules[0].reason, RuleReason::ExistingRedirect);
}

#[test]
fn test_rule_reasons() {
    let mut results = live_counties();
    results.push(not_found("https://example.test/bail-bonds/hendry"));
    results.push(not_found("https://example.test/faq"));
    results.push(redirected(
        "https://example.test/x",
        &["https://example.test/y", "https://example.test/z"],
        Some(200),
    ));

    let rules = build_rules(&results, &rule_config(), &own_hosts());
    let reasons: Vec<RuleReason> = rules.iter().map(|r| r.reason).collect();
    assert_eq!(
        reasons,
        vec![
            RuleReason::LegacyPrefix,
            RuleReason::BareSlug,
            RuleReason::ChainCollapse
        ]
    );
}

// ============================================================================
// Exclusion Tests
// ============================================================================

#[test]
fn test_skip_pattern_excludes_regardless_of_status() {
    let results = vec![
        not_found("https://example.test/portal-landing?county=lee"),
        redirected(
            "https://example.test/portal-landing?county=polk",
            &["https://example.test/x", "https://example.test/y"],
            Some(200),
        ),
    ];
    assert!(build(&results).is_empty());
}

#[test]
fn test_query_path_is_kept_when_not_skipped() {
    let results = vec![not_found("https://example.test/promo?ref=mail")];
    assert_eq!(
        build(&results),
        vec![("/promo?ref=mail".to_string(), "/".to_string())]
    );
}

#[test]
fn test_root_path_never_becomes_a_rule() {
    let results = vec![
        not_found("https://example.test/"),
        redirected(
            "https://example.test",
            &["https://example.test/home", "https://example.test/start"],
            Some(200),
        ),
    ];
    assert!(build(&results).is_empty());
}

#[test]
fn test_self_redirect_is_dropped() {
    let results = vec![redirected(
        "https://example.test/about",
        &["https://example.test/about/", "https://www.example.test/about"],
        Some(200),
    )];
    assert!(build(&results).is_empty());
}

// ============================================================================
// Properties
// ============================================================================

fn mixed_input() -> Vec<TraceResult> {
    let mut results = live_counties();
    results.extend([
        not_found("https://example.test/zeta"),
        not_found("https://example.test/bail-bonds/hendry"),
        not_found("https://www.example.test/bail-bonds/hendry"),
        redirected(
            "https://example.test/promo",
            &["https://example.test/p1", "https://example.test/summer"],
            Some(200),
        ),
        not_found("https://www.example.test/promo"),
        not_found("https://example.test/faq"),
        not_found("https://example.test/portal-landing?county=lee"),
        redirected(
            "https://example.test/old-page",
            &["https://example.test/new-page"],
            Some(200),
        ),
    ]);
    results
}

#[test]
fn test_first_seen_rule_wins() {
    let rules = build(&mixed_input());
    let promo: Vec<&(String, String)> = rules.iter().filter(|(old, _)| old == "/promo").collect();
    assert_eq!(promo.len(), 1);
    assert_eq!(promo[0].1, "/summer");
}

#[test]
fn test_rules_are_sorted_and_unique() {
    let rules = build(&mixed_input());

    let mut sorted = rules.clone();
    sorted.sort();
    assert_eq!(rules, sorted);

    let unique: HashSet<&String> = rules.iter().map(|(old, _)| old).collect();
    assert_eq!(unique.len(), rules.len());
}

#[test]
fn test_no_root_or_self_rules() {
    for (old, new) in build(&mixed_input()) {
        assert_ne!(old, "/");
        assert_ne!(old, new);
    }
}

#[test]
fn test_rule_builder_is_idempotent() {
    let input = mixed_input();
    let config = rule_config();
    let hosts = own_hosts();
    let builder = RuleBuilder::new(&config, &hosts);

    assert_eq!(builder.build(&input), builder.build(&input));
}

#[test]
fn test_alias_and_canonical_slug_share_target() {
    let mut results = live_counties();
    results.push(not_found("https://example.test/bail-bonds/st-johns"));
    results.push(not_found("https://example.test/bail-bonds/saint-johns"));

    let rules = build(&results);
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].1, rules[1].1);
    assert_eq!(rules[0].1, "/florida-bail-bonds/saint-johns");
}
