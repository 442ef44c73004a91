//! End-to-end pipeline tests: parse → learn → synthesize → filter → fallback.

use clerk_core::{
    FallbackReason, Lexicon, Preferences, Product, ScoreSource, SessionContext, cap_for_scoring,
    fallback_result, filter_products, parse, synthesize,
};

fn product(id: &str, title: &str, price: f64, rating: Option<f64>) -> Product {
    Product {
        rating,
        site: "amazon".to_string(),
        ..Product::new(id, title, price)
    }
}

fn catalog() -> Vec<Product> {
    vec![
        product("p1", "ASUS TUF Gaming Laptop 16GB RAM", 48_000.0, Some(4.3)),
        product("p2", "Dell Inspiron Laptop", 52_000.0, Some(4.0)),
        product("p3", "HP Pavilion Laptop", 39_000.0, Some(3.6)),
        product("p4", "Logitech Wireless Mouse", 1_200.0, Some(4.6)),
        product("p5", "Acer Aspire Laptop", 61_000.0, None),
    ]
}

#[test]
fn full_pipeline_with_fallback() {
    let lexicon = Lexicon::default();
    let mut prefs = Preferences::default();
    let mut session = SessionContext::default();

    // A few sessions' worth of learning
    for (i, text) in [
        "gaming laptop under 50000",
        "asus gaming laptop",
        "laptop with 16gb ram for gaming",
    ]
    .iter()
    .enumerate()
    {
        let parsed = parse(text, &lexicon);
        session.record_query(text, &parsed, i as u64 + 1);
        prefs.learn(&parsed, i as u64 + 1);
    }

    let insights = synthesize(&prefs, &session);
    assert_eq!(insights.search_patterns.dominant_purpose, "gaming");
    assert_eq!(insights.preferred_categories[0].key, "laptop");
    // 50000 sits on the bucket boundary; lower bounds are inclusive
    let budget = insights.recommended_budget.unwrap();
    assert_eq!(budget.range, "₹50k - ₹75k");

    // New request funnels through filter → cap → fallback
    let parsed = parse("gaming laptop under 50000", &lexicon);
    let filtered = filter_products(&catalog(), &parsed);
    let ids: Vec<&str> = filtered.iter().map(|p| p.id.as_str()).collect();
    // p2 and p5 are over budget, p4 is not a laptop
    assert_eq!(ids, vec!["p1", "p3"]);

    let capped = cap_for_scoring(filtered);
    let result = fallback_result(&capped, FallbackReason::Transient, 5);
    assert_eq!(
        result.source,
        ScoreSource::Fallback(FallbackReason::Transient)
    );
    assert_eq!(result.recommendations.len(), 2);
    assert_eq!(result.recommendations[0].product.id, "p1");
    assert_eq!(result.recommendations[0].score, 50.0 + 4.3 * 8.0);
    assert_eq!(result.recommendations[0].pros, vec!["High rating"]);
    assert_eq!(result.recommendations[1].pros, vec!["Available on amazon"]);
}

#[test]
fn learning_shifts_insights_across_queries() {
    let lexicon = Lexicon::default();
    let mut prefs = Preferences::default();
    let mut session = SessionContext::default();

    for i in 0..3 {
        let parsed = parse("office monitor", &lexicon);
        session.record_query("office monitor", &parsed, i);
        prefs.learn(&parsed, i);
    }
    let insights = synthesize(&prefs, &session);
    assert_eq!(insights.search_patterns.dominant_purpose, "work");
    assert_eq!(insights.preferred_categories[0].key, "monitor");

    // Heavy gaming activity overtakes the work purpose
    for i in 3..10 {
        let parsed = parse("gaming desktop", &lexicon);
        session.record_query("gaming desktop", &parsed, i);
        prefs.learn(&parsed, i);
    }
    let insights = synthesize(&prefs, &session);
    assert_eq!(insights.search_patterns.dominant_purpose, "gaming");
    assert_eq!(insights.preferred_categories[0].key, "desktop");
    assert_eq!(insights.search_patterns.total_queries, 10);
}

#[test]
fn clear_empties_accessors_immediately() {
    let lexicon = Lexicon::default();
    let mut prefs = Preferences::default();
    let mut session = SessionContext::default();

    let text = "gaming laptop under 50000 from asus";
    let parsed = parse(text, &lexicon);
    session.record_query(text, &parsed, 1);
    prefs.learn(&parsed, 1);
    assert!(!prefs.is_empty());

    prefs.clear();
    let insights = synthesize(&prefs, &session);
    assert!(insights.preferred_categories.is_empty());
    assert!(insights.preferred_brands.is_empty());
    assert!(insights.recommended_budget.is_none());
    // Session context is independent of a preferences clear
    assert_eq!(insights.search_patterns.total_queries, 1);
}
