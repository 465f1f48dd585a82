use aiaaic_extract::{
    extract, is_blocked, is_own_domain, Extractor, MetaDescriptionStrategy, BOILERPLATE_PHRASES,
};

const PAGE: &str = include_str!("fixtures/incident_page.html");
const PAGE_URL: &str = "https://www.aiaaic.org/aiaaic-repository/ai-algorithmic-and-automation-incidents/police-facial-recognition-misidentifies-shop-owner";

#[test]
fn repeated_extraction_is_identical() {
    let first = extract(PAGE, PAGE_URL);
    for _ in 0..5 {
        assert_eq!(extract(PAGE, PAGE_URL), first);
    }
}

#[test]
fn description_comes_from_narrative_section() {
    let fields = extract(PAGE, PAGE_URL);
    let description = fields.description.expect("description");

    assert!(description.starts_with("**What happened**\n\nA live facial recognition van"));
    assert!(description.contains("**Response**"));
    assert!(description.contains("released him without charge."));
    assert!(!description.contains("FaceMatch Pro"));
}

#[test]
fn description_has_no_boilerplate() {
    let description = extract(PAGE, PAGE_URL).description.expect("description");
    let lower = description.to_lowercase();
    for phrase in BOILERPLATE_PHRASES {
        assert!(!lower.contains(&phrase.to_lowercase()), "found {phrase:?}");
    }
}

#[test]
fn source_links_exclude_blocked_and_own_domain() {
    let fields = extract(PAGE, PAGE_URL);
    let urls: Vec<&str> = fields.source_links.iter().map(|l| l.url.as_str()).collect();

    assert_eq!(
        urls,
        vec![
            "https://www.theguardian.com/technology/2023/mar/10/police-facial-recognition",
            "https://www.bbc.co.uk/news/technology-64912345",
            "https://www.ft.com/content/police-face-scans",
            "https://www.wired.com/story/facial-recognition-van-trial/",
        ]
    );
    for url in &urls {
        assert!(!is_blocked(url));
        assert!(!is_own_domain(url));
    }
}

#[test]
fn source_titles_are_cleaned() {
    let fields = extract(PAGE, PAGE_URL);
    assert_eq!(
        fields.source_links[0].title.as_deref(),
        Some("Police facial recognition wrongly flags shop owner")
    );
    // Link text that is itself a URL.
    assert!(fields.source_links[1].title.is_none());
    // Plain-text URLs never carry a title.
    assert!(fields.source_links[2].title.is_none());
}

#[test]
fn related_incidents_skip_self_reference() {
    let fields = extract(PAGE, PAGE_URL);

    assert_eq!(fields.related_incidents.len(), 2);
    assert!(fields
        .related_incidents
        .iter()
        .all(|r| !r.url.trim_end_matches('/').ends_with("misidentifies-shop-owner")));
    assert_eq!(
        fields.related_incidents[0].url,
        "https://www.aiaaic.org/aiaaic-repository/ai-algorithmic-and-automation-incidents/met-police-live-facial-recognition-trial"
    );
    assert_eq!(
        fields.related_incidents[0].title,
        "Met Police live facial recognition trial"
    );
    // Trailing-slash duplicate collapses; too-short titles are dropped.
    assert_eq!(
        fields.related_incidents[1].title,
        "South Wales Police face scans ruled unlawful"
    );
}

#[test]
fn dates_are_read_from_page_text() {
    let fields = extract(PAGE, PAGE_URL);
    assert_eq!(fields.occurred.as_deref(), Some("March 2023"));
    assert_eq!(fields.page_published.as_deref(), Some("May 2023"));
}

#[test]
fn meta_only_page_uses_og_description() {
    let html = r#"<html><head>
        <meta property="og:description" content="An insurance pricing model charged higher premiums in minority postcodes">
        </head><body><p>Short.</p></body></html>"#;
    let fields = extract(html, PAGE_URL);
    assert_eq!(
        fields.description.as_deref(),
        Some("An insurance pricing model charged higher premiums in minority postcodes")
    );
    assert!(fields.source_links.is_empty());
}

#[test]
fn custom_chain_can_be_meta_only() {
    let extractor = Extractor::empty().with_strategy(MetaDescriptionStrategy);
    let fields = extractor.extract(PAGE, PAGE_URL);
    assert_eq!(
        fields.description.as_deref(),
        Some("Police facial recognition misidentifies shop owner in a busy high street")
    );
}

#[test]
fn malformed_markup_does_not_panic() {
    let fields = extract("<section><p>unclosed <b>bold <a href='http", PAGE_URL);
    assert!(fields.description.is_none());
}
