mod common;

use std::sync::Arc;

use airwaves_core::cache::ResultCache;
use airwaves_core::directory::{flag_emoji, DirectoryClient};
use airwaves_core::DirectoryError;
use airwaves_proto::config::Config;

use common::{refused_url, MockMirror};

fn client(config: &Config) -> DirectoryClient {
    let cache = Arc::new(ResultCache::from_config(&config.cache));
    DirectoryClient::new(&config.directory, cache).expect("reqwest client")
}

#[tokio::test]
async fn all_mirrors_down_is_unavailable() {
    let down = MockMirror::failing().await.unwrap();
    let refused_a = refused_url().await.unwrap();
    let refused_b = refused_url().await.unwrap();
    let config = common::config_for(&[&refused_a, &down.url, &refused_b]);
    let directory = client(&config);

    match directory.fetch_by_country("DE").await {
        Err(DirectoryError::Unavailable { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected Unavailable, got {:?}", other),
    }
    assert_eq!(down.hits(), 1);
    assert!(directory.preferred_mirror().is_none());

    // Failures are not cached.
    assert!(directory.fetch_by_country("DE").await.is_err());
    assert_eq!(down.hits(), 2);
}

#[tokio::test]
async fn falls_over_and_prefers_the_mirror_that_answered() {
    let down = MockMirror::failing().await.unwrap();
    let up = MockMirror::healthy().await.unwrap();
    let config = common::config_for(&[&down.url, &up.url]);
    let directory = client(&config);

    let countries = directory.fetch_countries().await.unwrap();
    assert_eq!(countries[0].code, "US");
    assert_eq!(down.hits(), 1);
    assert_eq!(up.hits(), 1);
    assert_eq!(directory.preferred_mirror(), Some(up.url.as_str()));

    // Next lookup goes straight to the preferred mirror.
    directory.fetch_tags(10).await.unwrap();
    assert_eq!(down.hits(), 1);
    assert_eq!(up.hits(), 2);
}

#[tokio::test]
async fn by_country_results_all_carry_that_flag() {
    let up = MockMirror::healthy().await.unwrap();
    let config = common::config_for(&[&up.url]);
    let directory = client(&config);

    for code in ["DE", "fr", "US", "JP"] {
        let stations = directory.fetch_by_country(code).await.unwrap();
        let upper = code.to_uppercase();
        let expected = flag_emoji(&upper).unwrap();
        assert_eq!(stations.len(), 3, "{}", code);
        for st in &stations {
            assert_eq!(st.country_flag.as_deref(), Some(expected.as_str()));
            assert_eq!(st.country_code.as_deref(), Some(upper.as_str()));
            assert!(st.is_playable());
            assert!(st.url.starts_with("https://stream.example/"));
        }
    }
}

#[tokio::test]
async fn cached_reads_skip_the_network_until_expiry() {
    let up = MockMirror::healthy().await.unwrap();
    let config = common::config_for(&[&up.url]);
    let directory = client(&config);

    let first = directory.fetch_by_tag("Jazz").await.unwrap();
    let second = directory.fetch_by_tag("jazz").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(up.hits(), 1);

    let mut expiring = common::config_for(&[&up.url]);
    expiring.cache.listing_ttl_secs = 0;
    expiring.cache.search_ttl_secs = 0;
    let directory = client(&expiring);
    directory.fetch_by_tag("jazz").await.unwrap();
    directory.fetch_by_tag("jazz").await.unwrap();
    assert_eq!(up.hits(), 3);
}

#[tokio::test]
async fn blank_search_does_not_hit_the_network() {
    let up = MockMirror::healthy().await.unwrap();
    let config = common::config_for(&[&up.url]);
    let directory = client(&config);

    assert!(directory.search("   ").await.unwrap().is_empty());
    assert_eq!(up.hits(), 0);

    let found = directory.search("rock").await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].genre.as_deref(), Some("rock"));
}
