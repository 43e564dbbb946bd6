//! End-to-end tests: StatsService over PubgProvider, a mock PUBG API and SQLite

#![cfg(feature = "cache-sqlite")]

use std::sync::Arc;

use serde_json::json;
use stats::{
    CacheKey, CacheStore, PubgConfig, PubgProvider, SeasonRequest, Settings, Shard, SqliteCache,
    StatsError, StatsProvider, StatsService,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn shroud_json() -> serde_json::Value {
    json!({
        "type": "player",
        "id": "account.d50fdc18fcad49c691d38466bed6f8fd",
        "attributes": {
            "name": "shroud",
            "shardId": "steam",
            "patchVersion": "",
            "titleId": "bluehole-pubg"
        },
        "relationships": {
            "assets": { "data": [] },
            "matches": {
                "data": [
                    { "type": "match", "id": "match-a" },
                    { "type": "match", "id": "match-b" },
                    { "type": "match", "id": "match-c" }
                ]
            }
        },
        "links": { "self": "https://api.pubg.com/shards/steam/players/account.d50fdc18fcad49c691d38466bed6f8fd" }
    })
}

fn service_for(server: &MockServer) -> (StatsService, Arc<SqliteCache>) {
    let provider =
        PubgProvider::new(PubgConfig::new("test_key").with_base_url(server.uri())).unwrap();
    let store = Arc::new(SqliteCache::in_memory().unwrap());
    (StatsService::new(Arc::new(provider), store.clone()), store)
}

#[tokio::test]
async fn test_search_shroud_on_steam_hits_provider_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shards/steam/players"))
        .and(query_param("filter[playerNames]", "shroud"))
        .and(header("Authorization", "Bearer test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [shroud_json()],
            "links": { "self": "https://api.pubg.com/shards/steam/players?filter[playerNames]=shroud" },
            "meta": {}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (service, store) = service_for(&mock_server);

    let first = service
        .search_player_by_name("shroud", Some(Shard::Steam))
        .await
        .unwrap();
    assert!(!first.from_cache);

    let key = CacheKey::player("account.d50fdc18fcad49c691d38466bed6f8fd", Shard::Steam);
    assert_eq!(first.record.key, key);
    let stored = store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.payload, shroud_json());
    assert_eq!(stored.name.as_deref(), Some("shroud"));

    let second = service
        .search_player_by_name("shroud", Some(Shard::Steam))
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.payload(), first.payload());
    assert_eq!(
        serde_json::to_string(second.payload()).unwrap(),
        serde_json::to_string(&shroud_json()).unwrap()
    );
}

#[tokio::test]
async fn test_current_season_stats_and_recent_matches() {
    let mock_server = MockServer::start().await;
    let player_id = "account.d50fdc18fcad49c691d38466bed6f8fd";

    Mock::given(method("GET"))
        .and(path(format!("/shards/steam/players/{player_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": shroud_json() })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shards/steam/seasons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "type": "season", "id": "division.bro.official.pc-2018-30",
                  "attributes": { "isCurrentSeason": false, "isOffseason": false } },
                { "type": "season", "id": "division.bro.official.pc-2018-31",
                  "attributes": { "isCurrentSeason": false, "isOffseason": false } }
            ]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/shards/steam/players/{player_id}/seasons/division.bro.official.pc-2018-31"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "type": "playerSeason",
                "attributes": { "gameModeStats": { "squad-fpp": { "wins": 12, "kills": 340 } } }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    for id in ["match-a", "match-c"] {
        Mock::given(method("GET"))
            .and(path(format!("/shards/steam/matches/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "type": "match", "id": id },
                "included": [ { "type": "roster", "id": format!("{id}-roster") } ]
            })))
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/shards/steam/matches/match-b"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&mock_server)
        .await;

    let (service, _store) = service_for(&mock_server);

    // No season flagged current: the greatest id wins
    let stats = service
        .get_season_stats(player_id, &SeasonRequest::Current, None)
        .await
        .unwrap();
    assert_eq!(stats.season_id, "division.bro.official.pc-2018-31");
    assert_eq!(
        stats.stats.payload()["attributes"]["gameModeStats"]["squad-fpp"]["wins"],
        json!(12)
    );
    let again = service
        .get_season_stats(player_id, &SeasonRequest::Current, None)
        .await
        .unwrap();
    assert!(again.stats.from_cache);

    let matches = service
        .get_recent_matches(player_id, None, None)
        .await
        .unwrap();
    let ids: Vec<&str> = matches
        .iter()
        .filter_map(|m| m["data"]["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["match-a", "match-c"]);
    assert_eq!(matches[0]["included"][0]["type"], json!("roster"));
}

#[tokio::test]
async fn test_force_sync_against_mock_api() {
    let mock_server = MockServer::start().await;
    let player_id = "account.d50fdc18fcad49c691d38466bed6f8fd";

    Mock::given(method("GET"))
        .and(path(format!("/shards/steam/players/{player_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": shroud_json() })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shards/steam/seasons"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "errors": [ { "title": "Service Unavailable", "detail": "try later" } ]
        })))
        .mount(&mock_server)
        .await;

    let (service, store) = service_for(&mock_server);

    let result = service.force_sync(player_id, None).await.unwrap();
    assert!(result.season_stats.is_none());
    assert!(
        store
            .latest_successful_sync(player_id)
            .await
            .unwrap()
            .is_some()
    );

    let err = service.force_sync(player_id, None).await.unwrap_err();
    assert!(matches!(err, StatsError::RateLimited { .. }));
}

#[tokio::test]
async fn test_service_from_settings() {
    let settings = Settings::from_lookup(|name| match name {
        "PUBG_OPEN_API_KEY" => Some("key".to_string()),
        "PUBG_DEFAULT_SHARD" => Some("xbox".to_string()),
        _ => None,
    })
    .unwrap();

    let service = StatsService::from_settings(&settings).unwrap();
    assert_eq!(service.provider().default_shard(), Shard::Xbox);
    assert_eq!(service.provider().name(), "PUBG");
}
