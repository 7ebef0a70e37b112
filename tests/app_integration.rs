use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fxnotify::core::config::{AppConfig, ProviderConfig};
use fxnotify::core::error::RateError;
use fxnotify::core::{Delivery, ManualClock, RateProvider, Storage, Trend, UserId};
use fxnotify::engine::RateEngine;
use fxnotify::providers::RetryPolicy;
use fxnotify::scheduler::{FireOutcome, Scheduler};
use fxnotify::store::{DiskStorage, MemoryStorage};
use fxnotify::{App, AppCommand, UserAction};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::info;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DAILY_JSON: &str = r#"{
    "Date": "2025-12-06T11:30:00+03:00",
    "PreviousDate": "2025-12-05T11:30:00+03:00",
    "Timestamp": "2025-12-05T20:00:00+03:00",
    "Valute": {
        "USD": {"ID": "R01235", "CharCode": "USD", "Nominal": 1, "Value": 78.2284, "Previous": 77.9},
        "TRY": {"ID": "R01700J", "CharCode": "TRY", "Nominal": 10, "Value": 18.3962, "Previous": 18.4}
    }
}"#;

const ARCHIVE_JSON: &str = r#"{
    "Date": "2025-12-05T11:30:00+03:00",
    "Valute": {
        "USD": {"CharCode": "USD", "Nominal": 1, "Value": 77.9}
    }
}"#;

const DAILY_XML: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs Date="06.12.2025" name="Foreign Currency Market">
    <Valute ID="R01239">
        <NumCode>978</NumCode>
        <CharCode>EUR</CharCode>
        <Nominal>1</Nominal>
        <Name>Euro</Name>
        <Value>91,0451</Value>
    </Valute>
</ValCurs>"#;

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 6, 6, 0, 0).unwrap()
}

mod test_utils {
    use super::*;

    pub async fn json_feed(today: Option<&str>, archive: Option<&str>) -> MockServer {
        let server = MockServer::start().await;
        let respond = |body: Option<&str>| match body {
            Some(body) => ResponseTemplate::new(200).set_body_string(body),
            None => ResponseTemplate::new(503),
        };
        Mock::given(method("GET"))
            .and(path("/daily_json.js"))
            .respond_with(respond(today))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/archive/2025/12/05/daily_json.js"))
            .respond_with(respond(archive))
            .mount(&server)
            .await;
        server
    }

    pub async fn xml_feed(today: Option<&str>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scripts/XML_daily.asp"))
            .and(query_param("date_req", "05/12/2025"))
            .respond_with(ResponseTemplate::new(503))
            .with_priority(1)
            .mount(&server)
            .await;
        let today = match today {
            Some(body) => ResponseTemplate::new(200).set_body_string(body),
            None => ResponseTemplate::new(503),
        };
        Mock::given(method("GET"))
            .and(path("/scripts/XML_daily.asp"))
            .respond_with(today)
            .mount(&server)
            .await;
        server
    }

    pub fn config(json: &MockServer, xml: &MockServer, geo: Option<&MockServer>) -> AppConfig {
        let mut config = AppConfig::default();
        config.providers.cbr_json = ProviderConfig {
            base_url: json.uri(),
        };
        config.providers.cbr_xml = ProviderConfig { base_url: xml.uri() };
        if let Some(geo) = geo {
            config.providers.nominatim = ProviderConfig { base_url: geo.uri() };
            config.providers.open_meteo_geocoding = ProviderConfig { base_url: geo.uri() };
            config.providers.open_meteo_timezone = ProviderConfig { base_url: geo.uri() };
        }
        config
    }

    pub fn engine(config: &AppConfig, storage: Arc<dyn Storage>) -> RateEngine {
        RateEngine::from_config(config, storage, Arc::new(ManualClock::new(morning())))
            .with_policy(RetryPolicy::immediate(3))
    }

    #[derive(Default)]
    pub struct Inbox {
        pub messages: Mutex<Vec<(UserId, String)>>,
    }

    #[async_trait]
    impl Delivery for Inbox {
        async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push((user_id, text.to_string()));
            Ok(())
        }
    }
}

#[test_log::test(tokio::test)]
async fn test_primary_feed_today() {
    let json = test_utils::json_feed(Some(DAILY_JSON), None).await;
    let xml = test_utils::xml_feed(None).await;
    let storage = Arc::new(MemoryStorage::new());
    let engine = test_utils::engine(&test_utils::config(&json, &xml, None), storage.clone());

    let quote = engine.fetch("try").await.unwrap();
    info!(?quote, "Fetched quote");
    assert_eq!(quote.currency_code, "TRY");
    assert_eq!(quote.rate, dec!(1.83962));
    assert_eq!(quote.as_of_date, NaiveDate::from_ymd_opt(2025, 12, 6).unwrap());
    assert!(!quote.stale);
    assert_eq!(quote.trend, Trend::Flat);

    let cached = storage.get_cached_rate("TRY").await.unwrap().unwrap();
    assert_eq!(cached.rate, dec!(1.83962));
    assert_eq!(cached.observed_at, morning());
}

#[test_log::test(tokio::test)]
async fn test_archive_fallback_is_stale_and_trends_against_cache() {
    let json = test_utils::json_feed(None, Some(ARCHIVE_JSON)).await;
    let xml = test_utils::xml_feed(Some(DAILY_XML)).await;
    let storage = Arc::new(MemoryStorage::new());
    let engine = test_utils::engine(&test_utils::config(&json, &xml, None), storage.clone());

    storage
        .save_rate(&fxnotify::core::RateRecord {
            currency_code: "USD".into(),
            rate: dec!(78.5),
            as_of_date: NaiveDate::from_ymd_opt(2025, 12, 4).unwrap(),
            observed_at: morning() - chrono::Duration::days(1),
        })
        .await
        .unwrap();

    let quote = engine.fetch("USD").await.unwrap();
    assert!(quote.stale);
    assert_eq!(quote.rate, dec!(77.9));
    assert_eq!(quote.as_of_date, NaiveDate::from_ymd_opt(2025, 12, 5).unwrap());
    assert_eq!(quote.trend, Trend::Down);
    assert_eq!(quote.source, "cbr-json-archive");

    let today_requests = json
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/daily_json.js")
        .count();
    assert_eq!(today_requests, 3);
}

#[test_log::test(tokio::test)]
async fn test_secondary_feed_used_when_currency_missing_from_primary() {
    let json = test_utils::json_feed(Some(DAILY_JSON), Some(ARCHIVE_JSON)).await;
    let xml = test_utils::xml_feed(Some(DAILY_XML)).await;
    let engine = test_utils::engine(
        &test_utils::config(&json, &xml, None),
        Arc::new(MemoryStorage::new()),
    );

    let quote = engine.fetch("EUR").await.unwrap();
    assert!(!quote.stale);
    assert_eq!(quote.rate, dec!(91.0451));
    assert_eq!(quote.source, "cbr-xml");
    // Absent currency is not retried.
    assert_eq!(json.received_requests().await.unwrap().len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_total_outage_skips_notification() {
    let json = test_utils::json_feed(None, None).await;
    let xml = test_utils::xml_feed(None).await;
    let storage = Arc::new(MemoryStorage::new());
    let engine = test_utils::engine(&test_utils::config(&json, &xml, None), storage.clone());

    let err = engine.fetch("USD").await.unwrap_err();
    assert!(matches!(err, RateError::AcquisitionFailed { ref currency, .. } if currency == "USD"));
    assert_eq!(json.received_requests().await.unwrap().len(), 6);
    assert_eq!(xml.received_requests().await.unwrap().len(), 6);

    let inbox = Arc::new(test_utils::Inbox::default());
    let scheduler = Scheduler::new(
        storage.clone(),
        Arc::new(engine),
        inbox.clone(),
        Arc::new(ManualClock::new(morning())),
    );
    let mut settings = fxnotify::core::UserSettings::new(7);
    settings.set_timezone(180);
    settings.set_currency("USD").unwrap();
    settings.set_notification_time(9, 0).unwrap();
    storage.save_user_settings(&settings).await.unwrap();
    scheduler.reload_all().await.unwrap();

    let trigger = scheduler.trigger_for(7).unwrap();
    assert_eq!(scheduler.fire(trigger).await, FireOutcome::Skipped);
    assert!(inbox.messages.lock().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_onboarding_through_cli_then_daily_fire() {
    let json = test_utils::json_feed(Some(DAILY_JSON), None).await;
    let xml = test_utils::xml_feed(None).await;
    let geo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Moscow"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"lat": "55.7505412", "lon": "37.6174782", "display_name": "Moscow, Russia"}]"#,
        ))
        .expect(1)
        .mount(&geo)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/timezone"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"timezone": "Europe/Moscow", "utc_offset_seconds": 10800}"#),
        )
        .expect(1)
        .mount(&geo)
        .await;

    let data_dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(DiskStorage::open(data_dir.path()).unwrap());
    let clock = Arc::new(ManualClock::new(morning() - chrono::Duration::hours(1)));
    let app = App::new(
        test_utils::config(&json, &xml, Some(&geo)),
        storage.clone(),
        clock.clone(),
    );

    for action in [
        UserAction::City("Moscow".into()),
        UserAction::Currency("usd".into()),
        UserAction::Time("09:00".into()),
    ] {
        fxnotify::execute(
            &app,
            AppCommand::User {
                user_id: 42,
                action,
            },
        )
        .await
        .unwrap();
    }

    let settings = storage.get_user_settings(42).await.unwrap().unwrap();
    assert_eq!(settings.utc_offset_minutes, Some(180));
    assert_eq!((settings.utc_hour, settings.utc_minute), (Some(6), Some(0)));
    assert!(settings.is_schedulable());

    // Resolved again from the persistent tier; the mocks expect one call each.
    let location = app.resolver().resolve("moscow").await.unwrap();
    assert_eq!(location.utc_offset_minutes, 180);

    let inbox = Arc::new(test_utils::Inbox::default());
    let scheduler = Scheduler::new(
        storage.clone(),
        Arc::new(app.rate_engine().with_policy(RetryPolicy::immediate(1))),
        inbox.clone(),
        clock.clone(),
    );
    assert_eq!(scheduler.reload_all().await.unwrap(), 1);
    assert_eq!(scheduler.next_fire_for(42), Some(morning()));

    clock.set(morning());
    let trigger = scheduler.trigger_for(42).unwrap();
    assert_eq!(scheduler.fire(trigger).await, FireOutcome::Delivered);

    let messages = inbox.messages.lock().unwrap().clone();
    assert_eq!(
        messages,
        vec![(42, "USD → 78.23 ₽ =\nDate: 2025-12-06".to_string())]
    );
}

#[test_log::test(tokio::test)]
async fn test_run_command_with_config_file() {
    let json = test_utils::json_feed(Some(DAILY_JSON), None).await;
    let xml = test_utils::xml_feed(None).await;
    let data_dir = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    let config_path = config_dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "providers:\n  cbr_json:\n    base_url: \"{}\"\n  cbr_xml:\n    base_url: \"{}\"\ndata_path: \"{}\"\n",
            json.uri(),
            xml.uri(),
            data_dir.path().display()
        ),
    )
    .unwrap();

    fxnotify::run_command(
        AppCommand::Rate {
            currencies: vec!["USD".into()],
        },
        config_path.to_str(),
    )
    .await
    .unwrap();

    let storage = DiskStorage::open(&data_dir.path().join("store")).unwrap();
    let cached = storage.get_cached_rate("USD").await.unwrap().unwrap();
    assert_eq!(cached.rate, dec!(78.2284));
}

#[test_log::test(tokio::test)]
async fn test_invalid_user_input_is_rejected_without_saving() {
    let json = test_utils::json_feed(None, None).await;
    let xml = test_utils::xml_feed(None).await;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let app = App::new(
        test_utils::config(&json, &xml, None),
        storage.clone(),
        Arc::new(ManualClock::new(morning())),
    );

    let time_without_zone = fxnotify::execute(
        &app,
        AppCommand::User {
            user_id: 5,
            action: UserAction::Time("09:00".into()),
        },
    )
    .await;
    assert!(time_without_zone.is_err());

    let bad_offset = fxnotify::execute(
        &app,
        AppCommand::User {
            user_id: 5,
            action: UserAction::Timezone("Mars+3".into()),
        },
    )
    .await;
    assert!(bad_offset.is_err());
    assert!(storage.get_user_settings(5).await.unwrap().is_none());
}

#[test_log::test(tokio::test)]
async fn test_settings_changes_reach_the_live_scheduler() {
    let json = test_utils::json_feed(Some(DAILY_JSON), None).await;
    let xml = test_utils::xml_feed(None).await;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let inbox = Arc::new(test_utils::Inbox::default());
    let clock = Arc::new(ManualClock::new(morning() - chrono::Duration::hours(1)));
    let app = App::with_delivery(
        test_utils::config(&json, &xml, None),
        storage.clone(),
        clock.clone(),
        inbox.clone(),
    );

    for action in [
        UserAction::Timezone("UTC+3".into()),
        UserAction::Currency("usd".into()),
        UserAction::Time("09:00".into()),
    ] {
        fxnotify::execute(&app, AppCommand::User { user_id: 42, action })
            .await
            .unwrap();
    }
    let trigger = app.scheduler().trigger_for(42).unwrap();
    assert_eq!((trigger.utc_hour, trigger.utc_minute), (6, 0));
    assert_eq!(app.scheduler().reload_all().await.unwrap(), 1);

    fxnotify::execute(
        &app,
        AppCommand::User {
            user_id: 42,
            action: UserAction::Disable,
        },
    )
    .await
    .unwrap();
    assert!(app.scheduler().trigger_for(42).is_none());
    assert!(app.scheduler().is_empty());

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    for line in [
        "user 42 enable",
        "user 42 time 10:30",
        "user 42 currency try",
        "frobnicate",
        "user 42 time 25:00",
    ] {
        tx.send(line.to_string()).await.unwrap();
    }
    drop(tx);
    fxnotify::cli::run::serve_commands(&app, rx).await;

    let trigger = app.scheduler().trigger_for(42).unwrap();
    assert_eq!((trigger.utc_hour, trigger.utc_minute), (7, 30));
    assert_eq!(trigger.currency_code, "TRY");
    assert_eq!(
        app.scheduler().next_fire_for(42),
        Some(morning() + chrono::Duration::minutes(90))
    );
    let settings = storage.get_user_settings(42).await.unwrap().unwrap();
    assert_eq!((settings.local_hour, settings.local_minute), (Some(10), Some(30)));

    clock.set(morning() + chrono::Duration::minutes(90));
    assert_eq!(app.scheduler().fire(trigger).await, FireOutcome::Delivered);
    let messages = inbox.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].1.starts_with("TRY → 1.84 ₽"));
}
