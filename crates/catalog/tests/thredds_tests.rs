//! THREDDS client tests against an in-process HTTP server.

use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use catalog::{CatalogClient, CatalogError, ChannelFeed, ThreddsCatalog, ThreddsConfig};
use chrono::{TimeZone, Utc};
use test_utils::{catalog_xml, entry_name, raw_counts, tokens, ChannelFileFixture};

const DIR: &str = "satellite/goes/east/Channel01/current";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client() -> ThreddsCatalog {
    ThreddsCatalog::new(ThreddsConfig {
        max_retries: 0,
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

async fn file_route(Path(path): Path<String>) -> (StatusCode, Vec<u8>) {
    if !path.ends_with(".nc") {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    let mut fx = ChannelFileFixture::new(
        "Sectorized_CMI",
        raw_counts(2, 3, 4096, &[5]),
        vec![-1000.0, 0.0, 1000.0],
        vec![40000.0, 39000.0],
    );
    fx.start_date_time = Some(tokens::START_1801.to_string());
    (StatusCode::OK, fx.to_bytes())
}

fn thredds_app() -> Router {
    let names = [
        entry_name(1, tokens::SCAN_1801.replace("1801", "1756").as_str()),
        entry_name(1, tokens::SCAN_1801),
    ];
    let xml = catalog_xml(&[names[0].as_str(), names[1].as_str()], DIR);

    Router::new()
        .route(
            &format!("/thredds/catalog/{}/catalog.xml", DIR),
            get(move || async move { xml }),
        )
        .route("/thredds/fileServer/*path", get(file_route))
}

#[tokio::test]
async fn test_list_newest_picks_last_entry() {
    let base = serve(thredds_app()).await;
    let feed = ChannelFeed::new("C01", format!("{}/thredds/catalog/{}/catalog.xml", base, DIR));

    let handle = client().list_newest(&feed).await.unwrap();
    assert_eq!(handle.channel, "C01");
    assert_eq!(handle.token, tokens::SCAN_1801);
    assert_eq!(handle.name, entry_name(1, tokens::SCAN_1801));
    assert_eq!(
        handle.data_url,
        format!("{}/thredds/fileServer/{}/{}", base, DIR, handle.name)
    );
}

#[tokio::test]
async fn test_fetch_unpacks_channel() {
    let base = serve(thredds_app()).await;
    let feed = ChannelFeed::new("C01", format!("{}/thredds/catalog/{}/catalog.xml", base, DIR));
    let client = client();

    let handle = client.list_newest(&feed).await.unwrap();
    let dataset = client.fetch(&handle).await.unwrap();

    assert_eq!((dataset.rows, dataset.cols), (2, 3));
    assert_eq!(dataset.x, vec![-1000.0, 0.0, 1000.0]);
    assert_eq!(dataset.y, vec![40000.0, 39000.0]);
    assert_eq!(dataset.sub_satellite_lon, -75.0);
    assert!(dataset.values[5].is_nan());
    assert!(dataset.values[..5].iter().all(|v| v.is_finite() && *v > 0.0));
    assert_eq!(
        dataset.valid_time,
        Utc.with_ymd_and_hms(2023, 3, 27, 18, 1, 17).unwrap()
    );
}

#[tokio::test]
async fn test_missing_catalog_is_status_error() {
    let base = serve(thredds_app()).await;
    let feed = ChannelFeed::new("C02", format!("{}/thredds/catalog/nowhere/catalog.xml", base));

    let err = client().list_newest(&feed).await.unwrap_err();
    assert!(matches!(err, CatalogError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_empty_catalog() {
    let xml = catalog_xml(&[], DIR);
    let base = serve(Router::new().route("/catalog.xml", get(move || async move { xml }))).await;
    let feed = ChannelFeed::new("C03", format!("{}/catalog.xml", base));

    let err = client().list_newest(&feed).await.unwrap_err();
    assert!(matches!(err, CatalogError::EmptyCatalog(_)));
}
