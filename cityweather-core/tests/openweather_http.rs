//! OpenWeatherProvider and WeatherService against a mock HTTP server.

use std::sync::Arc;

use cityweather_core::{
    Coordinates, Location, OpenWeatherProvider, Store, WeatherError, WeatherProvider,
    WeatherService,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn current_weather(lat: f64, lon: f64) -> serde_json::Value {
    serde_json::json!({
        "coord": {"lon": lon, "lat": lat},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
        "main": {"temp": 18.4, "feels_like": 17.9, "temp_min": 16.0, "temp_max": 20.1,
                 "pressure": 1016, "humidity": 62},
        "visibility": 10000,
        "wind": {"speed": 4.1, "deg": 250, "gust": 7.2},
        "clouds": {"all": 0},
        "dt": 1717405200,
        "sys": {"country": "FR", "sunrise": 1717386000, "sunset": 1717443600},
        "timezone": 7200,
        "id": 2988507,
        "name": "Paris"
    })
}

fn provider_for(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::new(
        "test-key".into(),
        format!("{}/data/2.5/weather", server.uri()),
        format!("{}/geo/1.0/", server.uri()),
    )
    .expect("client builds")
}

#[tokio::test]
async fn weather_request_carries_coordinates_key_and_units() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "48.85"))
        .and(query_param("lon", "2.35"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather(48.85, 2.35)))
        .expect(1)
        .mount(&server)
        .await;

    let reading = provider_for(&server)
        .fetch_weather(Coordinates::new(48.85, 2.35))
        .await
        .expect("weather");

    assert_eq!(reading.city_name, "Paris");
    assert_eq!(reading.country.as_deref(), Some("FR"));
    assert_eq!(reading.wind_gust, Some(7.2));
    assert_eq!(reading.condition.map(|c| c.icon), Some("01d".to_string()));
}

#[tokio::test]
async fn non_success_status_is_an_api_error_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"cod":401,"message":"Invalid API key"}"#))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .fetch_weather(Coordinates::new(1.0, 2.0))
        .await
        .unwrap_err();

    match err {
        WeatherError::Api { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .fetch_weather(Coordinates::new(1.0, 2.0))
        .await
        .unwrap_err();

    assert!(matches!(err, WeatherError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn direct_geocoding_decodes_cities() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Paris"))
        .and(query_param("limit", "1"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "Paris", "local_names": {"fr": "Paris"}, "lat": 48.8589, "lon": 2.32, "country": "FR", "state": "Ile-de-France"}
        ])))
        .mount(&server)
        .await;

    let cities = provider_for(&server).fetch_geocoding("Paris", 1).await.expect("cities");

    assert_eq!(cities.len(), 1);
    assert_eq!(cities[0].name, "Paris");
    assert_eq!(cities[0].country, "FR");
    assert_eq!(cities[0].id, 0);
}

#[tokio::test]
async fn empty_geocoding_answer_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let err = provider_for(&server).fetch_geocoding("Zzzzqx", 1).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn reverse_geocoding_hits_reverse_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("lat", "51.51"))
        .and(query_param("lon", "-0.13"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "London", "lat": 51.5073, "lon": -0.1276, "country": "GB"},
            {"name": "City of Westminster", "lat": 51.4973, "lon": -0.1372, "country": "GB"}
        ])))
        .mount(&server)
        .await;

    let cities = provider_for(&server)
        .fetch_reverse_geocoding(Coordinates::new(51.51, -0.13), 5)
        .await
        .expect("cities");

    assert_eq!(cities.len(), 2);
    assert_eq!(cities[0].name, "London");
}

#[tokio::test]
async fn service_caches_success_and_never_caches_failure() {
    let server = MockServer::start().await;
    let store = Arc::new(Store::in_memory().expect("store"));
    let service = WeatherService::new(Arc::clone(&store), Box::new(provider_for(&server)));
    let paris = Coordinates::new(48.85, 2.35);

    let failing = Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount_as_scoped(&server)
        .await;

    let err = service.get_weather(&Location::at(paris)).await.unwrap_err();
    assert!(matches!(err, WeatherError::Api { status: 500, .. }));
    assert!(
        store
            .get_fresh_weather(paris, WeatherService::cache_duration())
            .unwrap_err()
            .is_not_found()
    );
    drop(failing);

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather(48.85, 2.35)))
        .expect(1)
        .mount(&server)
        .await;

    let first = service.get_weather(&Location::at(paris)).await.expect("fetched");
    let nearby = Coordinates::new(48.855, 2.345);
    let second = service.get_weather(&Location::at(nearby)).await.expect("cached");

    assert_eq!(first, second);
}

#[tokio::test]
async fn unknown_city_name_falls_back_to_geocoding() {
    let server = MockServer::start().await;
    let store = Arc::new(Store::in_memory().expect("store"));
    let service = WeatherService::new(store, Box::new(provider_for(&server)));

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Paris"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "Paris", "lat": 48.85, "lon": 2.35, "country": "FR"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let cities = service.resolve_city("Paris").await.expect("resolved remotely");
    assert_eq!(cities[0].name, "Paris");
}
