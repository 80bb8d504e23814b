//! Routes for serving API endpoints.

use crate::{
    Api, Backend, Error,
    render::{Body as RenderedBody, Rendered},
};
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{
        HeaderMap, HeaderValue, Method,
        header::{ACCEPT, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::convert::Infallible;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(%status, "{self}");
        } else {
            tracing::debug!(%status, "{self}");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            RenderedBody::Json(value) => match serde_json::to_vec(&value) {
                Ok(bytes) => Body::from(bytes).into_response(),
                Err(err) => return Error::from(err).into_response(),
            },
            RenderedBody::Chunks(chunks) => Body::from_stream(futures_util::stream::iter(
                chunks.into_iter().map(Ok::<_, Infallible>),
            ))
            .into_response(),
            RenderedBody::Html(html) => Body::from(html).into_response(),
        };
        let headers = response.headers_mut();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Some(disposition) = self.disposition {
            let _ = headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static(disposition));
        }
        response
    }
}

/// Creates an [axum::Router] from an [Api].
///
/// # Examples
///
/// ```
/// use pgfeatures_server::{Api, MemoryBackend, routes};
///
/// let api = Api::new(MemoryBackend::new(), "http://pgfeatures.test").unwrap();
/// let router = routes::from_api(api);
/// ```
pub fn from_api<B: Backend>(api: Api<B>) -> Router {
    let cors = cors_layer(&api.config.cors_origins);
    let cache_control = api
        .config
        .cache_control
        .as_deref()
        .and_then(|value| match HeaderValue::from_str(value) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("ignoring invalid cache control value {value}: {err}");
                None
            }
        });
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/collections/{collection_id}", get(collection))
        .route("/collections/{collection_id}/items", get(items))
        .route("/collections/{collection_id}/items/{item_id}", get(item))
        .route("/search", get(get_search).post(post_search))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(api);
    if let Some(cache_control) = cache_control {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            cache_control,
        ));
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.iter().any(|origin| origin == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(origin) => Some(origin),
                Err(err) => {
                    tracing::warn!("ignoring invalid cors origin {origin}: {err}");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

fn accept(headers: &HeaderMap) -> Option<&str> {
    headers.get(ACCEPT).and_then(|value| value.to_str().ok())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ping": "pong!" }))
}

async fn collection<B: Backend>(
    State(api): State<Api<B>>,
    Path(collection_id): Path<String>,
) -> Result<Response, Error> {
    let collection = api.collection(&collection_id).await?;
    Ok(Json(collection).into_response())
}

async fn items<B: Backend>(
    State(api): State<Api<B>>,
    Path(collection_id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Rendered, Error> {
    api.items(&collection_id, query.as_deref(), accept(&headers))
        .await
}

async fn item<B: Backend>(
    State(api): State<Api<B>>,
    Path((collection_id, item_id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Rendered, Error> {
    api.item(&collection_id, &item_id, query.as_deref(), accept(&headers))
        .await
}

async fn get_search<B: Backend>(
    State(api): State<Api<B>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Rendered, Error> {
    api.search_get(query.as_deref(), accept(&headers)).await
}

async fn post_search<B: Backend>(
    State(api): State<Api<B>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Rendered, Error> {
    api.search_post(&body, query.as_deref(), accept(&headers))
        .await
}

#[cfg(test)]
mod tests {
    use crate::{Api, Config, MemoryBackend};
    use axum::{
        Router,
        body::Body,
        http::{Request, Response, StatusCode, header},
    };
    use pgfeatures::CollectionDescriptor;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use url::{Url, form_urlencoded};

    const ROOT: &str = "http://pgfeatures.test";

    fn router(config: Config) -> Router {
        let api = Api::new(backend(), ROOT).unwrap().with_config(config);
        crate::routes::from_api(api)
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        let mut collection = CollectionDescriptor::new("noaa");
        collection.title = Some("NOAA Emergency Response Imagery".to_string());
        backend.add_collection(collection).unwrap();
        let names = ["X", "Y", "Z", "W", "V"];
        backend
            .add_items(names.iter().enumerate().map(|(i, name)| {
                json!({
                    "type": "Feature",
                    "id": format!("item-{i}"),
                    "collection": "noaa",
                    "geometry": {"type": "Point", "coordinates": [-105.0 + i as f64, 40.0]},
                    "properties": {
                        "datetime": format!("2024-01-0{}T00:00:00Z", i + 1),
                        "name": name,
                        "eo:cloud_cover": i * 10,
                    },
                })
            }))
            .unwrap();
        backend
    }

    async fn get(uri: &str) -> Response<Body> {
        get_with_accept(uri, None).await
    }

    async fn get_with_accept(uri: &str, accept: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        router(Config::default())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(uri: &str, body: Value) -> Response<Body> {
        router(Config::default())
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn json(response: Response<Body>) -> Value {
        serde_json::from_str(&text(response).await).unwrap()
    }

    fn ids(value: &Value) -> Vec<String> {
        value["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|feature| feature["id"].as_str().unwrap().to_string())
            .collect()
    }

    fn link<'a>(value: &'a Value, rel: &str) -> Option<&'a Value> {
        value["links"]
            .as_array()
            .unwrap()
            .iter()
            .find(|link| link["rel"] == rel)
    }

    fn path_and_query(href: &str) -> String {
        let url = Url::parse(href).unwrap();
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }

    #[tokio::test]
    async fn healthz() {
        let response = get("/healthz").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, json!({"ping": "pong!"}));
    }

    #[tokio::test]
    async fn collection() {
        let response = get("/collections/noaa").await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value["title"], "NOAA Emergency Response Imagery");

        let response = get("/collections/not-a-collection").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json(response).await,
            json!({"detail": "Collection 'not-a-collection' not found."})
        );
    }

    #[tokio::test]
    async fn items_with_cql2_json_filter() {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("filter-lang", "cql2-json")
            .append_pair(
                "filter",
                r#"{"op":"=","args":[{"property":"name"},"X"]}"#,
            )
            .finish();
        let response = get(&format!("/collections/noaa/items?{query}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/geo+json"
        );
        let value = json(response).await;
        assert_eq!(value["numberMatched"], 1);
        assert_eq!(ids(&value), vec!["item-0"]);
        assert_eq!(value["id"], "noaa");
        assert_eq!(value["title"], "NOAA Emergency Response Imagery");
    }

    #[tokio::test]
    async fn items_with_cql2_text_filter() {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("filter", "name = 'Y'")
            .finish();
        let value = json(get(&format!("/collections/noaa/items?{query}")).await).await;
        assert_eq!(ids(&value), vec!["item-1"]);
    }

    #[tokio::test]
    async fn empty_properties() {
        let response = get("/collections/noaa/items?properties=").await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 5);
        for feature in features {
            assert!(feature.get("properties").is_none());
        }
    }

    #[tokio::test]
    async fn some_properties() {
        let value = json(get("/collections/noaa/items?properties=name").await).await;
        assert_eq!(value["features"][0]["properties"], json!({"name": "V"}));
    }

    #[tokio::test]
    async fn limit_ceiling() {
        let response = router(Config {
            max_limit: 3,
            ..Default::default()
        })
        .oneshot(
            Request::builder()
                .uri("/collections/noaa/items?limit=4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn validation_errors() {
        for uri in [
            "/search?bbox=10,0,0,10",
            "/search?bbox=-190,0,0,10",
            "/search?bbox=1,2,3",
            "/search?datetime=../..",
            "/search?datetime=2024-02-01T00:00:00Z/2024-01-01T00:00:00Z",
            "/search?limit=10001",
            "/search?limit=0",
            "/search?filter-lang=xml&filter=a",
            "/search?filter=name%20%3D%20",
            "/search?filter=name",
            "/collections/noaa/items?filter=name%20%3D%20&filter-lang=cql2-text",
            "/search?f=xml",
            "/search?bbox=0,0,1,1&intersects=%7B%22type%22%3A%22Point%22%2C%22coordinates%22%3A%5B0%2C0%5D%7D",
        ] {
            let response = get(uri).await;
            assert_eq!(
                response.status(),
                StatusCode::UNPROCESSABLE_ENTITY,
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_collection_before_invalid_query() {
        for uri in [
            "/collections/nope/items?f=bogus",
            "/collections/nope/items?limit=0",
            "/collections/nope/items?filter=name%20%3D%20",
            "/collections/nope/items/item-0?f=bogus",
        ] {
            let response = get(uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn path_collection_overrides_collections() {
        let backend = backend();
        backend
            .add_collection(CollectionDescriptor::new("other"))
            .unwrap();
        backend
            .add_item(json!({
                "type": "Feature",
                "id": "other-item",
                "collection": "other",
                "geometry": {"type": "Point", "coordinates": [-105.0, 40.0]},
                "properties": {"datetime": "2024-01-01T00:00:00Z"},
            }))
            .unwrap();
        let router = crate::routes::from_api(Api::new(backend, ROOT).unwrap());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/collections/noaa/items?collections=other")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value["numberMatched"], 5);
        assert!(
            value["features"]
                .as_array()
                .unwrap()
                .iter()
                .all(|feature| feature["collection"] == "noaa")
        );
    }

    #[tokio::test]
    async fn three_dimensional_bbox() {
        let response = get("/collections/noaa/items?bbox=-106,39,0,-103.5,41,100").await;
        assert_eq!(response.status(), StatusCode::OK);
        let mut ids = ids(&json(response).await);
        ids.sort();
        assert_eq!(ids, vec!["item-0", "item-1"]);
    }

    #[tokio::test]
    async fn half_open_datetime() {
        let response = get("/search?datetime=2024-01-04T00:00:00Z/..").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ids(&json(response).await), vec!["item-4", "item-3"]);
        let response = get("/search?datetime=../2024-01-01T00:00:00Z").await;
        assert_eq!(ids(&json(response).await), vec!["item-0"]);
    }

    #[tokio::test]
    async fn unknown_sort_field() {
        let response = get("/search?sortby=-not-a-field").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["numberMatched"], 5);
    }

    #[tokio::test]
    async fn sortby() {
        let value = json(get("/search?sortby=%2Bname").await).await;
        assert_eq!(
            ids(&value),
            vec!["item-4", "item-3", "item-0", "item-1", "item-2"]
        );
    }

    #[tokio::test]
    async fn query() {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("query", r#"{"eo:cloud_cover": {"gte": 30}}"#)
            .finish();
        let value = json(get(&format!("/search?{query}")).await).await;
        assert_eq!(ids(&value), vec!["item-4", "item-3"]);
    }

    #[tokio::test]
    async fn pagination_round_trip() {
        let first = json(get("/search?limit=2&collections=noaa").await).await;
        assert_eq!(first["numberReturned"], 2);
        assert!(link(&first, "prev").is_none());
        let next = link(&first, "next").unwrap()["href"].as_str().unwrap();
        assert_eq!(
            next,
            "http://pgfeatures.test/search?limit=2&collections=noaa&offset=next%3A2"
        );
        let second = json(get(&path_and_query(next)).await).await;
        assert_eq!(ids(&second), vec!["item-2", "item-1"]);
        let prev = link(&second, "prev").unwrap()["href"].as_str().unwrap();
        let back = json(get(&path_and_query(prev)).await).await;
        assert_eq!(ids(&back), ids(&first));
    }

    #[tokio::test]
    async fn idempotent() {
        let uri = "/search?limit=2&offset=next%3A2";
        let a = json(get(uri).await).await;
        let b = json(get(uri).await).await;
        assert_eq!(a["numberMatched"], b["numberMatched"]);
        assert_eq!(ids(&a), ids(&b));
    }

    #[tokio::test]
    async fn invalid_token() {
        let response = get("/search?token=not-a-token").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn self_link_is_verbatim() {
        let value = json(get("/search?collections=noaa&limit=1").await).await;
        assert_eq!(
            link(&value, "self").unwrap()["href"],
            "http://pgfeatures.test/search?collections=noaa&limit=1"
        );
    }

    #[tokio::test]
    async fn csv() {
        let response = get_with_accept(
            "/collections/noaa/items?limit=2",
            Some("text/csv;q=1.0, application/json;q=0.4"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment;filename=items.csv"
        );
        let text = text(response).await;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "collectionId,itemId,datetime,name,eo:cloud_cover,geometry"
        );
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn csv_properties_keep_geometry() {
        let response = get("/collections/noaa/items?f=csv&properties=name&limit=1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let text = text(response).await;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "collectionId,itemId,name,geometry");
        assert!(lines[1].starts_with("noaa,item-4,V,"));
        assert!(lines[1].contains("Point"));
    }

    #[tokio::test]
    async fn search_wkt() {
        let value = json(get("/search?f=json&limit=1").await).await;
        assert_eq!(value[0]["geometry"], "POINT(-101 40)");
        assert_eq!(value[0]["itemId"], "item-4");
    }

    #[tokio::test]
    async fn geojson_preferred() {
        let response =
            get_with_accept("/search", Some("application/geo+json, text/csv;q=0.1")).await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/geo+json"
        );
    }

    #[tokio::test]
    async fn geojson_seq() {
        let response = get("/collections/noaa/items?f=geojsonseq&limit=3").await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/geo+json-seq"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment;filename=items.geojson"
        );
        let text = text(response).await;
        let features: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(features.len(), 3);
        assert!(features.iter().all(|feature| feature["type"] == "Feature"));
    }

    #[tokio::test]
    async fn ndjson() {
        let response = get("/collections/noaa/items?f=ndjson").await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/ndjson"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment;filename=items.ndjson"
        );
        assert_eq!(text(response).await.lines().count(), 5);
    }

    #[tokio::test]
    async fn html() {
        let response = get_with_accept("/collections/noaa/items", Some("text/html")).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert!(text(response).await.contains("<pre>"));
    }

    #[tokio::test]
    async fn post_search() {
        let response = post(
            "/search",
            json!({"collections": ["noaa"], "limit": 2, "sortby": [{"field": "name", "direction": "asc"}]}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(ids(&value), vec!["item-4", "item-3"]);
        let next = link(&value, "next").unwrap();
        assert_eq!(next["method"], "POST");
        assert_eq!(next["href"], "http://pgfeatures.test/search");
        assert_eq!(
            next["body"],
            json!({"collections": ["noaa"], "limit": 2, "sortby": [{"field": "name", "direction": "asc"}], "token": "next:2"})
        );
        let response = post("/search", next["body"].clone()).await;
        assert_eq!(ids(&json(response).await), vec!["item-0", "item-1"]);
    }

    #[tokio::test]
    async fn post_bbox_and_intersects() {
        let response = post(
            "/search",
            json!({"bbox": [0, 0, 1, 1], "intersects": {"type": "Point", "coordinates": [0, 0]}}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn post_empty_body() {
        let response = router(Config::default())
            .oneshot(Request::post("/search").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["numberMatched"], 5);
    }

    #[tokio::test]
    async fn item() {
        let response = get("/collections/noaa/items/item-1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value["id"], "item-1");
        assert_eq!(
            value["links"][1]["href"],
            "http://pgfeatures.test/collections/noaa/items/item-1"
        );

        let response = get("/collections/noaa/items/not-an-item").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json(response).await,
            json!({"detail": "Item not-an-item in Collection noaa does not exist."})
        );
    }

    #[tokio::test]
    async fn cache_control() {
        let response = get("/healthz").await;
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );
        let response = router(Config {
            cache_control: None,
            ..Default::default()
        })
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }
}
