//! Request interception.
//!
//! A host transport asks [`StubInterceptor::can_init`] whether a request
//! should be answered from the registry. If so it calls
//! [`StubInterceptor::start_loading`] with a [`TransportClient`] and receives
//! the stubbed response, body and completion (or a failure) through it,
//! exactly as it would from real I/O.

use crate::codec::{TransportError, TransportResponse};
use crate::logger::StubLogger;
use crate::registry::StubRegistry;
use crate::stub::{Stub, StubData, StubKind, StubResponse, StubTarget, StubVariant};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Anything that carries a request URL.
pub trait InterceptedRequest {
    /// The absolute URL of the request, if it has one.
    fn target(&self) -> Option<Cow<'_, str>>;
}

impl InterceptedRequest for str {
    fn target(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self))
    }
}

impl InterceptedRequest for String {
    fn target(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl InterceptedRequest for StubTarget {
    fn target(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

/// The URL is rebuilt from scheme, authority and the path-and-query as
/// written, so `https://host?q=1` stays as is. `http` cannot tell an absent
/// path from `/`, so a bare `https://host` reads back as `https://host/`.
impl InterceptedRequest for http::Uri {
    fn target(&self) -> Option<Cow<'_, str>> {
        // Relative URIs cannot be matched against absolute targets
        let scheme = self.scheme_str()?;
        let authority = self.authority().map_or("", |a| a.as_str());
        let path_and_query = self.path_and_query().map_or("/", |pq| pq.as_str());
        Some(Cow::Owned(format!("{}://{}{}", scheme, authority, path_and_query)))
    }
}

impl<B> InterceptedRequest for http::Request<B> {
    fn target(&self) -> Option<Cow<'_, str>> {
        self.uri().target()
    }
}

impl<T: InterceptedRequest + ?Sized> InterceptedRequest for &T {
    fn target(&self) -> Option<Cow<'_, str>> {
        (**self).target()
    }
}

/// Delivery callbacks of the host transport.
pub trait TransportClient {
    fn deliver_response(&mut self, response: TransportResponse);
    fn deliver_body(&mut self, body: &[u8]);
    fn deliver_failure(&mut self, error: TransportError);
    fn signal_completion(&mut self);
}

/// One callback received by a [`ResponseCollector`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Response(TransportResponse),
    Body(Vec<u8>),
    Failure(TransportError),
    Completed,
}

/// A [`TransportClient`] that records every delivery in order.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    events: Vec<ClientEvent>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ClientEvent] {
        &self.events
    }

    pub fn response(&self) -> Option<&TransportResponse> {
        self.events.iter().find_map(|e| match e {
            ClientEvent::Response(response) => Some(response),
            _ => None,
        })
    }

    /// All delivered body chunks, concatenated.
    pub fn body(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Body(chunk) => Some(chunk.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    pub fn failure(&self) -> Option<&TransportError> {
        self.events.iter().find_map(|e| match e {
            ClientEvent::Failure(error) => Some(error),
            _ => None,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.events.iter().any(|e| matches!(e, ClientEvent::Completed))
    }
}

impl TransportClient for ResponseCollector {
    fn deliver_response(&mut self, response: TransportResponse) {
        self.events.push(ClientEvent::Response(response));
    }

    fn deliver_body(&mut self, body: &[u8]) {
        self.events.push(ClientEvent::Body(body.to_vec()));
    }

    fn deliver_failure(&mut self, error: TransportError) {
        self.events.push(ClientEvent::Failure(error));
    }

    fn signal_completion(&mut self) {
        self.events.push(ClientEvent::Completed);
    }
}

/// What `start_loading` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The stub was delivered to the client
    Served(StubVariant),
    /// Nothing was delivered; the request never completes from this layer
    Stalled,
}

/// Answers intercepted requests from a [`StubRegistry`].
pub struct StubInterceptor {
    registry: Arc<StubRegistry>,
    /// Requests passed to `start_loading`.
    requests_total: AtomicU64,
    /// Requests answered from a stub.
    requests_served: AtomicU64,
    /// Requests left without any delivery.
    requests_stalled: AtomicU64,
}

impl StubInterceptor {
    pub fn new(registry: Arc<StubRegistry>) -> Self {
        Self {
            registry,
            requests_total: AtomicU64::new(0),
            requests_served: AtomicU64::new(0),
            requests_stalled: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<StubRegistry> {
        &self.registry
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn total_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub fn total_stalled(&self) -> u64 {
        self.requests_stalled.load(Ordering::Relaxed)
    }

    /// Whether this interceptor should take over the request.
    pub fn can_init<R: InterceptedRequest + ?Sized>(&self, request: &R) -> bool {
        request
            .target()
            .is_some_and(|url| self.registry.can_handle(&url))
    }

    /// Serve the request from its stub.
    ///
    /// Without a resolvable stub nothing is delivered to `client` and the
    /// request stalls; hosts are expected to gate on [`Self::can_init`].
    pub fn start_loading<R: InterceptedRequest + ?Sized>(
        &self,
        request: &R,
        client: &mut dyn TransportClient,
    ) -> LoadOutcome {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let url = request.target();
        let stub = url.as_deref().and_then(|url| self.registry.resolve(url));

        let (url, stub) = match (url, stub) {
            (Some(url), Some(stub)) => (url, stub),
            (url, _) => {
                self.log(&format!(
                    "Failed to stub request for {}",
                    url.as_deref().unwrap_or("<no url>")
                ));
                return self.stalled();
            }
        };

        self.log(&format!("Stubbing request for {}", url));

        let delivered = match stub.kind() {
            StubKind::Error(error) => {
                let error = error.to_native();
                self.log(&format!("Stubbing error: {}", error));
                client.deliver_failure(error);
                true
            }
            StubKind::Data(data) => self.serve_data(data, &url, client),
            StubKind::Response(response) => self.serve_response(response, &url, client),
            StubKind::Empty => {
                self.log(&format!(
                    "Stub is empty for {}, returning without modification",
                    url
                ));
                client.signal_completion();
                true
            }
        };

        if !delivered {
            self.log(&format!("Failed to stub request for {}", url));
            return self.stalled();
        }

        self.log(&format!("Stubbing completed for {}", url));
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        LoadOutcome::Served(stub.variant())
    }

    /// Cancellation is not supported; stubbed deliveries are synchronous.
    pub fn stop_loading<R: InterceptedRequest + ?Sized>(&self, _request: &R) {}

    /// Look up the stub a request would be served from.
    pub fn stub_for<R: InterceptedRequest + ?Sized>(&self, request: &R) -> Option<Stub> {
        request.target().and_then(|url| self.registry.resolve(&url))
    }

    fn serve_data(&self, data: &StubData, url: &str, client: &mut dyn TransportClient) -> bool {
        let Some(status) = data.status() else {
            return false;
        };

        let kind = if data.is_codable { "Codable" } else { "Data" };
        self.log(&format!(
            "Stubbing sending {} response for {}: {}",
            kind,
            url,
            data.debug_string()
        ));

        deliver(client, TransportResponse::new(url, status), &data.data);
        true
    }

    fn serve_response(
        &self,
        response: &StubResponse,
        url: &str,
        client: &mut dyn TransportClient,
    ) -> bool {
        let Some(head) = response.response.to_native() else {
            return false;
        };

        self.log(&format!(
            "Stubbing response for {}: {}",
            url,
            response.debug_string()
        ));

        deliver(client, head, &response.data);
        true
    }

    fn stalled(&self) -> LoadOutcome {
        self.requests_stalled.fetch_add(1, Ordering::Relaxed);
        LoadOutcome::Stalled
    }

    fn log(&self, message: &str) {
        self.registry.logger().log_message(message);
    }
}

fn deliver(client: &mut dyn TransportClient, response: TransportResponse, body: &[u8]) {
    client.deliver_response(response);
    client.deliver_body(body);
    client.signal_completion();
}

impl std::fmt::Debug for StubInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubInterceptor")
            .field("registry", &self.registry)
            .field("requests_total", &self.total_requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StubHttpResponse;
    use crate::logger::MemoryLogger;
    use http::StatusCode;

    fn setup() -> (Arc<MemoryLogger>, StubInterceptor) {
        let logger = Arc::new(MemoryLogger::new());
        let registry = Arc::new(StubRegistry::with_logger(logger.clone()));
        (logger, StubInterceptor::new(registry))
    }

    fn added(url: &str) -> String {
        format!("URL: {} added to NetworkStubber", url)
    }

    fn stubbing_request(url: &str) -> String {
        format!("Stubbing request for {}", url)
    }

    fn completed(url: &str) -> String {
        format!("Stubbing completed for {}", url)
    }

    #[test]
    fn test_can_init_with_matching_stub() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com";
        interceptor
            .registry()
            .add(Stub::data(url, StubData::new(200, Vec::new())));

        assert!(interceptor.can_init(url));
        assert_eq!(logger.last_message(), Some(added(url)));
    }

    #[test]
    fn test_can_init_without_stub() {
        let (_, interceptor) = setup();
        assert!(!interceptor.can_init("https://api.example.com"));
    }

    #[test]
    fn test_can_init_http_request() {
        let (_, interceptor) = setup();
        interceptor.registry().add(Stub::empty("https://api.example.com/users"));

        let request = http::Request::get("https://api.example.com/users/1")
            .body(())
            .unwrap();
        assert!(interceptor.can_init(&request));

        let relative = http::Request::get("/users/1").body(()).unwrap();
        assert!(!interceptor.can_init(&relative));
    }

    #[test]
    fn test_http_request_with_query_and_no_path() {
        let (_, interceptor) = setup();
        interceptor.registry().add(Stub::empty("https://api.example.com?q=1"));

        let request = http::Request::get("https://api.example.com?q=1")
            .body(())
            .unwrap();
        assert_eq!(request.target().as_deref(), Some("https://api.example.com?q=1"));
        assert!(interceptor.can_init(&request));

        let mut client = ResponseCollector::new();
        assert_eq!(
            interceptor.start_loading(&request, &mut client),
            LoadOutcome::Served(StubVariant::Empty)
        );
    }

    #[test]
    fn test_http_uri_target_keeps_path_and_query() {
        let uri: http::Uri = "http://localhost:8080/users/1?expand=true".parse().unwrap();
        assert_eq!(
            uri.target().as_deref(),
            Some("http://localhost:8080/users/1?expand=true")
        );

        let bare: http::Uri = "https://api.example.com".parse().unwrap();
        assert_eq!(bare.target().as_deref(), Some("https://api.example.com/"));
    }

    #[test]
    fn test_data_stub() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com/data";
        let stub = Stub::data(url, StubData::new(200, b"Hello, World!".to_vec()));
        interceptor.registry().add(stub);

        let mut client = ResponseCollector::new();
        let outcome = interceptor.start_loading(url, &mut client);

        assert_eq!(outcome, LoadOutcome::Served(StubVariant::Data));
        let response = client.response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.headers.is_empty());
        assert_eq!(client.body(), b"Hello, World!");
        assert!(client.is_completed());

        assert_eq!(
            logger.messages(),
            vec![
                added(url),
                stubbing_request(url),
                format!("Stubbing sending Data response for {}: Hello, World!", url),
                completed(url),
            ]
        );
    }

    #[test]
    fn test_delivery_order() {
        let (_, interceptor) = setup();
        let url = "https://api.example.com/data";
        interceptor
            .registry()
            .add(Stub::data(url, StubData::new(204, Vec::new())));

        let mut client = ResponseCollector::new();
        interceptor.start_loading(url, &mut client);

        let events = client.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ClientEvent::Response(_)));
        assert!(matches!(events[1], ClientEvent::Body(_)));
        assert!(matches!(events[2], ClientEvent::Completed));
    }

    #[test]
    fn test_codable_data_stub_log() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com/data";
        let data = StubData::from_codable(200, &serde_json::json!({"message": "Hello!"})).unwrap();
        interceptor.registry().add(Stub::data(url, data));

        interceptor.start_loading(url, &mut ResponseCollector::new());

        assert_eq!(
            logger.messages()[2],
            format!(
                "Stubbing sending Codable response for {}: {{\"message\":\"Hello!\"}}",
                url
            )
        );
    }

    #[test]
    fn test_error_stub() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com/error";
        let error = TransportError::new("TestError", -1);
        interceptor.registry().add(Stub::failure(url, &error));

        let mut client = ResponseCollector::new();
        let outcome = interceptor.start_loading(url, &mut client);

        assert_eq!(outcome, LoadOutcome::Served(StubVariant::Error));
        assert_eq!(client.failure().map(|e| e.code), Some(-1));
        assert!(client.response().is_none());
        assert!(!client.is_completed());

        assert_eq!(
            logger.messages(),
            vec![
                added(url),
                stubbing_request(url),
                "Stubbing error: TestError error -1".to_string(),
                completed(url),
            ]
        );
    }

    #[test]
    fn test_full_response_stub() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com/fullresponse";
        let head = TransportResponse::new(url, StatusCode::CREATED)
            .with_header("Content-Type", "application/json");
        let body = br#"{ "message": "Success" }"#.to_vec();
        interceptor
            .registry()
            .add(Stub::response(url, StubResponse::new(&head, body.clone())));

        let mut client = ResponseCollector::new();
        interceptor.start_loading(url, &mut client);

        let response = client.response().unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers["content-type"], "application/json");
        assert_eq!(client.body(), body);
        assert!(client.is_completed());

        assert_eq!(
            logger.messages(),
            vec![
                added(url),
                stubbing_request(url),
                format!("Stubbing response for {}: {{ \"message\": \"Success\" }}", url),
                completed(url),
            ]
        );
    }

    #[test]
    fn test_empty_stub() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com/empty";
        interceptor.registry().add(Stub::empty(url));

        let mut client = ResponseCollector::new();
        let outcome = interceptor.start_loading(url, &mut client);

        assert_eq!(outcome, LoadOutcome::Served(StubVariant::Empty));
        assert_eq!(client.events().len(), 1);
        assert!(client.is_completed());
        assert_eq!(
            logger.messages()[2],
            format!("Stub is empty for {}, returning without modification", url)
        );
    }

    #[test]
    fn test_unmatched_request_stalls() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com/missing";

        let mut client = ResponseCollector::new();
        let outcome = interceptor.start_loading(url, &mut client);

        assert_eq!(outcome, LoadOutcome::Stalled);
        assert!(client.events().is_empty());
        assert_eq!(
            logger.messages(),
            vec![format!("Failed to stub request for {}", url)]
        );
        assert_eq!(interceptor.total_stalled(), 1);
    }

    #[test]
    fn test_response_without_url_stalls() {
        let (logger, interceptor) = setup();
        let url = "https://api.example.com/broken";
        let response = StubResponse {
            response: StubHttpResponse {
                url: None,
                status_code: 200,
                header_fields: None,
            },
            data: Vec::new(),
            is_codable: false,
        };
        interceptor.registry().add(Stub::response(url, response));

        let mut client = ResponseCollector::new();
        let outcome = interceptor.start_loading(url, &mut client);

        assert_eq!(outcome, LoadOutcome::Stalled);
        assert!(client.events().is_empty());
        assert_eq!(
            logger.last_message(),
            Some(format!("Failed to stub request for {}", url))
        );
    }

    #[test]
    fn test_invalid_data_status_stalls() {
        let (_, interceptor) = setup();
        let url = "https://api.example.com/odd";
        interceptor
            .registry()
            .add(Stub::data(url, StubData::new(7, Vec::new())));

        let mut client = ResponseCollector::new();
        assert_eq!(interceptor.start_loading(url, &mut client), LoadOutcome::Stalled);
        assert!(client.events().is_empty());
    }

    #[test]
    fn test_out_of_range_data_status_stalls() {
        let (logger, interceptor) = setup();
        for (url, status) in [
            ("https://api.example.com/small", 42),
            ("https://api.example.com/large", 70000),
        ] {
            interceptor
                .registry()
                .add(Stub::data(url, StubData::new(status, "body")));

            let mut client = ResponseCollector::new();
            assert_eq!(interceptor.start_loading(url, &mut client), LoadOutcome::Stalled);
            assert!(client.events().is_empty());
            assert_eq!(
                logger.last_message(),
                Some(format!("Failed to stub request for {}", url))
            );
        }
    }

    #[test]
    fn test_counters() {
        let (_, interceptor) = setup();
        interceptor.registry().add(Stub::empty("https://api.example.com"));

        interceptor.start_loading("https://api.example.com/a", &mut ResponseCollector::new());
        interceptor.start_loading("https://other.example.com", &mut ResponseCollector::new());

        assert_eq!(interceptor.total_requests(), 2);
        assert_eq!(interceptor.total_served(), 1);
        assert_eq!(interceptor.total_stalled(), 1);
    }

    #[test]
    fn test_stop_loading_is_inert() {
        let (logger, interceptor) = setup();
        interceptor.registry().add(Stub::empty("https://api.example.com"));
        let before = logger.messages().len();

        interceptor.stop_loading("https://api.example.com");

        assert_eq!(logger.messages().len(), before);
        assert!(interceptor.can_init("https://api.example.com"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_while_loading_batch() {
        let (_, interceptor) = setup();
        let interceptor = Arc::new(interceptor);
        let urls: Vec<String> = (0..50)
            .map(|i| format!("https://api.example.com/item/{:03}", i))
            .collect();

        let mut readers = Vec::new();
        for _ in 0..8 {
            let interceptor = interceptor.clone();
            let expected = urls.len();
            readers.push(tokio::spawn(async move {
                for _ in 0..100 {
                    // A batch is either fully visible or not at all
                    let visible = interceptor.registry().targets().len();
                    assert!(visible == 0 || visible == expected);
                    if visible == expected {
                        assert!(interceptor.can_init("https://api.example.com/item/049"));
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        interceptor
            .registry()
            .add_all(urls.iter().map(|u| Stub::data(u.as_str(), StubData::new(200, Vec::new()))));

        for reader in readers {
            reader.await.unwrap();
        }

        for url in &urls {
            let mut client = ResponseCollector::new();
            assert_eq!(
                interceptor.start_loading(url.as_str(), &mut client),
                LoadOutcome::Served(StubVariant::Data)
            );
        }
    }
}
