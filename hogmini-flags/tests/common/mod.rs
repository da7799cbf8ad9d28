use std::net::SocketAddr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use hogmini_flags::config::Config;
use hogmini_flags::redis::MockRedisClient;
use hogmini_flags::server::serve_with_client;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);

pub struct ServerHandle {
    pub addr: SocketAddr,
    pub redis: Arc<MockRedisClient>,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();
        let redis = Arc::new(MockRedisClient::new());
        let server_redis = redis.clone();

        tokio::spawn(async move {
            serve_with_client(server_redis, config, listener, async move {
                notify.notified().await
            })
            .await
        });
        ServerHandle {
            addr,
            redis,
            shutdown,
        }
    }

    pub async fn send_decide_request<T: Into<reqwest::Body>>(&self, body: T) -> reqwest::Response {
        let client = reqwest::Client::new();
        client
            .post(format!("http://{:?}/decide", self.addr))
            .body(body)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn send_decide_request_with_content_type<T: Into<reqwest::Body>>(
        &self,
        body: T,
        content_type: &str,
    ) -> reqwest::Response {
        let client = reqwest::Client::new();
        client
            .post(format!("http://{:?}/decide", self.addr))
            .body(body)
            .header(CONTENT_TYPE, content_type)
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn get_sdk_rules(&self, api_key: Option<&str>) -> reqwest::Response {
        let client = reqwest::Client::new();
        let mut request = client.get(format!("http://{:?}/sdk/rules", self.addr));
        if let Some(api_key) = api_key {
            request = request.header(AUTHORIZATION, api_key);
        }
        request.send().await.expect("failed to send request")
    }

    pub async fn create_organization<T: Into<reqwest::Body>>(&self, body: T) -> reqwest::Response {
        self.post("/api/organizations", body).await
    }

    pub async fn post<T: Into<reqwest::Body>>(&self, path: &str, body: T) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{:?}{}", self.addr, path))
            .body(body)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn patch<T: Into<reqwest::Body>>(&self, path: &str, body: T) -> reqwest::Response {
        reqwest::Client::new()
            .patch(format!("http://{:?}{}", self.addr, path))
            .body(body)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("http://{:?}{}", self.addr, path))
            .send()
            .await
            .expect("failed to send request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
