use std::time::Duration;

use async_trait::async_trait;
use k1s0_messaging::ConsumedMessage;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};

use crate::domain::service::{DeliveryClient, DeliveryError};

/// 試行番号を配送先へ伝えるヘッダー名。
pub const RETRY_TIMES_HEADER: &str = "X-Retry-Times";

/// 配送リクエストの User-Agent。
pub const PUSHER_USER_AGENT: &str = concat!("k1s0 pusher consumer(rust)/v", env!("CARGO_PKG_VERSION"));

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HttpDeliveryClient はメッセージを form-urlencoded の POST で配送する。
/// ステータス 200 のみを成功とみなす。
pub struct HttpDeliveryClient {
    url: String,
    client: Client,
}

impl HttpDeliveryClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

/// メッセージを `_topic`, `_key`, `_offset`, `_partition`, `message` のフォームにエンコードする。
pub fn encode_form(msg: &ConsumedMessage) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("_topic", &msg.topic)
        .append_pair("_key", &msg.key_lossy())
        .append_pair("_offset", &msg.offset.to_string())
        .append_pair("_partition", &msg.partition.to_string())
        .append_pair("message", &msg.payload_lossy())
        .finish()
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, msg: &ConsumedMessage, attempt: u32) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(USER_AGENT, PUSHER_USER_AGENT)
            .header(RETRY_TIMES_HEADER, attempt.to_string())
            .body(encode_form(msg))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(e.to_string())
                } else {
                    DeliveryError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::UnexpectedStatus(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> ConsumedMessage {
        ConsumedMessage {
            topic: "orders".to_string(),
            partition: 2,
            offset: 10,
            key: Some(b"order 1".to_vec()),
            payload: b"{\"total\":100,\"currency\":\"JPY\"}".to_vec(),
        }
    }

    fn client(server: &MockServer) -> HttpDeliveryClient {
        HttpDeliveryClient::new(format!("{}/hook", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_encode_form_fields() {
        let encoded = encode_form(&message());
        let fields: Vec<(String, String)> = url::form_urlencoded::parse(encoded.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            fields,
            vec![
                ("_topic".to_string(), "orders".to_string()),
                ("_key".to_string(), "order 1".to_string()),
                ("_offset".to_string(), "10".to_string()),
                ("_partition".to_string(), "2".to_string()),
                (
                    "message".to_string(),
                    "{\"total\":100,\"currency\":\"JPY\"}".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_encode_form_without_key() {
        let mut msg = message();
        msg.key = None;
        assert!(encode_form(&msg).contains("_key=&"));
    }

    #[test]
    fn test_user_agent_contains_version() {
        assert!(PUSHER_USER_AGENT.starts_with("k1s0 pusher consumer(rust)/v"));
        assert!(PUSHER_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn test_deliver_success_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(header("user-agent", PUSHER_USER_AGENT))
            .and(header(RETRY_TIMES_HEADER, "2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).deliver(&message(), 2).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_fails_on_other_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = client(&server).deliver(&message(), 0).await;
        assert!(matches!(result, Err(DeliveryError::UnexpectedStatus(204))));
    }

    #[tokio::test]
    async fn test_deliver_fails_on_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        // クライアント内部ではリトライしない
        let result = client(&server).deliver(&message(), 0).await;
        assert!(matches!(result, Err(DeliveryError::UnexpectedStatus(500))));
    }

    #[tokio::test]
    async fn test_deliver_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpDeliveryClient::new(server.uri(), Duration::from_millis(50)).unwrap();
        let result = client.deliver(&message(), 0).await;
        assert!(matches!(result, Err(DeliveryError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_deliver_connection_refused() {
        // ポートを確保して解放し、接続先が存在しない状態を作る
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client =
            HttpDeliveryClient::new(format!("http://{addr}/hook"), Duration::from_secs(1)).unwrap();
        let result = client.deliver(&message(), 0).await;
        assert!(matches!(result, Err(DeliveryError::RequestFailed(_))));
    }
}
