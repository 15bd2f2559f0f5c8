//! The per-exchange state machine and its business types.
//!
//! [`FlowExchange::handle`] runs one exchange end to end:
//!
//! 1. verify the payload signature, when an app secret is configured
//! 2. parse the envelope
//! 3. load the private key and unwrap the symmetric key
//! 4. decrypt the body and parse the business payload
//! 5. answer health checks and error notifications directly, otherwise
//!    dispatch to the [`FlowHandler`]
//! 6. seal the reply under the flipped IV
//!
//! No state survives an exchange.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::crypto::{self, EncryptedRequest};
use crate::key::PrivateKeyLoader;
use crate::{FlowError, FlowHandlerError};

/// Screen name the client treats as the end of the flow.
pub const SUCCESS_SCREEN: &str = "SUCCESS";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    /// Health check.
    #[serde(rename = "ping")]
    Ping,
    /// The flow was opened.
    #[serde(rename = "INIT", alias = "init")]
    Init,
    /// The user pressed back on a screen with `refresh_on_back`.
    #[serde(rename = "BACK", alias = "back")]
    Back,
    /// The user submitted a screen.
    #[serde(rename = "data_exchange")]
    DataExchange,
}

/// The decrypted business payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowDataRequest {
    pub version: String,
    pub action: FlowAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_token: Option<String>,
}

impl FlowDataRequest {
    /// The client-side error this payload reports, if it is an error
    /// notification rather than a user action.
    pub fn error_notification(&self) -> Option<&Value> {
        self.data.get("error")
    }
}

/// The business reply: the next screen and the data it renders.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDataResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl FlowDataResponse {
    pub fn new(screen: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            screen: Some(screen.into()),
            data,
        }
    }

    /// Reply to a health check.
    pub fn status_active() -> Self {
        Self::without_screen(json!({"status": "active"}))
    }

    /// Reply to an error notification.
    pub fn acknowledged() -> Self {
        Self::without_screen(json!({"acknowledged": true}))
    }

    /// Show `message` on `screen`.
    pub fn error(screen: impl Into<String>, message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("error_message".to_owned(), Value::String(message.into()));
        Self::new(screen, data)
    }

    /// Close the flow, handing `params` back to the chat with the flow token.
    pub fn close(flow_token: impl Into<String>, mut params: Map<String, Value>) -> Self {
        params.insert("flow_token".to_owned(), Value::String(flow_token.into()));
        let mut data = Map::new();
        data.insert(
            "extension_message_response".to_owned(),
            json!({ "params": params }),
        );
        Self::new(SUCCESS_SCREEN, data)
    }

    fn without_screen(data: Value) -> Self {
        match data {
            Value::Object(data) => Self { screen: None, data },
            _ => Self::default(),
        }
    }
}

/// Business logic behind a flow.
///
/// Implemented for async closures taking a [`FlowDataRequest`].
pub trait FlowHandler: Send + Sync + 'static {
    fn handle(&self, request: FlowDataRequest) -> BoxFuture<'_, Result<FlowDataResponse, FlowHandlerError>>;
}

impl<F, Fut> FlowHandler for F
where
    F: Fn(FlowDataRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FlowDataResponse, FlowHandlerError>> + Send + 'static,
{
    fn handle(&self, request: FlowDataRequest) -> BoxFuture<'_, Result<FlowDataResponse, FlowHandlerError>> {
        Box::pin(self(request))
    }
}

/// Decrypts, dispatches and re-encrypts data exchanges.
#[derive(Clone)]
pub struct FlowExchange {
    keys: Arc<dyn PrivateKeyLoader>,
    handler: Arc<dyn FlowHandler>,
    app_secret: Option<String>,
}

impl std::fmt::Debug for FlowExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExchange")
            .field("verify_signature", &self.app_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl FlowExchange {
    pub fn new<K, H>(keys: K, handler: H) -> Self
    where
        K: PrivateKeyLoader,
        H: FlowHandler,
    {
        Self {
            keys: Arc::new(keys),
            handler: Arc::new(handler),
            app_secret: None,
        }
    }

    /// Require a valid `X-Hub-Signature-256` over the raw body.
    pub fn with_app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.app_secret = Some(app_secret.into());
        self
    }

    /// Run one exchange over the raw request body, returning the base64
    /// reply.
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> Result<String, FlowError> {
        if let Some(secret) = &self.app_secret {
            wacloud_core::verify_signature(secret, signature, body)?;
        }

        let envelope: EncryptedRequest = serde_json::from_slice(body).map_err(FlowError::Envelope)?;
        let key = self.keys.load().await?;
        let decrypted = crypto::decrypt_request(&envelope, &key)?;
        tracing::debug!(bytes = decrypted.body.len(), "decrypted flow request");

        let request: FlowDataRequest =
            serde_json::from_slice(&decrypted.body).map_err(FlowError::Payload)?;
        let response = self.dispatch(request).await?;

        crypto::encrypt_response(&response, &decrypted.aes_key, &decrypted.iv)
    }

    async fn dispatch(&self, request: FlowDataRequest) -> Result<FlowDataResponse, FlowError> {
        if request.action == FlowAction::Ping {
            return Ok(FlowDataResponse::status_active());
        }
        if request.error_notification().is_some() {
            tracing::warn!(
                action = ?request.action,
                screen = request.screen.as_deref().unwrap_or_default(),
                "flow client reported an error"
            );
            return Ok(FlowDataResponse::acknowledged());
        }

        let action = request.action;
        match self.handler.handle(request).await {
            Ok(response) => Ok(response),
            Err(FlowHandlerError::Screen { screen, message }) => {
                tracing::debug!(?action, %screen, "flow handler returned a screen error");
                Ok(FlowDataResponse::error(screen, message))
            }
            Err(FlowHandlerError::InvalidFlowToken) => Err(FlowError::InvalidFlowToken),
            Err(FlowHandlerError::Internal(err)) => Err(FlowError::Handler(err)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::tests::{IV, KEY, private_key};
    use crate::crypto::{decrypt_response, encrypt_request};
    use crate::key::StaticKey;
    use aes_gcm::aead::OsRng;

    pub(crate) async fn demo_handler(request: FlowDataRequest) -> Result<FlowDataResponse, FlowHandlerError> {
        match (request.action, request.flow_token.as_deref()) {
            (_, Some("expired")) => Err(FlowHandlerError::InvalidFlowToken),
            (_, Some("crash")) => Err(FlowHandlerError::internal("database unavailable")),
            (FlowAction::Init, _) => {
                let mut data = Map::new();
                data.insert("greeting".into(), "hello".into());
                Ok(FlowDataResponse::new("WELCOME", data))
            }
            (FlowAction::DataExchange, Some(token)) => match request.data.get("name") {
                Some(Value::String(name)) if !name.is_empty() => {
                    let mut params = Map::new();
                    params.insert("name".into(), Value::String(name.clone()));
                    Ok(FlowDataResponse::close(token, params))
                }
                _ => Err(FlowHandlerError::screen("DETAILS", "name is required")),
            },
            _ => Err(FlowHandlerError::internal("unexpected action")),
        }
    }

    pub(crate) fn envelope(payload: &Value) -> Vec<u8> {
        let request = encrypt_request(&mut OsRng, &private_key().to_public_key(), &KEY, &IV, payload).unwrap();
        serde_json::to_vec(&request).unwrap()
    }

    fn exchange() -> FlowExchange {
        FlowExchange::new(StaticKey::new(private_key().clone()), demo_handler)
    }

    async fn reply(exchange: &FlowExchange, payload: Value) -> Result<Value, FlowError> {
        let encoded = exchange.handle(&envelope(&payload), None).await?;
        let plaintext = decrypt_response(&encoded, &KEY, &IV).unwrap();
        Ok(serde_json::from_slice(&plaintext).unwrap())
    }

    #[tokio::test]
    async fn test_ping_answers_without_handler() {
        let exchange = FlowExchange::new(StaticKey::new(private_key().clone()), |_req: FlowDataRequest| async {
            Err::<FlowDataResponse, _>(FlowHandlerError::internal("must not be called"))
        });
        let reply = reply(&exchange, json!({"version": "3.0", "action": "ping"})).await.unwrap();
        assert_eq!(reply, json!({"data": {"status": "active"}}));
    }

    #[tokio::test]
    async fn test_init_dispatches_to_handler() {
        let reply = reply(
            &exchange(),
            json!({"version": "3.0", "action": "INIT", "flow_token": "t-1"}),
        )
        .await
        .unwrap();
        assert_eq!(reply, json!({"screen": "WELCOME", "data": {"greeting": "hello"}}));
    }

    #[tokio::test]
    async fn test_data_exchange_closes_flow() {
        let reply = reply(
            &exchange(),
            json!({
                "version": "3.0",
                "action": "data_exchange",
                "screen": "DETAILS",
                "data": {"name": "Ada"},
                "flow_token": "t-1",
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            reply,
            json!({
                "screen": "SUCCESS",
                "data": {"extension_message_response": {"params": {"flow_token": "t-1", "name": "Ada"}}},
            })
        );
    }

    #[tokio::test]
    async fn test_screen_error_is_an_encrypted_reply() {
        let reply = reply(
            &exchange(),
            json!({"version": "3.0", "action": "data_exchange", "screen": "DETAILS", "data": {}, "flow_token": "t-1"}),
        )
        .await
        .unwrap();
        assert_eq!(reply, json!({"screen": "DETAILS", "data": {"error_message": "name is required"}}));
    }

    #[tokio::test]
    async fn test_error_notification_is_acknowledged() {
        let reply = reply(
            &exchange(),
            json!({
                "version": "3.0",
                "action": "data_exchange",
                "screen": "DETAILS",
                "data": {"error": "component-failure", "error_message": "bad layout"},
                "flow_token": "t-1",
            }),
        )
        .await
        .unwrap();
        assert_eq!(reply, json!({"data": {"acknowledged": true}}));
    }

    #[tokio::test]
    async fn test_handler_errors_map_to_exchange_errors() {
        let err = reply(&exchange(), json!({"version": "3.0", "action": "INIT", "flow_token": "expired"}))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidFlowToken));

        let err = reply(&exchange(), json!({"version": "3.0", "action": "INIT", "flow_token": "crash"}))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Handler(_)));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let err = reply(&exchange(), json!({"action": "INIT"})).await.unwrap_err();
        assert!(matches!(err, FlowError::Payload(_)));

        let err = exchange().handle(b"not json", None).await.unwrap_err();
        assert!(matches!(err, FlowError::Envelope(_)));
    }

    #[tokio::test]
    async fn test_tampered_envelope_is_crypto_failure() {
        let mut request: EncryptedRequest =
            serde_json::from_slice(&envelope(&json!({"version": "3.0", "action": "ping"}))).unwrap();
        request.encrypted_flow_data = {
            use base64::Engine;
            let engine = base64::engine::general_purpose::STANDARD;
            let mut data = engine.decode(&request.encrypted_flow_data).unwrap();
            data[0] ^= 0x80;
            engine.encode(data)
        };
        let body = serde_json::to_vec(&request).unwrap();

        let err = exchange().handle(&body, None).await.unwrap_err();
        assert!(matches!(err, FlowError::BodyDecrypt));
    }

    #[tokio::test]
    async fn test_signature_is_checked_before_decryption() {
        let exchange = exchange().with_app_secret("my_app_secret");
        let body = envelope(&json!({"version": "3.0", "action": "ping"}));

        let err = exchange.handle(&body, None).await.unwrap_err();
        assert!(matches!(err, FlowError::Signature(wacloud_core::SignError::MissingSignature)));

        let signature = wacloud_core::sign_payload("my_app_secret", &body);
        assert!(exchange.handle(&body, Some(&signature)).await.is_ok());
    }
}
