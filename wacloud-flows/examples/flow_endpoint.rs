//! A Flow endpoint that collects a name and closes the flow.
//!
//! ```sh
//! FLOW_PRIVATE_KEY=private.pem FLOW_APP_SECRET=... cargo run -p wacloud-flows --example flow_endpoint
//! ```

use serde_json::{Map, Value};
use wacloud_flows::{
    FlowAction, FlowDataRequest, FlowDataResponse, FlowEndpoint, FlowExchange, FlowHandlerError, PemFile,
};

async fn appointment(request: FlowDataRequest) -> Result<FlowDataResponse, FlowHandlerError> {
    let token = request.flow_token.clone().ok_or(FlowHandlerError::InvalidFlowToken)?;
    match request.action {
        FlowAction::Init | FlowAction::Back => Ok(FlowDataResponse::new("DETAILS", Map::new())),
        FlowAction::DataExchange => {
            let Some(Value::String(name)) = request.data.get("name") else {
                return Err(FlowHandlerError::screen("DETAILS", "Please enter your name"));
            };
            let mut params = Map::new();
            params.insert("name".to_owned(), Value::String(name.clone()));
            Ok(FlowDataResponse::close(token, params))
        }
        FlowAction::Ping => Ok(FlowDataResponse::status_active()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let key_path = std::env::var("FLOW_PRIVATE_KEY").unwrap_or_else(|_| "private.pem".to_owned());
    let mut exchange = FlowExchange::new(PemFile::new(key_path), appointment);
    if let Ok(secret) = std::env::var("FLOW_APP_SECRET") {
        exchange = exchange.with_app_secret(secret);
    }

    let app = FlowEndpoint::new(exchange).router("/flows");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    println!("Flow endpoint listening on http://{}/flows", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
