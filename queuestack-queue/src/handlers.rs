//! Operation dispatch for queue requests
//!
//! Maps an operation name and a JSON request body onto the registry and
//! engine calls. Any transport (HTTP, RPC, in-process) can carry this; the
//! dispatcher itself knows nothing about sockets.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use queuestack_core::{ErrorCode, ServiceError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::message::{Message, MessageId, PopToken, ReceivedMessage};
use crate::registry::QueueRegistry;

/// Status and JSON body produced for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResponse {
    pub status: u16,
    pub body: Bytes,
}

impl OperationResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

type HandlerResult = Result<OperationResponse, ServiceError>;

/// Handle one operation by name
pub fn handle_request(
    registry: &QueueRegistry,
    operation: &str,
    body: &[u8],
) -> OperationResponse {
    debug!(operation = %operation, "Queue request");

    let result = match operation {
        "CreateQueue" => handle_create_queue(registry, body),
        "DeleteQueue" => handle_delete_queue(registry, body),
        "ListQueues" => handle_list_queues(registry, body),
        "Enqueue" => handle_enqueue(registry, body),
        "Peek" => handle_peek(registry, body),
        "Receive" => handle_receive(registry, body),
        "UpdateMessage" => handle_update_message(registry, body),
        "DeleteMessage" => handle_delete_message(registry, body),
        "GetProperties" => handle_get_properties(registry, body),
        "PurgeQueue" => handle_purge_queue(registry, body),
        _ => {
            warn!(operation = %operation, "Unknown queue operation");
            Err(ServiceError::new(
                ErrorCode::UnknownOperation,
                format!("Unknown operation: {}", operation),
            ))
        }
    };

    result.unwrap_or_else(|err| error_response(&err))
}

// === Request and response shapes ===

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueNameRequest {
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ListQueuesRequest {
    prefix: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueRequest {
    queue: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnqueueRequest {
    queue: String,
    body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PeekRequest {
    queue: String,
    max_count: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveRequest {
    queue: String,
    max_count: i64,
    visibility_timeout_seconds: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateMessageRequest {
    queue: String,
    message_id: MessageId,
    pop_token: PopToken,
    body: Option<String>,
    visibility_timeout_seconds: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest {
    queue: String,
    message_id: MessageId,
    pop_token: PopToken,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListQueuesResponse {
    queues: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnqueueResponse {
    message_id: MessageId,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PeekedMessageView {
    message_id: MessageId,
    body: String,
    enqueue_time: DateTime<Utc>,
    dequeue_count: u32,
}

impl From<Message> for PeekedMessageView {
    fn from(m: Message) -> Self {
        Self {
            message_id: m.id,
            body: m.body,
            enqueue_time: m.enqueue_time,
            dequeue_count: m.dequeue_count,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceivedMessageView {
    message_id: MessageId,
    body: String,
    pop_token: PopToken,
    dequeue_count: u32,
    enqueue_time: DateTime<Utc>,
    next_visible_on: DateTime<Utc>,
}

impl From<ReceivedMessage> for ReceivedMessageView {
    fn from(r: ReceivedMessage) -> Self {
        Self {
            message_id: r.message.id,
            body: r.message.body,
            pop_token: r.pop_token,
            dequeue_count: r.message.dequeue_count,
            enqueue_time: r.message.enqueue_time,
            next_visible_on: r.next_visible_on,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessagesResponse<T> {
    messages: Vec<T>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateMessageResponse {
    pop_token: PopToken,
    next_visible_on: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PropertiesResponse {
    approximate_message_count: usize,
    created_at: DateTime<Utc>,
}

// === Handlers ===

fn handle_create_queue(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: QueueNameRequest = parse(body)?;
    registry.create_if_not_exists(&req.name)?;
    Ok(json_response(&Empty {}))
}

fn handle_delete_queue(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: QueueNameRequest = parse(body)?;
    registry.delete(&req.name)?;
    Ok(json_response(&Empty {}))
}

fn handle_list_queues(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: ListQueuesRequest = if body.is_empty() {
        ListQueuesRequest::default()
    } else {
        parse(body)?
    };
    let queues = registry.list(req.prefix.as_deref());
    Ok(json_response(&ListQueuesResponse { queues }))
}

fn handle_enqueue(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: EnqueueRequest = parse(body)?;
    let message_id = registry.get(&req.queue)?.enqueue(req.body)?;
    Ok(json_response(&EnqueueResponse { message_id }))
}

fn handle_peek(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: PeekRequest = parse(body)?;
    let messages = registry.get(&req.queue)?.peek(max_count(req.max_count)?)?;
    Ok(json_response(&MessagesResponse {
        messages: messages
            .into_iter()
            .map(PeekedMessageView::from)
            .collect(),
    }))
}

fn handle_receive(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: ReceiveRequest = parse(body)?;
    let timeout = req
        .visibility_timeout_seconds
        .unwrap_or(registry.config().default_visibility_timeout_secs);
    let received = registry
        .get(&req.queue)?
        .receive(max_count(req.max_count)?, timeout)?;
    Ok(json_response(&MessagesResponse {
        messages: received
            .into_iter()
            .map(ReceivedMessageView::from)
            .collect(),
    }))
}

fn handle_update_message(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: UpdateMessageRequest = parse(body)?;
    let receipt = registry.get(&req.queue)?.update_lease(
        req.message_id,
        req.pop_token,
        req.body,
        req.visibility_timeout_seconds,
    )?;
    Ok(json_response(&UpdateMessageResponse {
        pop_token: receipt.pop_token,
        next_visible_on: receipt.next_visible_on,
    }))
}

fn handle_delete_message(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: DeleteMessageRequest = parse(body)?;
    registry
        .get(&req.queue)?
        .delete_message(req.message_id, req.pop_token)?;
    Ok(json_response(&Empty {}))
}

fn handle_get_properties(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: QueueRequest = parse(body)?;
    let props = registry.get(&req.queue)?.properties()?;
    Ok(json_response(&PropertiesResponse {
        approximate_message_count: props.approximate_message_count,
        created_at: props.created_at,
    }))
}

fn handle_purge_queue(registry: &QueueRegistry, body: &[u8]) -> HandlerResult {
    let req: QueueRequest = parse(body)?;
    registry.get(&req.queue)?.purge()?;
    Ok(json_response(&Empty {}))
}

/// Out-of-range counts are argument errors, not malformed requests
fn max_count(value: i64) -> Result<u32, QueueError> {
    u32::try_from(value)
        .map_err(|_| QueueError::InvalidArgument(format!("max_count out of range: {}", value)))
}

// === JSON helpers ===

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::new(ErrorCode::MalformedRequest, e.to_string()))
}

fn json_response<T: Serialize>(value: &T) -> OperationResponse {
    match serde_json::to_vec(value) {
        Ok(body) => OperationResponse {
            status: 200,
            body: Bytes::from(body),
        },
        Err(e) => error_response(&ServiceError::new(
            ErrorCode::InternalError,
            format!("Failed to encode response: {}", e),
        )),
    }
}

fn error_response(err: &ServiceError) -> OperationResponse {
    OperationResponse {
        status: err.code.http_status(),
        body: Bytes::from(err.to_json()),
    }
}
