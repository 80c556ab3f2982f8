use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::operation::delete_message::DeleteMessageError;
use aws_sdk_sqs::operation::get_queue_url::GetQueueUrlError;
use aws_sdk_sqs::types::{Message, MessageAttributeValue};
use aws_sdk_sqs::Client;
use tracing::{debug, warn};

use super::{QueueClient, QueueEndpoint};
use crate::error::{Error, Result};
use crate::message::{LeaseMessage, ReceiptHandle, ReceivedMessage, ATTRIBUTE_DATA_TYPE};

// Asks SQS to return every message attribute.
const ALL_ATTRIBUTES: &str = "All";

#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
}

impl SqsQueue {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the default AWS config chain (env, profile files,
    /// instance metadata). `endpoint_url` points it at an SQS-compatible
    /// service such as ElasticMQ or LocalStack.
    pub async fn from_env(endpoint_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(url) = endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        Self::new(Client::new(&config))
    }
}

fn queue_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Queue(DisplayErrorContext(&err).to_string())
}

fn into_received(message: Message) -> Option<ReceivedMessage> {
    let Some(receipt_handle) = message.receipt_handle else {
        warn!(message_id = ?message.message_id, "received message without a receipt handle");
        return None;
    };
    let attributes = message
        .message_attributes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.string_value.map(|v| (name, v)))
        .collect();
    Some(ReceivedMessage {
        body: message.body.unwrap_or_default(),
        attributes,
        receipt_handle: ReceiptHandle::new(receipt_handle),
    })
}

#[async_trait]
impl QueueClient for SqsQueue {
    async fn resolve_queue_url(&self, name: &str) -> Result<QueueEndpoint> {
        debug!(queue = name, "GetQueueUrl");
        match self.client.get_queue_url().queue_name(name).send().await {
            Ok(output) => output
                .queue_url
                .map(QueueEndpoint::new)
                .ok_or_else(|| Error::Queue(format!("no URL returned for queue `{}`", name))),
            Err(err) => {
                if matches!(
                    err.as_service_error(),
                    Some(GetQueueUrlError::QueueDoesNotExist(_))
                ) {
                    Err(Error::NotFound(name.to_string()))
                } else {
                    Err(queue_error(err))
                }
            }
        }
    }

    async fn send_message(&self, endpoint: &QueueEndpoint, message: &LeaseMessage) -> Result<()> {
        let mut request = self
            .client
            .send_message()
            .queue_url(endpoint.as_str())
            .message_body(message.body())
            .message_group_id(message.group_key());
        for (name, value) in message.attributes() {
            let attribute = MessageAttributeValue::builder()
                .data_type(ATTRIBUTE_DATA_TYPE)
                .string_value(value)
                .build()
                .map_err(queue_error)?;
            request = request.message_attributes(name, attribute);
        }

        let output = request.send().await.map_err(queue_error)?;
        debug!(
            queue = %endpoint,
            body = %message.body(),
            message_id = ?output.message_id,
            "SendMessage"
        );
        Ok(())
    }

    async fn receive_messages(
        &self,
        endpoint: &QueueEndpoint,
        max_count: i32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>> {
        let visibility = i32::try_from(visibility_timeout.as_secs()).unwrap_or(i32::MAX);
        let output = self
            .client
            .receive_message()
            .queue_url(endpoint.as_str())
            .max_number_of_messages(max_count)
            .visibility_timeout(visibility)
            .message_attribute_names(ALL_ATTRIBUTES)
            .receive_request_attempt_id(uuid::Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(queue_error)?;

        let messages: Vec<ReceivedMessage> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(into_received)
            .collect();
        debug!(queue = %endpoint, count = messages.len(), "ReceiveMessage");
        Ok(messages)
    }

    async fn delete_message(&self, endpoint: &QueueEndpoint, receipt: &ReceiptHandle) -> Result<()> {
        debug!(queue = %endpoint, "DeleteMessage");
        match self
            .client
            .delete_message()
            .queue_url(endpoint.as_str())
            .receipt_handle(receipt.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => match err.as_service_error() {
                Some(DeleteMessageError::ReceiptHandleIsInvalid(_))
                | Some(DeleteMessageError::InvalidIdFormat(_)) => {
                    Err(Error::InvalidReceipt(DisplayErrorContext(&err).to_string()))
                }
                _ => Err(queue_error(err)),
            },
        }
    }
}
