//! Platform traits the controller and pipeline are written against.

use crate::ChannelMessage;
use crate::error::{ResponseError, Result};
use crate::messaging::response::EditMessageData;

/// Read access to recent channel history.
pub trait ChannelHistory: Send + Sync + 'static {
    /// Up to `limit` of the channel's latest messages, newest first.
    fn recent_messages(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> impl std::future::Future<Output = Result<Vec<ChannelMessage>>> + Send;
}

/// First phase of the deferred-response protocol.
pub trait InteractionAcknowledger: Send + Sync + 'static {
    /// Acknowledge an interaction as "deferred channel message with source".
    fn defer(
        &self,
        interaction_id: u64,
        token: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Second phase of the deferred-response protocol.
pub trait DeferredResponse: Send + Sync + 'static {
    /// Replace the deferred placeholder with `data`.
    fn edit_original(
        &self,
        token: &str,
        data: EditMessageData,
    ) -> impl std::future::Future<Output = std::result::Result<(), ResponseError>> + Send;
}
