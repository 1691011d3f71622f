//! Discord messaging: platform seams, the serenity adapter, and the
//! deferred-response editor.

pub mod discord;
pub mod response;
pub mod traits;

pub use discord::{DiscordPlatform, Handler};
pub use response::ResponseEditor;
pub use traits::{ChannelHistory, DeferredResponse, InteractionAcknowledger};
