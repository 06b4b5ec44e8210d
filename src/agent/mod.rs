//! Conversation state and the agent protocol state machine.

pub mod conversation;
pub mod handle;
pub mod session;
pub mod state;

pub use conversation::{ConversationId, ConversationState};
pub use handle::SessionHandle;
pub use session::AgentSession;
pub use state::{EventSink, SessionEvent, SessionState, ToolRoundTrip, TurnResult, TurnStatus};
