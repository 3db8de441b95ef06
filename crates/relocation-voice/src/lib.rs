//! Voice assistant side of the relocation planner.
//!
//! Normalizes the realtime event stream, assembles streamed tool-call
//! arguments, and dispatches completed calls to handlers that act on the
//! [`relocation_timeline::TimelineStore`].

pub mod accumulator;
pub mod args;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handler;
pub mod inference;
pub mod protocol;
pub mod session;
pub mod transport;

pub use accumulator::{CallAccumulator, CompletedCall};
pub use args::{AliasGroup, ToolArguments};
pub use dispatcher::{ToolDispatcher, ToolOutcome};
pub use error::{ToolError, VoiceError};
pub use events::RealtimeEvent;
pub use handler::housing::{HousingListing, HousingSearchQuery, HousingSearchService};
pub use handler::{ToolContext, ToolHandler, ToolRegistry};
pub use inference::{infer_profile_update, infer_route, RouteHint};
pub use protocol::{OutboundMessage, SESSION_INSTRUCTIONS};
pub use session::{PhaseMachine, TranscriptMessage, TranscriptRole, VoiceSessionController};
pub use transport::{
    ChannelTransport, CredentialProvider, EphemeralCredential, LoopbackConnector,
    RealtimeTransport, StaticCredentialProvider, TransportConnector,
};
