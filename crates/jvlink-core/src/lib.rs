// jvlink-core: session orchestration over the JV-Link data service.
//
// The native component is apartment-threaded and blocking; this crate wraps
// it in a confined dispatcher, a reentrancy-guarded session state machine,
// eager and lazy read surfaces (sync and cancellable async), and a bounded
// watch-event pump. Backends implement the JvLinkClient contract; tests use
// the scripted stub from jv-test-utils.

pub mod blocking;
pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod session;
pub mod stream;

pub use config::{ConfigError, JvLinkConfig, load_config_from_path, load_config_from_str};
pub use contract::{
    EventSink, JvLinkClient, MovieType, OpenRequest, OpenSummary, Payload, Property,
    PropertyAccess, PropertyValue, ReadOutcome, parse_from_time,
};
pub use error::{JvLinkError, NativeFailure, RECOVERABLE_BY_SKIP, TIMEOUT_CODE};
pub use events::EventItem;
pub use session::{JvLink, SessionPolicy, SessionState, WorkoutListing};
pub use stream::PayloadStream;
