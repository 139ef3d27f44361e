pub mod layout;
pub mod model;
pub mod store;

pub use model::{
    DetailState, Group, GroupResult, Indexed, ReferenceItem, ResultItem, SectionRef, SectionType,
    Session, SessionKind, SessionStatus, SessionSummary, SessionType, Side, SwapState,
};
pub use store::SessionStore;
