pub mod handlers;
pub mod observability;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
