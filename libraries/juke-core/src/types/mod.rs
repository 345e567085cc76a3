mod ids;
mod item;
mod play_state;

pub use ids::{ProviderId, SessionId};
pub use item::{Item, ItemKey};
pub use play_state::{PlayState, ResourceEvent};
