pub mod intent;
pub mod rules;
pub mod weights;

pub use intent::IntentLabel;
pub use weights::{ChannelId, WeightVector};
