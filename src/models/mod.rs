pub mod user;
pub mod page;
pub mod block;
pub mod badge;
pub mod view;

pub use user::User;
pub use page::{default_theme, Page};
pub use block::{Block, BlockType};
pub use badge::{Badge, BadgeType};
pub use view::View;
