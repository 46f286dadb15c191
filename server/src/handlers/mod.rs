pub mod auth;
pub mod form;
pub mod health;
pub mod outfits;
pub mod wardrobe;

pub use auth::{authenticate, logout};
pub use health::health_check;
pub use outfits::{
    create_outfit, delete_outfit, generate_outfit, list_outfits, suggest_combinations,
    update_outfit,
};
pub use wardrobe::{
    bulk_upload, create_item, delete_item, get_item, item_analytics, list_items,
    styling_suggestions, update_item,
};
