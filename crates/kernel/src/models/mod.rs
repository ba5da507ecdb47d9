//! Database models.

pub mod category;
pub mod food_type;
pub mod listing;
pub mod rating;
pub mod restaurant;
pub mod suggestion;

pub use category::Category;
pub use food_type::{FoodType, LinkOwner};
pub use listing::{ListingFields, ListingPatch};
pub use rating::{AvgRating, CreateRating, Rating, RatingValues};
pub use restaurant::{CreateRestaurant, Restaurant, UpdateRestaurant};
pub use suggestion::{CreateSuggestion, RestaurantSuggestion, SuggestionStatus, UpdateSuggestion};
