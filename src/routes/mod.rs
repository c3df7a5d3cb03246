pub mod default_route;
pub mod search_route;
