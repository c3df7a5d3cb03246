pub mod decision_maker;
pub mod email;
pub mod lead;
pub mod phone;
pub mod web_link;
