pub mod rate;
pub mod resolve;
pub mod run;
pub mod setup;
pub mod ui;
pub mod user;
