pub mod cbr_json;
pub mod cbr_xml;
pub mod nominatim;
pub mod open_meteo;
pub mod telegram;
pub mod util;

pub use util::RetryPolicy;
