mod utils;

pub use utils::create_client;
