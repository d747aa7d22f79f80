mod records;

pub use records::record_routes;
